//! Repository: cancellable git subprocess execution and the branch,
//! divergence, and worktree primitives built on it.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::Context;
use wait_timeout::ChildExt;

use super::{Divergence, GitError, WorktreeInfo, validate_branch_name};
use crate::cancel::{CancelScope, Cancelled};

/// How often the supervisor re-checks the cancellation scope while a git
/// subprocess runs.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A discovered git repository.
///
/// `work_root` is the root of the working tree the command was invoked in
/// (a linked worktree when run from one); `main_root` is the main
/// repository root, shared by all worktrees. Ticket enumeration always
/// goes through `main_root`; worktree-local operations use explicit paths.
#[derive(Debug, Clone)]
pub struct Repository {
    work_root: PathBuf,
    main_root: PathBuf,
    timeout: Duration,
}

impl Repository {
    /// Discover the repository containing `path`.
    pub fn discover(scope: &CancelScope, path: &Path, timeout: Duration) -> anyhow::Result<Self> {
        let output = execute_git(scope, path, &["rev-parse", "--show-toplevel"], timeout)?;
        if !output.status.success() {
            return Err(GitError::NotARepository {
                path: path.to_path_buf(),
            }
            .into());
        }
        let toplevel = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let work_root = dunce::canonicalize(&toplevel)
            .with_context(|| format!("Failed to canonicalize {toplevel}"))?;

        // The common dir is shared across linked worktrees; its parent is
        // the main repository root.
        let output = execute_git(
            scope,
            &work_root,
            &["rev-parse", "--git-common-dir"],
            timeout,
        )?;
        if !output.status.success() {
            return Err(command_failed("rev-parse --git-common-dir", &output).into());
        }
        let common = PathBuf::from(String::from_utf8_lossy(&output.stdout).trim());
        let common = if common.is_relative() {
            work_root.join(common)
        } else {
            common
        };
        let common = dunce::canonicalize(&common)
            .with_context(|| format!("Failed to canonicalize {}", common.display()))?;
        let main_root = common
            .parent()
            .context("Git common directory has no parent")?
            .to_path_buf();

        Ok(Self {
            work_root,
            main_root,
            timeout,
        })
    }

    /// Replace the per-invocation timeout (applied once the config is
    /// loaded; discovery runs with a bootstrap default).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Root of the working tree the command was invoked in.
    pub fn work_root(&self) -> &Path {
        &self.work_root
    }

    /// Main repository root (same as `work_root` outside linked worktrees).
    pub fn main_root(&self) -> &Path {
        &self.main_root
    }

    /// True when the invocation directory is a linked worktree, not the
    /// main checkout.
    pub fn in_linked_worktree(&self) -> bool {
        self.work_root != self.main_root
    }

    // ------------------------------------------------------------------
    // Command execution
    // ------------------------------------------------------------------

    /// Run git in the main repository root, returning stdout.
    pub fn run(&self, scope: &CancelScope, args: &[&str]) -> anyhow::Result<String> {
        let output = execute_git(scope, &self.main_root, args, self.timeout)?;
        if !output.status.success() {
            return Err(command_failed(&args.join(" "), &output).into());
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Run git in an explicit working directory, returning stdout.
    pub fn run_in(&self, scope: &CancelScope, cwd: &Path, args: &[&str]) -> anyhow::Result<String> {
        let output = execute_git(scope, cwd, args, self.timeout)?;
        if !output.status.success() {
            return Err(command_failed(&args.join(" "), &output).into());
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Run git and report only whether it exited zero. For commands that
    /// use exit codes as boolean results (`merge-base --is-ancestor`).
    pub fn run_check(&self, scope: &CancelScope, args: &[&str]) -> anyhow::Result<bool> {
        let output = execute_git(scope, &self.main_root, args, self.timeout)?;
        Ok(output.status.success())
    }

    // ------------------------------------------------------------------
    // Branches
    // ------------------------------------------------------------------

    /// The branch checked out in the invocation working tree, or `None`
    /// for detached HEAD.
    pub fn current_branch(&self, scope: &CancelScope) -> anyhow::Result<Option<String>> {
        let work_root = self.work_root.clone();
        let out = self.run_in(scope, &work_root, &["rev-parse", "--abbrev-ref", "HEAD"])?;
        let branch = out.trim();
        if branch == "HEAD" {
            Ok(None)
        } else {
            Ok(Some(branch.to_string()))
        }
    }

    pub fn branch_exists(&self, scope: &CancelScope, name: &str) -> anyhow::Result<bool> {
        validate_branch_name(name)?;
        self.run_check(scope, &[
            "show-ref",
            "--verify",
            "--quiet",
            &format!("refs/heads/{name}"),
        ])
    }

    pub fn create_branch(
        &self,
        scope: &CancelScope,
        name: &str,
        base: Option<&str>,
    ) -> anyhow::Result<()> {
        validate_branch_name(name)?;
        if let Some(base) = base {
            validate_branch_name(base)?;
            self.run(scope, &["branch", name, base])?;
        } else {
            self.run(scope, &["branch", name])?;
        }
        Ok(())
    }

    pub fn delete_branch(&self, scope: &CancelScope, name: &str, force: bool) -> anyhow::Result<()> {
        validate_branch_name(name)?;
        let flag = if force { "-D" } else { "-d" };
        self.run(scope, &["branch", flag, name])?;
        Ok(())
    }

    pub fn checkout(&self, scope: &CancelScope, name: &str) -> anyhow::Result<()> {
        validate_branch_name(name)?;
        let work_root = self.work_root.clone();
        self.run_in(scope, &work_root, &["checkout", name])?;
        Ok(())
    }

    /// Tip commit hash of a branch.
    pub fn branch_commit(&self, scope: &CancelScope, name: &str) -> anyhow::Result<String> {
        validate_branch_name(name)?;
        let out = self.run(scope, &["rev-parse", "--verify", &format!("refs/heads/{name}")])?;
        Ok(out.trim().to_string())
    }

    /// List all local branch names.
    pub fn list_branches(&self, scope: &CancelScope) -> anyhow::Result<Vec<String>> {
        let out = self.run(scope, &[
            "for-each-ref",
            "--format=%(refname:short)",
            "refs/heads",
        ])?;
        Ok(out.lines().map(|l| l.trim().to_string()).collect())
    }

    /// Resolve the repository's default branch.
    ///
    /// Precedence: HEAD of `origin` if present, then `init.defaultBranch`,
    /// then the literal `main`. Probe failures degrade to the next option
    /// rather than failing the surrounding operation.
    pub fn default_branch(&self, scope: &CancelScope) -> String {
        if let Ok(out) = self.run(scope, &["symbolic-ref", "--short", "refs/remotes/origin/HEAD"]) {
            let trimmed = out.trim();
            let branch = trimmed.strip_prefix("origin/").unwrap_or(trimmed);
            if !branch.is_empty() {
                return branch.to_string();
            }
        }
        if let Ok(out) = self.run(scope, &["config", "--get", "init.defaultBranch"]) {
            let trimmed = out.trim();
            if !trimmed.is_empty() {
                return trimmed.to_string();
            }
        }
        "main".to_string()
    }

    // ------------------------------------------------------------------
    // Divergence
    // ------------------------------------------------------------------

    /// `(ahead, behind)` commit counts for `branch` relative to `base`,
    /// via `rev-list --left-right --count`. Both counts must parse.
    pub fn divergence(
        &self,
        scope: &CancelScope,
        branch: &str,
        base: &str,
    ) -> anyhow::Result<Divergence> {
        validate_branch_name(branch)?;
        validate_branch_name(base)?;
        let out = self.run(scope, &[
            "rev-list",
            "--left-right",
            "--count",
            &format!("{base}...{branch}"),
        ])?;
        // Left counts commits only on base (behind); right only on branch (ahead)
        let mut parts = out.split_whitespace();
        let behind = parts.next().and_then(|s| s.parse::<usize>().ok());
        let ahead = parts.next().and_then(|s| s.parse::<usize>().ok());
        match (ahead, behind) {
            (Some(ahead), Some(behind)) => Ok(Divergence {
                branch: branch.to_string(),
                base: base.to_string(),
                ahead,
                behind,
            }),
            _ => Err(GitError::Parse(format!(
                "Unexpected rev-list --count output: {:?}",
                out.trim()
            ))
            .into()),
        }
    }

    /// True iff `ahead + behind > 0`.
    pub fn is_diverged_from(
        &self,
        scope: &CancelScope,
        branch: &str,
        base: &str,
    ) -> anyhow::Result<bool> {
        Ok(self.divergence(scope, branch, base)?.is_diverged())
    }

    /// True when `base` contains `branch`'s tip.
    pub fn is_merged(&self, scope: &CancelScope, branch: &str, base: &str) -> anyhow::Result<bool> {
        validate_branch_name(branch)?;
        validate_branch_name(base)?;
        self.run_check(scope, &["merge-base", "--is-ancestor", branch, base])
    }

    // ------------------------------------------------------------------
    // Working tree state
    // ------------------------------------------------------------------

    /// Tracked files with uncommitted changes in the invocation working
    /// tree. Untracked files are not reported; they never block a start.
    pub fn uncommitted_changes(&self, scope: &CancelScope) -> anyhow::Result<Vec<String>> {
        let work_root = self.work_root.clone();
        let out = self.run_in(scope, &work_root, &["status", "--porcelain"])?;
        Ok(out
            .lines()
            .filter(|line| !line.starts_with("??"))
            .filter_map(|line| line.get(3..))
            .map(str::to_string)
            .collect())
    }

    /// Stage a pathspec and commit it in `cwd`. Returns `false` when there
    /// was nothing to commit (not an error).
    pub fn commit_paths(
        &self,
        scope: &CancelScope,
        cwd: &Path,
        pathspec: &str,
        message: &str,
    ) -> anyhow::Result<bool> {
        self.run_in(scope, cwd, &["add", "-A", "--", pathspec])?;
        let output = execute_git(scope, cwd, &["commit", "-m", message], self.timeout)?;
        if output.status.success() {
            return Ok(true);
        }
        let combined = format!(
            "{}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        if combined.contains("nothing to commit") || combined.contains("no changes added") {
            return Ok(false);
        }
        Err(command_failed(&format!("commit -m {message:?}"), &output).into())
    }

    // ------------------------------------------------------------------
    // Worktrees
    // ------------------------------------------------------------------

    /// List all worktrees tracked by the repository, bare entries excluded.
    pub fn list_worktrees(&self, scope: &CancelScope) -> anyhow::Result<Vec<WorktreeInfo>> {
        let out = self.run(scope, &["worktree", "list", "--porcelain"])?;
        let raw = WorktreeInfo::parse_porcelain_list(&out)?;
        Ok(raw.into_iter().filter(|wt| !wt.bare).collect())
    }

    /// The worktree path bound to `branch`, if any.
    pub fn worktree_for_branch(
        &self,
        scope: &CancelScope,
        branch: &str,
    ) -> anyhow::Result<Option<PathBuf>> {
        let worktrees = self.list_worktrees(scope)?;
        Ok(worktrees
            .into_iter()
            .find(|wt| wt.branch.as_deref() == Some(branch))
            .map(|wt| wt.path))
    }

    /// `git worktree add`, creating the branch from `base` when given.
    pub fn add_worktree(
        &self,
        scope: &CancelScope,
        path: &Path,
        branch: &str,
        base: Option<&str>,
    ) -> anyhow::Result<()> {
        validate_branch_name(branch)?;
        let path_str = path.to_str().ok_or_else(|| {
            GitError::Parse(format!("Worktree path is not valid UTF-8: {}", path.display()))
        })?;
        match base {
            Some(base) => {
                validate_branch_name(base)?;
                self.run(scope, &["worktree", "add", "-b", branch, path_str, base])?;
            }
            None => {
                self.run(scope, &["worktree", "add", path_str, branch])?;
            }
        }
        Ok(())
    }

    /// `git worktree remove`; `--force` allows removal with untracked files.
    pub fn remove_worktree(
        &self,
        scope: &CancelScope,
        path: &Path,
        force: bool,
    ) -> anyhow::Result<()> {
        let path_str = path.to_str().ok_or_else(|| {
            GitError::Parse(format!("Worktree path is not valid UTF-8: {}", path.display()))
        })?;
        let mut args = vec!["worktree", "remove"];
        if force {
            args.push("--force");
        }
        args.push(path_str);
        self.run(scope, &args)?;
        Ok(())
    }

    /// Drop worktree entries whose directories no longer exist.
    pub fn prune_worktrees(&self, scope: &CancelScope) -> anyhow::Result<()> {
        self.run(scope, &["worktree", "prune"])?;
        Ok(())
    }
}

fn command_failed(command: &str, output: &std::process::Output) -> GitError {
    let stderr = String::from_utf8_lossy(&output.stderr);
    // Git uses \r for progress updates; normalize for stable output
    let stderr = stderr.replace('\r', "\n");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let merged = [stderr.trim(), stdout.trim()]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    GitError::CommandFailed {
        command: format!("git {command}"),
        output: merged,
    }
}

/// Run a git subprocess under a cancellation scope.
///
/// The child is spawned without a shell, its output drained by reader
/// threads (so a chatty command cannot deadlock on a full pipe), and its
/// exit polled so the scope stays responsive: an interrupt kills the child
/// and surfaces [`Cancelled`]; deadline expiry kills it and surfaces
/// [`GitError::Timeout`].
fn execute_git(
    scope: &CancelScope,
    cwd: &Path,
    args: &[&str],
    timeout: Duration,
) -> anyhow::Result<std::process::Output> {
    scope.check()?;
    let effective = scope.with_timeout(timeout);
    let cmd_str = format!("git {}", args.join(" "));
    log::debug!("$ {cmd_str} [{}]", cwd.display());

    let mut child = Command::new("git")
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("Failed to spawn: {cmd_str}"))?;

    let stdout = child.stdout.take().expect("stdout was piped");
    let stderr = child.stderr.take().expect("stderr was piped");
    let stdout_handle = thread::spawn(move || drain(stdout));
    let stderr_handle = thread::spawn(move || drain(stderr));

    let status = loop {
        match child.wait_timeout(POLL_INTERVAL)? {
            Some(status) => break status,
            None => {
                if effective.is_interrupted() {
                    let _ = child.kill();
                    let _ = child.wait();
                    log::debug!("killed (interrupted): {cmd_str}");
                    return Err(Cancelled.into());
                }
                if effective.timed_out() {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(GitError::Timeout {
                        command: cmd_str,
                        seconds: timeout.as_secs(),
                    }
                    .into());
                }
            }
        }
    };

    let stdout = stdout_handle.join().unwrap_or_default();
    let stderr = stderr_handle.join().unwrap_or_default();
    Ok(std::process::Output {
        status,
        stdout,
        stderr,
    })
}

fn drain(mut reader: impl Read) -> Vec<u8> {
    let mut buf = Vec::new();
    let _ = reader.read_to_end(&mut buf);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Initialize an isolated repository with deterministic config and one
    /// commit on `main`.
    fn init_repo() -> (tempfile::TempDir, Repository) {
        let dir = tempfile::tempdir().unwrap();
        let scope = CancelScope::root();
        for args in [
            vec!["init", "-b", "main"],
            vec!["config", "user.name", "Test"],
            vec!["config", "user.email", "test@example.com"],
            vec!["config", "commit.gpgsign", "false"],
        ] {
            let status = Command::new("git")
                .args(&args)
                .current_dir(dir.path())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .unwrap();
            assert!(status.success(), "git {args:?} failed");
        }
        std::fs::write(dir.path().join("README.md"), "# test\n").unwrap();
        for args in [vec!["add", "."], vec!["commit", "-m", "init"]] {
            let status = Command::new("git")
                .args(&args)
                .current_dir(dir.path())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .unwrap();
            assert!(status.success(), "git {args:?} failed");
        }
        let repo =
            Repository::discover(&scope, dir.path(), Duration::from_secs(30)).unwrap();
        (dir, repo)
    }

    #[test]
    fn test_discover_not_a_repo() {
        let dir = tempfile::tempdir().unwrap();
        let scope = CancelScope::root();
        let err =
            Repository::discover(&scope, dir.path(), Duration::from_secs(30)).unwrap_err();
        assert!(err.downcast_ref::<GitError>().is_some());
    }

    #[test]
    fn test_current_branch_and_exists() {
        let (_dir, repo) = init_repo();
        let scope = CancelScope::root();
        assert_eq!(repo.current_branch(&scope).unwrap().as_deref(), Some("main"));
        assert!(repo.branch_exists(&scope, "main").unwrap());
        assert!(!repo.branch_exists(&scope, "missing").unwrap());
    }

    #[test]
    fn test_create_and_delete_branch() {
        let (_dir, repo) = init_repo();
        let scope = CancelScope::root();
        repo.create_branch(&scope, "250711-093015-x", Some("main"))
            .unwrap();
        assert!(repo.branch_exists(&scope, "250711-093015-x").unwrap());
        repo.delete_branch(&scope, "250711-093015-x", true).unwrap();
        assert!(!repo.branch_exists(&scope, "250711-093015-x").unwrap());
    }

    #[test]
    fn test_divergence_counts() {
        let (dir, repo) = init_repo();
        let scope = CancelScope::root();
        repo.create_branch(&scope, "topic", Some("main")).unwrap();
        assert_eq!(
            repo.branch_commit(&scope, "topic").unwrap(),
            repo.branch_commit(&scope, "main").unwrap()
        );
        assert!(!repo.is_diverged_from(&scope, "topic", "main").unwrap());

        // Advance main by one commit: topic is now behind 1, ahead 0
        std::fs::write(dir.path().join("a.txt"), "a\n").unwrap();
        repo.run_in(&scope, dir.path(), &["add", "."]).unwrap();
        repo.run_in(&scope, dir.path(), &["commit", "-m", "advance"])
            .unwrap();

        let d = repo.divergence(&scope, "topic", "main").unwrap();
        assert_eq!((d.ahead, d.behind), (0, 1));
        assert!(d.is_diverged());
        assert!(repo.is_diverged_from(&scope, "topic", "main").unwrap());
        assert!(repo.is_merged(&scope, "topic", "main").unwrap());
    }

    #[test]
    fn test_checkout_switches_branch() {
        let (_dir, repo) = init_repo();
        let scope = CancelScope::root();
        repo.create_branch(&scope, "topic", Some("main")).unwrap();
        repo.checkout(&scope, "topic").unwrap();
        assert_eq!(
            repo.current_branch(&scope).unwrap().as_deref(),
            Some("topic")
        );
        repo.checkout(&scope, "main").unwrap();
    }

    #[test]
    fn test_default_branch_fallbacks() {
        let (_dir, repo) = init_repo();
        let scope = CancelScope::root();
        // No origin; init.defaultBranch unset in repo config may still fall
        // through to the literal default. Either probe result is a non-empty
        // branch name.
        let branch = repo.default_branch(&scope);
        assert!(!branch.is_empty());
    }

    #[test]
    fn test_uncommitted_changes_ignores_untracked() {
        let (dir, repo) = init_repo();
        let scope = CancelScope::root();
        std::fs::write(dir.path().join("untracked.txt"), "x\n").unwrap();
        assert!(repo.uncommitted_changes(&scope).unwrap().is_empty());

        std::fs::write(dir.path().join("README.md"), "# changed\n").unwrap();
        let changes = repo.uncommitted_changes(&scope).unwrap();
        assert_eq!(changes, vec!["README.md".to_string()]);
    }

    #[test]
    fn test_cancelled_scope_rejects_execution() {
        let (_dir, repo) = init_repo();
        let scope = CancelScope::root();
        scope.cancel();
        let err = repo.run(&scope, &["status"]).unwrap_err();
        assert!(err.downcast_ref::<Cancelled>().is_some());
    }

    #[test]
    fn test_worktree_add_list_remove() {
        let (dir, repo) = init_repo();
        let scope = CancelScope::root();
        let wt_path = dir.path().join("wt-topic");
        repo.add_worktree(&scope, &wt_path, "250711-093015-x", Some("main"))
            .unwrap();

        let found = repo
            .worktree_for_branch(&scope, "250711-093015-x")
            .unwrap()
            .unwrap();
        assert_eq!(
            dunce::canonicalize(&found).unwrap(),
            dunce::canonicalize(&wt_path).unwrap()
        );

        repo.remove_worktree(&scope, &wt_path, true).unwrap();
        assert!(
            repo.worktree_for_branch(&scope, "250711-093015-x")
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_commit_paths_nothing_to_commit() {
        let (dir, repo) = init_repo();
        let scope = CancelScope::root();
        let committed = repo
            .commit_paths(&scope, dir.path(), ".", "empty commit attempt")
            .unwrap();
        assert!(!committed);
    }
}
