//! Worktree controller: materializes per-ticket worktrees and the
//! artifacts inside them.
//!
//! A ticket worktree lives at `<worktree_base>/<ID>` and is bound to the
//! branch named after the ticket. The controller creates and removes
//! worktrees, copies the ticket file into the worktree's `doing/`
//! directory, wires the `current-ticket.md` symlink, and runs the
//! project's init commands.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use anyhow::Context;
use wait_timeout::ChildExt;

use crate::cancel::{CancelScope, Cancelled};
use crate::config::Config;
use crate::git::{GitError, Repository, WorktreeInfo};
use crate::ticket::store::TicketStore;
use crate::ticket::{Status, Ticket, TicketId};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

pub struct WorktreeController<'a> {
    repo: &'a Repository,
    config: &'a Config,
}

impl<'a> WorktreeController<'a> {
    pub fn new(repo: &'a Repository, config: &'a Config) -> Self {
        Self { repo, config }
    }

    /// Directory that holds all ticket worktrees.
    pub fn base_dir(&self) -> PathBuf {
        self.config.worktree_base(self.repo.main_root())
    }

    /// `<worktree_base>/<ID>`.
    pub fn path_for(&self, id: &TicketId) -> PathBuf {
        self.base_dir().join(id.as_str())
    }

    /// Create a worktree for `branch`.
    ///
    /// When the branch already exists it is checked for divergence against
    /// the default branch: diverged branches fail with
    /// [`GitError::Diverged`] (carrying the counts) and non-diverged ones
    /// are attached as-is. A partial failure leaves no worktree metadata
    /// behind.
    pub fn add(
        &self,
        scope: &CancelScope,
        branch: &str,
        base_branch: &str,
    ) -> anyhow::Result<PathBuf> {
        if self.repo.branch_exists(scope, branch)? {
            let default = self.default_branch(scope);
            let divergence = self.repo.divergence(scope, branch, &default)?;
            if divergence.is_diverged() {
                return Err(GitError::Diverged(divergence).into());
            }
            self.attach(scope, branch)
        } else {
            self.create(scope, branch, Some(base_branch))
        }
    }

    /// Attach a worktree to an existing branch without a divergence check.
    /// Used when the user chose "use existing" at the divergence prompt.
    pub fn attach(&self, scope: &CancelScope, branch: &str) -> anyhow::Result<PathBuf> {
        self.create(scope, branch, None)
    }

    fn create(
        &self,
        scope: &CancelScope,
        branch: &str,
        base: Option<&str>,
    ) -> anyhow::Result<PathBuf> {
        let id = TicketId::parse(branch)
            .map_err(|_| GitError::InvalidBranchName {
                branch: branch.to_string(),
            })?;
        let path = self.path_for(&id);
        let base_dir = self.base_dir();
        std::fs::create_dir_all(&base_dir)
            .with_context(|| format!("Failed to create {}", base_dir.display()))?;

        let existed_before = path.exists();
        if let Err(e) = self.repo.add_worktree(scope, &path, branch, base) {
            // Roll back anything git left behind before surfacing the error
            if !existed_before && path.exists() {
                let _ = std::fs::remove_dir_all(&path);
            }
            let _ = self.repo.prune_worktrees(scope);
            if e.downcast_ref::<Cancelled>().is_some() {
                return Err(e);
            }
            return Err(GitError::WorktreeAddFailed {
                branch: branch.to_string(),
                path,
                error: e.to_string(),
            }
            .into());
        }
        Ok(path)
    }

    /// Remove the worktree at `path` and prune stale metadata. Tolerant of
    /// an already-absent directory.
    pub fn remove(&self, scope: &CancelScope, path: &Path) -> anyhow::Result<()> {
        if path.exists() {
            self.repo.remove_worktree(scope, path, true)?;
        }
        self.repo.prune_worktrees(scope)?;
        Ok(())
    }

    /// Copy the ticket file into the worktree's `doing/` directory and
    /// point `current-ticket.md` at the copy.
    ///
    /// The copy is the source of truth while the ticket is in progress;
    /// the main-repo copy stays behind so enumeration from the main
    /// checkout continues to see the ticket.
    pub fn provision_ticket_artifacts(
        &self,
        scope: &CancelScope,
        worktree_path: &Path,
        ticket: &Ticket,
    ) -> anyhow::Result<PathBuf> {
        scope.check()?;
        let doing_dir = self.config.status_dir(worktree_path, Status::Doing);
        std::fs::create_dir_all(&doing_dir)
            .with_context(|| format!("Failed to create {}", doing_dir.display()))?;
        let copy_path = doing_dir.join(ticket.id.file_name());
        std::fs::copy(&ticket.path, &copy_path).with_context(|| {
            format!(
                "Failed to copy {} to {}",
                ticket.path.display(),
                copy_path.display()
            )
        })?;

        let store = TicketStore::new(worktree_path, self.config);
        store.set_current(worktree_path, Some(&copy_path))?;
        Ok(copy_path)
    }

    /// Run the configured init commands sequentially in the worktree.
    ///
    /// Commands are tokenized with shell-words rules and executed without
    /// a shell, each under the init timeout. The first failure aborts the
    /// sequence; the caller decides whether to tear the worktree down.
    pub fn run_init_commands(
        &self,
        scope: &CancelScope,
        worktree_path: &Path,
        commands: &[String],
    ) -> anyhow::Result<()> {
        for raw in commands {
            scope.check()?;
            let argv = shell_words::split(raw).map_err(|e| GitError::InitCommandFailed {
                command: raw.clone(),
                error: format!("tokenization failed: {e}"),
                exit_code: None,
            })?;
            let Some((program, args)) = argv.split_first() else {
                continue;
            };
            log::debug!("$ {raw} [{}]", worktree_path.display());
            run_init_command(
                scope,
                worktree_path,
                raw,
                program,
                args,
                self.config.init_timeout(),
            )?;
        }
        Ok(())
    }

    /// Worktrees that look like ticket worktrees: branch named like a
    /// ticket ID, or rooted under the configured base directory. The main
    /// checkout is never included.
    pub fn list_ticket_worktrees(&self, scope: &CancelScope) -> anyhow::Result<Vec<WorktreeInfo>> {
        let base = self.base_dir();
        let main_root = self.repo.main_root();
        let worktrees = self.repo.list_worktrees(scope)?;
        Ok(worktrees
            .into_iter()
            .filter(|wt| {
                let canonical = dunce::canonicalize(&wt.path).unwrap_or_else(|_| wt.path.clone());
                if canonical == main_root {
                    return false;
                }
                wt.branch.as_deref().is_some_and(TicketId::is_id)
                    || canonical.starts_with(&base)
            })
            .collect())
    }

    fn default_branch(&self, scope: &CancelScope) -> String {
        self.config
            .git
            .default_branch
            .clone()
            .unwrap_or_else(|| self.repo.default_branch(scope))
    }
}

fn run_init_command(
    scope: &CancelScope,
    cwd: &Path,
    raw: &str,
    program: &str,
    args: &[String],
    timeout: Duration,
) -> anyhow::Result<()> {
    let effective = scope.with_timeout(timeout);
    let mut child = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| GitError::InitCommandFailed {
            command: raw.to_string(),
            error: e.to_string(),
            exit_code: None,
        })?;

    // Drain both pipes so a chatty command can't block on a full buffer
    let stdout = child.stdout.take().expect("stdout was piped");
    let stdout_handle = std::thread::spawn(move || {
        use std::io::Read;
        let mut buf = String::new();
        let mut reader = stdout;
        let _ = reader.read_to_string(&mut buf);
        buf
    });
    let stderr = child.stderr.take().expect("stderr was piped");
    let stderr_handle = std::thread::spawn(move || {
        use std::io::Read;
        let mut buf = String::new();
        let mut reader = stderr;
        let _ = reader.read_to_string(&mut buf);
        buf
    });

    let status = loop {
        match child.wait_timeout(POLL_INTERVAL)? {
            Some(status) => break status,
            None => {
                if effective.is_interrupted() {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(Cancelled.into());
                }
                if effective.timed_out() {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(GitError::InitCommandFailed {
                        command: raw.to_string(),
                        error: format!("timed out after {}s", timeout.as_secs()),
                        exit_code: None,
                    }
                    .into());
                }
            }
        }
    };

    if !status.success() {
        let stderr = stderr_handle.join().unwrap_or_default();
        return Err(GitError::InitCommandFailed {
            command: raw.to_string(),
            error: stderr.trim().to_string(),
            exit_code: status.code(),
        }
        .into());
    }

    let stdout = stdout_handle.join().unwrap_or_default();
    if !stdout.trim().is_empty() {
        log::debug!("init command output: {}", stdout.trim());
    }
    Ok(())
}
