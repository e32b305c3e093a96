//! Git operations: a thin, cancellable wrapper around the git executable.
//!
//! Everything here shells out to `git` as a subprocess — no libgit2. Each
//! invocation runs under a cancellation scope with a per-operation timeout;
//! the subprocess is killed when the scope is interrupted or the deadline
//! passes.

mod error;
mod repository;

pub use error::GitError;
pub use repository::Repository;

use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

/// Commit counts describing how a branch relates to its base.
///
/// `ahead` = commits on `branch` not on `base`; `behind` = commits on
/// `base` not on `branch`. Carried by [`GitError::Diverged`] so the UI
/// can render a prompt (or pick a non-interactive default) without
/// string-parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Divergence {
    pub branch: String,
    pub base: String,
    pub ahead: usize,
    pub behind: usize,
}

impl Divergence {
    pub fn is_diverged(&self) -> bool {
        self.ahead + self.behind > 0
    }
}

/// One entry from `git worktree list --porcelain`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorktreeInfo {
    pub path: PathBuf,
    pub head: String,
    pub branch: Option<String>,
    pub bare: bool,
    pub detached: bool,
    pub locked: Option<String>,
    pub prunable: Option<String>,
}

impl WorktreeInfo {
    pub(crate) fn parse_porcelain_list(output: &str) -> Result<Vec<Self>, GitError> {
        let mut worktrees = Vec::new();
        let mut current: Option<WorktreeInfo> = None;

        for line in output.lines() {
            if line.is_empty() {
                if let Some(wt) = current.take() {
                    worktrees.push(wt);
                }
                continue;
            }

            let (key, value) = match line.split_once(' ') {
                Some((k, v)) => (k, Some(v)),
                None => (line, None),
            };

            match key {
                "worktree" => {
                    let path = value.ok_or_else(|| {
                        GitError::Parse("worktree line missing path".to_string())
                    })?;
                    current = Some(WorktreeInfo {
                        path: PathBuf::from(path),
                        head: String::new(),
                        branch: None,
                        bare: false,
                        detached: false,
                        locked: None,
                        prunable: None,
                    });
                }
                key => match (key, current.as_mut()) {
                    ("HEAD", Some(wt)) => {
                        wt.head = value
                            .ok_or_else(|| GitError::Parse("HEAD line missing SHA".to_string()))?
                            .to_string();
                    }
                    ("branch", Some(wt)) => {
                        let branch_ref = value.ok_or_else(|| {
                            GitError::Parse("branch line missing ref".to_string())
                        })?;
                        let branch = branch_ref
                            .strip_prefix("refs/heads/")
                            .unwrap_or(branch_ref)
                            .to_string();
                        wt.branch = Some(branch);
                    }
                    ("bare", Some(wt)) => wt.bare = true,
                    ("detached", Some(wt)) => wt.detached = true,
                    ("locked", Some(wt)) => {
                        wt.locked = Some(value.unwrap_or_default().to_string());
                    }
                    ("prunable", Some(wt)) => {
                        wt.prunable = Some(value.unwrap_or_default().to_string());
                    }
                    _ => {
                        // Ignore unknown attributes or attributes before first worktree
                    }
                },
            }
        }

        if let Some(wt) = current {
            worktrees.push(wt);
        }

        Ok(worktrees)
    }
}

/// Validate a name before it appears on a git command line.
///
/// Allow-list: leading alphanumeric, then alphanumerics, `.`, `_`, `-`,
/// and `/`. Additionally rejects `..`, `@{`, trailing `/` or `.lock`.
/// This rejects whitespace, shell metacharacters, and leading `-`
/// (option injection) by construction. Every generated ticket ID passes.
pub fn validate_branch_name(name: &str) -> Result<(), GitError> {
    static BRANCH_RE: OnceLock<Regex> = OnceLock::new();
    let re = BRANCH_RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._/-]*$").unwrap());

    let invalid = || GitError::InvalidBranchName {
        branch: name.to_string(),
    };

    if !re.is_match(name)
        || name.contains("..")
        || name.contains("@{")
        || name.ends_with('/')
        || name.ends_with(".lock")
    {
        return Err(invalid());
    }
    Ok(())
}
