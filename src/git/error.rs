//! Git error types and formatting.

use std::path::PathBuf;

use super::Divergence;

#[derive(Debug)]
pub enum GitError {
    /// git exited non-zero; carries the captured stderr/stdout.
    CommandFailed { command: String, output: String },
    /// The per-operation deadline elapsed and the subprocess was killed.
    Timeout { command: String, seconds: u64 },
    /// Output from git did not parse as expected.
    Parse(String),
    /// The path is not inside a git repository.
    NotARepository { path: PathBuf },
    /// The working tree has uncommitted (tracked) changes.
    UncommittedChanges { files: Vec<String> },
    /// A name failed the branch-name allow-list.
    InvalidBranchName { branch: String },
    /// A branch exists but has diverged from its base.
    Diverged(Divergence),
    /// Creating a worktree failed (after rollback of partial state).
    WorktreeAddFailed {
        branch: String,
        path: PathBuf,
        error: String,
    },
    /// An init command failed inside a fresh worktree.
    InitCommandFailed {
        command: String,
        error: String,
        exit_code: Option<i32>,
    },
}

impl GitError {
    /// The divergence payload, when this is a divergence error.
    pub fn divergence(&self) -> Option<&Divergence> {
        match self {
            GitError::Diverged(d) => Some(d),
            _ => None,
        }
    }
}

impl std::fmt::Display for GitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use crate::styling::{ERROR, ERROR_BOLD, ERROR_EMOJI, HINT, HINT_EMOJI};

        match self {
            GitError::CommandFailed { command, output } => {
                write!(
                    f,
                    "{ERROR_EMOJI} {ERROR}git command failed: {ERROR_BOLD}{command}{ERROR_BOLD:#}{ERROR:#}"
                )?;
                let trimmed = output.trim();
                if !trimmed.is_empty() {
                    write!(f, "\n{trimmed}")?;
                }
                Ok(())
            }

            GitError::Timeout { command, seconds } => write!(
                f,
                "{ERROR_EMOJI} {ERROR}git command timed out after {seconds}s: {ERROR_BOLD}{command}{ERROR_BOLD:#}{ERROR:#}\n\n{HINT_EMOJI} {HINT}Raise git.timeout_seconds in .ticketflow.yaml if this repository is slow{HINT:#}"
            ),

            GitError::Parse(msg) => {
                write!(f, "{ERROR_EMOJI} {ERROR}{msg}{ERROR:#}")
            }

            GitError::NotARepository { path } => write!(
                f,
                "{ERROR_EMOJI} {ERROR}Not a git repository: {ERROR_BOLD}{}{ERROR_BOLD:#}{ERROR:#}",
                path.display()
            ),

            GitError::UncommittedChanges { files } => {
                write!(
                    f,
                    "{ERROR_EMOJI} {ERROR}Working tree has uncommitted changes{ERROR:#}\n"
                )?;
                for file in files.iter().take(10) {
                    writeln!(f, "  {file}")?;
                }
                if files.len() > 10 {
                    writeln!(f, "  … and {} more", files.len() - 10)?;
                }
                write!(
                    f,
                    "{HINT_EMOJI} {HINT}Commit or stash them first{HINT:#}"
                )
            }

            GitError::InvalidBranchName { branch } => write!(
                f,
                "{ERROR_EMOJI} {ERROR}Invalid branch name: {ERROR_BOLD}{branch:?}{ERROR_BOLD:#}{ERROR:#}"
            ),

            GitError::Diverged(d) => write!(
                f,
                "{ERROR_EMOJI} {ERROR}Branch {ERROR_BOLD}{}{ERROR_BOLD:#}{ERROR} has diverged from {ERROR_BOLD}{}{ERROR_BOLD:#}{ERROR} (ahead {}, behind {}){ERROR:#}",
                d.branch, d.base, d.ahead, d.behind
            ),

            GitError::WorktreeAddFailed {
                branch,
                path,
                error,
            } => {
                write!(
                    f,
                    "{ERROR_EMOJI} {ERROR}Failed to create worktree for {ERROR_BOLD}{branch}{ERROR_BOLD:#}{ERROR} at {ERROR_BOLD}{}{ERROR_BOLD:#}{ERROR:#}",
                    path.display()
                )?;
                let trimmed = error.trim();
                if !trimmed.is_empty() {
                    write!(f, "\n{trimmed}")?;
                }
                Ok(())
            }

            GitError::InitCommandFailed {
                command,
                error,
                exit_code,
            } => {
                let code_suffix = exit_code
                    .map(|c| format!(" (exit code {c})"))
                    .unwrap_or_default();
                write!(
                    f,
                    "{ERROR_EMOJI} {ERROR}Init command failed{code_suffix}: {ERROR_BOLD}{command}{ERROR_BOLD:#}{ERROR:#}"
                )?;
                let trimmed = error.trim();
                if !trimmed.is_empty() {
                    write!(f, "\n{trimmed}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for GitError {}
