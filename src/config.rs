//! Configuration for ticketflow.
//!
//! All configuration lives in a single YAML file at the main repository
//! root, `.ticketflow.yaml`, checked into git and shared across all
//! developers of the project. There is deliberately no user-level config
//! layer: the ticket directories and worktree layout are project facts.
//!
//! Every field has a default, so a freshly `ticketflow init`-ed file is a
//! complete description of the configuration surface.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Configuration file name, relative to the main repository root.
pub const CONFIG_FILE_NAME: &str = ".ticketflow.yaml";

/// Upper bound for every configurable timeout.
pub const MAX_TIMEOUT_SECONDS: u64 = 3600;

/// Error raised when the config file is missing or unusable.
#[derive(Debug)]
pub enum ConfigError {
    /// `.ticketflow.yaml` does not exist at the repository root.
    NotFound { path: PathBuf },
    /// The file exists but failed to parse or validate.
    Invalid { path: PathBuf, reason: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use crate::styling::{ERROR, ERROR_BOLD, HINT, HINT_EMOJI, ERROR_EMOJI};
        match self {
            ConfigError::NotFound { path } => write!(
                f,
                "{ERROR_EMOJI} {ERROR}No config found at {ERROR_BOLD}{}{ERROR_BOLD:#}{ERROR:#}\n\n{HINT_EMOJI} {HINT}Run 'ticketflow init' to set up this repository{HINT:#}",
                path.display()
            ),
            ConfigError::Invalid { path, reason } => write!(
                f,
                "{ERROR_EMOJI} {ERROR}Invalid config {ERROR_BOLD}{}{ERROR_BOLD:#}{ERROR}: {reason}{ERROR:#}",
                path.display()
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Git subprocess settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitConfig {
    /// Override for the integration branch. When unset, the branch is
    /// probed: origin/HEAD, then `init.defaultBranch`, then `main`.
    pub default_branch: Option<String>,
    /// Per-invocation timeout for git subprocesses.
    pub timeout_seconds: u64,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            default_branch: None,
            timeout_seconds: 30,
        }
    }
}

/// Worktree settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorktreeConfig {
    /// When false, `start` only creates a branch; no worktree is created
    /// and the current-ticket symlink lives at the main repository root.
    pub enabled: bool,
    /// Directory that holds per-ticket worktrees, one subdirectory per
    /// ticket ID. Relative paths resolve against the main repository root.
    pub base_dir: String,
    /// Commands run sequentially inside a freshly created worktree.
    /// Tokenized with shell-words rules; no shell is spawned.
    pub init_commands: Vec<String>,
    /// Timeout covering each init command invocation.
    pub init_timeout_seconds: u64,
}

impl Default for WorktreeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_dir: "../worktrees".to_string(),
            init_commands: Vec::new(),
            init_timeout_seconds: 60,
        }
    }
}

/// Ticket directory layout and defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TicketsConfig {
    /// Root of the ticket tree, relative to the repository root.
    pub dir: String,
    pub todo_dir: String,
    pub doing_dir: String,
    pub done_dir: String,
    /// Priority assigned to new tickets (lower = more urgent).
    pub default_priority: i64,
}

impl Default for TicketsConfig {
    fn default() -> Self {
        Self {
            dir: "tickets".to_string(),
            todo_dir: "todo".to_string(),
            doing_dir: "doing".to_string(),
            done_dir: "done".to_string(),
            default_priority: 2,
        }
    }
}

/// Output defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// `text` or `json`; overridden per invocation by `--format`.
    pub default_format: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            default_format: "text".to_string(),
        }
    }
}

/// The whole `.ticketflow.yaml`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub git: GitConfig,
    pub worktree: WorktreeConfig,
    pub tickets: TicketsConfig,
    pub output: OutputConfig,
}

impl Config {
    /// Load and validate the config from `<root>/.ticketflow.yaml`.
    pub fn load(repo_root: &Path) -> anyhow::Result<Self> {
        let path = repo_root.join(CONFIG_FILE_NAME);
        if !path.exists() {
            return Err(ConfigError::NotFound { path }.into());
        }
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&raw).map_err(|e| ConfigError::Invalid {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        config.validate().map_err(|reason| ConfigError::Invalid {
            path,
            reason,
        })?;
        Ok(config)
    }

    /// Serialize to `<root>/.ticketflow.yaml`. Used by `ticketflow init`.
    pub fn save(&self, repo_root: &Path) -> anyhow::Result<()> {
        let path = repo_root.join(CONFIG_FILE_NAME);
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config")?;
        std::fs::write(&path, yaml)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// Structural validation beyond what serde enforces.
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("git.timeout_seconds", self.git.timeout_seconds),
            (
                "worktree.init_timeout_seconds",
                self.worktree.init_timeout_seconds,
            ),
        ] {
            if value == 0 {
                return Err(format!("{name} must be positive"));
            }
            if value > MAX_TIMEOUT_SECONDS {
                return Err(format!("{name} exceeds the maximum of {MAX_TIMEOUT_SECONDS}s"));
            }
        }
        for (name, dir) in [
            ("tickets.dir", &self.tickets.dir),
            ("tickets.todo_dir", &self.tickets.todo_dir),
            ("tickets.doing_dir", &self.tickets.doing_dir),
            ("tickets.done_dir", &self.tickets.done_dir),
        ] {
            if dir.is_empty() {
                return Err(format!("{name} must not be empty"));
            }
            if Path::new(dir).is_absolute() {
                return Err(format!("{name} must be relative to the repository root"));
            }
        }
        if !matches!(self.output.default_format.as_str(), "text" | "json") {
            return Err(format!(
                "output.default_format must be 'text' or 'json', got '{}'",
                self.output.default_format
            ));
        }
        Ok(())
    }

    /// `<root>/<tickets.dir>`.
    pub fn tickets_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.tickets.dir)
    }

    /// Directory for a given status under `root`'s ticket tree.
    pub fn status_dir(&self, root: &Path, status: crate::ticket::Status) -> PathBuf {
        use crate::ticket::Status;
        let sub = match status {
            Status::Todo => &self.tickets.todo_dir,
            Status::Doing => &self.tickets.doing_dir,
            Status::Done => &self.tickets.done_dir,
        };
        self.tickets_dir(root).join(sub)
    }

    /// Worktree base directory, resolved against the main repo root.
    pub fn worktree_base(&self, repo_root: &Path) -> PathBuf {
        let base = Path::new(&self.worktree.base_dir);
        if base.is_absolute() {
            base.to_path_buf()
        } else {
            repo_root.join(base)
        }
    }

    pub fn git_timeout(&self) -> Duration {
        Duration::from_secs(self.git.timeout_seconds)
    }

    pub fn init_timeout(&self) -> Duration {
        Duration::from_secs(self.worktree.init_timeout_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ticket::Status;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(config.worktree.enabled);
        assert_eq!(config.tickets.default_priority, 2);
        assert_eq!(config.git.timeout_seconds, 30);
    }

    #[test]
    fn test_config_yaml_round_trip() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = "worktree:\n  enabled: false\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(!config.worktree.enabled);
        assert_eq!(config.tickets.dir, "tickets");
        assert_eq!(config.git.timeout_seconds, 30);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = Config::default();
        config.git.timeout_seconds = 0;
        assert!(config.validate().unwrap_err().contains("positive"));
    }

    #[test]
    fn test_oversized_timeout_rejected() {
        let mut config = Config::default();
        config.worktree.init_timeout_seconds = 4000;
        assert!(config.validate().unwrap_err().contains("maximum"));
    }

    #[test]
    fn test_absolute_ticket_dir_rejected() {
        let mut config = Config::default();
        config.tickets.dir = "/var/tickets".to_string();
        assert!(config.validate().unwrap_err().contains("relative"));
    }

    #[test]
    fn test_bad_output_format_rejected() {
        let mut config = Config::default();
        config.output.default_format = "yaml".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_status_dir_layout() {
        let config = Config::default();
        let root = Path::new("/repo");
        assert_eq!(
            config.status_dir(root, Status::Todo),
            PathBuf::from("/repo/tickets/todo")
        );
        assert_eq!(
            config.status_dir(root, Status::Done),
            PathBuf::from("/repo/tickets/done")
        );
    }

    #[test]
    fn test_worktree_base_resolution() {
        let config = Config::default();
        let root = Path::new("/repo/project");
        assert_eq!(
            config.worktree_base(root),
            PathBuf::from("/repo/project/../worktrees")
        );

        let mut abs = Config::default();
        abs.worktree.base_dir = "/tmp/wt".to_string();
        assert_eq!(abs.worktree_base(root), PathBuf::from("/tmp/wt"));
    }

    #[test]
    fn test_load_missing_config_hints_init() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains("ticketflow init"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.worktree.init_commands = vec!["cargo fetch".to_string()];
        config.save(dir.path()).unwrap();
        let loaded = Config::load(dir.path()).unwrap();
        assert_eq!(config, loaded);
    }
}
