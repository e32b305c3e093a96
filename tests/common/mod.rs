// Helpers are shared across test binaries; not every binary uses each one.
#![allow(dead_code)]

//! Test harness: isolated git repositories driven through the `ticketflow`
//! binary.
//!
//! Each [`TestRepo`] is a fresh repository in a temporary directory with
//! deterministic git configuration and no access to the user's global
//! config. The worktree base is kept inside the repository so nothing
//! escapes the tempdir. Commands run with `TICKETFLOW_NON_INTERACTIVE=1`
//! so no test ever blocks on a prompt.

use std::path::{Path, PathBuf};
use std::process::Command as StdCommand;

use assert_cmd::Command;
use tempfile::TempDir;

pub struct TestRepo {
    dir: TempDir,
}

impl TestRepo {
    /// A repository with one commit on `main` and ticketflow initialized
    /// (config + ticket directories committed).
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let repo = Self { dir };

        repo.git(&["init", "-b", "main"]);
        repo.git(&["config", "user.name", "Test User"]);
        repo.git(&["config", "user.email", "test@example.com"]);
        repo.git(&["config", "commit.gpgsign", "false"]);

        std::fs::write(repo.path().join("README.md"), "# test repo\n").unwrap();
        repo.git(&["add", "."]);
        repo.git(&["commit", "-m", "initial commit"]);

        repo.tf(&["init"]).assert().success();
        // Keep worktrees inside the tempdir
        repo.write_config("worktree:\n  base_dir: \".worktrees\"\n");
        repo.git(&["add", "."]);
        repo.git(&["commit", "-m", "ticketflow setup"]);

        repo
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Overwrite `.ticketflow.yaml`; omitted sections keep their defaults.
    pub fn write_config(&self, yaml: &str) {
        std::fs::write(self.path().join(".ticketflow.yaml"), yaml).unwrap();
    }

    /// Run git in the repository, asserting success.
    pub fn git(&self, args: &[&str]) -> String {
        self.git_in(self.path(), args)
    }

    pub fn git_in(&self, cwd: &Path, args: &[&str]) -> String {
        let output = StdCommand::new("git")
            .args(args)
            .current_dir(cwd)
            .env("GIT_CONFIG_NOSYSTEM", "1")
            .env("GIT_CONFIG_GLOBAL", "/dev/null")
            .env("GIT_AUTHOR_DATE", "2025-07-11T09:00:00+00:00")
            .env("GIT_COMMITTER_DATE", "2025-07-11T09:00:00+00:00")
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "git {args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).into_owned()
    }

    /// A `ticketflow` command rooted in the repository.
    pub fn tf(&self, args: &[&str]) -> Command {
        self.tf_in(self.path(), args)
    }

    /// A `ticketflow` command run from an arbitrary directory (e.g. inside
    /// a worktree).
    pub fn tf_in(&self, cwd: &Path, args: &[&str]) -> Command {
        let mut cmd = Command::cargo_bin("ticketflow").unwrap();
        cmd.args(args)
            .current_dir(cwd)
            .env("TICKETFLOW_NON_INTERACTIVE", "1")
            .env("GIT_CONFIG_NOSYSTEM", "1")
            .env("GIT_CONFIG_GLOBAL", "/dev/null");
        cmd
    }

    /// Create a ticket and return its ID.
    pub fn new_ticket(&self, slug: &str) -> String {
        self.tf(&["new", slug]).assert().success();
        self.ticket_id_for_slug(slug)
    }

    /// Look up a ticket ID by its slug across all statuses.
    pub fn ticket_id_for_slug(&self, slug: &str) -> String {
        let stdout = self
            .tf(&["list", "--status", "all", "-o", "json"])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        let value: serde_json::Value = serde_json::from_slice(&stdout).unwrap();
        value["items"]
            .as_array()
            .unwrap()
            .iter()
            .find(|item| {
                let id = item["id"].as_str().unwrap();
                id.len() > 14 && &id[14..] == slug
            })
            .unwrap_or_else(|| panic!("ticket for slug {slug} not found"))["id"]
            .as_str()
            .unwrap()
            .to_string()
    }

    /// Fetch one ticket as JSON.
    pub fn show_json(&self, id: &str) -> serde_json::Value {
        let stdout = self
            .tf(&["show", id, "-o", "json"])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        serde_json::from_slice(&stdout).unwrap()
    }

    pub fn ticket_file(&self, status: &str, id: &str) -> PathBuf {
        self.path().join(format!("tickets/{status}/{id}.md"))
    }

    pub fn worktree_path(&self, id: &str) -> PathBuf {
        self.path().join(".worktrees").join(id)
    }

    /// Branch names present in the repository.
    pub fn branches(&self) -> Vec<String> {
        self.git(&["for-each-ref", "--format=%(refname:short)", "refs/heads"])
            .lines()
            .map(str::to_string)
            .collect()
    }
}
