//! Reconciler: detects and repairs orphaned resources.
//!
//! Two kinds of drift accumulate as tickets move through their lifecycle
//! or when the user manipulates git directly:
//!
//! - *orphan worktrees* — ticket worktrees whose branch no longer
//!   corresponds to any `doing` ticket;
//! - *stale branches* — branches named after `done` tickets that have no
//!   worktree left.
//!
//! The reconciler builds a full action plan before mutating anything, then
//! executes it sequentially with per-item error aggregation: one failed
//! removal never aborts the sweep.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::Serialize;

use crate::cancel::CancelScope;
use crate::config::Config;
use crate::git::Repository;
use crate::ticket::store::{StatusFilter, TicketStore};
use crate::ticket::{Status, TicketId};
use crate::worktree::WorktreeController;

/// A worktree scheduled for removal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrphanWorktree {
    pub path: PathBuf,
    pub branch: Option<String>,
}

/// What a cleanup sweep would remove. Produced by [`Reconciler::plan`];
/// `--dry-run` renders this without acting on it.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupReport {
    pub orphaned_worktrees: Vec<OrphanWorktree>,
    pub stale_branches: Vec<String>,
}

impl CleanupReport {
    pub fn is_empty(&self) -> bool {
        self.orphaned_worktrees.is_empty() && self.stale_branches.is_empty()
    }
}

/// Outcome of executing a cleanup plan.
#[derive(Debug, Default, Serialize)]
pub struct CleanupResult {
    pub removed_worktrees: Vec<OrphanWorktree>,
    pub removed_branches: Vec<String>,
    /// Per-item failures; the sweep continues past them.
    pub errors: Vec<String>,
}

pub struct Reconciler<'a> {
    repo: &'a Repository,
    config: &'a Config,
    store: TicketStore,
}

impl<'a> Reconciler<'a> {
    pub fn new(repo: &'a Repository, config: &'a Config) -> Self {
        let store = TicketStore::new(repo.main_root(), config);
        Self {
            repo,
            config,
            store,
        }
    }

    fn controller(&self) -> WorktreeController<'_> {
        WorktreeController::new(self.repo, self.config)
    }

    /// Build the action plan: cross-reference tracked worktrees and
    /// branches against the ticket store without mutating anything.
    pub fn plan(&self, scope: &CancelScope) -> anyhow::Result<CleanupReport> {
        let doing: BTreeSet<String> = self
            .store
            .list(scope, StatusFilter::Only(Status::Doing))?
            .into_iter()
            .map(|t| t.id.as_str().to_string())
            .collect();

        let controller = self.controller();
        let worktrees = controller.list_ticket_worktrees(scope)?;

        let mut report = CleanupReport::default();
        // Branches whose worktrees survive this sweep; orphan worktrees are
        // removed first, so their branches are fair game for stale checks.
        let mut surviving_branches: BTreeSet<String> = BTreeSet::new();
        for wt in worktrees {
            let is_owned = wt
                .branch
                .as_deref()
                .is_some_and(|branch| doing.contains(branch));
            if is_owned {
                if let Some(branch) = &wt.branch {
                    surviving_branches.insert(branch.clone());
                }
            } else {
                report.orphaned_worktrees.push(OrphanWorktree {
                    path: wt.path,
                    branch: wt.branch,
                });
            }
        }

        for branch in self.repo.list_branches(scope)? {
            scope.check()?;
            if !TicketId::is_id(&branch) || surviving_branches.contains(&branch) {
                continue;
            }
            let Ok(id) = TicketId::parse(&branch) else {
                continue;
            };
            if let Some((Status::Done, _)) = self.store.find(&id) {
                report.stale_branches.push(branch);
            }
        }

        Ok(report)
    }

    /// Execute a plan. Per-item errors are collected, not fatal.
    pub fn execute(&self, scope: &CancelScope, report: &CleanupReport) -> CleanupResult {
        let controller = self.controller();
        let mut result = CleanupResult::default();

        for orphan in &report.orphaned_worktrees {
            if scope.is_cancelled() {
                result.errors.push("cancelled".to_string());
                break;
            }
            match controller.remove(scope, &orphan.path) {
                Ok(()) => result.removed_worktrees.push(orphan.clone()),
                Err(e) => result
                    .errors
                    .push(format!("worktree {}: {e:#}", orphan.path.display())),
            }
        }

        for branch in &report.stale_branches {
            if scope.is_cancelled() {
                result.errors.push("cancelled".to_string());
                break;
            }
            match self.repo.delete_branch(scope, branch, true) {
                Ok(()) => result.removed_branches.push(branch.clone()),
                Err(e) => result.errors.push(format!("branch {branch}: {e:#}")),
            }
        }

        // Drop a dangling current-ticket link at the main root while we're
        // sweeping; a live link is left alone.
        if let Ok(Some(target)) = self.store.read_current(self.repo.main_root())
            && !target.exists()
        {
            let _ = self.store.set_current(self.repo.main_root(), None);
        }

        result
    }
}
