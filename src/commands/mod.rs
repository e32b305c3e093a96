//! Command handlers: one `handle_*` function per subcommand.
//!
//! Handlers load the shared [`AppContext`], drive the engine/reconciler,
//! and render results in the requested format. They return
//! `anyhow::Result<()>`; error-to-exit-code mapping happens in `main`.

mod cleanup;
mod close;
mod init;
mod list;
mod new;
mod restore;
mod show;
mod start;
mod status;
mod workflow;
mod worktree_cmd;

pub use cleanup::handle_cleanup;
pub use close::handle_close;
pub use init::handle_init;
pub use list::handle_list;
pub use new::handle_new;
pub use restore::handle_restore;
pub use show::handle_show;
pub use start::handle_start;
pub use status::handle_status;
pub use workflow::handle_workflow;
pub use worktree_cmd::{handle_worktree_clean, handle_worktree_list};

use std::collections::BTreeSet;
use std::time::Duration;

use ticketflow::cancel::CancelScope;
use ticketflow::config::Config;
use ticketflow::git::Repository;
use ticketflow::lifecycle::LifecycleEngine;
use ticketflow::reconcile::Reconciler;
use ticketflow::worktree::WorktreeController;

/// Timeout used for repository discovery, before the config is readable.
const BOOTSTRAP_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything a command handler needs: the root cancellation scope, the
/// discovered repository, and the loaded configuration.
pub struct AppContext {
    pub scope: CancelScope,
    pub repo: Repository,
    pub config: Config,
}

impl AppContext {
    pub fn load(scope: CancelScope) -> anyhow::Result<Self> {
        let cwd = std::env::current_dir()?;
        let repo = Repository::discover(&scope, &cwd, BOOTSTRAP_TIMEOUT)?;
        let config = Config::load(repo.main_root())?;
        let repo = repo.with_timeout(config.git_timeout());
        Ok(Self {
            scope,
            repo,
            config,
        })
    }

    pub fn engine(&self) -> LifecycleEngine<'_> {
        LifecycleEngine::new(&self.repo, &self.config)
    }

    pub fn reconciler(&self) -> Reconciler<'_> {
        Reconciler::new(&self.repo, &self.config)
    }

    pub fn controller(&self) -> WorktreeController<'_> {
        WorktreeController::new(&self.repo, &self.config)
    }

    /// Branches that currently have a worktree; used to decorate ticket
    /// views with `has_worktree`.
    pub fn worktree_branches(&self) -> BTreeSet<String> {
        match self.repo.list_worktrees(&self.scope) {
            Ok(worktrees) => worktrees
                .into_iter()
                .filter_map(|wt| wt.branch)
                .collect(),
            Err(e) => {
                log::warn!("failed to list worktrees: {e:#}");
                BTreeSet::new()
            }
        }
    }
}
