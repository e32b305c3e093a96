//! The ticket lifecycle engine.
//!
//! Orchestrates `new`, `start`, `close`, `restore`, and per-ticket
//! cleanup, coupling ticket state transitions on disk with git branch and
//! worktree mutations. Mutations are ordered so the filesystem transition
//! happens first, and every step has a rollback that restores the state
//! immediately before the operation; nothing is retried automatically.

use std::path::{Path, PathBuf};

use chrono::Local;

use crate::cancel::CancelScope;
use crate::config::Config;
use crate::git::{GitError, Repository};
use crate::ticket::store::TicketStore;
use crate::ticket::{Status, Ticket, TicketError, TicketId};
use crate::worktree::WorktreeController;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub enum LifecycleError {
    /// The ticket is already `done`.
    AlreadyDone { id: String },
    /// `start` on a `doing` ticket with worktrees disabled.
    AlreadyStarted { id: String },
    /// `start` on a `doing` ticket with worktrees enabled needs `--force`.
    WorktreeActive { id: String },
    /// By-ID `restore` requires a `done` ticket.
    NotDone { id: String },
    /// Closing an unmerged or never-started ticket requires a reason.
    ReasonRequired { id: String },
    /// No readable `current-ticket.md` for a current-ticket operation.
    NoCurrentTicket,
    /// `restore` without an ID must run inside a ticket worktree.
    NotInWorktree,
    /// A ticket cannot be its own parent.
    SelfParent { id: String },
    /// `cleanup <ID>` requires a `done` ticket.
    CleanupRequiresDone { id: String, status: Status },
}

impl std::fmt::Display for LifecycleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use crate::styling::{ERROR, ERROR_BOLD, ERROR_EMOJI, HINT, HINT_EMOJI};
        match self {
            LifecycleError::AlreadyDone { id } => write!(
                f,
                "{ERROR_EMOJI} {ERROR}Ticket {ERROR_BOLD}{id}{ERROR_BOLD:#}{ERROR} is already done{ERROR:#}"
            ),
            LifecycleError::AlreadyStarted { id } => write!(
                f,
                "{ERROR_EMOJI} {ERROR}Ticket {ERROR_BOLD}{id}{ERROR_BOLD:#}{ERROR} is already being worked on{ERROR:#}"
            ),
            LifecycleError::WorktreeActive { id } => write!(
                f,
                "{ERROR_EMOJI} {ERROR}Ticket {ERROR_BOLD}{id}{ERROR_BOLD:#}{ERROR} is already in progress{ERROR:#}\n\n{HINT_EMOJI} {HINT}Use --force to recreate its worktree{HINT:#}"
            ),
            LifecycleError::NotDone { id } => write!(
                f,
                "{ERROR_EMOJI} {ERROR}Ticket {ERROR_BOLD}{id}{ERROR_BOLD:#}{ERROR} is not done; only done tickets can be restored by ID{ERROR:#}"
            ),
            LifecycleError::ReasonRequired { id } => write!(
                f,
                "{ERROR_EMOJI} {ERROR}Closing {ERROR_BOLD}{id}{ERROR_BOLD:#}{ERROR} requires a reason (branch not merged){ERROR:#}\n\n{HINT_EMOJI} {HINT}Pass --reason \"why\" to close it anyway{HINT:#}"
            ),
            LifecycleError::NoCurrentTicket => write!(
                f,
                "{ERROR_EMOJI} {ERROR}No current ticket{ERROR:#}\n\n{HINT_EMOJI} {HINT}Run 'ticketflow restore' to recreate the current-ticket link, or pass a ticket ID{HINT:#}"
            ),
            LifecycleError::NotInWorktree => write!(
                f,
                "{ERROR_EMOJI} {ERROR}Not inside a ticket worktree{ERROR:#}\n\n{HINT_EMOJI} {HINT}Run this from a worktree, or use 'ticketflow restore <ID>' for a done ticket{HINT:#}"
            ),
            LifecycleError::SelfParent { id } => write!(
                f,
                "{ERROR_EMOJI} {ERROR}Ticket {ERROR_BOLD}{id}{ERROR_BOLD:#}{ERROR} cannot be its own parent{ERROR:#}"
            ),
            LifecycleError::CleanupRequiresDone { id, status } => write!(
                f,
                "{ERROR_EMOJI} {ERROR}Ticket {ERROR_BOLD}{id}{ERROR_BOLD:#}{ERROR} is {status}; only done tickets can be cleaned up{ERROR:#}"
            ),
        }
    }
}

impl std::error::Error for LifecycleError {}

// ============================================================================
// Operation results
// ============================================================================

/// How to proceed when `start` finds an existing branch that diverged from
/// its base. Non-interactive callers default to [`Fail`](Self::Fail).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DivergencePolicy {
    /// Roll the ticket back and surface the divergence to the caller.
    Fail,
    /// Attach the worktree to the branch as it stands.
    UseExisting,
    /// Delete the branch and recreate it from the base.
    Recreate,
}

#[derive(Debug)]
pub struct NewOutcome {
    pub ticket: Ticket,
    pub parent: Option<TicketId>,
}

#[derive(Debug)]
pub struct StartOutcome {
    pub ticket: Ticket,
    /// `todo` for a fresh start, `doing` when `--force` recreated state.
    pub original_status: Status,
    pub recreating_worktree: bool,
    pub worktree_path: Option<PathBuf>,
    pub parent: Option<TicketId>,
    pub base_branch: String,
}

#[derive(Debug)]
pub struct CloseOutcome {
    pub ticket: Ticket,
    pub reason: Option<String>,
    /// Whether a commit was created in the owning repository.
    pub committed: bool,
}

#[derive(Debug)]
pub struct RestoreOutcome {
    pub ticket: Ticket,
    /// True when the current-ticket link was (re)created, false when the
    /// operation only moved the ticket back to `doing`.
    pub relinked: bool,
}

#[derive(Debug)]
pub struct TicketCleanup {
    pub id: TicketId,
    pub removed_worktree: Option<PathBuf>,
    pub removed_branch: bool,
}

// ============================================================================
// Engine
// ============================================================================

pub struct LifecycleEngine<'a> {
    repo: &'a Repository,
    config: &'a Config,
    store: TicketStore,
}

impl<'a> LifecycleEngine<'a> {
    pub fn new(repo: &'a Repository, config: &'a Config) -> Self {
        let store = TicketStore::new(repo.main_root(), config);
        Self {
            repo,
            config,
            store,
        }
    }

    /// The main-repository ticket store backing this engine.
    pub fn store(&self) -> &TicketStore {
        &self.store
    }

    fn controller(&self) -> WorktreeController<'_> {
        WorktreeController::new(self.repo, self.config)
    }

    fn default_branch(&self, scope: &CancelScope) -> String {
        self.config
            .git
            .default_branch
            .clone()
            .unwrap_or_else(|| self.repo.default_branch(scope))
    }

    // ------------------------------------------------------------------
    // new
    // ------------------------------------------------------------------

    /// Create a ticket in `todo/`.
    ///
    /// An explicit parent must resolve (any status) and dominates the
    /// implicit one; the implicit parent is the ticket whose ID matches
    /// the current branch, when there is one.
    pub fn new_ticket(
        &self,
        scope: &CancelScope,
        slug: &str,
        parent: Option<&str>,
    ) -> anyhow::Result<NewOutcome> {
        let now = Local::now();
        let id = TicketId::compose(now, slug)?;
        let description = slug.replace('-', " ");
        let mut ticket = Ticket::create(
            id.clone(),
            description,
            self.config.tickets.default_priority,
            now,
        );

        let parent_ticket = match parent {
            Some(spec) => {
                let resolved = self.store.get(scope, spec)?;
                if resolved.id == id {
                    return Err(LifecycleError::SelfParent {
                        id: id.as_str().to_string(),
                    }
                    .into());
                }
                Some(resolved)
            }
            None => self.implicit_parent(scope)?,
        };

        if let Some(parent_ticket) = &parent_ticket {
            ticket.set_parent(&parent_ticket.id);
        }

        self.store.create(&mut ticket)?;
        Ok(NewOutcome {
            ticket,
            parent: parent_ticket.map(|t| t.id),
        })
    }

    /// The ticket named by the current branch, if the branch looks like a
    /// ticket ID and resolves.
    fn implicit_parent(&self, scope: &CancelScope) -> anyhow::Result<Option<Ticket>> {
        let Some(branch) = self.repo.current_branch(scope)? else {
            return Ok(None);
        };
        if !TicketId::is_id(&branch) {
            return Ok(None);
        }
        let id = TicketId::parse(&branch)?;
        match self.store.find(&id) {
            Some((status, path)) => Ok(Some(self.store.load(&path, status)?)),
            None => Ok(None),
        }
    }

    // ------------------------------------------------------------------
    // start
    // ------------------------------------------------------------------

    pub fn start(
        &self,
        scope: &CancelScope,
        id_or_prefix: &str,
        force: bool,
        divergence: DivergencePolicy,
    ) -> anyhow::Result<StartOutcome> {
        let mut ticket = self.store.get(scope, id_or_prefix)?;
        let worktrees_enabled = self.config.worktree.enabled;

        match ticket.status {
            Status::Done => {
                return Err(LifecycleError::AlreadyDone {
                    id: ticket.id.as_str().to_string(),
                }
                .into());
            }
            Status::Doing if !worktrees_enabled => {
                return Err(LifecycleError::AlreadyStarted {
                    id: ticket.id.as_str().to_string(),
                }
                .into());
            }
            Status::Doing if !force => {
                return Err(LifecycleError::WorktreeActive {
                    id: ticket.id.as_str().to_string(),
                }
                .into());
            }
            _ => {}
        }

        let original_status = ticket.status;
        let recreating = ticket.status == Status::Doing;
        // --force implies recreating a diverged branch rather than prompting
        let policy = if force && divergence == DivergencePolicy::Fail {
            DivergencePolicy::Recreate
        } else {
            divergence
        };

        let (parent, base_branch) = self.resolve_base_branch(scope, &ticket)?;

        let changes = self.repo.uncommitted_changes(scope)?;
        if !changes.is_empty() {
            return Err(GitError::UncommittedChanges { files: changes }.into());
        }

        // Filesystem transition first; git operations follow. Rollback
        // reverses in the opposite order.
        let newly_started = ticket.started_at.is_none();
        if !recreating {
            if newly_started {
                ticket.started_at = Some(Local::now());
            }
            self.store.write(&ticket)?;
            self.store.move_to(&mut ticket, Status::Doing)?;
        }

        let result = if worktrees_enabled {
            self.start_with_worktree(scope, &ticket, &base_branch, recreating, policy)
        } else {
            self.start_branch_only(scope, &ticket, &base_branch)
        };

        let worktree_path = match result {
            Ok(path) => path,
            Err(e) => {
                self.rollback_start(&mut ticket, original_status, newly_started);
                return Err(e);
            }
        };

        // Record the transition in the main repository; a failed commit is
        // reported but does not undo the started ticket.
        if let Err(e) = self.repo.commit_paths(
            scope,
            self.repo.main_root(),
            &self.config.tickets.dir,
            &format!("Start ticket {}", ticket.id),
        ) {
            log::warn!("failed to commit ticket start: {e:#}");
        }

        Ok(StartOutcome {
            ticket,
            original_status,
            recreating_worktree: recreating,
            worktree_path,
            parent,
            base_branch,
        })
    }

    /// Base branch selection: a sub-ticket whose parent is in `doing` (and
    /// whose branch exists) stacks on the parent's branch; everything else
    /// starts from the default branch.
    fn resolve_base_branch(
        &self,
        scope: &CancelScope,
        ticket: &Ticket,
    ) -> anyhow::Result<(Option<TicketId>, String)> {
        if let Some(parent_str) = ticket.parent()
            && let Ok(parent_id) = TicketId::parse(parent_str)
            && let Some((Status::Doing, _)) = self.store.find(&parent_id)
            && self.repo.branch_exists(scope, parent_id.as_str())?
        {
            let base = parent_id.as_str().to_string();
            return Ok((Some(parent_id), base));
        }
        Ok((None, self.default_branch(scope)))
    }

    fn start_with_worktree(
        &self,
        scope: &CancelScope,
        ticket: &Ticket,
        base_branch: &str,
        recreating: bool,
        policy: DivergencePolicy,
    ) -> anyhow::Result<Option<PathBuf>> {
        let controller = self.controller();
        let branch = ticket.id.as_str();

        if recreating {
            controller.remove(scope, &controller.path_for(&ticket.id))?;
        }

        let worktree_path = match policy {
            DivergencePolicy::Fail => controller.add(scope, branch, base_branch)?,
            DivergencePolicy::UseExisting => {
                if self.repo.branch_exists(scope, branch)? {
                    controller.attach(scope, branch)?
                } else {
                    controller.add(scope, branch, base_branch)?
                }
            }
            DivergencePolicy::Recreate => match controller.add(scope, branch, base_branch) {
                Ok(path) => path,
                Err(e)
                    if e.downcast_ref::<GitError>()
                        .is_some_and(|g| g.divergence().is_some()) =>
                {
                    self.repo.delete_branch(scope, branch, true)?;
                    controller.add(scope, branch, base_branch)?
                }
                Err(e) => return Err(e),
            },
        };

        // Provision artifacts, then init commands; tear the worktree down
        // on any failure so no half-built worktree survives.
        let provisioned = controller
            .provision_ticket_artifacts(scope, &worktree_path, ticket)
            .and_then(|_| {
                controller.run_init_commands(
                    scope,
                    &worktree_path,
                    &self.config.worktree.init_commands,
                )
            });
        if let Err(e) = provisioned {
            let _ = controller.remove(scope, &worktree_path);
            return Err(e);
        }

        self.clear_stale_root_link(&ticket.id);
        Ok(Some(worktree_path))
    }

    fn start_branch_only(
        &self,
        scope: &CancelScope,
        ticket: &Ticket,
        base_branch: &str,
    ) -> anyhow::Result<Option<PathBuf>> {
        let branch = ticket.id.as_str();
        if !self.repo.branch_exists(scope, branch)? {
            self.repo.create_branch(scope, branch, Some(base_branch))?;
        }
        // Checkout is left to the user; the symlink marks the current ticket.
        self.store
            .set_current(self.repo.main_root(), Some(&ticket.path))?;
        Ok(None)
    }

    /// A `current-ticket.md` at the main root left over from a previous
    /// non-worktree session is removed when dangling or when it points at
    /// the ticket being started; anything else is left alone.
    fn clear_stale_root_link(&self, id: &TicketId) {
        let root = self.repo.main_root();
        match self.store.read_current(root) {
            Ok(Some(target)) => {
                let points_here = target
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .is_some_and(|stem| stem == id.as_str());
                if points_here || !target.exists() {
                    let _ = self.store.set_current(root, None);
                }
            }
            _ => {}
        }
    }

    fn rollback_start(&self, ticket: &mut Ticket, original_status: Status, newly_started: bool) {
        if ticket.status != original_status
            && let Err(e) = self.store.move_to(ticket, original_status)
        {
            log::warn!("rollback: failed to move ticket back: {e:#}");
            return;
        }
        if newly_started && ticket.started_at.take().is_some()
            && let Err(e) = self.store.write(ticket)
        {
            log::warn!("rollback: failed to restore front-matter: {e:#}");
        }
    }

    // ------------------------------------------------------------------
    // close
    // ------------------------------------------------------------------

    /// Close whatever the `current-ticket.md` link resolves to, searching
    /// the invocation directory, the working-tree root, then the main
    /// repository root.
    pub fn close_current(
        &self,
        scope: &CancelScope,
        cwd: &Path,
        reason: Option<String>,
    ) -> anyhow::Result<CloseOutcome> {
        let (link_dir, target) = self
            .find_current_link(cwd)?
            .ok_or(LifecycleError::NoCurrentTicket)?;
        if !target.exists() {
            // Dangling link: the ticket file moved or the worktree is stale
            return Err(LifecycleError::NoCurrentTicket.into());
        }
        let id = ticket_id_from_path(&target).ok_or(LifecycleError::NoCurrentTicket)?;
        let (status, path) = self.store.find(&id).ok_or_else(|| TicketError::NotFound {
            id: id.as_str().to_string(),
        })?;
        let ticket = self.store.load(&path, status)?;
        if ticket.status == Status::Done {
            return Err(LifecycleError::AlreadyDone {
                id: id.as_str().to_string(),
            }
            .into());
        }

        // The owning repository is the worktree the link lives in (the
        // main repo when worktree mode is disabled).
        let commit_root = link_dir;
        self.close_ticket(scope, ticket, reason, &commit_root)
    }

    /// Close a ticket by ID or prefix. Closing a `todo` ticket or one
    /// whose branch is not merged into the default branch requires a
    /// reason unless `force` waives it.
    pub fn close_by_id(
        &self,
        scope: &CancelScope,
        id_or_prefix: &str,
        reason: Option<String>,
        force: bool,
    ) -> anyhow::Result<CloseOutcome> {
        let ticket = self.store.get(scope, id_or_prefix)?;
        if ticket.status == Status::Done {
            return Err(LifecycleError::AlreadyDone {
                id: ticket.id.as_str().to_string(),
            }
            .into());
        }

        if reason.is_none() && !force {
            let merged = self.branch_merged(scope, &ticket)?;
            if ticket.status == Status::Todo || !merged {
                return Err(LifecycleError::ReasonRequired {
                    id: ticket.id.as_str().to_string(),
                }
                .into());
            }
        }

        let main_root = self.repo.main_root().to_path_buf();
        self.close_ticket(scope, ticket, reason, &main_root)
    }

    fn branch_merged(&self, scope: &CancelScope, ticket: &Ticket) -> anyhow::Result<bool> {
        let branch = ticket.id.as_str();
        if !self.repo.branch_exists(scope, branch)? {
            return Ok(false);
        }
        let base = self.default_branch(scope);
        self.repo.is_merged(scope, branch, &base)
    }

    fn close_ticket(
        &self,
        scope: &CancelScope,
        mut ticket: Ticket,
        reason: Option<String>,
        commit_root: &Path,
    ) -> anyhow::Result<CloseOutcome> {
        scope.check()?;
        let now = Local::now();
        let before = ticket.clone();

        ticket.closed_at = Some(now);
        if let Some(reason) = &reason {
            ticket.closure_reason = Some(reason.clone());
            ticket.append_closure_note(reason, now);
        }
        self.store.write(&ticket)?;

        if let Err(e) = self.store.move_to(&mut ticket, Status::Done) {
            // Restore the original front-matter so no half-closed ticket
            // remains in its old directory.
            if let Err(revert) = self.store.write(&before) {
                log::warn!("failed to revert ticket after close error: {revert:#}");
            }
            return Err(e);
        }

        self.mirror_close_into_worktree(scope, &ticket);
        self.remove_matching_links(&ticket.id);

        let committed = match self.repo.commit_paths(
            scope,
            commit_root,
            &self.config.tickets.dir,
            &format!("Close ticket {}", ticket.id),
        ) {
            Ok(committed) => committed,
            Err(e) => {
                log::warn!("failed to commit ticket close: {e:#}");
                false
            }
        };

        Ok(CloseOutcome {
            ticket,
            reason,
            committed,
        })
    }

    /// Mirror a closure into the ticket's worktree, when one exists: drop
    /// the `todo/`/`doing/` copies, write the closed ticket under `done/`.
    /// Best-effort; the main store already holds the authoritative state.
    fn mirror_close_into_worktree(&self, scope: &CancelScope, ticket: &Ticket) {
        if !self.config.worktree.enabled {
            return;
        }
        let wt_path = match self.repo.worktree_for_branch(scope, ticket.id.as_str()) {
            Ok(Some(path)) => path,
            Ok(None) => return,
            Err(e) => {
                log::warn!("failed to look up worktree for {}: {e:#}", ticket.id);
                return;
            }
        };

        for status in [Status::Todo, Status::Doing] {
            let stale = self
                .config
                .status_dir(&wt_path, status)
                .join(ticket.id.file_name());
            if stale.exists()
                && let Err(e) = std::fs::remove_file(&stale)
            {
                log::warn!("failed to remove {}: {e}", stale.display());
            }
        }

        let done_dir = self.config.status_dir(&wt_path, Status::Done);
        if let Err(e) = std::fs::create_dir_all(&done_dir) {
            log::warn!("failed to create {}: {e}", done_dir.display());
            return;
        }
        let mut mirrored = ticket.clone();
        mirrored.path = done_dir.join(ticket.id.file_name());
        let wt_store = TicketStore::new(&wt_path, self.config);
        if let Err(e) = wt_store.write(&mirrored) {
            log::warn!("failed to mirror close into worktree: {e:#}");
        }
    }

    /// Remove every `current-ticket.md` that points at this ticket — and
    /// only those. Links naming other tickets are never touched.
    fn remove_matching_links(&self, id: &TicketId) {
        let mut dirs: Vec<PathBuf> = vec![self.repo.main_root().to_path_buf()];
        let controller = self.controller();
        if self.config.worktree.enabled {
            dirs.push(controller.path_for(id));
        }
        for dir in dirs {
            if let Ok(Some(target)) = self.store.read_current(&dir) {
                let points_here = ticket_id_from_path(&target).is_some_and(|t| &t == id);
                if points_here {
                    let _ = self.store.set_current(&dir, None);
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // restore
    // ------------------------------------------------------------------

    /// Recreate the current-ticket link inside the worktree the command
    /// runs in. Does not alter status. The worktree's `doing/` copy is
    /// re-provisioned from the main store when missing.
    ///
    /// With worktree mode disabled there is no worktree to stand in; the
    /// link is recreated at the main root when exactly one ticket is in
    /// `doing`.
    pub fn restore_current(&self, scope: &CancelScope) -> anyhow::Result<RestoreOutcome> {
        if !self.repo.in_linked_worktree() {
            if self.config.worktree.enabled {
                return Err(LifecycleError::NotInWorktree.into());
            }
            let mut doing = self
                .store
                .list(scope, crate::ticket::store::StatusFilter::Only(Status::Doing))?;
            if doing.len() != 1 {
                return Err(LifecycleError::NoCurrentTicket.into());
            }
            let ticket = doing.remove(0);
            self.store
                .set_current(self.repo.main_root(), Some(&ticket.path))?;
            return Ok(RestoreOutcome {
                ticket,
                relinked: true,
            });
        }
        let wt_root = self.repo.work_root().to_path_buf();
        let id = wt_root
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| TicketId::parse(n).ok())
            .ok_or(LifecycleError::NotInWorktree)?;

        let (status, path) = self.store.find(&id).ok_or_else(|| TicketError::NotFound {
            id: id.as_str().to_string(),
        })?;
        let ticket = self.store.load(&path, status)?;

        let doing_dir = self.config.status_dir(&wt_root, Status::Doing);
        let copy_path = doing_dir.join(id.file_name());
        if !copy_path.exists() {
            let controller = self.controller();
            controller.provision_ticket_artifacts(scope, &wt_root, &ticket)?;
        } else {
            let wt_store = TicketStore::new(&wt_root, self.config);
            wt_store.set_current(&wt_root, Some(&copy_path))?;
        }

        Ok(RestoreOutcome {
            ticket,
            relinked: true,
        })
    }

    /// Move a `done` ticket back to `doing`, clearing `closed_at` (and the
    /// closure reason) while preserving `started_at`. Does not recreate a
    /// worktree; `start <ID> --force` rematerializes one.
    pub fn restore_by_id(
        &self,
        scope: &CancelScope,
        id_or_prefix: &str,
    ) -> anyhow::Result<RestoreOutcome> {
        let mut ticket = self.store.get(scope, id_or_prefix)?;
        if ticket.status != Status::Done {
            return Err(LifecycleError::NotDone {
                id: ticket.id.as_str().to_string(),
            }
            .into());
        }
        ticket.closed_at = None;
        ticket.closure_reason = None;
        self.store.write(&ticket)?;
        self.store.move_to(&mut ticket, Status::Doing)?;
        Ok(RestoreOutcome {
            ticket,
            relinked: false,
        })
    }

    // ------------------------------------------------------------------
    // cleanup (ticket mode)
    // ------------------------------------------------------------------

    /// Remove the worktree and branch of a `done` ticket.
    pub fn cleanup_ticket(
        &self,
        scope: &CancelScope,
        id_or_prefix: &str,
    ) -> anyhow::Result<TicketCleanup> {
        let ticket = self.store.get(scope, id_or_prefix)?;
        if ticket.status != Status::Done {
            return Err(LifecycleError::CleanupRequiresDone {
                id: ticket.id.as_str().to_string(),
                status: ticket.status,
            }
            .into());
        }

        let controller = self.controller();
        let branch = ticket.id.as_str();

        let removed_worktree = match self.repo.worktree_for_branch(scope, branch)? {
            Some(path) => {
                controller.remove(scope, &path)?;
                Some(path)
            }
            None => None,
        };

        let removed_branch = if self.repo.branch_exists(scope, branch)? {
            self.repo.delete_branch(scope, branch, true)?;
            true
        } else {
            false
        };

        Ok(TicketCleanup {
            id: ticket.id,
            removed_worktree,
            removed_branch,
        })
    }

    // ------------------------------------------------------------------
    // current ticket query
    // ------------------------------------------------------------------

    /// Resolve the current ticket for `cwd`: the first readable
    /// `current-ticket.md` in cwd, the working-tree root, then the main
    /// repository root, mapped back to the main store.
    pub fn current_ticket(&self, cwd: &Path) -> anyhow::Result<Option<Ticket>> {
        let Some((_, target)) = self.find_current_link(cwd)? else {
            return Ok(None);
        };
        let Some(id) = ticket_id_from_path(&target) else {
            return Ok(None);
        };
        match self.store.find(&id) {
            Some((status, path)) => Ok(Some(self.store.load(&path, status)?)),
            None => Ok(None),
        }
    }

    fn find_current_link(&self, cwd: &Path) -> anyhow::Result<Option<(PathBuf, PathBuf)>> {
        let mut candidates: Vec<PathBuf> = vec![cwd.to_path_buf()];
        candidates.push(self.repo.work_root().to_path_buf());
        candidates.push(self.repo.main_root().to_path_buf());
        candidates.dedup();
        for dir in candidates {
            if let Some(target) = self.store.read_current(&dir)? {
                return Ok(Some((dir, target)));
            }
        }
        Ok(None)
    }
}

/// Extract a ticket ID from a `<ID>.md` path.
fn ticket_id_from_path(path: &Path) -> Option<TicketId> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .and_then(|stem| TicketId::parse(stem).ok())
}
