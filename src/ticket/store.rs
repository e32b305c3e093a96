//! Filesystem-backed ticket store.
//!
//! The store owns the `tickets/{todo,doing,done}` layout under one root
//! (main repository or a worktree checkout). It parses and writes ticket
//! files, enumerates by status, resolves prefix IDs, performs rename-based
//! status transitions, and manages the `current-ticket.md` symlink.
//!
//! Enumeration is tolerant: files that fail to parse are skipped with a
//! warning, and only directory-level I/O errors fail the listing. Above a
//! small threshold the scan fans out across threads, with file reads capped
//! by a counting semaphore.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex};

use anyhow::Context;
use rayon::prelude::*;

use super::{CURRENT_TICKET_LINK, Status, Ticket, TicketError, TicketId};
use crate::cancel::CancelScope;
use crate::config::Config;

/// Below this many candidate files the scan stays sequential; thread
/// fan-out only pays for itself on larger directories.
pub const SEQUENTIAL_SCAN_THRESHOLD: usize = 10;

/// Hard cap on concurrent file reads during a parallel scan.
pub const MAX_PARALLEL_READS: usize = 8;

// ============================================================================
// Semaphore
// ============================================================================

/// A counting semaphore for limiting concurrent file reads.
#[derive(Clone)]
pub(crate) struct Semaphore {
    state: Arc<(Mutex<usize>, Condvar)>,
}

/// RAII guard that releases a semaphore permit on drop.
pub(crate) struct SemaphoreGuard {
    state: Arc<(Mutex<usize>, Condvar)>,
}

impl Semaphore {
    pub(crate) fn new(permits: usize) -> Self {
        Self {
            state: Arc::new((Mutex::new(permits), Condvar::new())),
        }
    }

    /// Acquire a permit, blocking until one is available.
    pub(crate) fn acquire(&self) -> SemaphoreGuard {
        let (lock, cvar) = &*self.state;
        let mut available = lock.lock().unwrap();
        while *available == 0 {
            available = cvar.wait(available).unwrap();
        }
        *available -= 1;
        SemaphoreGuard {
            state: Arc::clone(&self.state),
        }
    }
}

impl Drop for SemaphoreGuard {
    fn drop(&mut self) {
        let (lock, cvar) = &*self.state;
        let mut available = lock.lock().unwrap();
        *available += 1;
        cvar.notify_one();
    }
}

// ============================================================================
// Status filter
// ============================================================================

/// Which status directories an enumeration covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    /// `todo` and `doing` — the default listing.
    Active,
    Only(Status),
    All,
}

impl StatusFilter {
    pub fn statuses(self) -> &'static [Status] {
        match self {
            StatusFilter::Active => &[Status::Todo, Status::Doing],
            StatusFilter::Only(Status::Todo) => &[Status::Todo],
            StatusFilter::Only(Status::Doing) => &[Status::Doing],
            StatusFilter::Only(Status::Done) => &[Status::Done],
            StatusFilter::All => &Status::ALL,
        }
    }
}

// ============================================================================
// TicketStore
// ============================================================================

pub struct TicketStore {
    root: PathBuf,
    config: Config,
}

impl TicketStore {
    pub fn new(root: impl Into<PathBuf>, config: &Config) -> Self {
        Self {
            root: root.into(),
            config: config.clone(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn status_dir(&self, status: Status) -> PathBuf {
        self.config.status_dir(&self.root, status)
    }

    /// Create the `tickets/{todo,doing,done}` layout (with `.gitkeep`
    /// markers so empty directories survive a commit).
    pub fn ensure_layout(&self) -> anyhow::Result<()> {
        for status in Status::ALL {
            let dir = self.status_dir(status);
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
            let keep = dir.join(".gitkeep");
            if !keep.exists() {
                std::fs::write(&keep, "")?;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Enumeration
    // ------------------------------------------------------------------

    /// List tickets matching the filter, sorted by
    /// `(priority asc, created_at desc, id lex)`.
    pub fn list(&self, scope: &CancelScope, filter: StatusFilter) -> anyhow::Result<Vec<Ticket>> {
        let candidates = self.collect_candidates(filter)?;

        let mut tickets = if candidates.len() > SEQUENTIAL_SCAN_THRESHOLD {
            self.scan_parallel(scope, candidates)?
        } else {
            self.scan_sequential(scope, candidates)?
        };

        tickets.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then(b.created_at.cmp(&a.created_at))
                .then(a.id.cmp(&b.id))
        });
        Ok(tickets)
    }

    /// Count `.md` files per status directory without parsing them.
    /// Used for listing summaries, which report all statuses regardless
    /// of the active filter.
    pub fn counts(&self, scope: &CancelScope) -> anyhow::Result<BTreeMap<Status, usize>> {
        let mut counts = BTreeMap::new();
        for status in Status::ALL {
            scope.check()?;
            let dir = self.status_dir(status);
            let count = match std::fs::read_dir(&dir) {
                Ok(entries) => entries
                    .filter_map(Result::ok)
                    .filter(|e| is_ticket_file(&e.path()))
                    .count(),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to read {}", dir.display()));
                }
            };
            counts.insert(status, count);
        }
        Ok(counts)
    }

    fn collect_candidates(&self, filter: StatusFilter) -> anyhow::Result<Vec<(Status, PathBuf)>> {
        let mut candidates = Vec::new();
        for &status in filter.statuses() {
            let dir = self.status_dir(status);
            let entries = match std::fs::read_dir(&dir) {
                Ok(entries) => entries,
                // A missing status directory is an empty one
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to read {}", dir.display()));
                }
            };
            for entry in entries {
                let entry = entry.with_context(|| format!("Failed to read {}", dir.display()))?;
                let path = entry.path();
                if is_ticket_file(&path) {
                    candidates.push((status, path));
                }
            }
        }
        Ok(candidates)
    }

    fn scan_sequential(
        &self,
        scope: &CancelScope,
        candidates: Vec<(Status, PathBuf)>,
    ) -> anyhow::Result<Vec<Ticket>> {
        let mut tickets = Vec::with_capacity(candidates.len());
        for (status, path) in candidates {
            scope.check()?;
            if let Some(ticket) = self.load_tolerant(&path, status) {
                tickets.push(ticket);
            }
        }
        Ok(tickets)
    }

    fn scan_parallel(
        &self,
        scope: &CancelScope,
        candidates: Vec<(Status, PathBuf)>,
    ) -> anyhow::Result<Vec<Ticket>> {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let permits = cpus.min(MAX_PARALLEL_READS).min(candidates.len());
        let semaphore = Semaphore::new(permits.max(1));

        let results: Result<Vec<Option<Ticket>>, crate::cancel::Cancelled> = candidates
            .into_par_iter()
            .map(|(status, path)| {
                scope.check()?;
                let _permit = semaphore.acquire();
                scope.check()?;
                Ok(self.load_tolerant(&path, status))
            })
            .collect();

        Ok(results?.into_iter().flatten().collect())
    }

    /// Load one ticket, downgrading per-file failures to warnings.
    fn load_tolerant(&self, path: &Path, status: Status) -> Option<Ticket> {
        match self.load(path, status) {
            Ok(ticket) => Some(ticket),
            Err(e) => {
                log::warn!("skipping {}: {e:#}", path.display());
                None
            }
        }
    }

    /// Read and parse a ticket file at a known path and status.
    pub fn load(&self, path: &Path, status: Status) -> anyhow::Result<Ticket> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(Ticket::parse(path, &raw, status)?)
    }

    // ------------------------------------------------------------------
    // Resolution
    // ------------------------------------------------------------------

    /// Locate a ticket file by exact ID across all status directories.
    pub fn find(&self, id: &TicketId) -> Option<(Status, PathBuf)> {
        for status in Status::ALL {
            let path = self.status_dir(status).join(id.file_name());
            if path.exists() {
                return Some((status, path));
            }
        }
        None
    }

    /// Resolve an exact ID or a unique prefix to a ticket.
    pub fn get(&self, scope: &CancelScope, id_or_prefix: &str) -> anyhow::Result<Ticket> {
        // Exact match avoids a full scan
        if let Ok(id) = TicketId::parse(id_or_prefix)
            && let Some((status, path)) = self.find(&id)
        {
            return self.load(&path, status);
        }

        let tickets = self.list(scope, StatusFilter::All)?;
        let matches: Vec<&Ticket> = tickets
            .iter()
            .filter(|t| t.id.as_str().starts_with(id_or_prefix))
            .collect();

        match matches.len() {
            0 => Err(TicketError::NotFound {
                id: id_or_prefix.to_string(),
            }
            .into()),
            1 => Ok(matches[0].clone()),
            _ => Err(TicketError::Ambiguous {
                prefix: id_or_prefix.to_string(),
                matches: matches.iter().map(|t| t.id.as_str().to_string()).collect(),
            }
            .into()),
        }
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Write a brand-new ticket into `todo/`. Fails with `AlreadyExists`
    /// when the ID is taken in any status directory (same-second
    /// collisions are an error, not a suffixing case).
    pub fn create(&self, ticket: &mut Ticket) -> anyhow::Result<()> {
        if self.find(&ticket.id).is_some() {
            return Err(TicketError::AlreadyExists {
                id: ticket.id.as_str().to_string(),
            }
            .into());
        }
        let dir = self.status_dir(Status::Todo);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        ticket.status = Status::Todo;
        ticket.path = dir.join(ticket.id.file_name());
        self.write(ticket)
    }

    /// Atomically (re)write a ticket at its current path: serialize into a
    /// sibling temp file and rename into place.
    pub fn write(&self, ticket: &Ticket) -> anyhow::Result<()> {
        let parent = ticket
            .path
            .parent()
            .with_context(|| format!("Ticket path {} has no parent", ticket.path.display()))?;
        let serialized = ticket.to_file_string()?;
        let mut tmp = tempfile::NamedTempFile::new_in(parent)
            .with_context(|| format!("Failed to create temp file in {}", parent.display()))?;
        tmp.write_all(serialized.as_bytes())
            .context("Failed to write ticket")?;
        tmp.persist(&ticket.path)
            .with_context(|| format!("Failed to persist {}", ticket.path.display()))?;
        Ok(())
    }

    /// Transition a ticket to another status directory via rename (atomic
    /// on the same filesystem). Updates `ticket.path` and `ticket.status`.
    pub fn move_to(&self, ticket: &mut Ticket, target: Status) -> anyhow::Result<()> {
        if ticket.status == target {
            return Ok(());
        }
        let target_dir = self.status_dir(target);
        std::fs::create_dir_all(&target_dir)
            .with_context(|| format!("Failed to create {}", target_dir.display()))?;
        let target_path = target_dir.join(ticket.id.file_name());
        std::fs::rename(&ticket.path, &target_path).with_context(|| {
            format!(
                "Failed to move {} to {}",
                ticket.path.display(),
                target_path.display()
            )
        })?;
        ticket.path = target_path;
        ticket.status = target;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Current-ticket symlink
    // ------------------------------------------------------------------

    /// Create, replace, or remove the `current-ticket.md` symlink in `dir`.
    ///
    /// Idempotent: an existing link already pointing at the intended target
    /// is left untouched; a different link is replaced atomically (created
    /// under a temp name, renamed over). `None` removes the link; removing
    /// an absent link is a no-op. The link never owns the ticket file.
    pub fn set_current(&self, dir: &Path, target: Option<&Path>) -> anyhow::Result<()> {
        let link = dir.join(CURRENT_TICKET_LINK);
        let Some(target) = target else {
            match std::fs::remove_file(&link) {
                Ok(()) => return Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("Failed to remove {}", link.display()));
                }
            }
        };

        // Prefer a relative link when the target lives under `dir`
        let link_value: PathBuf = match target.strip_prefix(dir) {
            Ok(rel) => rel.to_path_buf(),
            Err(_) => target.to_path_buf(),
        };

        if let Ok(existing) = std::fs::read_link(&link)
            && existing == link_value
        {
            return Ok(());
        }

        let tmp = dir.join(format!(".{CURRENT_TICKET_LINK}.{}", std::process::id()));
        let _ = std::fs::remove_file(&tmp);
        make_symlink(&link_value, &tmp)
            .with_context(|| format!("Failed to create symlink at {}", tmp.display()))?;
        if let Err(e) = std::fs::rename(&tmp, &link) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e).with_context(|| format!("Failed to replace {}", link.display()));
        }
        Ok(())
    }

    /// Resolve the `current-ticket.md` symlink in `dir` to an absolute
    /// target path. `Ok(None)` when no link exists; the returned path may
    /// dangle — callers decide how to treat that.
    pub fn read_current(&self, dir: &Path) -> anyhow::Result<Option<PathBuf>> {
        let link = dir.join(CURRENT_TICKET_LINK);
        let target = match std::fs::read_link(&link) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            // Not a symlink: treat a plain file as absent rather than failing
            Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", link.display()));
            }
        };
        let absolute = if target.is_absolute() {
            target
        } else {
            dir.join(target)
        };
        Ok(Some(absolute))
    }
}

/// True for regular `<ID>.md` candidates (skips dotfiles and `.gitkeep`).
fn is_ticket_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "md")
        && path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| !n.starts_with('.') && n != CURRENT_TICKET_LINK)
}

#[cfg(unix)]
fn make_symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn make_symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Local};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn test_store() -> (tempfile::TempDir, TicketStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = TicketStore::new(dir.path(), &Config::default());
        store.ensure_layout().unwrap();
        (dir, store)
    }

    fn make_ticket(store: &TicketStore, id: &str, priority: i64) -> Ticket {
        let ticket_id = TicketId::parse(id).unwrap();
        let mut ticket = Ticket::create(
            ticket_id,
            format!("ticket {id}"),
            priority,
            Local::now(),
        );
        store.create(&mut ticket).unwrap();
        ticket
    }

    // ------------------------------------------------------------------
    // Semaphore
    // ------------------------------------------------------------------

    #[test]
    fn test_semaphore_limits_concurrency() {
        let sem = Semaphore::new(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        std::thread::scope(|s| {
            for _ in 0..10 {
                let sem = sem.clone();
                let running = Arc::clone(&running);
                let peak = Arc::clone(&peak);
                s.spawn(move || {
                    let _guard = sem.acquire();
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(std::time::Duration::from_millis(5));
                    running.fetch_sub(1, Ordering::SeqCst);
                });
            }
        });

        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    // ------------------------------------------------------------------
    // Create / find / move
    // ------------------------------------------------------------------

    #[test]
    fn test_create_and_find() {
        let (_dir, store) = test_store();
        let ticket = make_ticket(&store, "250711-093015-fix-parser", 2);
        let (status, path) = store.find(&ticket.id).unwrap();
        assert_eq!(status, Status::Todo);
        assert!(path.ends_with("tickets/todo/250711-093015-fix-parser.md"));
    }

    #[test]
    fn test_create_duplicate_fails() {
        let (_dir, store) = test_store();
        make_ticket(&store, "250711-093015-fix-parser", 2);
        let id = TicketId::parse("250711-093015-fix-parser").unwrap();
        let mut dup = Ticket::create(id, "dup".to_string(), 2, Local::now());
        let err = store.create(&mut dup).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn test_move_between_statuses() {
        let (_dir, store) = test_store();
        let mut ticket = make_ticket(&store, "250711-093015-fix-parser", 2);

        store.move_to(&mut ticket, Status::Doing).unwrap();
        assert_eq!(ticket.status, Status::Doing);
        assert!(ticket.path.exists());
        assert_eq!(store.find(&ticket.id).unwrap().0, Status::Doing);

        // ID exists in exactly one directory
        let todo_path = store.status_dir(Status::Todo).join(ticket.id.file_name());
        assert!(!todo_path.exists());
    }

    #[test]
    fn test_move_to_same_status_is_noop() {
        let (_dir, store) = test_store();
        let mut ticket = make_ticket(&store, "250711-093015-fix-parser", 2);
        store.move_to(&mut ticket, Status::Todo).unwrap();
        assert!(ticket.path.exists());
    }

    #[test]
    fn test_write_round_trip_on_disk() {
        let (_dir, store) = test_store();
        let mut ticket = make_ticket(&store, "250711-093015-fix-parser", 2);
        ticket.closure_reason = Some("wontfix".to_string());
        store.write(&ticket).unwrap();
        let loaded = store.load(&ticket.path, Status::Todo).unwrap();
        assert_eq!(loaded.closure_reason.as_deref(), Some("wontfix"));
    }

    // ------------------------------------------------------------------
    // Enumeration
    // ------------------------------------------------------------------

    #[test]
    fn test_list_default_filter_excludes_done() {
        let (_dir, store) = test_store();
        let scope = CancelScope::root();
        make_ticket(&store, "250711-093015-a", 2);
        let mut doing = make_ticket(&store, "250711-093016-b", 2);
        store.move_to(&mut doing, Status::Doing).unwrap();
        let mut done = make_ticket(&store, "250711-093017-c", 2);
        store.move_to(&mut done, Status::Done).unwrap();

        let active = store.list(&scope, StatusFilter::Active).unwrap();
        assert_eq!(active.len(), 2);
        let all = store.list(&scope, StatusFilter::All).unwrap();
        assert_eq!(all.len(), 3);
        let done_only = store
            .list(&scope, StatusFilter::Only(Status::Done))
            .unwrap();
        assert_eq!(done_only.len(), 1);
        assert_eq!(done_only[0].status, Status::Done);
    }

    #[test]
    fn test_sort_order() {
        let (_dir, store) = test_store();
        let scope = CancelScope::root();
        let now = Local::now();

        let mut older = Ticket::create(
            TicketId::parse("250701-093015-old").unwrap(),
            "old".into(),
            2,
            now - Duration::hours(1),
        );
        store.create(&mut older).unwrap();
        let mut newer = Ticket::create(
            TicketId::parse("250711-093015-new").unwrap(),
            "new".into(),
            2,
            now,
        );
        store.create(&mut newer).unwrap();
        let mut urgent = Ticket::create(
            TicketId::parse("250711-093016-urgent").unwrap(),
            "urgent".into(),
            1,
            now - Duration::hours(2),
        );
        store.create(&mut urgent).unwrap();

        let listed = store.list(&scope, StatusFilter::All).unwrap();
        let ids: Vec<&str> = listed.iter().map(|t| t.id.as_str()).collect();
        // Priority ascending first, then created_at descending
        assert_eq!(
            ids,
            vec![
                "250711-093016-urgent",
                "250711-093015-new",
                "250701-093015-old"
            ]
        );
    }

    #[test]
    fn test_sort_order_identical_above_threshold() {
        // Same ordering whether the scan ran sequentially or in parallel
        let (_dir, store) = test_store();
        let scope = CancelScope::root();
        for i in 0..25 {
            make_ticket(&store, &format!("250711-0930{i:02}-t{i}"), (i % 3) as i64);
        }
        let listed = store.list(&scope, StatusFilter::All).unwrap();
        assert_eq!(listed.len(), 25);
        let mut expected = listed.clone();
        expected.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then(b.created_at.cmp(&a.created_at))
                .then(a.id.cmp(&b.id))
        });
        assert_eq!(
            listed.iter().map(|t| t.id.as_str()).collect::<Vec<_>>(),
            expected.iter().map(|t| t.id.as_str()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_list_tolerates_corrupt_files() {
        let (_dir, store) = test_store();
        let scope = CancelScope::root();
        make_ticket(&store, "250711-093015-good", 2);
        std::fs::write(
            store.status_dir(Status::Todo).join("250711-093016-bad.md"),
            "no front matter here",
        )
        .unwrap();

        let listed = store.list(&scope, StatusFilter::All).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id.as_str(), "250711-093015-good");
    }

    #[test]
    fn test_list_cancelled() {
        let (_dir, store) = test_store();
        let scope = CancelScope::root();
        for i in 0..20 {
            make_ticket(&store, &format!("250711-0930{i:02}-t{i}"), 2);
        }
        scope.cancel();
        let err = store.list(&scope, StatusFilter::All).unwrap_err();
        assert!(err.downcast_ref::<crate::cancel::Cancelled>().is_some());
    }

    #[test]
    fn test_counts() {
        let (_dir, store) = test_store();
        let scope = CancelScope::root();
        make_ticket(&store, "250711-093015-a", 2);
        let mut b = make_ticket(&store, "250711-093016-b", 2);
        store.move_to(&mut b, Status::Done).unwrap();

        let counts = store.counts(&scope).unwrap();
        assert_eq!(counts[&Status::Todo], 1);
        assert_eq!(counts[&Status::Doing], 0);
        assert_eq!(counts[&Status::Done], 1);
    }

    // ------------------------------------------------------------------
    // Resolution
    // ------------------------------------------------------------------

    #[test]
    fn test_get_exact() {
        let (_dir, store) = test_store();
        let scope = CancelScope::root();
        make_ticket(&store, "250711-093015-fix-parser", 2);
        let t = store.get(&scope, "250711-093015-fix-parser").unwrap();
        assert_eq!(t.id.as_str(), "250711-093015-fix-parser");
    }

    #[test]
    fn test_get_unique_prefix() {
        let (_dir, store) = test_store();
        let scope = CancelScope::root();
        make_ticket(&store, "250711-093015-fix-parser", 2);
        make_ticket(&store, "250712-100000-other", 2);
        let t = store.get(&scope, "250711").unwrap();
        assert_eq!(t.id.as_str(), "250711-093015-fix-parser");
    }

    #[test]
    fn test_get_ambiguous_prefix_lists_matches() {
        let (_dir, store) = test_store();
        let scope = CancelScope::root();
        make_ticket(&store, "250711-093015-a", 2);
        make_ticket(&store, "250711-093016-b", 2);
        let err = store.get(&scope, "250711").unwrap_err();
        let ticket_err = err.downcast_ref::<TicketError>().unwrap();
        match ticket_err {
            TicketError::Ambiguous { matches, .. } => assert_eq!(matches.len(), 2),
            other => panic!("expected Ambiguous, got {other:?}"),
        }
    }

    #[test]
    fn test_get_not_found() {
        let (_dir, store) = test_store();
        let scope = CancelScope::root();
        let err = store.get(&scope, "999999").unwrap_err();
        assert!(err.downcast_ref::<TicketError>().is_some());
    }

    // ------------------------------------------------------------------
    // Current-ticket symlink
    // ------------------------------------------------------------------

    #[test]
    fn test_set_current_creates_relative_link() {
        let (dir, store) = test_store();
        let ticket = make_ticket(&store, "250711-093015-fix-parser", 2);
        store.set_current(dir.path(), Some(&ticket.path)).unwrap();

        let link = dir.path().join(CURRENT_TICKET_LINK);
        let target = std::fs::read_link(&link).unwrap();
        assert!(target.is_relative());
        assert_eq!(
            dunce::canonicalize(dir.path().join(target)).unwrap(),
            dunce::canonicalize(&ticket.path).unwrap()
        );
    }

    #[test]
    fn test_set_current_idempotent() {
        let (dir, store) = test_store();
        let ticket = make_ticket(&store, "250711-093015-fix-parser", 2);
        store.set_current(dir.path(), Some(&ticket.path)).unwrap();
        let link = dir.path().join(CURRENT_TICKET_LINK);
        let before = std::fs::symlink_metadata(&link).unwrap().modified().ok();

        store.set_current(dir.path(), Some(&ticket.path)).unwrap();
        let after = std::fs::symlink_metadata(&link).unwrap().modified().ok();
        assert_eq!(before, after);
        let current = store.read_current(dir.path()).unwrap().unwrap();
        assert!(current.ends_with("tickets/todo/250711-093015-fix-parser.md"));
    }

    #[test]
    fn test_set_current_replaces_existing() {
        let (dir, store) = test_store();
        let a = make_ticket(&store, "250711-093015-a", 2);
        let b = make_ticket(&store, "250711-093016-b", 2);
        store.set_current(dir.path(), Some(&a.path)).unwrap();
        store.set_current(dir.path(), Some(&b.path)).unwrap();
        let current = store.read_current(dir.path()).unwrap().unwrap();
        assert!(current.ends_with("250711-093016-b.md"));
    }

    #[test]
    fn test_set_current_none_removes() {
        let (dir, store) = test_store();
        let ticket = make_ticket(&store, "250711-093015-a", 2);
        store.set_current(dir.path(), Some(&ticket.path)).unwrap();
        store.set_current(dir.path(), None).unwrap();
        assert!(store.read_current(dir.path()).unwrap().is_none());
        // Removing the link never deletes the ticket file
        assert!(ticket.path.exists());
        // Removing again is a no-op
        store.set_current(dir.path(), None).unwrap();
    }

    #[test]
    fn test_read_current_absent() {
        let (dir, store) = test_store();
        assert!(store.read_current(dir.path()).unwrap().is_none());
    }
}
