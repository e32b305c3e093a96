//! Cancellation scopes.
//!
//! A single root [`CancelScope`] is created at process start and propagated
//! to every operation. Child scopes tighten the deadline but share the root
//! interrupt flag, so Ctrl-C cancels everything at once while per-operation
//! timeouts stay local.
//!
//! The scope is checked between steps and polled while subprocesses run;
//! there is no async runtime here, cancellation is cooperative.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Error returned when an operation observes a cancelled scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

impl std::fmt::Display for Cancelled {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use crate::styling::{ERROR, ERROR_EMOJI};
        write!(f, "{ERROR_EMOJI} {ERROR}Operation cancelled{ERROR:#}")
    }
}

impl std::error::Error for Cancelled {}

/// A cancellation scope: an interrupt flag shared with the root, plus an
/// optional deadline.
///
/// Cloning shares the flag; [`with_timeout`](Self::with_timeout) derives a
/// child scope whose deadline is the minimum of the parent's and the new
/// one — an existing deadline is never extended.
#[derive(Debug, Clone)]
pub struct CancelScope {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelScope {
    /// Create the root scope. Call once at process start.
    pub fn root() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            deadline: None,
        }
    }

    /// Install a SIGINT handler that cancels this scope.
    ///
    /// Installation failure is not fatal: the tool still works, it just
    /// exits abruptly on Ctrl-C instead of unwinding cleanly.
    pub fn install_interrupt_handler(&self) {
        let flag = Arc::clone(&self.flag);
        if let Err(e) = ctrlc::set_handler(move || {
            flag.store(true, Ordering::SeqCst);
        }) {
            log::warn!("failed to install interrupt handler: {e}");
        }
    }

    /// Trip the interrupt flag, cancelling this scope and all scopes derived
    /// from the same root.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// True when the root was interrupted. Deadline expiry is *not* an
    /// interrupt; see [`timed_out`](Self::timed_out).
    pub fn is_interrupted(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// True when this scope's deadline has passed.
    pub fn timed_out(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// True when the operation should stop, for either reason.
    pub fn is_cancelled(&self) -> bool {
        self.is_interrupted() || self.timed_out()
    }

    /// Return `Err(Cancelled)` when the scope has been interrupted or its
    /// deadline passed. Call between steps of multi-step operations.
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }

    /// Derive a child scope with a deadline `timeout` from now.
    ///
    /// A caller's existing (earlier) deadline is preserved, not overridden.
    pub fn with_timeout(&self, timeout: Duration) -> CancelScope {
        let new_deadline = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(existing) => Some(existing.min(new_deadline)),
            None => Some(new_deadline),
        };
        CancelScope {
            flag: Arc::clone(&self.flag),
            deadline,
        }
    }

    /// Time remaining until the deadline, if one is set.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_scope_not_cancelled() {
        let scope = CancelScope::root();
        assert!(!scope.is_cancelled());
        assert!(scope.check().is_ok());
    }

    #[test]
    fn test_cancel_propagates_to_children() {
        let root = CancelScope::root();
        let child = root.with_timeout(Duration::from_secs(60));
        root.cancel();
        assert!(child.is_interrupted());
        assert_eq!(child.check(), Err(Cancelled));
    }

    #[test]
    fn test_timeout_expiry() {
        let root = CancelScope::root();
        let child = root.with_timeout(Duration::ZERO);
        assert!(child.timed_out());
        assert!(child.is_cancelled());
        // Expiry is not an interrupt
        assert!(!child.is_interrupted());
        // The root is unaffected by a child's deadline
        assert!(!root.is_cancelled());
    }

    #[test]
    fn test_existing_deadline_preserved() {
        let root = CancelScope::root();
        let tight = root.with_timeout(Duration::from_millis(1));
        // A looser child timeout must not extend the tight deadline
        let loose = tight.with_timeout(Duration::from_secs(3600));
        assert!(loose.remaining().unwrap() <= Duration::from_millis(1));
    }

    #[test]
    fn test_remaining_none_without_deadline() {
        assert!(CancelScope::root().remaining().is_none());
    }
}
