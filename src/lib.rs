//! Ticket lifecycle management in tight coordination with git.
//!
//! Ticketflow is a CLI tool; tickets are markdown files with YAML
//! front-matter whose status is the directory they live in (`todo/`,
//! `doing/`, `done/`). Active tickets own a branch named after their ID
//! and, when worktree mode is enabled, a dedicated git worktree so several
//! tickets can progress in parallel.
//!
//! The library API is not stable; the supported interface is the
//! `ticketflow` binary.

pub mod cancel;
pub mod config;
pub mod git;
pub mod lifecycle;
pub mod reconcile;
pub mod styling;
pub mod ticket;
pub mod worktree;
