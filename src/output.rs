//! Output and presentation layer.
//!
//! Text rendering goes through the styling module (data on stdout, status
//! on stderr). In JSON mode stdout carries exactly one JSON document and
//! human-facing status messages are suppressed or sent to stderr; errors
//! are serialized to stderr as `{code, message, details?}`.

use std::collections::BTreeMap;
use std::io::IsTerminal;

use color_print::cformat;
use serde::Serialize;
use serde_json::json;

use ticketflow::cancel::Cancelled;
use ticketflow::config::{Config, ConfigError};
use ticketflow::git::{Divergence, GitError};
use ticketflow::lifecycle::{DivergencePolicy, LifecycleError};
use ticketflow::styling::{self, HINT, PROMPT_EMOJI, eprint, eprintln};
use ticketflow::ticket::{Status, Ticket, TicketError};

use crate::cli::OutputFormat;

/// Exit code for a user interrupt (128 + SIGINT).
pub const EXIT_INTERRUPTED: i32 = 130;
/// Exit code for a divergence surfaced in non-interactive mode.
pub const EXIT_DIVERGED: i32 = 3;

/// Resolve the effective format: CLI flag, then config default.
pub fn resolve_format(flag: Option<OutputFormat>, config: &Config) -> OutputFormat {
    flag.unwrap_or(match config.output.default_format.as_str() {
        "json" => OutputFormat::Json,
        _ => OutputFormat::Text,
    })
}

// ============================================================================
// Ticket views
// ============================================================================

/// The stable JSON shape of a single ticket.
#[derive(Debug, Serialize)]
pub struct TicketView {
    pub id: String,
    pub status: String,
    pub priority: i64,
    pub description: String,
    pub created_at: String,
    pub started_at: Option<String>,
    pub closed_at: Option<String>,
    pub closure_reason: Option<String>,
    pub related: Vec<String>,
    pub path: String,
    pub has_worktree: bool,
}

impl TicketView {
    pub fn new(ticket: &Ticket, has_worktree: bool) -> Self {
        Self {
            id: ticket.id.as_str().to_string(),
            status: ticket.status.to_string(),
            priority: ticket.priority,
            description: ticket.description.clone(),
            created_at: ticket.created_at.to_rfc3339(),
            started_at: ticket.started_at.map(|t| t.to_rfc3339()),
            closed_at: ticket.closed_at.map(|t| t.to_rfc3339()),
            closure_reason: ticket.closure_reason.clone(),
            related: ticket.related.iter().map(|r| r.to_string()).collect(),
            path: ticket.path.display().to_string(),
            has_worktree,
        }
    }
}

/// Per-status counts; always reports every status, however the listing
/// was filtered.
#[derive(Debug, Serialize)]
pub struct Summary {
    pub todo: usize,
    pub doing: usize,
    pub done: usize,
    pub total: usize,
}

impl Summary {
    pub fn from_counts(counts: &BTreeMap<Status, usize>) -> Self {
        let todo = counts.get(&Status::Todo).copied().unwrap_or(0);
        let doing = counts.get(&Status::Doing).copied().unwrap_or(0);
        let done = counts.get(&Status::Done).copied().unwrap_or(0);
        Self {
            todo,
            doing,
            done,
            total: todo + doing + done,
        }
    }
}

/// The stable JSON shape of list-like results.
#[derive(Debug, Serialize)]
pub struct ListView {
    pub summary: Summary,
    pub items: Vec<TicketView>,
}

/// One text line per ticket: status, priority, ID, description.
pub fn format_ticket_line(ticket: &Ticket) -> String {
    cformat!(
        "<dim>[{}]</> P{} <bold>{}</>  {}",
        ticket.status,
        ticket.priority,
        ticket.id,
        ticket.description
    )
}

/// Multi-line text rendering of one ticket.
pub fn format_ticket_details(ticket: &Ticket, has_worktree: bool) -> String {
    let mut out = String::new();
    out.push_str(&cformat!("<bold>{}</>\n", ticket.id));
    out.push_str(&format!("  status:      {}\n", ticket.status));
    out.push_str(&format!("  priority:    {}\n", ticket.priority));
    out.push_str(&format!("  description: {}\n", ticket.description));
    out.push_str(&format!(
        "  created_at:  {}\n",
        ticket.created_at.to_rfc3339()
    ));
    if let Some(started) = ticket.started_at {
        out.push_str(&format!("  started_at:  {}\n", started.to_rfc3339()));
    }
    if let Some(closed) = ticket.closed_at {
        out.push_str(&format!("  closed_at:   {}\n", closed.to_rfc3339()));
    }
    if let Some(reason) = &ticket.closure_reason {
        out.push_str(&format!("  reason:      {reason}\n"));
    }
    for relation in &ticket.related {
        out.push_str(&format!("  related:     {relation}\n"));
    }
    out.push_str(&format!("  path:        {}\n", ticket.path.display()));
    out.push_str(&format!("  worktree:    {has_worktree}\n"));
    out
}

// ============================================================================
// Interactivity
// ============================================================================

/// Non-interactive mode: CI markers, the explicit opt-in variable, or a
/// non-TTY stdin. Prompts must not be issued; their default branch is
/// taken instead.
pub fn is_non_interactive() -> bool {
    for var in ["TICKETFLOW_NON_INTERACTIVE", "CI", "GITHUB_ACTIONS", "GITLAB_CI"] {
        if std::env::var(var).is_ok_and(|v| !v.is_empty() && v != "0" && v != "false") {
            return true;
        }
    }
    !std::io::stdin().is_terminal()
}

/// Yes/no confirmation; the non-interactive default is `false`.
pub fn confirm(prompt: &str) -> bool {
    if is_non_interactive() {
        return false;
    }
    eprint!("{PROMPT_EMOJI} {prompt} [y/N] ");
    let mut line = String::new();
    if std::io::stdin().read_line(&mut line).is_err() {
        return false;
    }
    matches!(line.trim(), "y" | "Y" | "yes")
}

/// Divergence prompt: use / recreate / cancel. Cancel is the default and
/// the non-interactive answer.
pub fn prompt_divergence(divergence: &Divergence) -> DivergencePolicy {
    if is_non_interactive() {
        return DivergencePolicy::Fail;
    }
    eprintln!(
        "{}",
        styling::warning_message(cformat!(
            "Branch <bold>{}</> has diverged from <bold>{}</> (ahead {}, behind {})",
            divergence.branch,
            divergence.base,
            divergence.ahead,
            divergence.behind
        ))
    );
    eprint!(
        "{PROMPT_EMOJI} [u]se existing branch, [r]ecreate from {}, [c]ancel (default): ",
        divergence.base
    );
    let mut line = String::new();
    if std::io::stdin().read_line(&mut line).is_err() {
        return DivergencePolicy::Fail;
    }
    match line.trim() {
        "u" | "use" => DivergencePolicy::UseExisting,
        "r" | "recreate" => DivergencePolicy::Recreate,
        _ => DivergencePolicy::Fail,
    }
}

// ============================================================================
// Error reporting
// ============================================================================

/// Classify an error chain into a stable code, optional JSON details, and
/// a process exit code.
fn classify(err: &anyhow::Error) -> (&'static str, Option<serde_json::Value>, i32) {
    for cause in err.chain() {
        if cause.downcast_ref::<Cancelled>().is_some() {
            return ("cancelled", None, EXIT_INTERRUPTED);
        }
        if let Some(git) = cause.downcast_ref::<GitError>() {
            return match git {
                GitError::Timeout { .. } => ("timeout", None, 1),
                GitError::Diverged(d) => (
                    "branch_diverged",
                    Some(json!({
                        "branch": d.branch,
                        "base": d.base,
                        "ahead": d.ahead,
                        "behind": d.behind,
                    })),
                    EXIT_DIVERGED,
                ),
                GitError::UncommittedChanges { files } => (
                    "uncommitted_changes",
                    Some(json!({ "files": files })),
                    1,
                ),
                GitError::InitCommandFailed { command, .. } => (
                    "init_command_failed",
                    Some(json!({ "command": command })),
                    1,
                ),
                GitError::InvalidBranchName { .. } => ("validation", None, 1),
                _ => ("git", None, 1),
            };
        }
        if let Some(ticket) = cause.downcast_ref::<TicketError>() {
            return match ticket {
                TicketError::NotFound { .. } => ("not_found", None, 1),
                TicketError::Ambiguous { matches, .. } => (
                    "ambiguous_ticket",
                    Some(json!({ "matches": matches })),
                    1,
                ),
                TicketError::Invalid { .. } => ("invalid_ticket", None, 1),
                TicketError::AlreadyExists { .. } => ("state", None, 1),
                TicketError::InvalidSlug { .. } => ("validation", None, 1),
            };
        }
        if let Some(lifecycle) = cause.downcast_ref::<LifecycleError>() {
            return match lifecycle {
                LifecycleError::ReasonRequired { .. } => ("validation", None, 1),
                _ => ("state", None, 1),
            };
        }
        if cause.downcast_ref::<ConfigError>().is_some() {
            return ("config", None, 1);
        }
        if cause.downcast_ref::<std::io::Error>().is_some() {
            return ("io", None, 1);
        }
    }
    ("error", None, 1)
}

/// Report an error to stderr and return the exit code for the process.
///
/// Text mode prints the already-styled `Display` chain; JSON mode emits a
/// single `{code, message, details?}` object.
pub fn report_error(err: &anyhow::Error, format: OutputFormat) -> i32 {
    let (code, details, exit) = classify(err);
    match format {
        OutputFormat::Text => {
            eprintln!("{err}");
        }
        OutputFormat::Json => {
            let message = strip_ansi(&err.to_string());
            let mut obj = json!({ "code": code, "message": message });
            if let Some(details) = details {
                obj["details"] = details;
            }
            eprintln!("{obj}");
        }
    }
    exit
}

/// Drop ANSI escapes so JSON messages stay machine-readable.
fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\u{1b}' {
            // Skip CSI sequence through its final byte
            if chars.peek() == Some(&'[') {
                chars.next();
                for c in chars.by_ref() {
                    if c.is_ascii_alphabetic() {
                        break;
                    }
                }
            }
            continue;
        }
        out.push(c);
    }
    out
}

/// Silence hint shown in text mode only.
pub fn hint(format: OutputFormat, message: &str) {
    if format == OutputFormat::Text {
        eprintln!("{}", cformat!("{HINT}{message}{HINT:#}"));
    }
}
