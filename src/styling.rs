//! Terminal styling for user-facing output.
//!
//! Uses the anstyle ecosystem:
//! - anstream for auto-detecting color support
//! - anstyle for composable styling
//! - color-print's `cformat!` for semantic inline markup
//!
//! ## stdout vs stderr principle
//!
//! - **stdout**: primary data output (ticket listings, JSON)
//! - **stderr**: status messages (progress, success, errors, hints)
//!
//! This separation allows piping (`ticketflow list | grep fix`) without
//! status messages interfering. Use `println!` for primary output,
//! `eprintln!` for status messages.

// Re-exports from anstream (auto-detecting output)
pub use anstream::{eprint, eprintln, print, println};

use anstyle::{AnsiColor, Color, Style};
use color_print::cformat;

// ============================================================================
// Programmatic style constants
// ============================================================================

/// Error body style (red).
pub const ERROR: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Red)));

/// Bold-within-error style, re-establishes red after the bold segment.
pub const ERROR_BOLD: Style = Style::new()
    .bold()
    .fg_color(Some(Color::Ansi(AnsiColor::Red)));

/// Hint style (dimmed).
pub const HINT: Style = Style::new().dimmed();

/// Success style (green).
pub const SUCCESS: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Green)));

/// Warning style (yellow).
pub const WARNING: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Yellow)));

/// Bold, uncolored.
pub const BOLD: Style = Style::new().bold();

// ============================================================================
// Message emojis
// ============================================================================

pub const SUCCESS_EMOJI: &str = "✅";
pub const ERROR_EMOJI: &str = "❌";
pub const WARNING_EMOJI: &str = "🟡";
pub const HINT_EMOJI: &str = "💡";
pub const INFO_EMOJI: &str = "⚪";
pub const PROMPT_EMOJI: &str = "❓";

// ============================================================================
// Message formatting functions
// ============================================================================
//
// Canonical formatting for each message type, shared between the output
// layer and error Display impls so styling stays consistent.

/// Format an error message with emoji and red styling.
///
/// Content can include inner styling like `<bold>`:
/// ```
/// use color_print::cformat;
/// use ticketflow::styling::error_message;
///
/// let id = "250711-093015-fix-parser";
/// let msg = error_message(cformat!("Ticket <bold>{id}</> not found"));
/// ```
pub fn error_message(content: impl AsRef<str>) -> String {
    cformat!("{ERROR_EMOJI} <red>{}</>", content.as_ref())
}

/// Format a hint message with emoji and dim styling.
pub fn hint_message(content: impl AsRef<str>) -> String {
    cformat!("{HINT_EMOJI} <dim>{}</>", content.as_ref())
}

/// Format a warning message with emoji and yellow styling.
pub fn warning_message(content: impl AsRef<str>) -> String {
    cformat!("{WARNING_EMOJI} <yellow>{}</>", content.as_ref())
}

/// Format a success message with emoji and green styling.
pub fn success_message(content: impl AsRef<str>) -> String {
    cformat!("{SUCCESS_EMOJI} <green>{}</>", content.as_ref())
}

/// Format an info message with emoji (no color - neutral status).
pub fn info_message(content: impl AsRef<str>) -> String {
    cformat!("{INFO_EMOJI} {}", content.as_ref())
}
