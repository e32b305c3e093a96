//! Command-line surface.
//!
//! Flags may appear before, between, or after positional arguments (clap's
//! default), long and short forms coexist, and repeated boolean flags keep
//! the last value.

use clap::builder::styling::{AnsiColor, Color, Styles};
use clap::{Parser, Subcommand, ValueEnum};

/// Custom styles for help output.
fn help_styles() -> Styles {
    Styles::styled()
        .header(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Green))),
        )
        .usage(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Green))),
        )
        .literal(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Cyan))),
        )
        .placeholder(anstyle::Style::new().fg_color(Some(Color::Ansi(AnsiColor::Cyan))))
        .error(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Red))),
        )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// One JSON document on stdout
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatusArg {
    Todo,
    Doing,
    Done,
    All,
}

#[derive(Parser)]
#[command(name = "ticketflow")]
#[command(about = "Git-native ticket lifecycle management with per-ticket worktrees", long_about = None)]
#[command(version)]
#[command(styles = help_styles())]
#[command(arg_required_else_help = true)]
#[command(after_long_help = "\
Getting started

  ticketflow init                # Set up the current repository
  ticketflow new fix-parser      # Create a ticket in todo/
  ticketflow start <ID>          # Branch + worktree, ticket moves to doing/
  ticketflow close               # Close the current ticket
  ticketflow cleanup <ID>        # Remove the done ticket's worktree and branch

Run `ticketflow workflow` for the full lifecycle guide.")]
pub struct Cli {
    /// Working directory for this command
    #[arg(short = 'C', global = true, value_name = "path")]
    pub directory: Option<std::path::PathBuf>,

    /// Show debug logging (same as RUST_LOG=debug)
    #[arg(long, short = 'v', global = true, overrides_with = "verbose")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Set up the repository: config file, ticket directories, .gitignore
    Init,

    /// Create a ticket in todo/
    ///
    /// When run on a ticket branch, the new ticket becomes a sub-ticket of
    /// that branch's ticket unless --parent overrides it.
    New {
        /// Short name: lowercase alphanumerics and single hyphens
        slug: String,
        /// Parent ticket ID (or unique prefix)
        #[arg(long, short = 'p', value_name = "ID")]
        parent: Option<String>,
        #[arg(long = "format", short = 'o', value_enum, value_name = "fmt")]
        format: Option<OutputFormat>,
    },

    /// List tickets (todo and doing by default)
    List {
        /// Filter by status
        #[arg(long, value_enum, value_name = "status")]
        status: Option<StatusArg>,
        /// Show at most N tickets
        #[arg(long, value_name = "N")]
        count: Option<usize>,
        #[arg(long = "format", short = 'o', value_enum, value_name = "fmt")]
        format: Option<OutputFormat>,
    },

    /// Show one ticket
    Show {
        /// Ticket ID or unique prefix
        id: String,
        #[arg(long = "format", short = 'o', value_enum, value_name = "fmt")]
        format: Option<OutputFormat>,
    },

    /// Start work: ticket to doing/, branch and worktree created
    Start {
        /// Ticket ID or unique prefix
        id: String,
        /// Recreate the worktree of a ticket already in doing
        #[arg(long, short = 'f', overrides_with = "force")]
        force: bool,
        #[arg(long = "format", short = 'o', value_enum, value_name = "fmt")]
        format: Option<OutputFormat>,
    },

    /// Close a ticket (the current one when no ID is given)
    Close {
        /// Ticket ID or unique prefix; omit to close the current ticket
        id: Option<String>,
        /// Why the ticket is closed without being merged
        #[arg(long, value_name = "text")]
        reason: Option<String>,
        /// Close even when the branch is not merged, without a reason
        #[arg(long, overrides_with = "force")]
        force: bool,
        #[arg(long = "format", short = 'o', value_enum, value_name = "fmt")]
        format: Option<OutputFormat>,
    },

    /// Recreate the current-ticket link, or reopen a done ticket by ID
    Restore {
        /// Done ticket to move back to doing
        id: Option<String>,
    },

    /// Remove worktrees and branches left behind by done tickets
    Cleanup {
        /// Clean one done ticket; omit to sweep for orphans
        id: Option<String>,
        /// Report what would be removed without acting
        #[arg(long, overrides_with = "dry_run")]
        dry_run: bool,
        /// Skip the confirmation prompt
        #[arg(long, overrides_with = "force")]
        force: bool,
        #[arg(long = "format", short = 'o', value_enum, value_name = "fmt")]
        format: Option<OutputFormat>,
    },

    /// Show the current ticket and per-status counts
    Status {
        #[arg(long = "format", short = 'o', value_enum, value_name = "fmt")]
        format: Option<OutputFormat>,
    },

    /// Worktree maintenance
    Worktree {
        #[command(subcommand)]
        action: WorktreeCommand,
    },

    /// Print the version
    Version,

    /// Print the lifecycle guide
    Workflow,
}

#[derive(Subcommand)]
pub enum WorktreeCommand {
    /// List ticket worktrees
    List {
        #[arg(long = "format", short = 'o', value_enum, value_name = "fmt")]
        format: Option<OutputFormat>,
    },
    /// Remove orphaned ticket worktrees
    Clean {
        /// Report what would be removed without acting
        #[arg(long, overrides_with = "dry_run")]
        dry_run: bool,
        #[arg(long = "format", short = 'o', value_enum, value_name = "fmt")]
        format: Option<OutputFormat>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_asserts() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags_interspersed_with_positionals() {
        let cli = Cli::try_parse_from(["ticketflow", "close", "--reason", "dup", "250711-093015-x"])
            .unwrap();
        match cli.command {
            Commands::Close { id, reason, .. } => {
                assert_eq!(id.as_deref(), Some("250711-093015-x"));
                assert_eq!(reason.as_deref(), Some("dup"));
            }
            _ => panic!("expected close"),
        }

        let cli = Cli::try_parse_from(["ticketflow", "close", "250711-093015-x", "--reason", "dup"])
            .unwrap();
        assert!(matches!(cli.command, Commands::Close { .. }));
    }

    #[test]
    fn test_short_and_long_format() {
        let cli = Cli::try_parse_from(["ticketflow", "list", "-o", "json"]).unwrap();
        match cli.command {
            Commands::List { format, .. } => assert_eq!(format, Some(OutputFormat::Json)),
            _ => panic!("expected list"),
        }
        let cli = Cli::try_parse_from(["ticketflow", "list", "--format", "text"]).unwrap();
        match cli.command {
            Commands::List { format, .. } => assert_eq!(format, Some(OutputFormat::Text)),
            _ => panic!("expected list"),
        }
    }

    #[test]
    fn test_repeated_boolean_last_wins() {
        let cli =
            Cli::try_parse_from(["ticketflow", "start", "-f", "--force", "250711-093015-x"])
                .unwrap();
        match cli.command {
            Commands::Start { force, .. } => assert!(force),
            _ => panic!("expected start"),
        }
    }

    #[test]
    fn test_global_directory_flag() {
        let cli = Cli::try_parse_from(["ticketflow", "-C", "/tmp/repo", "status"]).unwrap();
        assert_eq!(cli.directory.as_deref(), Some(std::path::Path::new("/tmp/repo")));
    }
}
