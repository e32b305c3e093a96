use std::process;

use clap::Parser;
use ticketflow::cancel::CancelScope;

mod cli;
mod commands;
mod output;

use cli::{Cli, Commands, OutputFormat, WorktreeCommand};
use commands::AppContext;

/// The `--format` flag of the parsed command, used to render errors in
/// the right shape even when loading the config failed.
fn format_flag(command: &Commands) -> Option<OutputFormat> {
    match command {
        Commands::New { format, .. }
        | Commands::List { format, .. }
        | Commands::Show { format, .. }
        | Commands::Start { format, .. }
        | Commands::Close { format, .. }
        | Commands::Cleanup { format, .. }
        | Commands::Status { format } => *format,
        Commands::Worktree { action } => match action {
            WorktreeCommand::List { format } | WorktreeCommand::Clean { format, .. } => *format,
        },
        Commands::Init | Commands::Restore { .. } | Commands::Version | Commands::Workflow => None,
    }
}

fn run(scope: &CancelScope, command: &Commands) -> anyhow::Result<()> {
    // Commands that work without (or before) a config file
    match command {
        Commands::Init => return commands::handle_init(scope),
        Commands::Version => {
            ticketflow::styling::println!("ticketflow {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Commands::Workflow => return commands::handle_workflow(),
        _ => {}
    }

    let ctx = AppContext::load(scope.clone())?;
    match command {
        Commands::New {
            slug,
            parent,
            format,
        } => commands::handle_new(&ctx, slug, parent.as_deref(), *format),
        Commands::List {
            status,
            count,
            format,
        } => commands::handle_list(&ctx, *status, *count, *format),
        Commands::Show { id, format } => commands::handle_show(&ctx, id, *format),
        Commands::Start { id, force, format } => {
            commands::handle_start(&ctx, id, *force, *format)
        }
        Commands::Close {
            id,
            reason,
            force,
            format,
        } => commands::handle_close(&ctx, id.as_deref(), reason.clone(), *force, *format),
        Commands::Restore { id } => commands::handle_restore(&ctx, id.as_deref()),
        Commands::Cleanup {
            id,
            dry_run,
            force,
            format,
        } => commands::handle_cleanup(&ctx, id.as_deref(), *dry_run, *force, *format),
        Commands::Status { format } => commands::handle_status(&ctx, *format),
        Commands::Worktree { action } => match action {
            WorktreeCommand::List { format } => commands::handle_worktree_list(&ctx, *format),
            WorktreeCommand::Clean { dry_run, format } => {
                commands::handle_worktree_clean(&ctx, *dry_run, *format)
            }
        },
        Commands::Init | Commands::Version | Commands::Workflow => unreachable!("handled above"),
    }
}

fn main() {
    let cli = Cli::parse();

    if let Some(dir) = &cli.directory
        && let Err(e) = std::env::set_current_dir(dir)
    {
        ticketflow::styling::eprintln!(
            "{}",
            ticketflow::styling::error_message(format!("Cannot enter {}: {e}", dir.display()))
        );
        process::exit(1);
    }

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if cli.verbose { "debug" } else { "warn" }),
    )
    .format_timestamp(None)
    .init();

    // Single root cancellation scope for the whole invocation; Ctrl-C
    // trips it and every in-flight operation unwinds.
    let scope = CancelScope::root();
    scope.install_interrupt_handler();

    if let Err(e) = run(&scope, &cli.command) {
        let format = format_flag(&cli.command).unwrap_or(OutputFormat::Text);
        let code = output::report_error(&e, format);
        process::exit(code);
    }

    if scope.is_interrupted() {
        process::exit(output::EXIT_INTERRUPTED);
    }
}
