//! `ticketflow worktree {list,clean}` — worktree maintenance.

use color_print::cformat;
use ticketflow::styling::println;

use crate::cli::OutputFormat;
use crate::commands::AppContext;
use crate::commands::cleanup::render_report;
use crate::output::resolve_format;

pub fn handle_worktree_list(
    ctx: &AppContext,
    format: Option<OutputFormat>,
) -> anyhow::Result<()> {
    let format = resolve_format(format, &ctx.config);
    let worktrees = ctx.controller().list_ticket_worktrees(&ctx.scope)?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&worktrees)?);
        }
        OutputFormat::Text => {
            for wt in &worktrees {
                let branch = wt.branch.as_deref().unwrap_or("<detached>");
                println!(
                    "{}",
                    cformat!("<bold>{branch}</>  {}", wt.path.display())
                );
            }
        }
    }
    Ok(())
}

pub fn handle_worktree_clean(
    ctx: &AppContext,
    dry_run: bool,
    format: Option<OutputFormat>,
) -> anyhow::Result<()> {
    let format = resolve_format(format, &ctx.config);
    let reconciler = ctx.reconciler();

    // This surface only touches worktrees; stale branches are cleanup's job
    let mut report = reconciler.plan(&ctx.scope)?;
    report.stale_branches.clear();

    if dry_run {
        return render_report(&report, format, "Would remove");
    }

    let result = reconciler.execute(&ctx.scope, &report);
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        OutputFormat::Text => {
            use ticketflow::styling::{eprintln, info_message, success_message, warning_message};
            if result.removed_worktrees.is_empty() && result.errors.is_empty() {
                eprintln!("{}", info_message("No orphan worktrees"));
            }
            for wt in &result.removed_worktrees {
                eprintln!(
                    "{}",
                    success_message(cformat!(
                        "Removed orphan worktree <bold>{}</>",
                        wt.path.display()
                    ))
                );
            }
            for error in &result.errors {
                eprintln!("{}", warning_message(error));
            }
        }
    }
    Ok(())
}
