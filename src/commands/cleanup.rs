//! `ticketflow cleanup [ID]` — remove worktrees/branches for done
//! tickets, or sweep for orphans.

use color_print::cformat;
use serde_json::json;
use ticketflow::reconcile::CleanupReport;
use ticketflow::styling::{eprintln, error_message, info_message, println, success_message, warning_message};

use crate::cli::OutputFormat;
use crate::commands::AppContext;
use crate::output::{confirm, is_non_interactive, resolve_format};

pub fn handle_cleanup(
    ctx: &AppContext,
    id: Option<&str>,
    dry_run: bool,
    force: bool,
    format: Option<OutputFormat>,
) -> anyhow::Result<()> {
    let format = resolve_format(format, &ctx.config);
    match id {
        Some(id) => cleanup_ticket(ctx, id, dry_run, force, format),
        None => cleanup_auto(ctx, dry_run, format),
    }
}

fn cleanup_ticket(
    ctx: &AppContext,
    id: &str,
    dry_run: bool,
    force: bool,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let engine = ctx.engine();

    if dry_run {
        let ticket = engine.store().get(&ctx.scope, id)?;
        let worktree = ctx
            .repo
            .worktree_for_branch(&ctx.scope, ticket.id.as_str())?;
        let branch = ctx.repo.branch_exists(&ctx.scope, ticket.id.as_str())?;
        match format {
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&json!({
                        "id": ticket.id.as_str(),
                        "would_remove_worktree": worktree,
                        "would_remove_branch": branch,
                    }))?
                );
            }
            OutputFormat::Text => {
                eprintln!(
                    "{}",
                    info_message(cformat!("Would clean up <bold>{}</>", ticket.id))
                );
                if let Some(path) = worktree {
                    eprintln!("{}", cformat!("<dim>  worktree {}</>", path.display()));
                }
                if branch {
                    eprintln!("{}", cformat!("<dim>  branch {}</>", ticket.id));
                }
            }
        }
        return Ok(());
    }

    if !force {
        if is_non_interactive() {
            anyhow::bail!(
                "{}",
                error_message("Refusing to clean up without --force in non-interactive mode")
            );
        }
        if !confirm(&format!("Remove worktree and branch for {id}?")) {
            eprintln!("{}", info_message("Cleanup aborted"));
            return Ok(());
        }
    }

    let cleanup = engine.cleanup_ticket(&ctx.scope, id)?;
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "id": cleanup.id.as_str(),
                    "removed_worktree": cleanup.removed_worktree,
                    "removed_branch": cleanup.removed_branch,
                }))?
            );
        }
        OutputFormat::Text => {
            eprintln!(
                "{}",
                success_message(cformat!("Cleaned up <bold>{}</>", cleanup.id))
            );
            if let Some(path) = &cleanup.removed_worktree {
                eprintln!("{}", cformat!("<dim>  removed worktree {}</>", path.display()));
            }
            if cleanup.removed_branch {
                eprintln!("{}", cformat!("<dim>  removed branch {}</>", cleanup.id));
            }
        }
    }
    Ok(())
}

fn cleanup_auto(ctx: &AppContext, dry_run: bool, format: OutputFormat) -> anyhow::Result<()> {
    let reconciler = ctx.reconciler();
    let report = reconciler.plan(&ctx.scope)?;

    if dry_run {
        render_report(&report, format, "Would remove")?;
        return Ok(());
    }

    let result = reconciler.execute(&ctx.scope, &report);
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        OutputFormat::Text => {
            if report.is_empty() {
                eprintln!("{}", info_message("Nothing to clean up"));
            } else {
                for wt in &result.removed_worktrees {
                    eprintln!(
                        "{}",
                        success_message(cformat!(
                            "Removed orphan worktree <bold>{}</>",
                            wt.path.display()
                        ))
                    );
                }
                for branch in &result.removed_branches {
                    eprintln!(
                        "{}",
                        success_message(cformat!("Removed stale branch <bold>{branch}</>"))
                    );
                }
            }
            for error in &result.errors {
                eprintln!("{}", warning_message(error));
            }
        }
    }
    Ok(())
}

pub(super) fn render_report(
    report: &CleanupReport,
    format: OutputFormat,
    verb: &str,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        OutputFormat::Text => {
            if report.is_empty() {
                eprintln!("{}", info_message("Nothing to clean up"));
                return Ok(());
            }
            for wt in &report.orphaned_worktrees {
                let branch = wt.branch.as_deref().unwrap_or("<detached>");
                eprintln!(
                    "{}",
                    info_message(cformat!(
                        "{verb} orphan worktree <bold>{}</> ({branch})",
                        wt.path.display()
                    ))
                );
            }
            for branch in &report.stale_branches {
                eprintln!(
                    "{}",
                    info_message(cformat!("{verb} stale branch <bold>{branch}</>"))
                );
            }
        }
    }
    Ok(())
}
