//! `ticketflow status` — current ticket, branch, and counts.

use color_print::cformat;
use serde_json::json;
use ticketflow::styling::{eprintln, println};

use crate::cli::OutputFormat;
use crate::commands::AppContext;
use crate::output::{Summary, TicketView, resolve_format};

pub fn handle_status(ctx: &AppContext, format: Option<OutputFormat>) -> anyhow::Result<()> {
    let format = resolve_format(format, &ctx.config);
    let engine = ctx.engine();

    let cwd = std::env::current_dir()?;
    let current = engine.current_ticket(&cwd)?;
    let branch = ctx.repo.current_branch(&ctx.scope)?;
    let counts = engine.store().counts(&ctx.scope)?;
    let summary = Summary::from_counts(&counts);

    match format {
        OutputFormat::Json => {
            let worktrees = ctx.worktree_branches();
            let current_view = current
                .as_ref()
                .map(|t| TicketView::new(t, worktrees.contains(t.id.as_str())));
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "current_ticket": current_view,
                    "branch": branch,
                    "summary": summary,
                }))?
            );
        }
        OutputFormat::Text => {
            match &current {
                Some(ticket) => {
                    println!(
                        "{}",
                        cformat!("current ticket: <bold>{}</> ({})", ticket.id, ticket.status)
                    );
                }
                None => println!("current ticket: none"),
            }
            if let Some(branch) = branch {
                println!("branch:         {branch}");
            }
            eprintln!(
                "todo: {}  doing: {}  done: {}  (total {})",
                summary.todo, summary.doing, summary.done, summary.total
            );
        }
    }
    Ok(())
}
