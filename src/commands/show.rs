//! `ticketflow show <ID>` — display one ticket.

use ticketflow::styling::{print, println};

use crate::cli::OutputFormat;
use crate::commands::AppContext;
use crate::output::{TicketView, format_ticket_details, resolve_format};

pub fn handle_show(
    ctx: &AppContext,
    id: &str,
    format: Option<OutputFormat>,
) -> anyhow::Result<()> {
    let format = resolve_format(format, &ctx.config);
    let engine = ctx.engine();
    let ticket = engine.store().get(&ctx.scope, id)?;
    let has_worktree = ctx.worktree_branches().contains(ticket.id.as_str());

    match format {
        OutputFormat::Json => {
            let view = TicketView::new(&ticket, has_worktree);
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
        OutputFormat::Text => {
            print!("{}", format_ticket_details(&ticket, has_worktree));
        }
    }
    Ok(())
}
