//! `ticketflow list` — enumerate tickets.

use ticketflow::styling::{eprintln, println};
use ticketflow::ticket::Status;
use ticketflow::ticket::store::StatusFilter;

use crate::cli::{OutputFormat, StatusArg};
use crate::commands::AppContext;
use crate::output::{ListView, Summary, TicketView, format_ticket_line, resolve_format};

pub fn handle_list(
    ctx: &AppContext,
    status: Option<StatusArg>,
    count: Option<usize>,
    format: Option<OutputFormat>,
) -> anyhow::Result<()> {
    let format = resolve_format(format, &ctx.config);
    let filter = match status {
        None => StatusFilter::Active,
        Some(StatusArg::Todo) => StatusFilter::Only(Status::Todo),
        Some(StatusArg::Doing) => StatusFilter::Only(Status::Doing),
        Some(StatusArg::Done) => StatusFilter::Only(Status::Done),
        Some(StatusArg::All) => StatusFilter::All,
    };

    let engine = ctx.engine();
    let store = engine.store();
    let mut tickets = store.list(&ctx.scope, filter)?;
    let counts = store.counts(&ctx.scope)?;
    if let Some(count) = count {
        tickets.truncate(count);
    }

    match format {
        OutputFormat::Json => {
            let worktrees = ctx.worktree_branches();
            let items = tickets
                .iter()
                .map(|t| TicketView::new(t, worktrees.contains(t.id.as_str())))
                .collect();
            let view = ListView {
                summary: Summary::from_counts(&counts),
                items,
            };
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
        OutputFormat::Text => {
            let summary = Summary::from_counts(&counts);
            eprintln!(
                "todo: {}  doing: {}  done: {}  (total {})",
                summary.todo, summary.doing, summary.done, summary.total
            );
            for ticket in &tickets {
                println!("{}", format_ticket_line(ticket));
            }
        }
    }
    Ok(())
}
