//! `ticketflow close [ID]` — close the current ticket or one by ID.

use color_print::cformat;
use ticketflow::styling::{eprintln, println, success_message};

use crate::cli::OutputFormat;
use crate::commands::AppContext;
use crate::output::{TicketView, hint, resolve_format};

pub fn handle_close(
    ctx: &AppContext,
    id: Option<&str>,
    reason: Option<String>,
    force: bool,
    format: Option<OutputFormat>,
) -> anyhow::Result<()> {
    let format = resolve_format(format, &ctx.config);
    let engine = ctx.engine();

    let outcome = match id {
        Some(id) => engine.close_by_id(&ctx.scope, id, reason, force)?,
        None => {
            let cwd = std::env::current_dir()?;
            engine.close_current(&ctx.scope, &cwd, reason)?
        }
    };

    match format {
        OutputFormat::Json => {
            let has_worktree = ctx
                .worktree_branches()
                .contains(outcome.ticket.id.as_str());
            let view = TicketView::new(&outcome.ticket, has_worktree);
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
        OutputFormat::Text => {
            eprintln!(
                "{}",
                success_message(cformat!("Closed <bold>{}</>", outcome.ticket.id))
            );
            if let Some(reason) = &outcome.reason {
                eprintln!("{}", cformat!("<dim>  reason: {reason}</>"));
            }
            if !outcome.committed {
                eprintln!("{}", cformat!("<dim>  nothing committed</>"));
            }
            hint(
                format,
                &format!(
                    "Run 'ticketflow cleanup {}' to remove its worktree and branch",
                    outcome.ticket.id
                ),
            );
        }
    }
    Ok(())
}
