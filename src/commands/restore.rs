//! `ticketflow restore [ID]` — relink the current ticket, or reopen a
//! done ticket.

use color_print::cformat;
use ticketflow::styling::{eprintln, success_message};

use crate::commands::AppContext;

pub fn handle_restore(ctx: &AppContext, id: Option<&str>) -> anyhow::Result<()> {
    let engine = ctx.engine();
    match id {
        Some(id) => {
            let outcome = engine.restore_by_id(&ctx.scope, id)?;
            eprintln!(
                "{}",
                success_message(cformat!(
                    "Reopened <bold>{}</>: done → doing",
                    outcome.ticket.id
                ))
            );
            eprintln!(
                "{}",
                cformat!(
                    "<dim>  run 'ticketflow start {} --force' to rematerialize its worktree</>",
                    outcome.ticket.id
                )
            );
        }
        None => {
            let outcome = engine.restore_current(&ctx.scope)?;
            eprintln!(
                "{}",
                success_message(cformat!(
                    "Restored current-ticket link for <bold>{}</>",
                    outcome.ticket.id
                ))
            );
        }
    }
    Ok(())
}
