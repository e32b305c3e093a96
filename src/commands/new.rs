//! `ticketflow new <slug>` — create a ticket in todo/.

use color_print::cformat;
use ticketflow::styling::{eprintln, println, success_message};

use crate::cli::OutputFormat;
use crate::commands::AppContext;
use crate::output::{TicketView, resolve_format};

pub fn handle_new(
    ctx: &AppContext,
    slug: &str,
    parent: Option<&str>,
    format: Option<OutputFormat>,
) -> anyhow::Result<()> {
    let format = resolve_format(format, &ctx.config);
    let outcome = ctx.engine().new_ticket(&ctx.scope, slug, parent)?;

    match format {
        OutputFormat::Json => {
            let view = TicketView::new(&outcome.ticket, false);
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
        OutputFormat::Text => {
            eprintln!(
                "{}",
                success_message(cformat!(
                    "Created ticket <bold>{}</> (todo)",
                    outcome.ticket.id
                ))
            );
            if let Some(parent) = &outcome.parent {
                eprintln!(
                    "{}",
                    cformat!("<dim>  sub-ticket of {}</>", parent)
                );
            }
            eprintln!(
                "{}",
                cformat!("<dim>  {}</>", outcome.ticket.path.display())
            );
        }
    }
    Ok(())
}
