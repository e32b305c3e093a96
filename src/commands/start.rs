//! `ticketflow start <ID>` — move a ticket to doing and materialize its
//! branch/worktree.

use color_print::cformat;
use ticketflow::git::{Divergence, GitError};
use ticketflow::lifecycle::{DivergencePolicy, StartOutcome};
use ticketflow::styling::{eprintln, println, success_message};
use ticketflow::ticket::Status;

use crate::cli::OutputFormat;
use crate::commands::AppContext;
use crate::output::{TicketView, is_non_interactive, prompt_divergence, resolve_format};

pub fn handle_start(
    ctx: &AppContext,
    id: &str,
    force: bool,
    format: Option<OutputFormat>,
) -> anyhow::Result<()> {
    let format = resolve_format(format, &ctx.config);
    let engine = ctx.engine();

    let outcome = match engine.start(&ctx.scope, id, force, DivergencePolicy::Fail) {
        Ok(outcome) => outcome,
        Err(e) => {
            // Divergence is a conversation, not a failure, when a human is
            // attached: offer use / recreate / cancel and retry.
            let Some(divergence) = divergence_payload(&e) else {
                return Err(e);
            };
            if is_non_interactive() || format == OutputFormat::Json {
                return Err(e);
            }
            match prompt_divergence(&divergence) {
                DivergencePolicy::Fail => return Err(e),
                policy => engine.start(&ctx.scope, id, force, policy)?,
            }
        }
    };

    render(&outcome, format)?;
    Ok(())
}

fn divergence_payload(err: &anyhow::Error) -> Option<Divergence> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<GitError>())
        .and_then(|git| git.divergence())
        .cloned()
}

fn render(outcome: &StartOutcome, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            let view = TicketView::new(&outcome.ticket, outcome.worktree_path.is_some());
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
        OutputFormat::Text => {
            let transition = if outcome.original_status == Status::Doing {
                "doing → doing (worktree recreated)".to_string()
            } else {
                format!("{} → {}", outcome.original_status, outcome.ticket.status)
            };
            eprintln!(
                "{}",
                success_message(cformat!(
                    "Started <bold>{}</>: {transition}",
                    outcome.ticket.id
                ))
            );
            if let Some(parent) = &outcome.parent {
                eprintln!(
                    "{}",
                    cformat!("<dim>  stacked on parent {} (base branch)</>", parent)
                );
            } else {
                eprintln!(
                    "{}",
                    cformat!("<dim>  branch {} from {}</>", outcome.ticket.id, outcome.base_branch)
                );
            }
            match &outcome.worktree_path {
                Some(path) => {
                    eprintln!("{}", cformat!("<dim>  worktree {}</>", path.display()));
                }
                None => {
                    eprintln!(
                        "{}",
                        cformat!(
                            "<dim>  worktrees disabled; check out {} to begin</>",
                            outcome.ticket.id
                        )
                    );
                }
            }
        }
    }
    Ok(())
}
