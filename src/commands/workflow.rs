//! `ticketflow workflow` — the lifecycle guide.

use ticketflow::styling::println;

const GUIDE: &str = "\
The ticket lifecycle

  tickets/todo/    backlog        created by `ticketflow new <slug>`
  tickets/doing/   in progress    entered by `ticketflow start <ID>`
  tickets/done/    finished       entered by `ticketflow close`

A ticket's status IS the directory its file lives in; there is no status
field to edit.

Typical flow:

  ticketflow new fix-parser          # ticket lands in todo/
  ticketflow start 250711            # unique prefixes are fine
      - ticket moves to doing/
      - branch <ID> is created (from the parent's branch for sub-tickets)
      - a worktree appears under the configured base directory
      - current-ticket.md inside the worktree points at the ticket
  cd <worktree> && hack, commit, repeat
  ticketflow close                   # inside the worktree
      - ticket moves to done/, closed_at is set
  git merge / PR as usual
  ticketflow cleanup <ID>            # removes the worktree and branch

Other moves:

  ticketflow close <ID> --reason \"duplicate\"   # abandon without merging
  ticketflow restore                             # recreate current-ticket.md
  ticketflow restore <ID>                        # reopen a done ticket
  ticketflow cleanup                             # sweep orphans
  ticketflow list --status all -o json           # machine-readable listing

Sub-tickets: run `ticketflow new <slug>` while on a ticket branch (or pass
--parent) and `start` will stack the new branch on the parent's branch.";

pub fn handle_workflow() -> anyhow::Result<()> {
    println!("{GUIDE}");
    Ok(())
}
