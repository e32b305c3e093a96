//! `ticketflow init` — set up the repository.

use std::time::Duration;

use anyhow::Context;
use ticketflow::cancel::CancelScope;
use ticketflow::config::{CONFIG_FILE_NAME, Config};
use ticketflow::git::Repository;
use ticketflow::styling::{eprintln, info_message, success_message};
use ticketflow::ticket::CURRENT_TICKET_LINK;
use ticketflow::ticket::store::TicketStore;

pub fn handle_init(scope: &CancelScope) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;
    let repo = Repository::discover(scope, &cwd, Duration::from_secs(30))?;
    let root = repo.main_root();

    let config_path = root.join(CONFIG_FILE_NAME);
    let config = if config_path.exists() {
        eprintln!("{}", info_message(format!("{CONFIG_FILE_NAME} already exists")));
        Config::load(root)?
    } else {
        let config = Config::default();
        config.save(root)?;
        eprintln!("{}", success_message(format!("Created {CONFIG_FILE_NAME}")));
        config
    };

    let store = TicketStore::new(root, &config);
    store.ensure_layout()?;
    eprintln!(
        "{}",
        success_message(format!("Created {}/{{todo,doing,done}}", config.tickets.dir))
    );

    ensure_gitignore_entry(root)?;
    eprintln!(
        "{}",
        success_message("Repository initialized; create a ticket with 'ticketflow new <slug>'")
    );
    Ok(())
}

/// The current-ticket symlink is per-checkout state; keep it out of git.
fn ensure_gitignore_entry(root: &std::path::Path) -> anyhow::Result<()> {
    let path = root.join(".gitignore");
    let existing = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e).with_context(|| format!("Failed to read {}", path.display())),
    };
    if existing.lines().any(|line| line.trim() == CURRENT_TICKET_LINK) {
        return Ok(());
    }
    let mut updated = existing;
    if !updated.is_empty() && !updated.ends_with('\n') {
        updated.push('\n');
    }
    updated.push_str(CURRENT_TICKET_LINK);
    updated.push('\n');
    std::fs::write(&path, updated)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
