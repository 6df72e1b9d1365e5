//! `codewright history`: Print a project's conversation.

use super::load_config;
use codewright_agent::ConversationCache;
use codewright_core::message::Role;
use std::path::Path;

pub async fn run(path: Option<&Path>, project: i64) -> anyhow::Result<()> {
    let config = load_config(path)?;
    let store =
        codewright_store::open(&config.store.database_url, config.store.max_connections).await?;
    let cache = ConversationCache::new(store);

    let turns = cache.history(project).await?;
    if turns.is_empty() {
        println!("  No messages yet for project {project}.");
        return Ok(());
    }

    for turn in &turns {
        let who = match turn.role {
            Role::User => "You",
            Role::Assistant => "Codewright",
        };
        println!("  {who} > {}\n", turn.text().unwrap_or_default());
    }
    Ok(())
}
