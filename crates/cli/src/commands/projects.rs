//! `codewright projects`: List or create projects.

use super::load_config;
use clap::Subcommand;
use codewright_core::store::MetadataStore;
use std::path::Path;

#[derive(Subcommand)]
pub enum Action {
    /// List every project (the default)
    List,

    /// Create a project
    New {
        /// Display name
        name: String,
    },
}

pub async fn run(path: Option<&Path>, action: Option<Action>) -> anyhow::Result<()> {
    let config = load_config(path)?;
    let store =
        codewright_store::open(&config.store.database_url, config.store.max_connections).await?;

    match action.unwrap_or(Action::List) {
        Action::List => {
            let projects = store.list_projects().await?;
            if projects.is_empty() {
                println!("  No projects yet. Create one with `codewright projects new <name>`.");
            }
            for project in projects {
                println!(
                    "  {:>4}  {}  (created {})",
                    project.id,
                    project.name,
                    project.created_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        Action::New { name } => {
            let project = store.create_project(name.trim()).await?;
            println!("  Created project {} ({})", project.id, project.name);
        }
    }
    Ok(())
}
