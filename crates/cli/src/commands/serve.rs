//! `codewright serve`: Start the HTTP chat API.

use super::load_config;
use std::path::Path;

pub async fn run(
    path: Option<&Path>,
    port: Option<u16>,
    host: Option<String>,
) -> anyhow::Result<()> {
    let mut config = load_config(path)?;

    if let Some(port) = port {
        config.gateway.port = port;
    }
    if let Some(host) = host {
        config.gateway.host = host;
    }

    println!("Codewright Gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Store:     {}", config.store.database_url);
    println!("   Workspace: {}", config.tools.workspace_root.display());

    codewright_gateway::start(config)
        .await
        .map_err(|e| anyhow::anyhow!("Gateway failed: {e}"))
}
