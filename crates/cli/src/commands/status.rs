//! `codewright status`: Show the effective configuration.

use super::{config_file, load_config};
use std::path::Path;

pub fn run(path: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(path)?;
    let file = config_file(path);

    println!("Codewright Status");
    println!("=================");
    println!("  Config file:  {}", file.display());
    println!("  API key:      {}", if config.has_api_key() { "set" } else { "missing" });
    println!("  Model:        {}", config.model);
    println!("  Max tokens:   {}", config.max_tokens);
    println!("  Provider URL: {}", config.provider.base_url);
    println!("  Store:        {}", config.store.database_url);
    println!("  Gateway:      {}:{}", config.gateway.host, config.gateway.port);
    println!(
        "  Retries:      {} attempts, {}ms base, {}ms cap",
        config.retry.max_attempts, config.retry.base_delay_ms, config.retry.max_delay_ms
    );
    println!("  Workspace:    {}", config.tools.workspace_root.display());
    println!("  Mify binary:  {}", config.tools.mify_binary);

    if file.exists() {
        println!("\n  Config file found");
    } else {
        println!("\n  No config file — run `codewright init` first");
    }

    Ok(())
}
