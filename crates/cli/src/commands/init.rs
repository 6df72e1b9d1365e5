//! `codewright init`: Write a default configuration file.

use super::config_file;
use codewright_config::AppConfig;
use std::path::Path;

pub fn run(path: Option<&Path>, force: bool) -> anyhow::Result<()> {
    let config_path = config_file(path);

    println!("Codewright — Setup");
    println!("==================\n");

    if let Some(dir) = config_path.parent()
        && !dir.as_os_str().is_empty()
        && !dir.exists()
    {
        std::fs::create_dir_all(dir)?;
        println!("  Created config directory: {}", dir.display());
    }

    if config_path.exists() && !force {
        println!("  Config already exists at: {}", config_path.display());
        println!("  Edit it manually or re-run with --force to overwrite.\n");
        return Ok(());
    }

    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("  Wrote config: {}", config_path.display());
    println!("\nNext steps:");
    println!("  1. Set ANTHROPIC_API_KEY (or api_key in the config file)");
    println!("  2. Point [tools] workspace_root at the folder projects live in");
    println!("  3. Run `codewright serve`, or `codewright projects new <name>` then `codewright chat -p <id>`\n");

    Ok(())
}
