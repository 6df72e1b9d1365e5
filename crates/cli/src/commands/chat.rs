//! `codewright chat`: Single-message or interactive chat about a project.

use super::load_config;
use anyhow::bail;
use codewright_config::AppConfig;
use codewright_gateway::AppState;
use std::io::Write;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run(path: Option<&Path>, project: i64, message: Option<String>) -> anyhow::Result<()> {
    let config = load_config(path)?;

    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    ANTHROPIC_API_KEY=sk-ant-...");
        eprintln!("    CODEWRIGHT_API_KEY=sk-ant-...");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        bail!("No API key found. See above for setup instructions.");
    }

    let state = AppState::from_config(&config)
        .await
        .map_err(|e| anyhow::anyhow!("Startup failed: {e}"))?;
    let orchestrator = state.orchestrator;

    if let Some(msg) = message {
        eprint!("  Thinking...");
        let answer = orchestrator.handle_message(project, &msg).await;
        eprint!("\r              \r");
        println!("{}", answer?);
        return Ok(());
    }

    println!();
    println!("  Codewright — Interactive Mode");
    println!();
    println!("  Project:   {project}");
    println!("  Model:     {}", config.model);
    println!("  Workspace: {}", config.tools.workspace_root.display());
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or Ctrl+D to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }

        eprint!("  ...");
        match orchestrator.handle_message(project, line).await {
            Ok(answer) => {
                eprint!("\r     \r");
                println!("\n  Codewright > {answer}\n");
            }
            Err(e) => {
                eprint!("\r     \r");
                eprintln!("\n  Error: {e}\n");
            }
        }
    }

    println!("\n  Goodbye!");
    Ok(())
}
