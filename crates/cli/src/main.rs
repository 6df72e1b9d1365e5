//! Codewright CLI: the main entry point.
//!
//! Commands:
//! - `init`: Write a default config file
//! - `serve`: Start the HTTP chat API
//! - `chat`: Chat about a project from the terminal
//! - `history`: Print a project's conversation
//! - `projects`: List or create projects
//! - `status`: Show the effective configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "codewright",
    about = "Codewright: a coding assistant for Mify projects",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Read configuration from this file instead of ~/.codewright/config.toml
    #[arg(short, long, global = true, env = "CODEWRIGHT_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Start the HTTP chat API
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,

        /// Override the bind address
        #[arg(long)]
        host: Option<String>,
    },

    /// Chat with the assistant about a project
    Chat {
        /// The project to talk about
        #[arg(short, long)]
        project: i64,

        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Print a project's conversation
    History {
        #[arg(short, long)]
        project: i64,
    },

    /// List projects, or create one
    Projects {
        #[command(subcommand)]
        action: Option<commands::projects::Action>,
    },

    /// Show the effective configuration
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Init { force } => commands::init::run(config_path, force)?,
        Commands::Serve { port, host } => commands::serve::run(config_path, port, host).await?,
        Commands::Chat { project, message } => {
            commands::chat::run(config_path, project, message).await?
        }
        Commands::History { project } => commands::history::run(config_path, project).await?,
        Commands::Projects { action } => commands::projects::run(config_path, action).await?,
        Commands::Status => commands::status::run(config_path)?,
    }

    Ok(())
}
