pub mod chat;
pub mod history;
pub mod init;
pub mod projects;
pub mod serve;
pub mod status;

use anyhow::Context;
use codewright_config::AppConfig;
use std::path::{Path, PathBuf};

/// Where the config file lives: `--config`, or the default location.
pub fn config_file(path: Option<&Path>) -> PathBuf {
    path.map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
}

/// Load configuration and apply environment overrides.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let file = config_file(path);
    AppConfig::load_with_env(&file)
        .with_context(|| format!("Failed to load config from {}", file.display()))
}
