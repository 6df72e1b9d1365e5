//! Completion service clients for Codewright.
//!
//! All providers implement the `codewright_core::Provider` trait.

pub mod anthropic;

pub use anthropic::AnthropicProvider;

use codewright_core::{Provider, ProviderError};
use std::sync::Arc;

/// Build the configured provider.
///
/// A missing API key is not an error here: the provider is still built and
/// every call fails with [`ProviderError::AuthenticationFailed`], so the
/// gateway can serve history and project routes without a key.
pub fn build_from_config(
    config: &codewright_config::AppConfig,
) -> Result<Arc<dyn Provider>, ProviderError> {
    if !config.has_api_key() {
        tracing::warn!("No API key configured; completion calls will fail");
    }
    let provider = AnthropicProvider::new(
        config.api_key.clone().unwrap_or_default(),
        std::time::Duration::from_secs(config.provider.timeout_secs),
    )?
    .with_base_url(&config.provider.base_url);
    Ok(Arc::new(provider))
}
