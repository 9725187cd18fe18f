//! OpenAI client configuration with sensible defaults.

use crate::error::{Result, SyllabusError};
use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

/// Default timeout for OpenAI API requests (5 minutes).
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Create an OpenAI client with the default timeout and environment credentials.
pub fn create_client() -> Result<Client<OpenAIConfig>> {
    create_client_with(OpenAIConfig::default(), Duration::from_secs(DEFAULT_TIMEOUT_SECS))
}

/// Create a client for an OpenAI-compatible endpoint (OpenAI, DeepSeek, ...).
pub fn create_compatible_client(
    api_key: &str,
    base_url: Option<&url::Url>,
    timeout: Duration,
) -> Result<Client<OpenAIConfig>> {
    let mut config = OpenAIConfig::new().with_api_key(api_key);
    if let Some(url) = base_url {
        config = config.with_api_base(url.as_str().trim_end_matches('/'));
    }
    create_client_with(config, timeout)
}

/// Create a client with an explicit config and timeout.
pub fn create_client_with(config: OpenAIConfig, timeout: Duration) -> Result<Client<OpenAIConfig>> {
    let http_client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| SyllabusError::Config(format!("Failed to create HTTP client: {}", e)))?;

    Ok(Client::with_config(config).with_http_client(http_client))
}
