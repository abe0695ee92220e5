//! OpenAI client configuration with sensible defaults.

use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

/// Default timeout for OpenAI API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Create an OpenAI client using the primary credential.
pub fn create_client() -> Client<OpenAIConfig> {
    create_client_with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
}

/// Create an OpenAI client with a custom timeout.
pub fn create_client_with_timeout(timeout: Duration) -> Client<OpenAIConfig> {
    client_for(OpenAIConfig::default(), timeout)
}

/// Create an OpenAI client for the backup credential, if one is configured.
///
/// The backup key (`OPENAI_API_KEY_BACKUP`) is used when the primary key hits
/// quota-shaped errors.
pub fn create_backup_client(timeout: Duration) -> Option<Client<OpenAIConfig>> {
    let key = std::env::var("OPENAI_API_KEY_BACKUP").ok()?;
    if key.is_empty() {
        return None;
    }
    Some(client_for(OpenAIConfig::new().with_api_key(key), timeout))
}

fn client_for(config: OpenAIConfig, timeout: Duration) -> Client<OpenAIConfig> {
    let http_client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .expect("Failed to create HTTP client");

    Client::with_config(config).with_http_client(http_client)
}

/// Whether the primary API key is configured.
pub fn is_api_key_configured() -> bool {
    std::env::var("OPENAI_API_KEY").map(|k| !k.is_empty()).unwrap_or(false)
}

/// Heuristic for quota/rate errors that should trigger the backup credential.
pub fn is_quota_error(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("insufficient_quota")
        || lower.contains("rate limit")
        || lower.contains("rate_limit")
        || lower.contains("429")
}
