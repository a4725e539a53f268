//! Oracle integration for the awareness agent.
//!
//! The oracle is the external language-model service. Every call sends a
//! layered prompt (system role, optional assistant context, user text) and
//! receives a JSON object as text.
//!
//! - `provider`: the `ResponseOracle` trait and reply parsing helpers
//! - `openai`: chat-completions client over reqwest
//! - `retry`: bounded backoff wrapper for transient failures

pub mod openai;
pub mod provider;
pub mod retry;

pub use openai::OpenAiOracle;
pub use provider::{JSON_REMINDER, OraclePrompt, ResponseOracle, extract_json_object, parse_reply};
pub use retry::RetryingOracle;

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;

use crate::config::RetryConfig;
use crate::error::{ConfigError, OracleError};

/// Configuration for creating the oracle.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: SecretString,
    pub base_url: String,
    pub timeout: Duration,
    pub retry: RetryConfig,
}

impl LlmConfig {
    /// Read `OPENAI_API_KEY`, `OPENAI_BASE_URL` and the oracle tuning variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("OPENAI_API_KEY".to_string()))?;

        let base_url = std::env::var("OPENAI_BASE_URL")
            .unwrap_or_else(|_| openai::DEFAULT_BASE_URL.to_string());

        let timeout_secs: u64 = match std::env::var("AWARENESS_ORACLE_TIMEOUT_SECS") {
            Ok(raw) => raw.trim().parse().map_err(|e| ConfigError::InvalidValue {
                key: "AWARENESS_ORACLE_TIMEOUT_SECS".to_string(),
                message: format!("{e}"),
            })?,
            Err(_) => 60,
        };

        Ok(Self {
            api_key: SecretString::from(api_key),
            base_url,
            timeout: Duration::from_secs(timeout_secs),
            retry: RetryConfig::from_env()?,
        })
    }
}

/// Create the oracle stack (HTTP client wrapped in retry) from configuration.
pub fn create_oracle(config: &LlmConfig) -> Result<Arc<dyn ResponseOracle>, OracleError> {
    let client = OpenAiOracle::new(config.api_key.clone(), &config.base_url, config.timeout)?;
    tracing::info!(
        base_url = %config.base_url,
        max_attempts = config.retry.max_attempts,
        "Using OpenAI oracle"
    );
    Ok(Arc::new(RetryingOracle::new(
        Arc::new(client),
        config.retry.clone(),
    )))
}
