//! OpenAI chat-completions oracle.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::OracleError;
use crate::llm::provider::{OraclePrompt, ResponseOracle};

const PROVIDER: &str = "openai";

/// Default API root.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI API client that always requests `json_object` replies.
pub struct OpenAiOracle {
    api_key: SecretString,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiOracle {
    /// Create a client with a request timeout.
    pub fn new(
        api_key: SecretString,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, OracleError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OracleError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: format!("Failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn request_body(prompt: &OraclePrompt, model: &str) -> serde_json::Value {
        let mut messages = vec![serde_json::json!({
            "role": "system",
            "content": prompt.system_role,
        })];
        if let Some(ref context) = prompt.assistant_context {
            messages.push(serde_json::json!({
                "role": "assistant",
                "content": context,
            }));
        }
        messages.push(serde_json::json!({
            "role": "user",
            "content": prompt.user_prompt,
        }));

        serde_json::json!({
            "model": model,
            "messages": messages,
            "response_format": {"type": "json_object"},
        })
    }
}

#[derive(Deserialize)]
struct Message {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<Choice>,
}

/// Map an HTTP status to the oracle error taxonomy.
fn status_error(
    status: reqwest::StatusCode,
    retry_after: Option<Duration>,
    body: String,
) -> OracleError {
    let provider = PROVIDER.to_string();
    match status.as_u16() {
        401 | 403 => OracleError::AuthFailed { provider },
        429 => OracleError::RateLimited {
            provider,
            retry_after,
        },
        500..=599 => OracleError::Unavailable {
            provider,
            reason: format!("HTTP {status}: {body}"),
        },
        _ => OracleError::RequestFailed {
            provider,
            reason: format!("HTTP {status}: {body}"),
        },
    }
}

#[async_trait]
impl ResponseOracle for OpenAiOracle {
    fn provider_name(&self) -> &str {
        PROVIDER
    }

    async fn complete(&self, prompt: &OraclePrompt, model: &str) -> Result<String, OracleError> {
        let url = format!("{}/chat/completions", self.base_url);
        tracing::debug!(model, url = %url, "Calling oracle");

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&Self::request_body(prompt, model))
            .send()
            .await
            .map_err(|e| OracleError::Unavailable {
                provider: PROVIDER.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, retry_after, body));
        }

        let api_response: ApiResponse =
            response.json().await.map_err(|e| OracleError::Unavailable {
                provider: PROVIDER.to_string(),
                reason: format!("Failed to read response body: {e}"),
            })?;

        api_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| OracleError::malformed("OpenAI returned no message content"))
    }
}
