//! The response oracle contract: a structured prompt in, a JSON string out.

use async_trait::async_trait;

use crate::error::OracleError;

/// A layered prompt for a single oracle call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OraclePrompt {
    /// System role: global persona, node role chain and task context.
    pub system_role: String,
    /// Optional assistant-side continuity (prior assistant role, event window).
    pub assistant_context: Option<String>,
    /// The user-facing part of the prompt.
    pub user_prompt: String,
}

impl OraclePrompt {
    pub fn new(system_role: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            system_role: system_role.into(),
            assistant_context: None,
            user_prompt: user_prompt.into(),
        }
    }

    pub fn with_assistant_context(mut self, context: impl Into<String>) -> Self {
        let context = context.into();
        self.assistant_context = if context.trim().is_empty() {
            None
        } else {
            Some(context)
        };
        self
    }

    /// Append clarifying instructions to the system role (used on re-prompt).
    pub fn with_clarification(mut self, clarification: &str) -> Self {
        self.system_role.push_str("\n\n");
        self.system_role.push_str(clarification);
        self
    }
}

/// Appended to the system role when a reply could not be parsed.
pub const JSON_REMINDER: &str = "IMPORTANT: your previous reply could not be parsed. \
Respond with ONLY the JSON object in the requested format, with no other text.";

/// The external language-model completion service.
///
/// Implementations must always request a JSON-object-shaped reply.
#[async_trait]
pub trait ResponseOracle: Send + Sync {
    /// Provider name for logging.
    fn provider_name(&self) -> &str;

    /// Complete a prompt with the given model and return the raw JSON text.
    async fn complete(&self, prompt: &OraclePrompt, model: &str) -> Result<String, OracleError>;
}

/// Extract a JSON object from oracle output (handles markdown wrapping).
pub fn extract_json_object(text: &str) -> String {
    let trimmed = text.trim();

    if trimmed.starts_with('{') {
        return trimmed.to_string();
    }

    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return after[..end].trim().to_string();
        }
    }

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        if let Some(end) = after.find("```") {
            let inner = after[..end].trim();
            if inner.starts_with('{') {
                return inner.to_string();
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}'))
        && end > start
    {
        return trimmed[start..=end].to_string();
    }

    trimmed.to_string()
}

/// Parse oracle output into a typed record, mapping failures to `MalformedReply`.
pub fn parse_reply<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T, OracleError> {
    let json = extract_json_object(raw);
    serde_json::from_str(&json).map_err(|e| OracleError::malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_plain_object() {
        let input = r#"{"a": 1}"#;
        assert_eq!(extract_json_object(input), input);
    }

    #[test]
    fn extract_from_markdown_fence() {
        let input = "Sure!\n```json\n{\"a\": 1}\n```\nanything else?";
        assert_eq!(extract_json_object(input), r#"{"a": 1}"#);
    }

    #[test]
    fn extract_from_surrounding_prose() {
        let input = "here you go {\"a\": {\"b\": 2}} done";
        assert_eq!(extract_json_object(input), r#"{"a": {"b": 2}}"#);
    }

    #[test]
    fn parse_reply_maps_errors_to_malformed() {
        #[derive(Debug, serde::Deserialize)]
        struct Needs {
            #[allow(dead_code)]
            field: String,
        }
        let err = parse_reply::<Needs>(r#"{"other": 1}"#).unwrap_err();
        assert!(matches!(err, OracleError::MalformedReply { .. }));
    }

    #[test]
    fn blank_assistant_context_is_dropped() {
        let prompt = OraclePrompt::new("sys", "user").with_assistant_context("   ");
        assert!(prompt.assistant_context.is_none());
        let prompt = prompt.with_assistant_context("prior");
        assert_eq!(prompt.assistant_context.as_deref(), Some("prior"));
    }
}
