//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Global persona placed at the top of every conversational prompt.
pub const DEFAULT_PERSONA: &str = "\
You are a compassionate neuropsychologist and coach helping a user understand and \
improve their self-awareness. You speak warmly, use non-judgmental and supportive \
language, normalize the experience of having areas to improve, and ask ONE question \
at a time. Always reply with a single JSON object exactly matching the requested format.";

/// Question used when no handler supplies one and nothing was persisted yet.
pub const DEFAULT_OPENING_QUESTION: &str = "What would you like to talk about today?";

/// Agent configuration.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Agent name for identification.
    pub name: String,
    /// Global persona text (top layer of the composed role).
    pub persona: String,
    /// Question asked when there is no explicit or persisted one.
    pub opening_question: String,
    /// Model used for conversation turns.
    pub conversation_model: String,
    /// Model used for background calls (event compression, extraction).
    pub utility_model: String,
    /// Number of prior conversation events fed back as context.
    pub event_window: usize,
    /// Consecutive failed turn commits tolerated before giving up.
    pub max_persistence_failures: u32,
    /// Where the libSQL database lives.
    pub db_path: PathBuf,
    /// Directory for rolling log files.
    pub log_dir: PathBuf,
    /// Username supplied up front (skips the username prompt).
    pub username: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "awareness-agent".to_string(),
            persona: DEFAULT_PERSONA.to_string(),
            opening_question: DEFAULT_OPENING_QUESTION.to_string(),
            conversation_model: "gpt-4o".to_string(),
            utility_model: "gpt-4o-mini".to_string(),
            event_window: 10,
            max_persistence_failures: 3,
            db_path: PathBuf::from("./data/awareness-agent.db"),
            log_dir: PathBuf::from("./data/logs"),
            username: None,
        }
    }
}

impl AgentConfig {
    /// Build the agent configuration from `AWARENESS_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let persona = std::env::var("AWARENESS_PERSONA").unwrap_or(defaults.persona);
        let conversation_model = std::env::var("AWARENESS_CONVERSATION_MODEL")
            .unwrap_or(defaults.conversation_model);
        let utility_model = std::env::var("AWARENESS_MODEL").unwrap_or(defaults.utility_model);
        let event_window = parse_env("AWARENESS_EVENT_WINDOW", defaults.event_window)?;
        let max_persistence_failures = parse_env(
            "AWARENESS_MAX_PERSISTENCE_FAILURES",
            defaults.max_persistence_failures,
        )?;

        let db_path = std::env::var("AWARENESS_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);
        let log_dir = std::env::var("AWARENESS_LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                db_path
                    .parent()
                    .map(|p| p.join("logs"))
                    .unwrap_or(defaults.log_dir)
            });

        let username = std::env::var("AWARENESS_USER")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Ok(Self {
            persona,
            conversation_model,
            utility_model,
            event_window,
            max_persistence_failures,
            db_path,
            log_dir,
            username,
            ..defaults
        })
    }
}

/// Retry behaviour for transient oracle failures.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on every further attempt.
    pub base_delay: Duration,
    /// Upper bound for a single backoff delay.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let max_attempts = parse_env("AWARENESS_ORACLE_RETRIES", defaults.max_attempts)?;
        if max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "AWARENESS_ORACLE_RETRIES".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(Self {
            max_attempts,
            ..defaults
        })
    }

    /// Backoff delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Parse an optional environment variable, falling back to `default` when unset.
fn parse_env<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let retry = RetryConfig {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
        };
        assert_eq!(retry.delay_for(1), Duration::from_millis(100));
        assert_eq!(retry.delay_for(2), Duration::from_millis(200));
        assert_eq!(retry.delay_for(3), Duration::from_millis(350));
        assert_eq!(retry.delay_for(30), Duration::from_millis(350));
    }

    #[test]
    fn default_config_uses_data_dir() {
        let config = AgentConfig::default();
        assert!(config.db_path.ends_with("awareness-agent.db"));
        assert_eq!(config.event_window, 10);
        assert!(config.persona.contains("JSON"));
    }

    #[test]
    fn parse_env_falls_back_when_unset() {
        let value: usize = parse_env("AWARENESS_TEST_SURELY_UNSET_VAR", 7).unwrap();
        assert_eq!(value, 7);
    }
}
