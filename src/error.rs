//! Error types for the awareness agent.

use std::time::Duration;

/// Top-level error type for the agent.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Persistence error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Profile error: {0}")]
    Profile(#[from] ProfileError),
}

impl Error {
    /// Persistence failures abort the current turn but leave the process alive.
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors (the persistence gateway failing).
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Malformed persisted {entity} for user {user_id}: {reason}")]
    Malformed {
        entity: String,
        user_id: String,
        reason: String,
    },
}

/// Terminal I/O errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Failed to read input: {0}")]
    Read(String),
}

/// Errors from the response oracle (the LLM completion service).
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("Oracle {provider} unavailable: {reason}")]
    Unavailable { provider: String, reason: String },

    #[error("Oracle {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Oracle {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Authentication failed for oracle {provider}")]
    AuthFailed { provider: String },

    #[error("Malformed oracle reply: {reason}")]
    MalformedReply { reason: String },
}

impl OracleError {
    /// Whether the failure is transient and worth retrying with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::RateLimited { .. })
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedReply {
            reason: reason.into(),
        }
    }
}

/// State-machine errors. These are invariant violations, not user errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    #[error("Invalid transition in {node}: {from} -> {to}")]
    InvalidTransition {
        node: String,
        from: String,
        to: String,
    },

    #[error("Unknown state {node}.{state}: no handler registered")]
    UnknownState { node: String, state: String },

    #[error("Node {parent} has no child node named {name}")]
    UnknownNode { parent: String, name: String },

    #[error("No factory registered for node {name}")]
    UnregisteredNode { name: String },

    #[error("Invalid snapshot for node {node}: {reason}")]
    InvalidSnapshot { node: String, reason: String },
}

/// User profile import and bootstrap errors.
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("Failed to read profile data from {path}: {reason}")]
    Import { path: String, reason: String },

    #[error("Profile for {username} has no dimension scores")]
    NoDimensions { username: String },

    #[error("Username must not be empty")]
    EmptyUsername,
}

/// Result type alias for the agent.
pub type Result<T> = std::result::Result<T, Error>;
