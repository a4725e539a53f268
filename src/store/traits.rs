//! `Database` trait: single async interface for all persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::agent::conversation::ConversationState;
use crate::agent::snapshot::NestedStateSnapshot;
use crate::analysis::DimensionAnalysis;
use crate::error::DatabaseError;
use crate::profile::{UserGoals, UserProfile};

/// One compressed exchange in a user's conversation log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationEvent {
    pub id: Uuid,
    pub user_id: String,
    /// Dotted state path the exchange happened in.
    pub state_name: String,
    pub timestamp: DateTime<Utc>,
    pub normalized_text: String,
}

impl ConversationEvent {
    pub fn new(
        user_id: impl Into<String>,
        state_name: impl Into<String>,
        normalized_text: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            state_name: state_name.into(),
            timestamp: Utc::now(),
            normalized_text: normalized_text.into(),
        }
    }
}

/// Everything a completed turn writes, applied in one transaction.
#[derive(Debug, Clone)]
pub struct TurnCommit {
    pub user_id: String,
    pub snapshot: NestedStateSnapshot,
    /// `None` keeps the stored conversation state untouched.
    pub conversation_state: Option<ConversationState>,
    pub event: Option<ConversationEvent>,
}

/// Backend-agnostic persistence gateway. Each call is atomic.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    // ── Users ───────────────────────────────────────────────────────

    async fn get_user(&self, username: &str) -> Result<Option<UserProfile>, DatabaseError>;

    /// Insert or replace a user profile.
    async fn save_user(&self, profile: &UserProfile) -> Result<(), DatabaseError>;

    // ── Agent state ─────────────────────────────────────────────────

    /// The persisted state-tree snapshot, validated at read time.
    async fn get_agent_state(
        &self,
        user_id: &str,
    ) -> Result<Option<NestedStateSnapshot>, DatabaseError>;

    async fn save_agent_state(
        &self,
        user_id: &str,
        snapshot: &NestedStateSnapshot,
    ) -> Result<(), DatabaseError>;

    // ── Conversation ────────────────────────────────────────────────

    async fn get_conversation_state(
        &self,
        user_id: &str,
    ) -> Result<Option<ConversationState>, DatabaseError>;

    async fn save_conversation_state(
        &self,
        user_id: &str,
        state: &ConversationState,
    ) -> Result<(), DatabaseError>;

    async fn append_conversation_event(&self, event: &ConversationEvent)
    -> Result<(), DatabaseError>;

    /// The most recent `limit` events, returned oldest first.
    /// `state_name` restricts the window to one state path.
    async fn get_conversation_events(
        &self,
        user_id: &str,
        state_name: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ConversationEvent>, DatabaseError>;

    /// Delete every event of a user. Returns the number deleted.
    async fn wipe_conversation_events(&self, user_id: &str) -> Result<usize, DatabaseError>;

    // ── Journey artifacts ───────────────────────────────────────────

    async fn get_dimension_analysis(
        &self,
        user_id: &str,
    ) -> Result<Option<DimensionAnalysis>, DatabaseError>;

    async fn save_dimension_analysis(
        &self,
        user_id: &str,
        analysis: &DimensionAnalysis,
    ) -> Result<(), DatabaseError>;

    /// Returns whether a cached analysis existed.
    async fn delete_dimension_analysis(&self, user_id: &str) -> Result<bool, DatabaseError>;

    async fn get_user_goals(&self, user_id: &str) -> Result<Option<UserGoals>, DatabaseError>;

    async fn save_user_goals(&self, user_id: &str, goals: &UserGoals)
    -> Result<(), DatabaseError>;

    // ── Turns ───────────────────────────────────────────────────────

    /// Write snapshot, conversation state and event together, or none of them.
    async fn commit_turn(&self, commit: &TurnCommit) -> Result<(), DatabaseError>;
}
