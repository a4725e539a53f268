//! libSQL backend: async `Database` trait implementation.
//!
//! Supports local file and in-memory databases. Structured records are
//! stored as JSON text and validated when read back.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::agent::conversation::ConversationState;
use crate::agent::snapshot::NestedStateSnapshot;
use crate::analysis::DimensionAnalysis;
use crate::error::DatabaseError;
use crate::profile::{UserGoals, UserProfile};
use crate::store::migrations;
use crate::store::traits::{ConversationEvent, Database, TurnCommit};

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|ndt| ndt.and_utc())
}

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, DatabaseError> {
    serde_json::to_string(value).map_err(|e| DatabaseError::Serialization(e.to_string()))
}

fn malformed(entity: &str, user_id: &str, reason: impl ToString) -> DatabaseError {
    DatabaseError::Malformed {
        entity: entity.to_string(),
        user_id: user_id.to_string(),
        reason: reason.to_string(),
    }
}

/// Read the single text column of the first row, if any.
async fn query_text(
    conn: &Connection,
    sql: &str,
    user_id: &str,
    op: &str,
) -> Result<Option<String>, DatabaseError> {
    let mut rows = conn
        .query(sql, params![user_id])
        .await
        .map_err(|e| DatabaseError::Query(format!("{op}: {e}")))?;

    match rows.next().await {
        Ok(Some(row)) => row
            .get::<String>(0)
            .map(Some)
            .map_err(|e| DatabaseError::Query(format!("{op}: {e}"))),
        Ok(None) => Ok(None),
        Err(e) => Err(DatabaseError::Query(format!("{op}: {e}"))),
    }
}

async fn upsert_agent_state(
    conn: &Connection,
    user_id: &str,
    snapshot: &NestedStateSnapshot,
) -> Result<(), DatabaseError> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO agent_state (user_id, snapshot, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT (user_id) DO UPDATE SET snapshot = ?2, updated_at = ?3",
        params![user_id, to_json(snapshot)?, now],
    )
    .await
    .map_err(|e| DatabaseError::Query(format!("save_agent_state: {e}")))?;
    Ok(())
}

async fn upsert_conversation_state(
    conn: &Connection,
    user_id: &str,
    state: &ConversationState,
) -> Result<(), DatabaseError> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO conversation_state (user_id, state, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT (user_id) DO UPDATE SET state = ?2, updated_at = ?3",
        params![user_id, to_json(state)?, now],
    )
    .await
    .map_err(|e| DatabaseError::Query(format!("save_conversation_state: {e}")))?;
    Ok(())
}

async fn insert_event(conn: &Connection, event: &ConversationEvent) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO conversation_events (id, user_id, state_name, normalized_text, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            event.id.to_string(),
            event.user_id.as_str(),
            event.state_name.as_str(),
            event.normalized_text.as_str(),
            event.timestamp.to_rfc3339()
        ],
    )
    .await
    .map_err(|e| DatabaseError::Query(format!("append_conversation_event: {e}")))?;
    Ok(())
}

fn row_to_event(row: &libsql::Row, user_id: &str) -> Result<ConversationEvent, DatabaseError> {
    let column = |e: libsql::Error| malformed("conversation_event", user_id, e);
    let id_str: String = row.get(0).map_err(column)?;
    let created_str: String = row.get(4).map_err(column)?;

    let id = Uuid::parse_str(&id_str)
        .map_err(|e| malformed("conversation_event", user_id, format!("id {id_str:?}: {e}")))?;
    let timestamp = parse_datetime(&created_str).ok_or_else(|| {
        malformed(
            "conversation_event",
            user_id,
            format!("unparseable timestamp {created_str:?}"),
        )
    })?;
    Ok(ConversationEvent {
        id,
        user_id: row.get(1).map_err(column)?,
        state_name: row.get(2).map_err(column)?,
        normalized_text: row.get(3).map_err(column)?,
        timestamp,
    })
}

fn parse_string_list(raw: &str, user_id: &str) -> Result<Vec<String>, DatabaseError> {
    serde_json::from_str(raw).map_err(|e| malformed("user_goals", user_id, e))
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Users ───────────────────────────────────────────────────────

    async fn get_user(&self, username: &str) -> Result<Option<UserProfile>, DatabaseError> {
        let raw = query_text(
            self.conn(),
            "SELECT profile FROM users WHERE username = ?1",
            username,
            "get_user",
        )
        .await?;

        raw.map(|raw| serde_json::from_str(&raw).map_err(|e| malformed("user", username, e)))
            .transpose()
    }

    async fn save_user(&self, profile: &UserProfile) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        self.conn()
            .execute(
                "INSERT INTO users (username, profile, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?3)
                 ON CONFLICT (username) DO UPDATE SET profile = ?2, updated_at = ?3",
                params![profile.username.as_str(), to_json(profile)?, now],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("save_user: {e}")))?;
        debug!(username = %profile.username, "User saved");
        Ok(())
    }

    // ── Agent state ─────────────────────────────────────────────────

    async fn get_agent_state(
        &self,
        user_id: &str,
    ) -> Result<Option<NestedStateSnapshot>, DatabaseError> {
        let raw = query_text(
            self.conn(),
            "SELECT snapshot FROM agent_state WHERE user_id = ?1",
            user_id,
            "get_agent_state",
        )
        .await?;

        let Some(raw) = raw else {
            return Ok(None);
        };
        let value: serde_json::Value =
            serde_json::from_str(&raw).map_err(|e| malformed("agent_state", user_id, e))?;
        NestedStateSnapshot::from_json(&value)
            .map(Some)
            .map_err(|e| malformed("agent_state", user_id, e))
    }

    async fn save_agent_state(
        &self,
        user_id: &str,
        snapshot: &NestedStateSnapshot,
    ) -> Result<(), DatabaseError> {
        upsert_agent_state(self.conn(), user_id, snapshot).await
    }

    // ── Conversation ────────────────────────────────────────────────

    async fn get_conversation_state(
        &self,
        user_id: &str,
    ) -> Result<Option<ConversationState>, DatabaseError> {
        let raw = query_text(
            self.conn(),
            "SELECT state FROM conversation_state WHERE user_id = ?1",
            user_id,
            "get_conversation_state",
        )
        .await?;

        raw.map(|raw| {
            serde_json::from_str(&raw).map_err(|e| malformed("conversation_state", user_id, e))
        })
        .transpose()
    }

    async fn save_conversation_state(
        &self,
        user_id: &str,
        state: &ConversationState,
    ) -> Result<(), DatabaseError> {
        upsert_conversation_state(self.conn(), user_id, state).await
    }

    async fn append_conversation_event(
        &self,
        event: &ConversationEvent,
    ) -> Result<(), DatabaseError> {
        insert_event(self.conn(), event).await
    }

    async fn get_conversation_events(
        &self,
        user_id: &str,
        state_name: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ConversationEvent>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, user_id, state_name, normalized_text, created_at
                 FROM conversation_events
                 WHERE user_id = ?1 AND (?2 IS NULL OR state_name = ?2)
                 ORDER BY seq DESC LIMIT ?3",
                params![user_id, opt_text(state_name), limit as i64],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_conversation_events: {e}")))?;

        let mut events = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("get_conversation_events: {e}")))?
        {
            events.push(row_to_event(&row, user_id)?);
        }
        // Newest first from the query; callers want chronological order.
        events.reverse();
        Ok(events)
    }

    async fn wipe_conversation_events(&self, user_id: &str) -> Result<usize, DatabaseError> {
        let count = self
            .conn()
            .execute(
                "DELETE FROM conversation_events WHERE user_id = ?1",
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("wipe_conversation_events: {e}")))?;
        info!(user_id, count, "Conversation history wiped");
        Ok(count as usize)
    }

    // ── Journey artifacts ───────────────────────────────────────────

    async fn get_dimension_analysis(
        &self,
        user_id: &str,
    ) -> Result<Option<DimensionAnalysis>, DatabaseError> {
        let raw = query_text(
            self.conn(),
            "SELECT analysis FROM dimension_analysis WHERE user_id = ?1",
            user_id,
            "get_dimension_analysis",
        )
        .await?;

        raw.map(|raw| {
            serde_json::from_str(&raw).map_err(|e| malformed("dimension_analysis", user_id, e))
        })
        .transpose()
    }

    async fn save_dimension_analysis(
        &self,
        user_id: &str,
        analysis: &DimensionAnalysis,
    ) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        self.conn()
            .execute(
                "INSERT INTO dimension_analysis (user_id, analysis, created_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT (user_id) DO UPDATE SET analysis = ?2, created_at = ?3",
                params![user_id, to_json(analysis)?, now],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("save_dimension_analysis: {e}")))?;
        Ok(())
    }

    async fn delete_dimension_analysis(&self, user_id: &str) -> Result<bool, DatabaseError> {
        let count = self
            .conn()
            .execute(
                "DELETE FROM dimension_analysis WHERE user_id = ?1",
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_dimension_analysis: {e}")))?;
        Ok(count > 0)
    }

    async fn get_user_goals(&self, user_id: &str) -> Result<Option<UserGoals>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT short_term, long_term, completed FROM user_goals WHERE user_id = ?1",
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_user_goals: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let column = |e: libsql::Error| malformed("user_goals", user_id, e);
                let short_term: String = row.get(0).map_err(column)?;
                let long_term: String = row.get(1).map_err(column)?;
                let completed: i64 = row.get(2).map_err(column)?;
                Ok(Some(UserGoals {
                    short_term: parse_string_list(&short_term, user_id)?,
                    long_term: parse_string_list(&long_term, user_id)?,
                    completed: completed != 0,
                }))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_user_goals: {e}"))),
        }
    }

    async fn save_user_goals(
        &self,
        user_id: &str,
        goals: &UserGoals,
    ) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        self.conn()
            .execute(
                "INSERT INTO user_goals (user_id, short_term, long_term, completed, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (user_id) DO UPDATE SET
                    short_term = ?2, long_term = ?3, completed = ?4, updated_at = ?5",
                params![
                    user_id,
                    to_json(&goals.short_term)?,
                    to_json(&goals.long_term)?,
                    goals.completed as i64,
                    now
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("save_user_goals: {e}")))?;
        Ok(())
    }

    // ── Turns ───────────────────────────────────────────────────────

    async fn commit_turn(&self, commit: &TurnCommit) -> Result<(), DatabaseError> {
        let tx = self
            .conn()
            .transaction()
            .await
            .map_err(|e| DatabaseError::Query(format!("commit_turn: begin: {e}")))?;

        // Dropping `tx` on an early return rolls the whole turn back.
        upsert_agent_state(&tx, &commit.user_id, &commit.snapshot).await?;
        if let Some(state) = &commit.conversation_state {
            upsert_conversation_state(&tx, &commit.user_id, state).await?;
        }
        if let Some(event) = &commit.event {
            insert_event(&tx, event).await?;
        }

        tx.commit()
            .await
            .map_err(|e| DatabaseError::Query(format!("commit_turn: commit: {e}")))?;
        debug!(
            user_id = %commit.user_id,
            path = %commit.snapshot.active_path(),
            with_event = commit.event.is_some(),
            "Turn committed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_db() -> LibSqlBackend {
        LibSqlBackend::new_memory().await.unwrap()
    }

    fn sample_state(question: &str) -> ConversationState {
        ConversationState {
            next_agent_action: "Conversation".into(),
            next_detected_state: "Analysis".into(),
            agent_response: "ok".into(),
            next_agent_question: question.into(),
            assistant_role: String::new(),
        }
    }

    fn sample_snapshot(sub: &str) -> NestedStateSnapshot {
        NestedStateSnapshot::leaf("DimensionAnalysis")
            .with_child("DimensionAnalysis", NestedStateSnapshot::leaf(sub))
    }

    // ── Users ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn user_roundtrip() {
        let db = test_db().await;
        assert!(db.get_user("sam").await.unwrap().is_none());

        let mut profile = UserProfile::new("sam", serde_json::json!({"Attention": 70}));
        profile.language = "English".into();
        db.save_user(&profile).await.unwrap();
        assert_eq!(db.get_user("sam").await.unwrap(), Some(profile.clone()));

        profile.gender = "female".into();
        db.save_user(&profile).await.unwrap();
        assert_eq!(db.get_user("sam").await.unwrap().unwrap().gender, "female");
    }

    // ── Agent state ─────────────────────────────────────────────────

    #[tokio::test]
    async fn agent_state_roundtrip() {
        let db = test_db().await;
        assert!(db.get_agent_state("u1").await.unwrap().is_none());

        let snapshot = sample_snapshot("SpiderChart");
        db.save_agent_state("u1", &snapshot).await.unwrap();
        assert_eq!(db.get_agent_state("u1").await.unwrap(), Some(snapshot));

        let updated = sample_snapshot("Analysis");
        db.save_agent_state("u1", &updated).await.unwrap();
        assert_eq!(db.get_agent_state("u1").await.unwrap(), Some(updated));
    }

    #[tokio::test]
    async fn malformed_agent_state_is_rejected() {
        let db = test_db().await;
        db.conn()
            .execute(
                "INSERT INTO agent_state (user_id, snapshot, updated_at)
                 VALUES ('u1', '{\"children\":{}}', '2026-01-01T00:00:00Z')",
                (),
            )
            .await
            .unwrap();
        let err = db.get_agent_state("u1").await.unwrap_err();
        assert!(
            matches!(err, DatabaseError::Malformed { ref entity, .. } if entity == "agent_state")
        );
    }

    // ── Conversation ────────────────────────────────────────────────

    #[tokio::test]
    async fn conversation_state_roundtrip() {
        let db = test_db().await;
        assert!(db.get_conversation_state("u1").await.unwrap().is_none());
        let state = sample_state("What next?");
        db.save_conversation_state("u1", &state).await.unwrap();
        assert_eq!(db.get_conversation_state("u1").await.unwrap(), Some(state));
    }

    #[tokio::test]
    async fn event_window_is_most_recent_oldest_first() {
        let db = test_db().await;
        for i in 0..5 {
            let event = ConversationEvent::new("u1", "Education.Introduction", format!("e{i}"));
            db.append_conversation_event(&event).await.unwrap();
        }
        let other = ConversationEvent::new("u2", "Education.Introduction", "other");
        db.append_conversation_event(&other).await.unwrap();

        let events = db.get_conversation_events("u1", None, 3).await.unwrap();
        let texts: Vec<_> = events.iter().map(|e| e.normalized_text.as_str()).collect();
        assert_eq!(texts, vec!["e2", "e3", "e4"]);
    }

    #[tokio::test]
    async fn event_window_filters_by_state() {
        let db = test_db().await;
        let analysis = ConversationEvent::new("u1", "DimensionAnalysis.Analysis", "a");
        db.append_conversation_event(&analysis).await.unwrap();
        db.append_conversation_event(&ConversationEvent::new("u1", "Education.Introduction", "b"))
            .await
            .unwrap();

        let events = db
            .get_conversation_events("u1", Some("DimensionAnalysis.Analysis"), 10)
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].normalized_text, "a");
    }

    #[tokio::test]
    async fn event_with_bad_id_is_rejected() {
        let db = test_db().await;
        db.conn()
            .execute(
                "INSERT INTO conversation_events
                     (id, user_id, state_name, normalized_text, created_at)
                 VALUES ('not-a-uuid', 'u1', 's', '{}', '2026-01-01T00:00:00Z')",
                (),
            )
            .await
            .unwrap();
        let err = db.get_conversation_events("u1", None, 10).await.unwrap_err();
        assert!(matches!(
            err,
            DatabaseError::Malformed { ref entity, .. } if entity == "conversation_event"
        ));
    }

    #[tokio::test]
    async fn event_with_bad_timestamp_is_rejected() {
        let db = test_db().await;
        let id = Uuid::new_v4().to_string();
        db.conn()
            .execute(
                "INSERT INTO conversation_events
                     (id, user_id, state_name, normalized_text, created_at)
                 VALUES (?1, 'u1', 's', '{}', 'last tuesday')",
                params![id],
            )
            .await
            .unwrap();
        let err = db.get_conversation_events("u1", None, 10).await.unwrap_err();
        assert!(matches!(
            err,
            DatabaseError::Malformed { ref reason, .. } if reason.contains("timestamp")
        ));
    }

    #[test]
    fn sqlite_timestamps_parse() {
        let parsed = parse_datetime("2026-01-01 08:30:00").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2026-01-01T08:30:00+00:00");
        assert!(parse_datetime("soon").is_none());
    }

    #[tokio::test]
    async fn wipe_only_touches_one_user() {
        let db = test_db().await;
        db.append_conversation_event(&ConversationEvent::new("u1", "s", "a"))
            .await
            .unwrap();
        db.append_conversation_event(&ConversationEvent::new("u2", "s", "b"))
            .await
            .unwrap();

        assert_eq!(db.wipe_conversation_events("u1").await.unwrap(), 1);
        assert!(db.get_conversation_events("u1", None, 10).await.unwrap().is_empty());
        assert_eq!(db.get_conversation_events("u2", None, 10).await.unwrap().len(), 1);
    }

    // ── Journey artifacts ───────────────────────────────────────────

    #[tokio::test]
    async fn goals_roundtrip() {
        let db = test_db().await;
        assert!(db.get_user_goals("u1").await.unwrap().is_none());
        let goals = UserGoals {
            short_term: vec!["sleep better".into()],
            long_term: vec!["change careers".into()],
            completed: true,
        };
        db.save_user_goals("u1", &goals).await.unwrap();
        assert_eq!(db.get_user_goals("u1").await.unwrap(), Some(goals));
    }

    #[tokio::test]
    async fn goals_with_bad_columns_are_rejected() {
        let db = test_db().await;
        db.conn()
            .execute(
                "INSERT INTO user_goals (user_id, short_term, long_term, completed, updated_at)
                 VALUES ('u1', '[]', '[]', 'maybe', '2026-01-01T00:00:00Z')",
                (),
            )
            .await
            .unwrap();
        let err = db.get_user_goals("u1").await.unwrap_err();
        assert!(
            matches!(err, DatabaseError::Malformed { ref entity, .. } if entity == "user_goals")
        );
    }

    #[tokio::test]
    async fn analysis_save_and_delete() {
        let db = test_db().await;
        let analysis = DimensionAnalysis {
            strengths: [("Attention".to_string(), Default::default())].into(),
            areas_for_growth: Default::default(),
            summary: Default::default(),
            assistant_role: String::new(),
        };
        db.save_dimension_analysis("u1", &analysis).await.unwrap();
        assert_eq!(db.get_dimension_analysis("u1").await.unwrap(), Some(analysis));
        assert!(db.delete_dimension_analysis("u1").await.unwrap());
        assert!(!db.delete_dimension_analysis("u1").await.unwrap());
        assert!(db.get_dimension_analysis("u1").await.unwrap().is_none());
    }

    // ── Turns ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn commit_turn_writes_everything() {
        let db = test_db().await;
        let commit = TurnCommit {
            user_id: "u1".into(),
            snapshot: sample_snapshot("SpiderChart"),
            conversation_state: Some(sample_state("Q?")),
            event: Some(ConversationEvent::new("u1", "DimensionAnalysis.SpiderChart", "{}")),
        };
        db.commit_turn(&commit).await.unwrap();

        assert_eq!(db.get_agent_state("u1").await.unwrap(), Some(commit.snapshot.clone()));
        assert_eq!(
            db.get_conversation_state("u1").await.unwrap(),
            commit.conversation_state.clone()
        );
        assert_eq!(db.get_conversation_events("u1", None, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn commit_turn_is_all_or_nothing() {
        let db = test_db().await;
        let event = ConversationEvent::new("u1", "DimensionAnalysis.Analysis", "first");
        db.commit_turn(&TurnCommit {
            user_id: "u1".into(),
            snapshot: sample_snapshot("Analysis"),
            conversation_state: Some(sample_state("first?")),
            event: Some(event.clone()),
        })
        .await
        .unwrap();

        // Re-using the event id violates the UNIQUE constraint after the
        // snapshot and state were already written inside the transaction.
        let err = db
            .commit_turn(&TurnCommit {
                user_id: "u1".into(),
                snapshot: sample_snapshot("SpiderChart"),
                conversation_state: Some(sample_state("second?")),
                event: Some(event),
            })
            .await;
        assert!(err.is_err());

        assert_eq!(db.get_agent_state("u1").await.unwrap(), Some(sample_snapshot("Analysis")));
        assert_eq!(
            db.get_conversation_state("u1").await.unwrap().unwrap().next_agent_question,
            "first?"
        );
        assert_eq!(db.get_conversation_events("u1", None, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn commit_turn_without_state_keeps_previous() {
        let db = test_db().await;
        db.save_conversation_state("u1", &sample_state("kept?"))
            .await
            .unwrap();
        db.commit_turn(&TurnCommit {
            user_id: "u1".into(),
            snapshot: sample_snapshot("Analysis"),
            conversation_state: None,
            event: None,
        })
        .await
        .unwrap();
        assert_eq!(
            db.get_conversation_state("u1").await.unwrap().unwrap().next_agent_question,
            "kept?"
        );
    }

    #[tokio::test]
    async fn local_file_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("agent.db");
        {
            let db = LibSqlBackend::new_local(&path).await.unwrap();
            db.save_agent_state("u1", &sample_snapshot("SpiderChart"))
                .await
                .unwrap();
        }
        let db = LibSqlBackend::new_local(&path).await.unwrap();
        assert_eq!(
            db.get_agent_state("u1").await.unwrap(),
            Some(sample_snapshot("SpiderChart"))
        );
    }
}
