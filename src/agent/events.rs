//! Conversation event compression.
//!
//! Each completed exchange is condensed by the oracle into a small JSON
//! record (intent, entities, emotional tone, summary) that later turns feed
//! back as context. When compression fails the raw exchange is kept instead.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::llm::{OraclePrompt, ResponseOracle, extract_json_object};

const INTENTS: &[&str] = &[
    "greeting",
    "farewell",
    "ask_question",
    "request_assistance",
    "provide_information",
    "express_gratitude",
    "confirm",
    "deny",
    "express_dissatisfaction",
    "small_talk",
    "feedback",
    "request_information",
    "express_confusion",
    "request_clarification",
    "express_empathy",
    "other",
];

const ENTITY_TYPES: &[&str] = &[
    "goal",
    "dimension",
    "emotion",
    "person",
    "activity",
    "action",
    "issue",
    "date_time",
    "location",
    "technical_term",
    "other",
];

const EMOTIONAL_TONES: &[&str] = &[
    "neutral",
    "happy",
    "sad",
    "frustrated",
    "angry",
    "confused",
    "worried",
    "excited",
    "relieved",
    "disappointed",
    "grateful",
    "empathetic",
    "surprised",
    "hopeful",
    "skeptical",
    "other",
];

/// One agent question, the user's answer and the agent's reply.
#[derive(Debug, Clone, Serialize)]
pub struct Exchange<'a> {
    pub state: &'a str,
    pub timestamp: DateTime<Utc>,
    pub agent_question: &'a str,
    pub user_answer: &'a str,
    pub agent_response: &'a str,
}

impl Exchange<'_> {
    /// Locally built record used when the oracle cannot compress the exchange.
    pub fn fallback_record(&self) -> String {
        serde_json::json!({
            "compressed": false,
            "state": self.state,
            "timestamp": self.timestamp.to_rfc3339(),
            "agent_question": self.agent_question,
            "user_answer": self.user_answer,
            "agent_response": self.agent_response,
        })
        .to_string()
    }
}

fn system_role() -> String {
    format!(
        "You process dialogue exchanges between a user and an agent and extract the metadata \
         needed to keep future conversations continuous and empathetic.\n\n\
         For the exchange, produce one JSON object with a \"user\" and an \"agent\" entry. \
         Each entry has:\n\
         - timestamp: ISO 8601 time of the message\n\
         - intent: one of [{intents}]\n\
         - entities: array of {{\"entity\": <key term>, \"type\": one of [{entities}]}}\n\
         - emotionalTone: one of [{tones}]\n\
         - summary: the essential content in one or two sentences\n\n\
         Provide only the JSON object.",
        intents = INTENTS.join(", "),
        entities = ENTITY_TYPES.join(", "),
        tones = EMOTIONAL_TONES.join(", "),
    )
}

/// Compress an exchange into normalized event text. Never fails.
pub async fn compress_exchange(
    oracle: &dyn ResponseOracle,
    model: &str,
    exchange: &Exchange<'_>,
) -> String {
    let user_prompt = match serde_json::to_string_pretty(exchange) {
        Ok(json) => json,
        Err(_) => return exchange.fallback_record(),
    };
    let prompt = OraclePrompt::new(system_role(), user_prompt);

    match oracle.complete(&prompt, model).await {
        Ok(raw) => {
            match serde_json::from_str::<serde_json::Value>(&extract_json_object(&raw)) {
                Ok(value) if value.is_object() => value.to_string(),
                Ok(_) | Err(_) => {
                    tracing::warn!(
                        state = exchange.state,
                        "Event compression returned non-object, storing raw exchange"
                    );
                    exchange.fallback_record()
                }
            }
        }
        Err(e) => {
            tracing::warn!(
                state = exchange.state,
                error = %e,
                "Event compression failed, storing raw exchange"
            );
            exchange.fallback_record()
        }
    }
}
