//! Oracle-produced conversation state and the JSON contract handlers request.

use serde::{Deserialize, Serialize};

use crate::error::OracleError;
use crate::llm::parse_reply;

/// The structured reply of one conversational oracle call.
///
/// The last one is persisted per user; its `next_agent_question` seeds the
/// following turn when a handler does not supply a question of its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    pub next_agent_action: String,
    pub next_detected_state: String,
    pub agent_response: String,
    pub next_agent_question: String,
    #[serde(default)]
    pub assistant_role: String,
}

impl ConversationState {
    /// Parse an oracle reply. Missing required fields are a `MalformedReply`.
    pub fn parse(raw: &str) -> Result<Self, OracleError> {
        let state: Self = parse_reply(raw)?;
        if state.agent_response.trim().is_empty() && state.next_agent_question.trim().is_empty() {
            return Err(OracleError::malformed(
                "reply has neither agent_response nor next_agent_question",
            ));
        }
        Ok(state)
    }

    /// Case-insensitive check of the detected state.
    pub fn detected(&self, state: &str) -> bool {
        self.next_detected_state.trim().eq_ignore_ascii_case(state)
    }

    /// Case-insensitive check of the requested action.
    pub fn action_is(&self, action: &str) -> bool {
        self.next_agent_action.trim().eq_ignore_ascii_case(action)
    }
}

/// Instruction appended when the first reply could not be parsed.
pub const CLARIFICATION: &str = "\
IMPORTANT: your previous reply could not be used. Respond with ONLY one JSON object \
containing the string fields next_agent_action, next_detected_state, agent_response, \
next_agent_question and assistant_role. Do not add any other text.";

/// Render the JSON response contract a conversational handler expects.
pub fn response_format(actions: &[&str], states: &[&str], detection_rule: &str) -> String {
    format!(
        r#"JSON Response:
Rules:
next_detected_state: {detection_rule}
Format:
{{
    "next_agent_action": "<{actions}>",
    "next_detected_state": "<{states}>",
    "agent_response": "<place the agent response to the user here, but DO NOT place the agent's next question here.>",
    "next_agent_question": "<the agent's next question here. Keep the current context unless the user wants to move on.>",
    "assistant_role": "<save all conversation context information useful for the next prompt in this field>"
}}"#,
        actions = actions.join(", "),
        states = states.join(", "),
    )
}
