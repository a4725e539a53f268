//! One conversational exchange.
//!
//! A turn shows the HUD and the agent's question, reads the user's answer,
//! and either runs a matching command or asks the oracle for a structured
//! reply. Successful replies are staged on the context; the controller
//! commits them together with the new state-tree snapshot.

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::agent::controller::AgentDeps;
use crate::agent::conversation::{CLARIFICATION, ConversationState};
use crate::agent::events::{Exchange, compress_exchange};
use crate::agent::node::{CommandTable, Directive};
use crate::agent::snapshot::StatePath;
use crate::channels::Terminal;
use crate::config::AgentConfig;
use crate::error::{OracleError, Result};
use crate::llm::OraclePrompt;
use crate::profile::UserProfile;
use crate::store::ConversationEvent;

const MALFORMED_NOTICE: &str = "I'm sorry, I lost my train of thought there. \
     Could you say that again, maybe in different words?";
const UNAVAILABLE_NOTICE: &str =
    "I'm having trouble reaching my reasoning service right now. Please try again in a moment.";

/// A reply and its event, waiting for the controller to commit them.
#[derive(Debug, Clone)]
pub struct PendingTurn {
    pub conversation_state: ConversationState,
    pub event: ConversationEvent,
}

/// Everything a handler may touch while processing one turn.
pub struct TurnContext<'a> {
    pub user: &'a UserProfile,
    pub deps: &'a AgentDeps,
    pub config: &'a AgentConfig,
    pub terminal: &'a mut dyn Terminal,
    /// Full path of the leaf being processed.
    pub path: StatePath,
    /// Composed role text of the active chain.
    pub role: String,
    /// Last committed conversation state.
    pub last_state: Option<ConversationState>,
    pub pending: Option<PendingTurn>,
}

impl<'a> TurnContext<'a> {
    pub fn new(
        user: &'a UserProfile,
        deps: &'a AgentDeps,
        config: &'a AgentConfig,
        terminal: &'a mut dyn Terminal,
        last_state: Option<ConversationState>,
    ) -> Self {
        Self {
            user,
            deps,
            config,
            terminal,
            path: StatePath::default(),
            role: String::new(),
            last_state,
            pending: None,
        }
    }

    pub fn username(&self) -> &str {
        &self.user.username
    }

    /// Path of a sibling of the current leaf.
    pub fn local(&self, name: &str) -> StatePath {
        self.path.sibling(name)
    }
}

/// Which prior events to feed back as context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventWindow {
    /// Number of events; `None` uses the configured window.
    pub limit: Option<usize>,
}

impl EventWindow {
    pub fn recent(limit: usize) -> Self {
        Self { limit: Some(limit) }
    }
}

/// Per-turn instructions from a handler.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    /// Task context appended to the composed role.
    pub prompt_context: String,
    /// Explicit question; otherwise the persisted one is reused.
    pub agent_prompt: Option<String>,
    pub include_assistant_role: bool,
    pub event_window: Option<EventWindow>,
}

impl TurnRequest {
    pub fn new(prompt_context: impl Into<String>) -> Self {
        Self {
            prompt_context: prompt_context.into(),
            agent_prompt: None,
            include_assistant_role: true,
            event_window: Some(EventWindow::default()),
        }
    }

    pub fn with_agent_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.agent_prompt = Some(prompt.into());
        self
    }

    pub fn with_event_window(mut self, window: Option<EventWindow>) -> Self {
        self.event_window = window;
        self
    }

    pub fn without_assistant_role(mut self) -> Self {
        self.include_assistant_role = false;
        self
    }
}

/// How a turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The oracle replied; the reply is staged on the context.
    Reply(ConversationState),
    /// A command ran, or input ended (`Directive::Quit`). No oracle call was made.
    Command(Directive),
    /// The oracle could not produce a usable reply. Nothing was staged.
    Degraded,
}

/// The user's answer to the question, known not to be a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub question: String,
    pub input: String,
}

/// Result of reading a turn's input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnInput {
    /// A command ran, or input ended.
    Command(Directive),
    Answer(Answer),
}

/// Status line plus command menu shown before every question.
pub fn render_hud(path: &StatePath, commands: &CommandTable) -> String {
    let mut hud = format!("[ {path} ]");
    if !commands.is_empty() {
        hud.push_str("\nCommands:\n");
        hud.push_str(&commands.menu());
    }
    hud
}

pub struct ConversationTurn {
    request: TurnRequest,
}

impl ConversationTurn {
    pub fn new(request: TurnRequest) -> Self {
        Self { request }
    }

    /// Replace the task context. Handlers whose context is costly to build
    /// set it after [`read`](Self::read) has ruled out a command.
    pub fn with_prompt_context(mut self, context: impl Into<String>) -> Self {
        self.request.prompt_context = context.into();
        self
    }

    /// Read the input, then either run the command or ask the oracle.
    pub async fn run(
        self,
        ctx: &mut TurnContext<'_>,
        commands: &CommandTable,
    ) -> Result<TurnOutcome> {
        match self.read(ctx, commands).await? {
            TurnInput::Command(directive) => Ok(TurnOutcome::Command(directive)),
            TurnInput::Answer(answer) => self.respond(ctx, answer).await,
        }
    }

    /// Show the HUD and the question, read a non-blank line and run it if it
    /// is a command. Never calls the oracle.
    pub async fn read(
        &self,
        ctx: &mut TurnContext<'_>,
        commands: &CommandTable,
    ) -> Result<TurnInput> {
        let question = self.question(ctx);

        ctx.terminal.notice(&render_hud(&ctx.path, commands));
        ctx.terminal.say(&question);

        let input = loop {
            match ctx.terminal.read_line("> ").await? {
                None => {
                    info!(path = %ctx.path, "Input closed");
                    return Ok(TurnInput::Command(Directive::Quit));
                }
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => break line.trim().to_string(),
            }
        };

        if let Some(command) = commands.find(&input) {
            info!(path = %ctx.path, command = %command.token, "Running command");
            let directive = command.handler.run(ctx).await?;
            return Ok(TurnInput::Command(directive));
        }
        Ok(TurnInput::Answer(Answer { question, input }))
    }

    /// Ask the oracle for a reply to `answer` and stage it on the context.
    pub async fn respond(self, ctx: &mut TurnContext<'_>, answer: Answer) -> Result<TurnOutcome> {
        let Answer { question, input } = answer;
        let prompt = self.build_prompt(ctx, &question, &input).await;
        let model = ctx.config.conversation_model.clone();

        let reply = match request_state(ctx, &prompt, &model).await {
            Err(OracleError::MalformedReply { reason }) => {
                warn!(path = %ctx.path, %reason, "Malformed reply, re-prompting once");
                let clarified = prompt.clone().with_clarification(CLARIFICATION);
                request_state(ctx, &clarified, &model).await
            }
            other => other,
        };

        let state = match reply {
            Ok(state) => state,
            Err(e) => {
                warn!(path = %ctx.path, error = %e, "Turn degraded");
                let notice = match e {
                    OracleError::MalformedReply { .. } => MALFORMED_NOTICE,
                    _ => UNAVAILABLE_NOTICE,
                };
                ctx.terminal.say(notice);
                return Ok(TurnOutcome::Degraded);
            }
        };

        if !state.agent_response.trim().is_empty() {
            ctx.terminal.say(&state.agent_response);
        }

        let path = ctx.path.to_string();
        let exchange = Exchange {
            state: &path,
            timestamp: Utc::now(),
            agent_question: &question,
            user_answer: &input,
            agent_response: &state.agent_response,
        };
        let normalized =
            compress_exchange(ctx.deps.oracle.as_ref(), &ctx.config.utility_model, &exchange).await;

        ctx.pending = Some(PendingTurn {
            conversation_state: state.clone(),
            event: ConversationEvent::new(ctx.username(), path.as_str(), normalized),
        });
        debug!(
            path = %ctx.path,
            action = %state.next_agent_action,
            detected = %state.next_detected_state,
            "Turn staged"
        );
        Ok(TurnOutcome::Reply(state))
    }

    /// Explicit prompt, else the persisted question verbatim, else the opening question.
    fn question(&self, ctx: &TurnContext<'_>) -> String {
        if let Some(prompt) = &self.request.agent_prompt {
            return prompt.clone();
        }
        ctx.last_state
            .as_ref()
            .map(|s| s.next_agent_question.clone())
            .filter(|q| !q.trim().is_empty())
            .unwrap_or_else(|| ctx.config.opening_question.clone())
    }

    async fn build_prompt(
        &self,
        ctx: &TurnContext<'_>,
        question: &str,
        input: &str,
    ) -> OraclePrompt {
        let about_user = format!("About the user:\n{}", ctx.user.to_prompt_section());
        let system_role = [
            ctx.config.persona.as_str(),
            about_user.as_str(),
            ctx.role.as_str(),
            self.request.prompt_context.trim(),
        ]
        .into_iter()
        .filter(|part| !part.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");

        let mut assistant_context = Vec::new();
        if self.request.include_assistant_role
            && let Some(role) = ctx
                .last_state
                .as_ref()
                .map(|s| s.assistant_role.trim())
                .filter(|r| !r.is_empty())
        {
            assistant_context.push(format!("Context from the previous turn:\n{role}"));
        }
        if let Some(window) = &self.request.event_window
            && let Some(history) = event_history(ctx, window).await
        {
            assistant_context.push(history);
        }

        let user_prompt = format!("Agent question: {question}\nUser answer: {input}");
        OraclePrompt::new(system_role, user_prompt)
            .with_assistant_context(assistant_context.join("\n\n"))
    }
}

async fn request_state(
    ctx: &TurnContext<'_>,
    prompt: &OraclePrompt,
    model: &str,
) -> std::result::Result<ConversationState, OracleError> {
    let raw = ctx.deps.oracle.complete(prompt, model).await?;
    ConversationState::parse(&raw)
}

/// Recent events, oldest first, as prompt text. Read failures only cost context.
async fn event_history(ctx: &TurnContext<'_>, window: &EventWindow) -> Option<String> {
    let limit = window.limit.unwrap_or(ctx.config.event_window);
    if limit == 0 {
        return None;
    }
    match ctx
        .deps
        .store
        .get_conversation_events(ctx.username(), None, limit)
        .await
    {
        Ok(events) if events.is_empty() => None,
        Ok(events) => {
            let lines: Vec<String> = events
                .iter()
                .map(|e| format!("- [{}] {}", e.state_name, e.normalized_text))
                .collect();
            Some(format!("Conversation history (oldest first):\n{}", lines.join("\n")))
        }
        Err(e) => {
            warn!(error = %e, "Could not load conversation history");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::agent::node::CommandHandler;
    use async_trait::async_trait;

    struct Noop;

    #[async_trait]
    impl CommandHandler for Noop {
        async fn run(&self, _ctx: &mut TurnContext<'_>) -> Result<Directive> {
            Ok(Directive::Stay)
        }
    }

    #[test]
    fn hud_shows_path_and_menu() {
        let mut commands = CommandTable::new();
        commands.add("quit", "Quit the agent", Arc::new(Noop));
        let hud = render_hud(&StatePath::parse("DimensionAnalysis.SpiderChart"), &commands);
        assert!(hud.starts_with("[ DimensionAnalysis.SpiderChart ]"));
        assert!(hud.contains("quit: Quit the agent"));
    }

    #[test]
    fn hud_without_commands() {
        let hud = render_hud(&StatePath::parse("Onboarding.Goals.UserGoals"), &CommandTable::new());
        assert_eq!(hud, "[ Onboarding.Goals.UserGoals ]");
    }

    #[test]
    fn request_builder_defaults() {
        let request = TurnRequest::new("ctx");
        assert!(request.include_assistant_role);
        assert_eq!(request.event_window, Some(EventWindow::default()));
        let request = request
            .with_agent_prompt("Q?")
            .with_event_window(Some(EventWindow::recent(3)))
            .without_assistant_role();
        assert_eq!(request.agent_prompt.as_deref(), Some("Q?"));
        assert_eq!(request.event_window.unwrap().limit, Some(3));
    }
}
