//! The `Onboarding` container and its `Goals` child node.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use crate::agent::conversation::response_format;
use crate::agent::{
    CommandTable, ConversationTurn, Directive, NodeRegistry, StateHandler, StateNode, TurnContext,
    TurnOutcome, TurnRequest,
};
use crate::error::{OracleError, Result, StateError};
use crate::llm::{JSON_REMINDER, OraclePrompt, parse_reply};
use crate::profile::UserGoals;
use crate::states::DIMENSION_ANALYSIS;
use crate::states::commands::{ClearHistory, Quit};

pub const NAME: &str = "Onboarding";
pub const GOALS: &str = "Goals";

const FIRST_QUESTION: &str = "What are your goals?";

pub fn build(registry: &NodeRegistry) -> std::result::Result<StateNode, StateError> {
    Ok(StateNode::new(NAME, &[GOALS])
        .with_role("In the Onboarding state the agent gets to know the user before the analysis.")
        .with_child(GOALS, registry.build(GOALS)?))
}

pub fn build_goals(_: &NodeRegistry) -> std::result::Result<StateNode, StateError> {
    Ok(StateNode::new(GOALS, &["UserGoals"])
        .with_role(
            "In the Goals sub-state the agent helps the user define their short-term and \
             long-term goals.",
        )
        .with_handler("UserGoals", Arc::new(UserGoalsTopic))
        .with_command("quit", "Quit the agent", Arc::new(Quit))
        .with_command("clear history", "Clear the conversation history", Arc::new(ClearHistory)))
}

/// Goals conversation. Moves to `DimensionAnalysis` once the user is done.
struct UserGoalsTopic;

#[async_trait]
impl StateHandler for UserGoalsTopic {
    async fn handle(
        &self,
        ctx: &mut TurnContext<'_>,
        commands: &CommandTable,
    ) -> Result<Directive> {
        let stored = match ctx.deps.store.get_user_goals(ctx.username()).await {
            Ok(goals) => goals,
            Err(e) => {
                warn!(error = %e, "Could not load goals");
                None
            }
        };
        if stored.as_ref().is_some_and(|g| g.completed) {
            info!(user = %ctx.username(), "Goals already captured, skipping onboarding");
            return Ok(Directive::goto(DIMENSION_ANALYSIS));
        }

        let context = format!(
            "Ask about one goal area at a time. When the user has shared their short-term and \
             long-term goals and is ready to continue, detect DimensionAnalysis.\n\n{}",
            response_format(
                &["Conversation"],
                &["Goals", "DimensionAnalysis"],
                "Detect DimensionAnalysis once the user has finished describing their goals.",
            )
        );
        let mut request = TurnRequest::new(context);
        if first_visit(ctx).await && stored.as_ref().is_none_or(UserGoals::is_empty) {
            request = request.with_agent_prompt(FIRST_QUESTION);
        }

        let outcome = ConversationTurn::new(request).run(ctx, commands).await?;
        match outcome {
            TurnOutcome::Command(directive) => Ok(directive),
            TurnOutcome::Degraded => Ok(Directive::Stay),
            TurnOutcome::Reply(state) if state.detected(DIMENSION_ANALYSIS) => {
                match extract_goals(ctx).await {
                    Ok(goals) => {
                        let saved = ctx.deps.store.save_user_goals(ctx.username(), &goals).await;
                        if let Err(e) = saved {
                            warn!(error = %e, "Failed to save goals");
                        } else {
                            info!(
                                user = %ctx.username(),
                                short_term = goals.short_term.len(),
                                long_term = goals.long_term.len(),
                                "Goals captured"
                            );
                        }
                    }
                    Err(e) => warn!(error = %e, "Goal extraction failed, continuing without goals"),
                }
                Ok(Directive::goto(DIMENSION_ANALYSIS))
            }
            TurnOutcome::Reply(_) => Ok(Directive::Stay),
        }
    }
}

/// Whether no exchange has been recorded in this sub-state yet.
async fn first_visit(ctx: &TurnContext<'_>) -> bool {
    let path = ctx.path.to_string();
    match ctx
        .deps
        .store
        .get_conversation_events(ctx.username(), Some(path.as_str()), 1)
        .await
    {
        Ok(events) => events.is_empty(),
        Err(_) => ctx.last_state.is_none(),
    }
}

#[derive(Deserialize)]
struct ExtractedGoals {
    #[serde(default)]
    short_term: Vec<String>,
    #[serde(default)]
    long_term: Vec<String>,
}

/// Ask the oracle to pull the goals out of this sub-state's exchanges.
async fn extract_goals(ctx: &TurnContext<'_>) -> std::result::Result<UserGoals, OracleError> {
    let path = ctx.path.to_string();
    let limit = ctx.config.event_window.max(1) * 2;
    let mut exchanges: Vec<String> = ctx
        .deps
        .store
        .get_conversation_events(ctx.username(), Some(path.as_str()), limit)
        .await
        .unwrap_or_default()
        .into_iter()
        .map(|e| e.normalized_text)
        .collect();
    if let Some(pending) = &ctx.pending {
        exchanges.push(pending.event.normalized_text.clone());
    }

    let prompt = OraclePrompt::new(
        "You extract a user's goals from a conversation log. Reply with one JSON object: \
         {\"short_term\": [\"<goal>\", ...], \"long_term\": [\"<goal>\", ...]}. \
         Use the user's own words where possible and leave a list empty if none were given.",
        format!("Conversation log:\n{}", exchanges.join("\n")),
    );

    let model = &ctx.config.utility_model;
    let raw = ctx.deps.oracle.complete(&prompt, model).await?;
    let extracted: ExtractedGoals = match parse_reply(&raw) {
        Ok(goals) => goals,
        Err(_) => {
            let raw = ctx
                .deps
                .oracle
                .complete(&prompt.with_clarification(JSON_REMINDER), model)
                .await?;
            parse_reply(&raw)?
        }
    };

    Ok(UserGoals {
        short_term: extracted.short_term,
        long_term: extracted.long_term,
        completed: true,
    })
}
