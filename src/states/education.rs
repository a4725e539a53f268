//! The `Education` node: a linear course through the user's growth areas.

use std::sync::Arc;

use async_trait::async_trait;

use crate::agent::conversation::response_format;
use crate::agent::{
    CommandTable, Directive, NodeRegistry, StateHandler, StateNode, TurnContext, TurnOutcome,
};
use crate::error::{Result, StateError};
use crate::states::commands::{ClearHistory, Quit, ShowAnalysis};
use crate::states::{DIMENSION_ANALYSIS, analysis_turn};

pub const NAME: &str = "Education";

const ROLE: &str = "\
In the Education state the agent teaches the user about their weakest dimensions, one topic at a \
time, checking understanding before moving on.";

/// Topics in course order with their role fragments.
const TOPICS: &[(&str, &str)] = &[
    (
        "Introduction",
        "Introduce the user's areas for growth: what each dimension means and how it shows up \
         in daily life.",
    ),
    (
        "Neuropsychology",
        "Explain the neuropsychology behind these dimensions: the brain systems and processes \
         involved.",
    ),
    (
        "Influences",
        "Discuss what influences these dimensions: upbringing, environment, habits and \
         experiences.",
    ),
    (
        "Implications",
        "Explore the implications of these dimensions for relationships, work and well-being.",
    ),
    (
        "Challenges",
        "Talk through the common challenges people face when developing these dimensions.",
    ),
    (
        "Culture",
        "Consider how culture shapes these dimensions, drawing on the user's own background.",
    ),
    (
        "Advancements",
        "Share recent research advancements and practices for developing these dimensions.",
    ),
    (
        "Summary",
        "Summarize what the user has learned and connect it back to their goals.",
    ),
    (
        "Resources",
        "Recommend resources (books, exercises, practices) for continued growth.",
    ),
];

pub fn build(_: &NodeRegistry) -> std::result::Result<StateNode, StateError> {
    let names: Vec<&str> = TOPICS.iter().map(|(name, _)| *name).collect();
    let mut node = StateNode::new(NAME, &names)
        .with_role(ROLE)
        .with_chain(&names)
        .with_command("quit", "Quit the agent", Arc::new(Quit))
        .with_command("clear history", "Clear the conversation history", Arc::new(ClearHistory))
        .with_command(
            "show analysis",
            "Display the dimensional analysis",
            Arc::new(ShowAnalysis { then: None }),
        );

    for (index, &(name, role)) in TOPICS.iter().enumerate() {
        let next = TOPICS.get(index + 1).map(|(next, _)| *next);
        node = node.with_handler(name, Arc::new(Topic { role, next }));
    }
    Ok(node)
}

/// One course topic.
struct Topic {
    role: &'static str,
    next: Option<&'static str>,
}

#[async_trait]
impl StateHandler for Topic {
    fn role(&self) -> &str {
        self.role
    }

    async fn handle(
        &self,
        ctx: &mut TurnContext<'_>,
        commands: &CommandTable,
    ) -> Result<Directive> {
        let reply_format = response_format(
            &["Conversation", "NextTopic"],
            &["Education", "Analysis"],
            "Detect whether the user wants to go back to the Analysis; otherwise keep Education. \
             Use NextTopic once the user is ready for the next topic.",
        );
        let outcome = analysis_turn(ctx, commands, reply_format).await?;
        Ok(match outcome {
            TurnOutcome::Command(directive) => directive,
            TurnOutcome::Degraded => Directive::Stay,
            TurnOutcome::Reply(state) if state.detected("Analysis") => {
                Directive::goto(DIMENSION_ANALYSIS)
            }
            TurnOutcome::Reply(state) if state.action_is("NextTopic") => match self.next {
                Some(next) => Directive::Goto(vec![ctx.local(next)]),
                None => {
                    ctx.terminal
                        .notice("That was the last topic. Feel free to keep asking questions.");
                    Directive::Stay
                }
            },
            TurnOutcome::Reply(_) => Directive::Stay,
        })
    }
}
