//! Journey states: the concrete nodes under the `Agent` root.

pub mod commands;
pub mod dimension_analysis;
pub mod education;
pub mod onboarding;

use tracing::warn;

use crate::agent::{
    CommandTable, ConversationTurn, NodeRegistry, ROOT_NODE, StateNode, TurnContext, TurnInput,
    TurnOutcome, TurnRequest,
};
use crate::error::{Result, StateError};

pub const ONBOARDING: &str = onboarding::NAME;
pub const DIMENSION_ANALYSIS: &str = dimension_analysis::NAME;
pub const EDUCATION: &str = education::NAME;

const ROOT_ROLE: &str = "\
The agent guides the user through a self-awareness journey: first getting to know their goals, \
then walking through the analysis of their self-awareness profile, then teaching them about \
their areas for growth.";

/// Registry with every journey node.
pub fn registry() -> NodeRegistry {
    NodeRegistry::new()
        .with(ROOT_NODE, build_root)
        .with(ONBOARDING, onboarding::build)
        .with(onboarding::GOALS, onboarding::build_goals)
        .with(DIMENSION_ANALYSIS, dimension_analysis::build)
        .with(EDUCATION, education::build)
}

fn build_root(registry: &NodeRegistry) -> std::result::Result<StateNode, StateError> {
    Ok(
        StateNode::new(ROOT_NODE, &[ONBOARDING, DIMENSION_ANALYSIS, EDUCATION])
            .with_role(ROOT_ROLE)
            .with_transition(ONBOARDING, DIMENSION_ANALYSIS)
            .with_transition(DIMENSION_ANALYSIS, EDUCATION)
            .with_transition(EDUCATION, DIMENSION_ANALYSIS)
            .with_child(ONBOARDING, registry.build(ONBOARDING)?)
            .with_child(DIMENSION_ANALYSIS, registry.build(DIMENSION_ANALYSIS)?)
            .with_child(EDUCATION, registry.build(EDUCATION)?),
    )
}

/// A conversational turn whose prompt carries the dimension analysis.
///
/// The analysis may cost an oracle call and a store write, so it is only
/// fetched once the input is known not to be a command.
pub(crate) async fn analysis_turn(
    ctx: &mut TurnContext<'_>,
    commands: &CommandTable,
    response_format: String,
) -> Result<TurnOutcome> {
    let turn = ConversationTurn::new(TurnRequest::new(String::new()));
    let answer = match turn.read(ctx, commands).await? {
        TurnInput::Command(directive) => return Ok(TurnOutcome::Command(directive)),
        TurnInput::Answer(answer) => answer,
    };
    let context = format!("{}\n\n{response_format}", analysis_context(ctx).await);
    turn.with_prompt_context(context).respond(ctx, answer).await
}

/// Raw scores plus the cached analysis, as prompt context.
///
/// An analysis failure degrades to a placeholder so the turn can still run.
async fn analysis_context(ctx: &TurnContext<'_>) -> String {
    let analysis = match ctx.deps.analysis.get_or_generate(ctx.user).await {
        Ok(analysis) => analysis.to_prompt_json(),
        Err(e) => {
            warn!(user = %ctx.username(), error = %e, "Analysis unavailable for prompt context");
            "(the analysis is not available right now; rely on the awareness profile)".to_string()
        }
    };
    format!(
        "Awareness Profile:\n{}\n\nDimension Analysis:\n{analysis}",
        ctx.user.dimensions_json()
    )
}
