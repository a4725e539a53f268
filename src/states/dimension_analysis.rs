//! The `DimensionAnalysis` node: talk through the analysis and the chart.

use std::sync::Arc;

use async_trait::async_trait;

use crate::agent::conversation::response_format;
use crate::agent::{
    CommandTable, ConversationTurn, Directive, NodeRegistry, StateHandler, StateNode, StatePath,
    TurnContext, TurnOutcome, TurnRequest,
};
use crate::analysis::SpiderChartData;
use crate::error::{Result, StateError};
use crate::states::commands::{
    ClearHistory, Quit, RegenerateAnalysis, ShowAnalysis, ShowSpiderChart, display_analysis,
    display_spider_chart,
};
use crate::states::{EDUCATION, analysis_turn};

pub const NAME: &str = "DimensionAnalysis";

const ROLE: &str = "\
In the DimensionAnalysis state the agent helps the user understand the analysis of their \
self-awareness profile: their strengths, their areas for growth and how the dimensions interact.";

const DETECTION_RULE: &str = "Detect whether the user wants to talk about the Analysis or move on \
to Education, in that order.";

pub fn build(_: &NodeRegistry) -> std::result::Result<StateNode, StateError> {
    Ok(
        StateNode::new(NAME, &["Analysis", "SpiderChart", "Education"])
            .with_role(ROLE)
            .with_transition("Analysis", "SpiderChart")
            .with_transition("SpiderChart", "Analysis")
            .with_transition("Analysis", "Education")
            .with_transition("SpiderChart", "Education")
            .with_transition("Education", "Analysis")
            .with_handler("Analysis", Arc::new(AnalysisTopic))
            .with_handler("SpiderChart", Arc::new(SpiderChartTopic))
            .with_handler("Education", Arc::new(EducationHandoff))
            .with_command("quit", "Quit the agent", Arc::new(Quit))
            .with_command("clear history", "Clear the conversation history", Arc::new(ClearHistory))
            .with_command(
                "show analysis",
                "Display the dimensional analysis",
                Arc::new(ShowAnalysis {
                    then: Some("Analysis"),
                }),
            )
            .with_command(
                "show spider chart",
                "Display the spider chart",
                Arc::new(ShowSpiderChart),
            )
            .with_command(
                "regenerate analysis",
                "Generate a fresh dimensional analysis",
                Arc::new(RegenerateAnalysis),
            ),
    )
}

/// `Analysis`: converse about the cached analysis.
struct AnalysisTopic;

#[async_trait]
impl StateHandler for AnalysisTopic {
    fn role(&self) -> &str {
        "You are now discussing the analysis of the user's self-awareness profile. \
         Answer their questions and notice when they would like to move on to Education."
    }

    async fn handle(
        &self,
        ctx: &mut TurnContext<'_>,
        commands: &CommandTable,
    ) -> Result<Directive> {
        let reply_format = response_format(
            &["Conversation", "DisplayAnalysis", "DisplaySpiderChart"],
            &["Analysis", "Education"],
            DETECTION_RULE,
        );
        let outcome = analysis_turn(ctx, commands, reply_format).await?;
        Ok(match outcome {
            TurnOutcome::Command(directive) => directive,
            TurnOutcome::Degraded => Directive::Stay,
            TurnOutcome::Reply(state) if state.detected("Education") => {
                Directive::Goto(vec![ctx.local("Education")])
            }
            TurnOutcome::Reply(state) if state.action_is("DisplaySpiderChart") => {
                display_spider_chart(ctx);
                Directive::Goto(vec![ctx.local("SpiderChart")])
            }
            TurnOutcome::Reply(state) if state.action_is("DisplayAnalysis") => {
                display_analysis(ctx).await;
                Directive::Stay
            }
            TurnOutcome::Reply(_) => Directive::Stay,
        })
    }
}

/// `SpiderChart`: converse about the chart.
struct SpiderChartTopic;

#[async_trait]
impl StateHandler for SpiderChartTopic {
    fn role(&self) -> &str {
        "You have shown the user a spider chart of their dimension scores. Weaker dimensions \
         pull the line toward the centre. Discuss the chart and answer their questions."
    }

    async fn handle(
        &self,
        ctx: &mut TurnContext<'_>,
        commands: &CommandTable,
    ) -> Result<Directive> {
        let chart = SpiderChartData::from_profile(ctx.user);
        let context = format!(
            "Spider Chart Data:\n{}\n\n{}",
            chart.to_prompt_json(),
            response_format(
                &["DiscussSpiderChart", "DiscussAnalysis", "SwitchTopics"],
                &["SpiderChart", "Analysis", "Education"],
                DETECTION_RULE,
            )
        );

        let outcome = ConversationTurn::new(TurnRequest::new(context))
            .run(ctx, commands)
            .await?;
        Ok(match outcome {
            TurnOutcome::Command(directive) => directive,
            TurnOutcome::Degraded => Directive::Stay,
            TurnOutcome::Reply(state) if state.detected("Education") => {
                Directive::Goto(vec![ctx.local("Education")])
            }
            TurnOutcome::Reply(state) if state.detected("Analysis") => {
                Directive::Goto(vec![ctx.local("Analysis")])
            }
            TurnOutcome::Reply(_) => Directive::Stay,
        })
    }
}

/// `Education`: hand off to the top-level `Education` node, leaving this
/// node on `Analysis` for the next visit.
struct EducationHandoff;

#[async_trait]
impl StateHandler for EducationHandoff {
    async fn handle(
        &self,
        ctx: &mut TurnContext<'_>,
        _commands: &CommandTable,
    ) -> Result<Directive> {
        if let Ok(analysis) = ctx.deps.analysis.get_or_generate(ctx.user).await {
            let growth = analysis.growth_dimensions();
            if !growth.is_empty() {
                ctx.terminal
                    .notice(&format!("Let's learn more about your areas for growth: {growth}."));
            }
        }
        Ok(Directive::Goto(vec![
            StatePath::new(vec![NAME.to_string(), "Analysis".to_string()]),
            StatePath::parse(EDUCATION),
        ]))
    }
}
