//! Command handlers shared by the journey nodes.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::agent::{CommandHandler, Directive, TurnContext};
use crate::analysis::{SpiderChartData, render_analysis};
use crate::error::Result;

const ANALYSIS_UNAVAILABLE: &str =
    "I couldn't prepare your analysis right now. Let's keep talking and try again later.";

/// `quit`: persist the position and end the session.
pub struct Quit;

#[async_trait]
impl CommandHandler for Quit {
    async fn run(&self, ctx: &mut TurnContext<'_>) -> Result<Directive> {
        ctx.terminal.notice("Goodbye. Your progress has been saved.");
        Ok(Directive::Quit)
    }
}

/// `clear history`: wipe the user's conversation events.
pub struct ClearHistory;

#[async_trait]
impl CommandHandler for ClearHistory {
    async fn run(&self, ctx: &mut TurnContext<'_>) -> Result<Directive> {
        match ctx.deps.store.wipe_conversation_events(ctx.username()).await {
            Ok(count) => {
                info!(user = %ctx.username(), count, "History cleared by user");
                ctx.terminal.notice("Conversation history cleared.");
            }
            Err(e) => {
                warn!(error = %e, "Failed to clear history");
                ctx.terminal
                    .notice("I couldn't clear the conversation history. Please try again.");
            }
        }
        Ok(Directive::Stay)
    }
}

/// `show analysis`: print the cached analysis, then optionally move to a
/// sibling sub-state.
pub struct ShowAnalysis {
    pub then: Option<&'static str>,
}

#[async_trait]
impl CommandHandler for ShowAnalysis {
    async fn run(&self, ctx: &mut TurnContext<'_>) -> Result<Directive> {
        if !display_analysis(ctx).await {
            return Ok(Directive::Stay);
        }
        Ok(match self.then {
            Some(name) => Directive::Goto(vec![ctx.local(name)]),
            None => Directive::Stay,
        })
    }
}

/// `show spider chart`: print the chart and move to the `SpiderChart` sibling.
pub struct ShowSpiderChart;

#[async_trait]
impl CommandHandler for ShowSpiderChart {
    async fn run(&self, ctx: &mut TurnContext<'_>) -> Result<Directive> {
        display_spider_chart(ctx);
        Ok(Directive::Goto(vec![ctx.local("SpiderChart")]))
    }
}

/// `regenerate analysis`: drop the cached analysis and build a new one.
pub struct RegenerateAnalysis;

#[async_trait]
impl CommandHandler for RegenerateAnalysis {
    async fn run(&self, ctx: &mut TurnContext<'_>) -> Result<Directive> {
        ctx.terminal.notice("Regenerating your analysis, this can take a moment...");
        match ctx.deps.analysis.regenerate(ctx.user).await {
            Ok(analysis) => ctx.terminal.notice(&render_analysis(&analysis)),
            Err(e) => {
                warn!(error = %e, "Analysis regeneration failed");
                ctx.terminal.notice(ANALYSIS_UNAVAILABLE);
            }
        }
        Ok(Directive::Stay)
    }
}

/// Print the analysis. Returns whether it could be shown.
pub(crate) async fn display_analysis(ctx: &mut TurnContext<'_>) -> bool {
    match ctx.deps.analysis.get_or_generate(ctx.user).await {
        Ok(analysis) => {
            ctx.terminal.notice(&render_analysis(&analysis));
            true
        }
        Err(e) => {
            warn!(error = %e, "Analysis unavailable");
            ctx.terminal.notice(ANALYSIS_UNAVAILABLE);
            false
        }
    }
}

pub(crate) fn display_spider_chart(ctx: &mut TurnContext<'_>) {
    let chart = SpiderChartData::from_profile(ctx.user);
    ctx.terminal.notice(&chart.render_text());
}
