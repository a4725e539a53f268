//! Cached dimension analysis generation.

use std::sync::Arc;

use tracing::{info, warn};

use crate::analysis::DimensionAnalysis;
use crate::error::{OracleError, Result};
use crate::llm::{JSON_REMINDER, OraclePrompt, ResponseOracle};
use crate::profile::UserProfile;
use crate::store::Database;

const ANALYSIS_FORMAT: &str = r#"JSON Response Format:
{
    "Strengths": {
        "<top strength dimension>": {
            "score_understanding": "<how this strength shapes their self-awareness>",
            "why_this_matters": "<how using this strength will benefit them>",
            "leveraging_this_strength": "<how they can leverage this strength to grow>",
            "an_interesting_fact": "<a fact that sparks curiosity and insight>"
        },
        "<second strength dimension>": { ... }
    },
    "AreasForGrowth": {
        "<lowest scoring dimension>": {
            "score_understanding": "<how this area shapes their self-awareness>",
            "why_this_matters": "<how improving it will benefit them>",
            "leveraging_this_strength": "<how they can work on this area>",
            "an_interesting_fact": "<a fact that sparks curiosity and insight>"
        },
        "<second lowest scoring dimension>": { ... }
    },
    "summary": {
        "growth_summary": "<how the growth dimensions relate and why to address them together>",
        "strength_summary": "<how the strengths relate and can be leveraged together>",
        "next_steps": "<how the agent will work with the user from here>"
    },
    "assistant_role": "<information useful for a later conversation about this analysis>"
}"#;

/// Generates the per-user dimension analysis once and serves it from the store.
pub struct AnalysisService {
    store: Arc<dyn Database>,
    oracle: Arc<dyn ResponseOracle>,
    model: String,
}

impl AnalysisService {
    pub fn new(
        store: Arc<dyn Database>,
        oracle: Arc<dyn ResponseOracle>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            store,
            oracle,
            model: model.into(),
        }
    }

    /// Return the cached analysis, generating and saving it on a miss.
    pub async fn get_or_generate(&self, profile: &UserProfile) -> Result<DimensionAnalysis> {
        if let Some(analysis) = self.store.get_dimension_analysis(&profile.username).await? {
            return Ok(analysis);
        }
        self.generate(profile).await
    }

    /// Drop the cached analysis and generate a fresh one.
    pub async fn regenerate(&self, profile: &UserProfile) -> Result<DimensionAnalysis> {
        let existed = self.store.delete_dimension_analysis(&profile.username).await?;
        info!(user = %profile.username, existed, "Regenerating dimension analysis");
        self.generate(profile).await
    }

    async fn generate(&self, profile: &UserProfile) -> Result<DimensionAnalysis> {
        let prompt = analysis_prompt(profile);
        let analysis = match self.request(&prompt).await {
            Err(OracleError::MalformedReply { reason }) => {
                warn!(%reason, "Analysis reply malformed, asking again");
                self.request(&prompt.clone().with_clarification(JSON_REMINDER))
                    .await?
            }
            other => other?,
        };

        self.store
            .save_dimension_analysis(&profile.username, &analysis)
            .await?;
        info!(
            user = %profile.username,
            strengths = analysis.strengths.len(),
            growth = analysis.areas_for_growth.len(),
            "Dimension analysis generated"
        );
        Ok(analysis)
    }

    async fn request(
        &self,
        prompt: &OraclePrompt,
    ) -> std::result::Result<DimensionAnalysis, OracleError> {
        let raw = self.oracle.complete(prompt, &self.model).await?;
        DimensionAnalysis::parse(&raw)
    }
}

fn analysis_prompt(profile: &UserProfile) -> OraclePrompt {
    let system_role = format!(
        "You are a compassionate neuropsychologist helping a user who has recently completed \
         a self-awareness assessment.\n\nUser:\n{}",
        profile.to_prompt_section()
    );
    let user_prompt = format!(
        "Based on the user's self-awareness profile analyze their strengths and weaknesses:\n\
         - Choose the top two highest scoring dimensions to highlight as their strengths.\n\
         - Choose the two lowest scoring dimensions to highlight as areas for growth.\n\
         - Be compassionate, with non-judgmental, empathetic and supportive language.\n\
         - Normalize the experience: everyone has areas to improve.\n\
         - Be aware of how different dimensions interact.\n\
         - In assistant_role save anything useful for a later conversation about the analysis.\n\n\
         Awareness Profile:\n{}\n\n{ANALYSIS_FORMAT}",
        profile.dimensions_json()
    );
    OraclePrompt::new(system_role, user_prompt)
}
