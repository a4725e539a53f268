//! Dimension analysis data model.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::OracleError;
use crate::llm::parse_reply;

/// What the agent has to say about one assessed dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionInsight {
    pub score_understanding: String,
    pub why_this_matters: String,
    pub leveraging_this_strength: String,
    pub an_interesting_fact: String,
}

impl DimensionInsight {
    /// `(title, text)` pairs in display order.
    pub fn sections(&self) -> [(&'static str, &str); 4] {
        [
            ("Score understanding", self.score_understanding.as_str()),
            ("Why this matters", self.why_this_matters.as_str()),
            ("Leveraging this strength", self.leveraging_this_strength.as_str()),
            ("An interesting fact", self.an_interesting_fact.as_str()),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub growth_summary: String,
    pub strength_summary: String,
    pub next_steps: String,
}

/// Cached per-user analysis: top strengths, top growth areas and a summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionAnalysis {
    #[serde(rename = "Strengths")]
    pub strengths: BTreeMap<String, DimensionInsight>,
    #[serde(rename = "AreasForGrowth")]
    pub areas_for_growth: BTreeMap<String, DimensionInsight>,
    pub summary: AnalysisSummary,
    #[serde(default)]
    pub assistant_role: String,
}

impl DimensionAnalysis {
    /// Parse an oracle reply into the analysis schema.
    pub fn parse(raw: &str) -> Result<Self, OracleError> {
        let analysis: Self = parse_reply(raw)?;
        if analysis.strengths.is_empty() && analysis.areas_for_growth.is_empty() {
            return Err(OracleError::malformed("analysis names no dimensions"));
        }
        Ok(analysis)
    }

    /// Names of the growth dimensions, comma separated.
    pub fn growth_dimensions(&self) -> String {
        self.areas_for_growth
            .keys()
            .cloned()
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// JSON text for prompt injection.
    pub fn to_prompt_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}
