//! Dimension analysis and spider chart.
//!
//! The analysis is generated once per user by the oracle and cached in the
//! store. The spider chart is derived locally from the profile scores.

pub mod chart;
pub mod model;
pub mod service;

pub use chart::SpiderChartData;
pub use model::{AnalysisSummary, DimensionAnalysis, DimensionInsight};
pub use service::AnalysisService;

use crate::channels::wrap;

const TEXT_WIDTH: usize = 100;
const INDENT: &str = "    ";

/// Render an analysis for the terminal.
pub fn render_analysis(analysis: &DimensionAnalysis) -> String {
    let rule = "--------------------------";
    let mut out = String::new();

    for (title, dimensions) in [
        ("Strengths", &analysis.strengths),
        ("Areas for growth", &analysis.areas_for_growth),
    ] {
        if dimensions.is_empty() {
            continue;
        }
        out.push_str(&format!("{rule}\n{title}\n{rule}\n"));
        for (dimension, insight) in dimensions {
            out.push_str(dimension);
            out.push('\n');
            for (section, text) in insight.sections() {
                out.push_str(&format!("{INDENT}{section}:\n"));
                out.push_str(&wrap(text, TEXT_WIDTH, &INDENT.repeat(2)));
                out.push_str("\n\n");
            }
        }
    }

    let summary = &analysis.summary;
    out.push_str(&format!("{rule}\nSummary\n{rule}\n"));
    for (section, text) in [
        ("Growth summary", &summary.growth_summary),
        ("Strength summary", &summary.strength_summary),
        ("Next steps", &summary.next_steps),
    ] {
        out.push_str(&format!("{INDENT}{section}:\n"));
        out.push_str(&wrap(text, TEXT_WIDTH, &INDENT.repeat(2)));
        out.push_str("\n\n");
    }
    out
}
