//! Spider chart data and its text rendering.

use serde::{Deserialize, Serialize};

use crate::profile::UserProfile;

const BAR_WIDTH: usize = 40;

/// Labels and scores for a radar chart of the user's dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpiderChartData {
    pub labels: Vec<String>,
    pub scores: Vec<f64>,
}

impl SpiderChartData {
    /// Derive chart data from the profile's dimension scores.
    pub fn from_profile(profile: &UserProfile) -> Self {
        let (labels, scores) = profile.dimension_scores().into_iter().unzip();
        Self { labels, scores }
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// The scale the bars are drawn against: 100, or the top score if larger.
    fn scale(&self) -> f64 {
        self.scores.iter().copied().fold(100.0, f64::max)
    }

    /// Labels of the `n` lowest-scoring dimensions, weakest first.
    pub fn weakest(&self, n: usize) -> Vec<&str> {
        let mut pairs: Vec<(&str, f64)> = self
            .labels
            .iter()
            .map(String::as_str)
            .zip(self.scores.iter().copied())
            .collect();
        pairs.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(b.0)));
        pairs.into_iter().take(n).map(|(label, _)| label).collect()
    }

    /// Render the chart as one bar per dimension.
    ///
    /// Weaker dimensions have shorter bars, the way they pull toward the
    /// centre of a radar chart.
    pub fn render_text(&self) -> String {
        if self.is_empty() {
            return "No dimension scores available.".to_string();
        }

        let label_width = self.labels.iter().map(|l| l.chars().count()).max().unwrap_or(0);
        let scale = self.scale();
        let weakest = self.weakest(2);

        let mut out = String::from("Awareness Profile\n");
        for (label, score) in self.labels.iter().zip(&self.scores) {
            let filled = ((score.max(0.0) / scale) * BAR_WIDTH as f64).round() as usize;
            let filled = filled.min(BAR_WIDTH);
            let marker = if weakest.contains(&label.as_str()) { "  <- growth area" } else { "" };
            out.push_str(&format!(
                "{label:<label_width$} |{}{}| {score:>5.1}{marker}\n",
                "#".repeat(filled),
                " ".repeat(BAR_WIDTH - filled),
            ));
        }
        out
    }

    /// JSON text for prompt injection.
    pub fn to_prompt_json(&self) -> String {
        serde_json::json!({ "spiderChartData": self }).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> UserProfile {
        UserProfile::new(
            "sam",
            serde_json::json!({"Attention": 80, "Empathy": 30, "Metacognition": 55}),
        )
    }

    #[test]
    fn derived_from_profile_scores() {
        let chart = SpiderChartData::from_profile(&profile());
        assert_eq!(chart.labels, vec!["Attention", "Empathy", "Metacognition"]);
        assert_eq!(chart.scores, vec![80.0, 30.0, 55.0]);
    }

    #[test]
    fn derivation_is_deterministic() {
        assert_eq!(
            SpiderChartData::from_profile(&profile()),
            SpiderChartData::from_profile(&profile())
        );
        assert_eq!(
            SpiderChartData::from_profile(&profile()).render_text(),
            SpiderChartData::from_profile(&profile()).render_text()
        );
    }

    #[test]
    fn weakest_orders_by_score() {
        let chart = SpiderChartData::from_profile(&profile());
        assert_eq!(chart.weakest(2), vec!["Empathy", "Metacognition"]);
    }

    #[test]
    fn render_marks_growth_areas() {
        let text = SpiderChartData::from_profile(&profile()).render_text();
        let empathy = text.lines().find(|l| l.starts_with("Empathy")).unwrap();
        assert!(empathy.contains("growth area"));
        let attention = text.lines().find(|l| l.starts_with("Attention")).unwrap();
        assert!(!attention.contains("growth area"));
        assert_eq!(attention.matches('#').count(), 32);
    }

    #[test]
    fn empty_chart_renders_notice() {
        let chart = SpiderChartData::from_profile(&UserProfile::new("sam", serde_json::json!({})));
        assert!(chart.is_empty());
        assert!(chart.render_text().contains("No dimension"));
    }

    #[test]
    fn prompt_json_is_wrapped() {
        let chart = SpiderChartData::from_profile(&profile());
        let value: serde_json::Value = serde_json::from_str(&chart.to_prompt_json()).unwrap();
        assert_eq!(value["spiderChartData"]["labels"][0], "Attention");
    }
}
