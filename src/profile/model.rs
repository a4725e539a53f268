//! User profile and goals data models.

use serde::{Deserialize, Serialize};

/// Cultural background captured on first run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Culture {
    pub born_in_country: String,
    pub most_in_country: String,
    pub born_in_city: String,
    pub most_in_city: String,
    pub religion: String,
    pub interests: String,
}

/// Demographics plus raw per-dimension assessment scores.
///
/// Loaded once at startup; the conversation engine only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub username: String,
    #[serde(default)]
    pub birthdate: String,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub sexual_orientation: String,
    #[serde(default)]
    pub culture: Culture,
    #[serde(default)]
    pub language: String,
    /// Raw assessment data as imported from `profile-data.json`.
    pub dimensions: serde_json::Value,
}

impl UserProfile {
    /// A profile with only a username and dimension data.
    pub fn new(username: impl Into<String>, dimensions: serde_json::Value) -> Self {
        Self {
            username: username.into(),
            birthdate: String::new(),
            gender: String::new(),
            sexual_orientation: String::new(),
            culture: Culture::default(),
            language: String::new(),
            dimensions,
        }
    }

    /// Extract `(dimension, score)` pairs from the raw assessment data.
    ///
    /// Accepts `{"Attention": 72}`, `{"Attention": {"score": 72}}` and the
    /// same shapes nested under a top-level `"dimensions"` key.
    pub fn dimension_scores(&self) -> Vec<(String, f64)> {
        let root = self
            .dimensions
            .get("dimensions")
            .filter(|v| v.is_object())
            .unwrap_or(&self.dimensions);

        let Some(map) = root.as_object() else {
            return Vec::new();
        };

        map.iter()
            .filter_map(|(name, value)| {
                let score = value
                    .as_f64()
                    .or_else(|| value.get("score").and_then(|s| s.as_f64()))?;
                Some((name.clone(), score))
            })
            .collect()
    }

    /// Render the demographics for prompt injection.
    pub fn to_prompt_section(&self) -> String {
        let mut parts = vec![format!("- Name: {}", self.username)];
        if !self.birthdate.is_empty() {
            parts.push(format!("- Born: {}", self.birthdate));
        }
        if !self.gender.is_empty() {
            parts.push(format!("- Gender: {}", self.gender));
        }
        if !self.sexual_orientation.is_empty() {
            parts.push(format!("- Sexual orientation: {}", self.sexual_orientation));
        }
        if !self.language.is_empty() {
            parts.push(format!("- Native language: {}", self.language));
        }
        let culture = &self.culture;
        if !culture.born_in_country.is_empty() || !culture.born_in_city.is_empty() {
            parts.push(format!(
                "- Born in: {}, {}",
                culture.born_in_city, culture.born_in_country
            ));
        }
        if !culture.most_in_country.is_empty() || !culture.most_in_city.is_empty() {
            parts.push(format!(
                "- Lived mostly in: {}, {}",
                culture.most_in_city, culture.most_in_country
            ));
        }
        if !culture.religion.is_empty() {
            parts.push(format!("- Religion: {}", culture.religion));
        }
        if !culture.interests.is_empty() {
            parts.push(format!("- Interests: {}", culture.interests));
        }
        parts.join("\n")
    }

    /// The raw assessment data as pretty JSON, for prompts.
    pub fn dimensions_json(&self) -> String {
        serde_json::to_string_pretty(&self.dimensions)
            .unwrap_or_else(|_| self.dimensions.to_string())
    }
}

/// Short- and long-term goals collected during onboarding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserGoals {
    #[serde(default)]
    pub short_term: Vec<String>,
    #[serde(default)]
    pub long_term: Vec<String>,
    #[serde(default)]
    pub completed: bool,
}

impl UserGoals {
    pub fn is_empty(&self) -> bool {
        self.short_term.is_empty() && self.long_term.is_empty()
    }

    pub fn to_prompt_section(&self) -> String {
        let list = |items: &[String]| {
            if items.is_empty() {
                "(none yet)".to_string()
            } else {
                items.join("; ")
            }
        };
        format!(
            "- Short-term goals: {}\n- Long-term goals: {}",
            list(&self.short_term),
            list(&self.long_term)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scores_from_flat_map() {
        let profile = UserProfile::new(
            "sam",
            serde_json::json!({"Attention": 72, "Metacognition": 41.5}),
        );
        let mut scores = profile.dimension_scores();
        scores.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(
            scores,
            vec![("Attention".to_string(), 72.0), ("Metacognition".to_string(), 41.5)]
        );
    }

    #[test]
    fn scores_from_nested_objects() {
        let profile = UserProfile::new(
            "sam",
            serde_json::json!({"dimensions": {
                "Attention": {"score": 60, "description": "focus"},
                "Notes": "not a score"
            }}),
        );
        assert_eq!(profile.dimension_scores(), vec![("Attention".to_string(), 60.0)]);
    }

    #[test]
    fn scores_from_non_object_is_empty() {
        let profile = UserProfile::new("sam", serde_json::json!([1, 2, 3]));
        assert!(profile.dimension_scores().is_empty());
    }

    #[test]
    fn prompt_section_skips_blank_fields() {
        let mut profile = UserProfile::new("sam", serde_json::json!({}));
        profile.language = "English".into();
        let section = profile.to_prompt_section();
        assert!(section.contains("Name: sam"));
        assert!(section.contains("Native language: English"));
        assert!(!section.contains("Gender"));
    }

    #[test]
    fn goals_default_and_section() {
        let goals = UserGoals::default();
        assert!(goals.is_empty());
        assert!(!goals.completed);
        assert!(goals.to_prompt_section().contains("(none yet)"));
    }
}
