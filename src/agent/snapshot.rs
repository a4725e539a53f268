//! Nested state snapshot and state paths.
//!
//! A snapshot records which sub-state is active at every level of the state
//! tree. It is the controller's whole resumable position and is persisted
//! after every turn.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Recursive record of the active sub-state at one node and below.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NestedStateSnapshot {
    /// Active sub-state name at this node.
    pub active: String,
    /// Snapshots of child nodes, keyed by node name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub children: BTreeMap<String, NestedStateSnapshot>,
}

impl NestedStateSnapshot {
    /// A snapshot with no children.
    pub fn leaf(active: impl Into<String>) -> Self {
        Self {
            active: active.into(),
            children: BTreeMap::new(),
        }
    }

    pub fn with_child(mut self, name: impl Into<String>, child: NestedStateSnapshot) -> Self {
        self.children.insert(name.into(), child);
        self
    }

    /// Follow `active` links down the snapshot.
    pub fn active_path(&self) -> StatePath {
        let mut segments = vec![self.active.clone()];
        let mut current = self;
        while let Some(child) = current.children.get(&current.active) {
            segments.push(child.active.clone());
            current = child;
        }
        StatePath::new(segments)
    }

    /// Parse a persisted snapshot. Required fields are enforced here so
    /// malformed rows fail at the boundary instead of deep in the tree.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, String> {
        let snapshot: Self = serde_json::from_value(value.clone()).map_err(|e| e.to_string())?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    fn validate(&self) -> Result<(), String> {
        if self.active.trim().is_empty() {
            return Err("empty active state".to_string());
        }
        for (name, child) in &self.children {
            child.validate().map_err(|e| format!("{name}: {e}"))?;
        }
        Ok(())
    }
}

/// Dotted path of sub-state names from the root, e.g. `DimensionAnalysis.SpiderChart`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct StatePath {
    segments: Vec<String>,
}

impl StatePath {
    pub fn new(segments: Vec<String>) -> Self {
        Self { segments }
    }

    /// Parse a dotted path. Empty segments are dropped.
    pub fn parse(path: &str) -> Self {
        Self::new(
            path.split('.')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
        )
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Path of the leaf's siblings: same parent, different last segment.
    pub fn sibling(&self, name: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.pop();
        segments.push(name.to_string());
        Self { segments }
    }
}

impl fmt::Display for StatePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

impl From<&str> for StatePath {
    fn from(path: &str) -> Self {
        Self::parse(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NestedStateSnapshot {
        NestedStateSnapshot::leaf("DimensionAnalysis")
            .with_child("Onboarding", NestedStateSnapshot::leaf("Goals").with_child(
                "Goals",
                NestedStateSnapshot::leaf("UserGoals"),
            ))
            .with_child("DimensionAnalysis", NestedStateSnapshot::leaf("SpiderChart"))
    }

    #[test]
    fn serde_shape() {
        let json = serde_json::to_value(NestedStateSnapshot::leaf("Analysis")).unwrap();
        assert_eq!(json, serde_json::json!({"active": "Analysis"}));

        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["active"], "DimensionAnalysis");
        assert_eq!(json["children"]["DimensionAnalysis"]["active"], "SpiderChart");
    }

    #[test]
    fn json_roundtrip() {
        let snapshot = sample();
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(NestedStateSnapshot::from_json(&value).unwrap(), snapshot);
    }

    #[test]
    fn rejects_missing_active() {
        let value = serde_json::json!({"children": {}});
        assert!(NestedStateSnapshot::from_json(&value).is_err());
    }

    #[test]
    fn rejects_empty_nested_active() {
        let value = serde_json::json!({
            "active": "Onboarding",
            "children": {"Onboarding": {"active": ""}}
        });
        let err = NestedStateSnapshot::from_json(&value).unwrap_err();
        assert!(err.starts_with("Onboarding"));
    }

    #[test]
    fn active_path_follows_children() {
        assert_eq!(
            sample().active_path().to_string(),
            "DimensionAnalysis.SpiderChart"
        );
    }

    #[test]
    fn path_helpers() {
        let path = StatePath::parse("DimensionAnalysis.Analysis");
        assert_eq!(path.sibling("SpiderChart").to_string(), "DimensionAnalysis.SpiderChart");
        assert!(StatePath::parse("..").segments().is_empty());
    }
}
