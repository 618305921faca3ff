//! Objective domain type
//!
//! An Objective is the top-level goal that owns a task tree for one run.

use serde::{Deserialize, Serialize};

use super::id::{generate_id, now_ms};

/// Objective status label
///
/// The scheduler only computes the derived all-complete condition; it does
/// not own transitions of this field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveStatus {
    #[default]
    Active,
    Paused,
    Completed,
}

impl std::fmt::Display for ObjectiveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Paused => write!(f, "paused"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

/// A top-level goal containing an ordered task tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Objective {
    /// Unique identifier (e.g., "019430-objective-launch-newsletter")
    pub id: String,

    /// Short goal statement
    pub title: String,

    /// Free-form context supplied at creation
    pub description: String,

    /// Report-level status label
    pub status: ObjectiveStatus,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,

    /// Opaque generator annotation; never read by scheduling logic
    pub ai_insights: Option<String>,
}

impl Objective {
    /// Create a new active objective with no tasks yet
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        let title = title.into();
        Self {
            id: generate_id("objective", &title),
            title,
            description: description.into(),
            status: ObjectiveStatus::Active,
            created_at: now_ms(),
            ai_insights: None,
        }
    }

    /// Create an objective with a specific ID (for testing or restore)
    pub fn with_id(id: impl Into<String>, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::new(title, description)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_objective_new() {
        let obj = Objective::new("Launch newsletter", "Weekly tech digest");
        assert!(obj.id.contains("-objective-"));
        assert_eq!(obj.status, ObjectiveStatus::Active);
        assert!(obj.ai_insights.is_none());
    }

    #[test]
    fn test_objective_serde() {
        let obj = Objective::new("Test", "Description");
        let json = serde_json::to_string(&obj).unwrap();
        assert!(json.contains("\"active\""));

        let back: Objective = serde_json::from_str(&json).unwrap();
        assert_eq!(obj.id, back.id);
        assert_eq!(back.status, ObjectiveStatus::Active);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(ObjectiveStatus::Active.to_string(), "active");
        assert_eq!(ObjectiveStatus::Paused.to_string(), "paused");
        assert_eq!(ObjectiveStatus::Completed.to_string(), "completed");
    }
}
