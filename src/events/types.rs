//! Event types for GoalDaemon activity
//!
//! Everything observable about a run is expressed as an `EngineEvent`:
//! generation, task lifecycle, blockage, objective completion, and advisory
//! evaluations.

use serde::{Deserialize, Serialize};

use crate::evaluator::Recommendation;

/// A pending task together with its unmet dependency ids
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnmetDependency {
    pub task_id: String,
    pub missing: Vec<String>,
}

/// The vocabulary of engine activity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EngineEvent {
    /// Tasks were generated (or fallen back) for a new objective
    TasksGenerated {
        objective_id: String,
        count: usize,
        fallback: bool,
    },
    /// A task moved pending -> executing
    TaskStarted { task_id: String, title: String },
    /// A task moved executing -> completed
    TaskCompleted { task_id: String, title: String },
    /// Subtasks were attached under an executing task
    SubtasksAttached { parent_id: String, count: usize },
    /// Pending tasks exist but none are eligible; advisory, not fatal
    Blocked { pending: usize, unmet: Vec<UnmetDependency> },
    /// Every task completed; fired exactly once per completion
    ObjectiveCompleted {
        objective_id: String,
        title: String,
        completed: usize,
    },
    /// Periodic evaluation produced advisory recommendations
    EvaluationReady {
        objective_id: String,
        recommendations: Vec<Recommendation>,
    },
}

impl EngineEvent {
    /// Get the event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::TasksGenerated { .. } => "TasksGenerated",
            Self::TaskStarted { .. } => "TaskStarted",
            Self::TaskCompleted { .. } => "TaskCompleted",
            Self::SubtasksAttached { .. } => "SubtasksAttached",
            Self::Blocked { .. } => "Blocked",
            Self::ObjectiveCompleted { .. } => "ObjectiveCompleted",
            Self::EvaluationReady { .. } => "EvaluationReady",
        }
    }
}
