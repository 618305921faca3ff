//! Task domain type
//!
//! A Task is the atomic unit of work inside an objective. Tasks live in an
//! arena keyed by id; parent/child and dependency relationships are expressed
//! as id references, never as embedded object cycles.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::id::{generate_id, now_ms};

/// Maximum depth of the subtask tree (0 = top-level)
pub const MAX_SUBTASK_DEPTH: u8 = 3;

/// Task status in the execution lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting for selection (and for dependencies to complete)
    #[default]
    Pending,
    /// Currently running; at most one task per objective may be in this state
    Executing,
    /// Terminal; `completed_at` is stamped exactly once on entry
    Completed,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Executing => write!(f, "executing"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "executing" => Ok(Self::Executing),
            "completed" => Ok(Self::Completed),
            _ => Err(format!("Unknown task status: {}", s)),
        }
    }
}

/// A unit of work within an objective
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier (e.g., "019430-task-gather-requirements")
    pub id: String,

    /// Human-readable title; opaque to the scheduler
    pub title: String,

    /// Current lifecycle status
    pub status: TaskStatus,

    /// Scheduling precedence; lower value runs first
    pub priority: i32,

    /// Generator-provided category (research, planning, execution, ...)
    pub category: Option<String>,

    /// Generator-provided time estimate (e.g., "15 minutes")
    pub estimated_time: Option<String>,

    /// Task ids that must all be completed before this task is eligible
    pub dependencies: Vec<String>,

    /// Parent task id, if this is a subtask
    pub parent: Option<String>,

    /// Ordered child task ids produced by decomposition
    pub children: Vec<String>,

    /// Depth in the subtask tree (0 = top-level, max 3)
    pub depth: u8,

    /// Creation timestamp (Unix milliseconds); breaks priority ties
    pub created_at: i64,

    /// Stamped at the pending -> executing transition
    pub started_at: Option<i64>,

    /// Completion timestamp, set at the executing -> completed transition
    pub completed_at: Option<i64>,
}

impl Task {
    /// Create a new top-level task with a generated ID
    pub fn new(title: impl Into<String>, priority: i32) -> Self {
        let title = title.into();
        Self {
            id: generate_id("task", &title),
            title,
            status: TaskStatus::Pending,
            priority,
            category: None,
            estimated_time: None,
            dependencies: Vec::new(),
            parent: None,
            children: Vec::new(),
            depth: 0,
            created_at: now_ms(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Create a task with a specific ID (for testing or restore)
    pub fn with_id(id: impl Into<String>, title: impl Into<String>, priority: i32) -> Self {
        Self {
            id: id.into(),
            ..Self::new(title, priority)
        }
    }

    /// Build a task from a generator seed at the given depth
    pub fn from_seed(seed: TaskSeed, depth: u8, parent: Option<String>) -> Self {
        let mut task = Self::new(seed.title, seed.priority);
        task.category = seed.category;
        task.estimated_time = seed.estimated_time;
        task.depth = depth;
        task.parent = parent;
        task
    }

    /// Check if this task was decomposed into subtasks
    pub fn has_subtasks(&self) -> bool {
        !self.children.is_empty()
    }

    /// Check if every dependency is in the completed set (membership by id)
    pub fn is_eligible(&self, completed: &HashSet<String>) -> bool {
        self.status == TaskStatus::Pending && self.dependencies.iter().all(|dep| completed.contains(dep))
    }

    /// Check if the task is in a terminal state
    pub fn is_terminal(&self) -> bool {
        self.status == TaskStatus::Completed
    }
}

/// Generator output: the shape of a task before the store assigns identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSeed {
    pub title: String,
    pub priority: i32,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, rename = "estimatedTime", alias = "estimated_time")]
    pub estimated_time: Option<String>,
}

impl TaskSeed {
    /// Create a bare seed with just a title and priority
    pub fn new(title: impl Into<String>, priority: i32) -> Self {
        Self {
            title: title.into(),
            priority,
            category: None,
            estimated_time: None,
        }
    }
}
