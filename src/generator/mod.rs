//! Task generation collaborators
//!
//! The engine never produces task content itself; it asks a generator. Both
//! traits here are failure-tolerant seams: when generation fails, callers
//! recover with the deterministic fallback seeds instead of halting.

use async_trait::async_trait;
use thiserror::Error;

mod http;

pub use http::HttpGenerator;

use crate::domain::{MAX_SUBTASK_DEPTH, Task, TaskSeed};

/// Errors from task generation
#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("API key not found in environment variable {0}")]
    MissingApiKey(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Invalid generator response: {0}")]
    InvalidResponse(String),

    #[error("Maximum subtask depth reached ({0} levels)")]
    DepthExceeded(u8),
}

/// Output of top-level task generation
#[derive(Debug, Clone)]
pub struct GeneratedTasks {
    pub seeds: Vec<TaskSeed>,
    pub insights: Option<String>,
}

/// Produces the initial task breakdown for a new objective
///
/// Called exactly once per objective, right after creation.
#[async_trait]
pub trait TaskGenerator: Send + Sync {
    async fn generate(
        &self,
        objective: &str,
        description: &str,
        context: Option<&str>,
    ) -> Result<GeneratedTasks, GeneratorError>;
}

/// Decomposes a single task into finer-grained subtasks
#[async_trait]
pub trait SubtaskGenerator: Send + Sync {
    /// Must reject `depth >= MAX_SUBTASK_DEPTH` with `DepthExceeded`
    async fn generate(&self, parent: &Task, objective: &str, depth: u8) -> Result<Vec<TaskSeed>, GeneratorError>;
}

/// Fixed task breakdown used whenever generation fails or is disabled
pub fn fallback_tasks() -> GeneratedTasks {
    let seed = |title: &str, priority: i32, category: &str, time: &str| {
        let mut s = TaskSeed::new(title, priority);
        s.category = Some(category.to_string());
        s.estimated_time = Some(time.to_string());
        s
    };

    GeneratedTasks {
        seeds: vec![
            seed("Research and gather information", 1, "research", "15 minutes"),
            seed("Define success criteria and requirements", 2, "planning", "10 minutes"),
            seed("Break down into actionable steps", 3, "planning", "15 minutes"),
            seed("Identify required resources", 4, "planning", "10 minutes"),
            seed("Create implementation plan", 5, "planning", "20 minutes"),
            seed("Execute core functionality", 6, "execution", "30 minutes"),
            seed("Test and validate results", 7, "testing", "15 minutes"),
            seed("Document findings and process", 8, "documentation", "10 minutes"),
        ],
        insights: Some("Generation unavailable, using fallback task structure".to_string()),
    }
}

/// Fixed subtask breakdown used when subtask generation fails
pub fn fallback_subtasks(parent_title: &str) -> Vec<TaskSeed> {
    vec![
        TaskSeed::new(format!("Outline the steps for: {}", parent_title), 1),
        TaskSeed::new(format!("Work through: {}", parent_title), 2),
        TaskSeed::new(format!("Verify the outcome of: {}", parent_title), 3),
    ]
}

/// Guard shared by every SubtaskGenerator implementation
pub(crate) fn check_depth(depth: u8) -> Result<(), GeneratorError> {
    if depth >= MAX_SUBTASK_DEPTH {
        Err(GeneratorError::DepthExceeded(depth))
    } else {
        Ok(())
    }
}
