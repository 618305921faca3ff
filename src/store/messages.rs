//! Store messages
//!
//! Commands, responses, and errors for the store actor.

use thiserror::Error;
use tokio::sync::oneshot;

use crate::domain::{Task, TaskSeed, TaskStatus};

use super::tree::TaskUpdate;

/// Errors from task store transitions
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Task not found: {0}")]
    NotFound(String),

    #[error("Task already exists: {0}")]
    DuplicateId(String),

    #[error("Another task is already executing: {running}")]
    AlreadyExecuting { running: String },

    #[error("Maximum subtask depth reached ({depth} levels)")]
    DepthLimit { depth: u8 },

    #[error("Task {task} already has subtasks")]
    AlreadyExpanded { task: String },

    #[error("Task {task} depends on unknown task {dependency}")]
    UnknownDependency { task: String, dependency: String },

    #[error("Dependency cycle: {}", path.join(" -> "))]
    DependencyCycle { path: Vec<String> },

    #[error("Store channel closed")]
    ChannelClosed,
}

/// Response from store operations
pub type StoreResponse<T> = Result<T, StoreError>;

/// Broadcast when the task tree changes; drives scheduler re-evaluation and
/// save-on-mutation.
#[derive(Debug, Clone)]
pub enum TreeEvent {
    /// A status transition was applied
    StatusChanged { id: String, status: TaskStatus },
    /// Tasks were inserted or attached
    Added { count: usize },
    /// A subtree was removed
    Removed { ids: Vec<String> },
    /// Task fields were edited
    Updated { id: String },
    /// The whole tree was cleared or replaced
    Reset,
}

/// Commands sent to the store actor
#[derive(Debug)]
pub enum StoreCommand {
    Insert {
        task: Task,
        reply: oneshot::Sender<StoreResponse<String>>,
    },
    SetStatus {
        id: String,
        status: TaskStatus,
        reply: oneshot::Sender<StoreResponse<Task>>,
    },
    AttachSubtasks {
        parent_id: String,
        seeds: Vec<TaskSeed>,
        reply: oneshot::Sender<StoreResponse<Vec<Task>>>,
    },
    UpdateTask {
        id: String,
        update: TaskUpdate,
        reply: oneshot::Sender<StoreResponse<Task>>,
    },
    RemoveTask {
        id: String,
        reply: oneshot::Sender<StoreResponse<Vec<String>>>,
    },
    Clear {
        reply: oneshot::Sender<StoreResponse<()>>,
    },
    ReplaceAll {
        tasks: Vec<Task>,
        reply: oneshot::Sender<StoreResponse<()>>,
    },
    Snapshot {
        reply: oneshot::Sender<StoreResponse<Vec<Task>>>,
    },
    ByStatus {
        status: TaskStatus,
        reply: oneshot::Sender<StoreResponse<Vec<Task>>>,
    },
    Find {
        id: String,
        reply: oneshot::Sender<StoreResponse<Option<Task>>>,
    },
    Shutdown,
}
