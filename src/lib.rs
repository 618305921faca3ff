//! GoalDaemon - autonomous goal decomposition and task execution
//!
//! An objective is broken into prioritized, dependency-ordered tasks by an
//! external generator; the scheduler engine then executes them one at a
//! time until the objective completes or blocks.
//!
//! # Core Concepts
//!
//! - **Single Flight**: at most one task is executing at any instant
//! - **Priority + Dependencies**: lowest priority value first, but only
//!   among tasks whose dependencies have all completed
//! - **Blockage Is Advisory**: unmet dependencies pause processing with a
//!   notice; they never crash the engine
//! - **Bounded Decomposition**: an in-flight task can be broken into 3-5
//!   subtasks, at most 3 levels deep
//!
//! # Modules
//!
//! - [`domain`] - Task and Objective types
//! - [`store`] - single-writer task arena behind an actor
//! - [`resolver`] - eligibility selection and cycle validation
//! - [`scheduler`] - the cooperative execution engine
//! - [`expander`] - bounded subtask decomposition
//! - [`generator`] - task generation collaborators
//! - [`lifecycle`] - completion history and reflection sinks
//! - [`evaluator`] - periodic advisory progress evaluation
//! - [`manager`] - objective list management and persistence wiring

pub mod cli;
pub mod config;
pub mod domain;
pub mod evaluator;
pub mod events;
pub mod expander;
pub mod generator;
pub mod lifecycle;
pub mod manager;
pub mod persistence;
pub mod resolver;
pub mod scheduler;
pub mod store;

// Re-export commonly used types
pub use config::{Config, EvaluationConfig, GeneratorConfig, StorageConfig};
pub use domain::{MAX_SUBTASK_DEPTH, Objective, ObjectiveStatus, Task, TaskSeed, TaskStatus};
pub use evaluator::{EvaluationTimer, EvaluatorError, HeuristicEvaluator, ProgressEvaluator, Recommendation};
pub use events::{EngineEvent, EventBus, UnmetDependency};
pub use expander::{ExpandError, SubtaskExpander};
pub use generator::{
    GeneratedTasks, GeneratorError, HttpGenerator, SubtaskGenerator, TaskGenerator, fallback_subtasks, fallback_tasks,
};
pub use lifecycle::{CompletionHistory, CompletionRecord, KnowledgeLog, LifecycleEmitter, ReflectionSink};
pub use manager::ObjectiveManager;
pub use persistence::{PersistedState, Storage, StoredObjective};
pub use resolver::{next_eligible, validate_dependency_graph};
pub use scheduler::{Engine, EngineConfig, EngineState, RunOutcome, Tick};
pub use store::{StoreError, StoreHandle, TaskStore, TaskUpdate, TreeEvent};
