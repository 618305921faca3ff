//! Subtask expansion
//!
//! Decomposes an in-flight task into 3-5 finer-grained children, re-entering
//! the store's depth bound. Expansion never touches the parent's status, and
//! subtasks do not gate the parent's own completion; they are an
//! informational breakdown scheduled like any other pending work.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::{MAX_SUBTASK_DEPTH, Task, TaskSeed, TaskStatus};
use crate::events::{EngineEvent, EventBus};
use crate::generator::{GeneratorError, SubtaskGenerator, fallback_subtasks};
use crate::store::{StoreError, StoreHandle};

/// Seeds per expansion, clamped to the generator contract
const MIN_SUBTASKS: usize = 3;
const MAX_SUBTASKS: usize = 5;

/// Errors from subtask expansion; reported to the caller, never thrown into
/// the scheduler
#[derive(Debug, Error)]
pub enum ExpandError {
    #[error("Task not found: {0}")]
    NotFound(String),

    #[error("Task {0} is not executing; only an in-flight task can be broken down")]
    NotExecuting(String),

    #[error("Maximum subtask depth reached ({0} levels)")]
    DepthLimit(u8),

    #[error("Task {0} already has subtasks")]
    AlreadyExpanded(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Breaks an executing task down into child tasks
pub struct SubtaskExpander {
    store: StoreHandle,
    generator: Option<Arc<dyn SubtaskGenerator>>,
    bus: Arc<EventBus>,
}

impl SubtaskExpander {
    pub fn new(store: StoreHandle, generator: Option<Arc<dyn SubtaskGenerator>>, bus: Arc<EventBus>) -> Self {
        Self { store, generator, bus }
    }

    /// Expand a task into pending children at `depth + 1`
    ///
    /// Precondition checks run against the live tree before generation, so a
    /// rejected expansion leaves no partial subtree. Returns the attached
    /// children.
    pub async fn expand(&self, task_id: &str, objective_title: &str) -> Result<Vec<Task>, ExpandError> {
        debug!(%task_id, "SubtaskExpander::expand: called");

        let parent = self
            .store
            .find(task_id)
            .await?
            .ok_or_else(|| ExpandError::NotFound(task_id.to_string()))?;

        if parent.status != TaskStatus::Executing {
            return Err(ExpandError::NotExecuting(task_id.to_string()));
        }
        if parent.depth >= MAX_SUBTASK_DEPTH {
            return Err(ExpandError::DepthLimit(parent.depth));
        }
        if parent.has_subtasks() {
            return Err(ExpandError::AlreadyExpanded(task_id.to_string()));
        }

        let seeds = self.generate_seeds(&parent, objective_title).await;

        let children = self.store.attach_subtasks(task_id, seeds).await?;
        self.bus.emit(EngineEvent::SubtasksAttached {
            parent_id: task_id.to_string(),
            count: children.len(),
        });
        Ok(children)
    }

    /// Ask the generator for seeds, falling back to the fixed breakdown on
    /// any generation failure
    async fn generate_seeds(&self, parent: &Task, objective_title: &str) -> Vec<TaskSeed> {
        let generated = match &self.generator {
            Some(generator) => generator.generate(parent, objective_title, parent.depth).await,
            None => Err(GeneratorError::InvalidResponse("no generator configured".to_string())),
        };

        let mut seeds = match generated {
            Ok(seeds) => seeds,
            Err(e) => {
                warn!(parent_id = %parent.id, error = %e, "Subtask generation failed, using fallback");
                fallback_subtasks(&parent.title)
            }
        };

        if seeds.len() < MIN_SUBTASKS {
            seeds = fallback_subtasks(&parent.title);
        }
        seeds.truncate(MAX_SUBTASKS);
        seeds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::mock::StaticGenerator;

    async fn executing_parent(store: &StoreHandle, id: &str, depth: u8) -> Task {
        let mut task = Task::with_id(id, format!("Parent {}", id), 1);
        task.depth = depth;
        store.insert(task).await.unwrap();
        store.set_status(id, TaskStatus::Executing).await.unwrap()
    }

    fn seeds(n: usize) -> Vec<TaskSeed> {
        (0..n).map(|i| TaskSeed::new(format!("Sub {}", i), i as i32 + 1)).collect()
    }

    #[tokio::test]
    async fn test_expand_attaches_pending_children() {
        let store = StoreHandle::spawn();
        executing_parent(&store, "p", 0).await;
        let bus = Arc::new(EventBus::with_default_capacity());
        let mut rx = bus.subscribe();
        let expander = SubtaskExpander::new(store.clone(), Some(Arc::new(StaticGenerator::new(seeds(4)))), bus);

        let children = expander.expand("p", "The goal").await.unwrap();
        assert_eq!(children.len(), 4);
        assert!(children.iter().all(|c| c.status == TaskStatus::Pending));
        assert!(children.iter().all(|c| c.depth == 1));
        assert!(children.iter().all(|c| c.dependencies.is_empty()));

        // Parent status untouched
        let parent = store.find("p").await.unwrap().unwrap();
        assert_eq!(parent.status, TaskStatus::Executing);

        // Skip the store's own tree events on the engine bus side
        let mut saw_attached = false;
        while let Ok(event) = rx.try_recv() {
            if event.event_type() == "SubtasksAttached" {
                saw_attached = true;
            }
        }
        assert!(saw_attached);
    }

    #[tokio::test]
    async fn test_expand_rejects_pending_parent() {
        let store = StoreHandle::spawn();
        store.insert(Task::with_id("p", "Parent", 1)).await.unwrap();
        let bus = Arc::new(EventBus::with_default_capacity());
        let expander = SubtaskExpander::new(store, Some(Arc::new(StaticGenerator::new(seeds(3)))), bus);

        let err = expander.expand("p", "Goal").await.unwrap_err();
        assert!(matches!(err, ExpandError::NotExecuting(_)));
    }

    #[tokio::test]
    async fn test_expand_rejects_depth_limit_tree_unchanged() {
        let store = StoreHandle::spawn();
        executing_parent(&store, "deep", MAX_SUBTASK_DEPTH).await;
        let bus = Arc::new(EventBus::with_default_capacity());
        let expander = SubtaskExpander::new(store.clone(), Some(Arc::new(StaticGenerator::new(seeds(3)))), bus);

        let err = expander.expand("deep", "Goal").await.unwrap_err();
        assert!(matches!(err, ExpandError::DepthLimit(3)));

        let snapshot = store.snapshot().await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert!(!snapshot[0].has_subtasks());
    }

    #[tokio::test]
    async fn test_expand_rejects_second_expansion() {
        let store = StoreHandle::spawn();
        executing_parent(&store, "p", 0).await;
        let bus = Arc::new(EventBus::with_default_capacity());
        let expander = SubtaskExpander::new(store.clone(), Some(Arc::new(StaticGenerator::new(seeds(3)))), bus);

        expander.expand("p", "Goal").await.unwrap();
        let err = expander.expand("p", "Goal").await.unwrap_err();
        assert!(matches!(err, ExpandError::AlreadyExpanded(_)));
        assert_eq!(store.find("p").await.unwrap().unwrap().children.len(), 3);
    }

    #[tokio::test]
    async fn test_generation_failure_falls_back() {
        let store = StoreHandle::spawn();
        executing_parent(&store, "p", 0).await;
        let bus = Arc::new(EventBus::with_default_capacity());
        let expander = SubtaskExpander::new(store, Some(Arc::new(StaticGenerator::failing())), bus);

        let children = expander.expand("p", "Goal").await.unwrap();
        assert_eq!(children.len(), 3);
        assert!(children.iter().all(|c| c.title.contains("Parent p")));
    }

    #[tokio::test]
    async fn test_no_generator_falls_back() {
        let store = StoreHandle::spawn();
        executing_parent(&store, "p", 0).await;
        let bus = Arc::new(EventBus::with_default_capacity());
        let expander = SubtaskExpander::new(store, None, bus);

        let children = expander.expand("p", "Goal").await.unwrap();
        assert_eq!(children.len(), 3);
    }

    #[tokio::test]
    async fn test_oversized_generation_clamped() {
        let store = StoreHandle::spawn();
        executing_parent(&store, "p", 0).await;
        let bus = Arc::new(EventBus::with_default_capacity());
        let expander = SubtaskExpander::new(store, Some(Arc::new(StaticGenerator::new(seeds(9)))), bus);

        let children = expander.expand("p", "Goal").await.unwrap();
        assert_eq!(children.len(), MAX_SUBTASKS);
    }

    #[tokio::test]
    async fn test_missing_task_rejected() {
        let store = StoreHandle::spawn();
        let bus = Arc::new(EventBus::with_default_capacity());
        let expander = SubtaskExpander::new(store, None, bus);

        let err = expander.expand("ghost", "Goal").await.unwrap_err();
        assert!(matches!(err, ExpandError::NotFound(_)));
    }
}
