//! TaskStore - the canonical task arena for the active objective
//!
//! Tasks are stored flat, keyed by id; the tree shape lives in `roots` and
//! each task's `children` list. Every transition is all-or-nothing: a
//! rejected edit leaves the arena untouched.

use std::collections::{HashMap, HashSet};

use crate::domain::{MAX_SUBTASK_DEPTH, Task, TaskSeed, TaskStatus, now_ms};
use crate::resolver::validate_dependency_graph;

use super::messages::{StoreError, StoreResponse};

/// Field edits applied through `update_task`; `None` leaves a field unchanged
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub priority: Option<i32>,
    pub category: Option<String>,
    pub estimated_time: Option<String>,
    pub dependencies: Option<Vec<String>>,
}

/// Arena of tasks for one objective
#[derive(Debug, Default)]
pub struct TaskStore {
    tasks: HashMap<String, Task>,
    roots: Vec<String>,
}

impl TaskStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from a flat task list (persistence restore)
    ///
    /// Root order follows the input order. No graph validation: persisted
    /// data from older versions may contain cycles, which the scheduler
    /// surfaces as blockage at runtime.
    pub fn from_tasks(tasks: Vec<Task>) -> Self {
        let mut store = Self::new();
        for task in tasks {
            if task.parent.is_none() {
                store.roots.push(task.id.clone());
            }
            store.tasks.insert(task.id.clone(), task);
        }
        store
    }

    /// Insert a top-level task (seeding and tests)
    ///
    /// Subtasks go through `attach_subtasks`; dependency edits through
    /// `update_task`, which is where graph validation lives.
    pub fn insert(&mut self, task: Task) -> StoreResponse<String> {
        if self.tasks.contains_key(&task.id) {
            return Err(StoreError::DuplicateId(task.id.clone()));
        }
        let id = task.id.clone();
        if task.parent.is_none() {
            self.roots.push(id.clone());
        }
        self.tasks.insert(id.clone(), task);
        Ok(id)
    }

    /// Apply a status transition
    ///
    /// Stamps `completed_at` exactly once at the transition into
    /// `Completed`. Rejects a second in-flight task: at most one task across
    /// the objective may be `Executing`.
    pub fn set_status(&mut self, id: &str, status: TaskStatus) -> StoreResponse<Task> {
        if status == TaskStatus::Executing
            && let Some(running) = self.tasks.values().find(|t| t.status == TaskStatus::Executing)
            && running.id != id
        {
            return Err(StoreError::AlreadyExecuting {
                running: running.id.clone(),
            });
        }

        let task = self
            .tasks
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if status == TaskStatus::Executing && task.status != TaskStatus::Executing {
            task.started_at = Some(now_ms());
        }
        if status == TaskStatus::Completed && task.status != TaskStatus::Completed {
            task.completed_at = Some(now_ms());
        }
        task.status = status;
        Ok(task.clone())
    }

    /// Attach generated subtasks under a parent
    ///
    /// Children land at `parent.depth + 1`, each `Pending` with no
    /// dependencies. Rejected wholesale when the parent already sits at the
    /// depth bound or was already expanded; no partial subtree is created.
    pub fn attach_subtasks(&mut self, parent_id: &str, seeds: Vec<TaskSeed>) -> StoreResponse<Vec<Task>> {
        let parent = self
            .tasks
            .get(parent_id)
            .ok_or_else(|| StoreError::NotFound(parent_id.to_string()))?;

        if parent.depth >= MAX_SUBTASK_DEPTH {
            return Err(StoreError::DepthLimit { depth: parent.depth });
        }
        if parent.has_subtasks() {
            return Err(StoreError::AlreadyExpanded {
                task: parent_id.to_string(),
            });
        }

        let depth = parent.depth + 1;
        let children: Vec<Task> = seeds
            .into_iter()
            .map(|seed| Task::from_seed(seed, depth, Some(parent_id.to_string())))
            .collect();

        let parent = self.tasks.get_mut(parent_id).expect("parent checked above");
        for child in &children {
            parent.children.push(child.id.clone());
        }
        for child in &children {
            self.tasks.insert(child.id.clone(), child.clone());
        }
        Ok(children)
    }

    /// Edit task fields
    ///
    /// Dependency edits are validated before anything is applied: unknown
    /// ids and self or cyclic references reject the whole edit, leaving the
    /// tree unchanged.
    pub fn update_task(&mut self, id: &str, update: TaskUpdate) -> StoreResponse<Task> {
        let mut edited = self
            .tasks
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?
            .clone();

        if let Some(title) = update.title {
            edited.title = title;
        }
        if let Some(priority) = update.priority {
            edited.priority = priority;
        }
        if let Some(category) = update.category {
            edited.category = Some(category);
        }
        if let Some(estimated_time) = update.estimated_time {
            edited.estimated_time = Some(estimated_time);
        }
        if let Some(dependencies) = update.dependencies {
            for dep in &dependencies {
                if dep == id {
                    return Err(StoreError::DependencyCycle {
                        path: vec![id.to_string(), id.to_string()],
                    });
                }
                if !self.tasks.contains_key(dep) {
                    return Err(StoreError::UnknownDependency {
                        task: id.to_string(),
                        dependency: dep.clone(),
                    });
                }
            }
            edited.dependencies = dependencies;

            let prospective: Vec<&Task> = self
                .tasks
                .values()
                .filter(|t| t.id != id)
                .chain(std::iter::once(&edited))
                .collect();
            validate_dependency_graph(prospective).map_err(|path| StoreError::DependencyCycle { path })?;
        }

        self.tasks.insert(id.to_string(), edited.clone());
        Ok(edited)
    }

    /// Remove a task and its whole subtree
    ///
    /// Removed ids are also stripped from every remaining dependency list so
    /// a deleted prerequisite cannot silently block its dependents forever.
    /// Returns the removed ids.
    pub fn remove_task(&mut self, id: &str) -> StoreResponse<Vec<String>> {
        if !self.tasks.contains_key(id) {
            return Err(StoreError::NotFound(id.to_string()));
        }

        let mut removed = Vec::new();
        self.collect_subtree(id, &mut removed);

        let removed_set: HashSet<&String> = removed.iter().collect();
        for task_id in &removed {
            self.tasks.remove(task_id);
        }
        self.roots.retain(|r| !removed_set.contains(r));
        for task in self.tasks.values_mut() {
            task.children.retain(|c| !removed_set.contains(c));
            task.dependencies.retain(|d| !removed_set.contains(d));
        }
        Ok(removed)
    }

    fn collect_subtree(&self, id: &str, out: &mut Vec<String>) {
        out.push(id.to_string());
        if let Some(task) = self.tasks.get(id) {
            for child in &task.children {
                self.collect_subtree(child, out);
            }
        }
    }

    /// Drop every task (objective reset)
    pub fn clear(&mut self) {
        self.tasks.clear();
        self.roots.clear();
    }

    /// All tasks, cloned, in pre-order walk of the roots
    pub fn snapshot(&self) -> Vec<Task> {
        let mut out = Vec::with_capacity(self.tasks.len());
        for root in &self.roots {
            self.walk(root, &mut out);
        }
        out
    }

    fn walk(&self, id: &str, out: &mut Vec<Task>) {
        if let Some(task) = self.tasks.get(id) {
            out.push(task.clone());
            for child in &task.children {
                self.walk(child, out);
            }
        }
    }

    /// Tasks with the given status, in walk order
    pub fn by_status(&self, status: TaskStatus) -> Vec<Task> {
        self.snapshot().into_iter().filter(|t| t.status == status).collect()
    }

    /// Look up a single task by id
    pub fn find(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    /// Number of tasks in the arena, nested subtasks included
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// True when no tasks exist
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Count of tasks currently executing; the invariant keeps this <= 1
    pub fn executing_count(&self) -> usize {
        self.tasks.values().filter(|t| t.status == TaskStatus::Executing).count()
    }
}
