//! StoreManager - actor that owns the TaskStore
//!
//! All mutations flow through one mpsc channel, so every transition is
//! applied atomically with respect to a scheduler tick: no observer ever
//! sees a half-applied change. Mutations additionally broadcast a
//! `TreeEvent` that re-triggers the scheduler and save-on-mutation.

use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info};

use crate::domain::{Task, TaskSeed, TaskStatus};

use super::messages::{StoreCommand, StoreError, StoreResponse, TreeEvent};
use super::tree::{TaskStore, TaskUpdate};

/// Capacity of the command channel
const COMMAND_CAPACITY: usize = 256;

/// Capacity of the tree-event broadcast channel
const EVENT_CAPACITY: usize = 64;

/// Handle to send commands to the store actor
#[derive(Clone)]
pub struct StoreHandle {
    tx: mpsc::Sender<StoreCommand>,
    event_tx: broadcast::Sender<TreeEvent>,
}

impl StoreHandle {
    /// Spawn a store actor around an empty arena
    pub fn spawn() -> Self {
        Self::spawn_with(TaskStore::new())
    }

    /// Spawn a store actor around an existing arena (persistence restore)
    pub fn spawn_with(store: TaskStore) -> Self {
        debug!(task_count = store.len(), "StoreHandle::spawn_with: called");
        let (tx, rx) = mpsc::channel(COMMAND_CAPACITY);
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);

        tokio::spawn(actor_loop(store, rx, event_tx.clone()));
        info!("Task store actor spawned");

        Self { tx, event_tx }
    }

    /// Subscribe to tree change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<TreeEvent> {
        self.event_tx.subscribe()
    }

    async fn request<T>(
        &self,
        command: StoreCommand,
        reply_rx: oneshot::Receiver<StoreResponse<T>>,
    ) -> StoreResponse<T> {
        self.tx.send(command).await.map_err(|_| StoreError::ChannelClosed)?;
        reply_rx.await.map_err(|_| StoreError::ChannelClosed)?
    }

    /// Insert a top-level task
    pub async fn insert(&self, task: Task) -> StoreResponse<String> {
        debug!(task_id = %task.id, "StoreHandle::insert: called");
        let (reply, reply_rx) = oneshot::channel();
        self.request(StoreCommand::Insert { task, reply }, reply_rx).await
    }

    /// Apply a status transition
    pub async fn set_status(&self, id: &str, status: TaskStatus) -> StoreResponse<Task> {
        debug!(%id, %status, "StoreHandle::set_status: called");
        let (reply, reply_rx) = oneshot::channel();
        self.request(
            StoreCommand::SetStatus {
                id: id.to_string(),
                status,
                reply,
            },
            reply_rx,
        )
        .await
    }

    /// Attach generated subtasks under a parent
    pub async fn attach_subtasks(&self, parent_id: &str, seeds: Vec<TaskSeed>) -> StoreResponse<Vec<Task>> {
        debug!(%parent_id, seed_count = seeds.len(), "StoreHandle::attach_subtasks: called");
        let (reply, reply_rx) = oneshot::channel();
        self.request(
            StoreCommand::AttachSubtasks {
                parent_id: parent_id.to_string(),
                seeds,
                reply,
            },
            reply_rx,
        )
        .await
    }

    /// Edit task fields; dependency edits are cycle-validated
    pub async fn update_task(&self, id: &str, update: TaskUpdate) -> StoreResponse<Task> {
        debug!(%id, "StoreHandle::update_task: called");
        let (reply, reply_rx) = oneshot::channel();
        self.request(
            StoreCommand::UpdateTask {
                id: id.to_string(),
                update,
                reply,
            },
            reply_rx,
        )
        .await
    }

    /// Remove a task and its subtree
    pub async fn remove_task(&self, id: &str) -> StoreResponse<Vec<String>> {
        debug!(%id, "StoreHandle::remove_task: called");
        let (reply, reply_rx) = oneshot::channel();
        self.request(StoreCommand::RemoveTask { id: id.to_string(), reply }, reply_rx)
            .await
    }

    /// Clear the whole tree (objective reset)
    pub async fn clear(&self) -> StoreResponse<()> {
        debug!("StoreHandle::clear: called");
        let (reply, reply_rx) = oneshot::channel();
        self.request(StoreCommand::Clear { reply }, reply_rx).await
    }

    /// Replace the whole tree (objective switch)
    pub async fn replace_all(&self, tasks: Vec<Task>) -> StoreResponse<()> {
        debug!(task_count = tasks.len(), "StoreHandle::replace_all: called");
        let (reply, reply_rx) = oneshot::channel();
        self.request(StoreCommand::ReplaceAll { tasks, reply }, reply_rx).await
    }

    /// All tasks, nested subtasks included, in walk order
    pub async fn snapshot(&self) -> StoreResponse<Vec<Task>> {
        let (reply, reply_rx) = oneshot::channel();
        self.request(StoreCommand::Snapshot { reply }, reply_rx).await
    }

    /// Tasks with the given status
    pub async fn by_status(&self, status: TaskStatus) -> StoreResponse<Vec<Task>> {
        let (reply, reply_rx) = oneshot::channel();
        self.request(StoreCommand::ByStatus { status, reply }, reply_rx).await
    }

    /// Look up a single task
    pub async fn find(&self, id: &str) -> StoreResponse<Option<Task>> {
        let (reply, reply_rx) = oneshot::channel();
        self.request(StoreCommand::Find { id: id.to_string(), reply }, reply_rx)
            .await
    }

    /// Stop the actor
    pub async fn shutdown(&self) {
        debug!("StoreHandle::shutdown: called");
        let _ = self.tx.send(StoreCommand::Shutdown).await;
    }
}

/// The actor: processes commands one at a time until shutdown
async fn actor_loop(
    mut store: TaskStore,
    mut rx: mpsc::Receiver<StoreCommand>,
    event_tx: broadcast::Sender<TreeEvent>,
) {
    debug!("store actor_loop: started");

    while let Some(command) = rx.recv().await {
        match command {
            StoreCommand::Insert { task, reply } => {
                let result = store.insert(task);
                if result.is_ok() {
                    let _ = event_tx.send(TreeEvent::Added { count: 1 });
                }
                let _ = reply.send(result);
            }
            StoreCommand::SetStatus { id, status, reply } => {
                let result = store.set_status(&id, status);
                if result.is_ok() {
                    let _ = event_tx.send(TreeEvent::StatusChanged { id, status });
                }
                let _ = reply.send(result);
            }
            StoreCommand::AttachSubtasks { parent_id, seeds, reply } => {
                let result = store.attach_subtasks(&parent_id, seeds);
                if let Ok(children) = &result {
                    let _ = event_tx.send(TreeEvent::Added { count: children.len() });
                }
                let _ = reply.send(result);
            }
            StoreCommand::UpdateTask { id, update, reply } => {
                let result = store.update_task(&id, update);
                if result.is_ok() {
                    let _ = event_tx.send(TreeEvent::Updated { id });
                }
                let _ = reply.send(result);
            }
            StoreCommand::RemoveTask { id, reply } => {
                let result = store.remove_task(&id);
                if let Ok(ids) = &result {
                    let _ = event_tx.send(TreeEvent::Removed { ids: ids.clone() });
                }
                let _ = reply.send(result);
            }
            StoreCommand::Clear { reply } => {
                store.clear();
                let _ = event_tx.send(TreeEvent::Reset);
                let _ = reply.send(Ok(()));
            }
            StoreCommand::ReplaceAll { tasks, reply } => {
                store = TaskStore::from_tasks(tasks);
                let _ = event_tx.send(TreeEvent::Reset);
                let _ = reply.send(Ok(()));
            }
            StoreCommand::Snapshot { reply } => {
                let _ = reply.send(Ok(store.snapshot()));
            }
            StoreCommand::ByStatus { status, reply } => {
                let _ = reply.send(Ok(store.by_status(status)));
            }
            StoreCommand::Find { id, reply } => {
                let _ = reply.send(Ok(store.find(&id).cloned()));
            }
            StoreCommand::Shutdown => {
                debug!("store actor_loop: shutdown requested");
                break;
            }
        }
    }

    debug!("store actor_loop: stopped");
}
