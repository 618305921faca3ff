//! Lifecycle event emission
//!
//! Terminal transitions fan out from here: completed tasks land in a bounded
//! history (input for later prioritization heuristics), and a completed
//! objective is reported to every reflection sink exactly once. Sink
//! failures are logged and never surface as scheduler errors.

use std::collections::VecDeque;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::domain::{Objective, Task, TaskStatus, now_ms};
use crate::events::{EngineEvent, EventBus};

/// One completed task, as remembered by the bounded history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub task_id: String,
    pub title: String,
    pub priority: i32,
    pub completed_at: i64,
}

impl CompletionRecord {
    fn from_task(task: &Task) -> Self {
        Self {
            task_id: task.id.clone(),
            title: task.title.clone(),
            priority: task.priority,
            completed_at: task.completed_at.unwrap_or_else(now_ms),
        }
    }
}

/// Append-only bounded history of recent completions; oldest evicted first
#[derive(Debug)]
pub struct CompletionHistory {
    entries: VecDeque<CompletionRecord>,
    cap: usize,
}

impl CompletionHistory {
    pub fn new(cap: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(cap),
            cap,
        }
    }

    /// Append a record, evicting the oldest entry once full
    pub fn push(&mut self, record: CompletionRecord) {
        if self.entries.len() == self.cap {
            self.entries.pop_front();
        }
        self.entries.push_back(record);
    }

    /// Records from oldest to newest
    pub fn recent(&self) -> Vec<CompletionRecord> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Fire-and-forget collaborator notified when an objective completes
#[async_trait]
pub trait ReflectionSink: Send + Sync {
    async fn on_objective_completed(&self, objective: &Objective, tasks: &[Task]) -> eyre::Result<()>;
}

/// Knowledge-log line written per completed objective
#[derive(Debug, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub recorded_at: i64,
    pub objective_id: String,
    pub title: String,
    pub total_tasks: usize,
    pub insights: Option<String>,
}

/// Reflection sink appending completed-objective reports as JSONL
pub struct KnowledgeLog {
    path: PathBuf,
}

impl KnowledgeLog {
    /// Log to `<dir>/knowledge.jsonl`
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join("knowledge.jsonl"),
        }
    }

    /// Read back all entries (for inspection and tests)
    pub fn entries(&self) -> eyre::Result<Vec<KnowledgeEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)?;
        let mut entries = Vec::new();
        for line in content.lines().filter(|l| !l.trim().is_empty()) {
            match serde_json::from_str(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(line, error = %e, "KnowledgeLog: skipping bad line"),
            }
        }
        Ok(entries)
    }
}

#[async_trait]
impl ReflectionSink for KnowledgeLog {
    async fn on_objective_completed(&self, objective: &Objective, tasks: &[Task]) -> eyre::Result<()> {
        debug!(objective_id = %objective.id, "KnowledgeLog::on_objective_completed");
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let entry = KnowledgeEntry {
            recorded_at: now_ms(),
            objective_id: objective.id.clone(),
            title: objective.title.clone(),
            total_tasks: tasks.len(),
            insights: objective.ai_insights.clone(),
        };

        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{}", serde_json::to_string(&entry)?)?;
        Ok(())
    }
}

/// Fans terminal transitions out to the bus, the history, and the sinks
pub struct LifecycleEmitter {
    bus: Arc<EventBus>,
    history: Mutex<CompletionHistory>,
    sinks: Vec<Arc<dyn ReflectionSink>>,
}

impl LifecycleEmitter {
    pub fn new(bus: Arc<EventBus>, history_cap: usize) -> Self {
        Self {
            bus,
            history: Mutex::new(CompletionHistory::new(history_cap)),
            sinks: Vec::new(),
        }
    }

    /// Register a reflection sink
    pub fn with_sink(mut self, sink: Arc<dyn ReflectionSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Record a task's executing -> completed transition
    pub async fn task_completed(&self, task: &Task) {
        debug!(task_id = %task.id, "LifecycleEmitter::task_completed");
        self.history.lock().await.push(CompletionRecord::from_task(task));
        self.bus.emit(EngineEvent::TaskCompleted {
            task_id: task.id.clone(),
            title: task.title.clone(),
        });
    }

    /// Report a fully completed objective
    ///
    /// Callers guarantee the exactly-once property; this method just fans
    /// out. Sink failures are logged, never propagated.
    pub async fn objective_completed(&self, objective: &Objective, tasks: &[Task]) {
        debug!(objective_id = %objective.id, "LifecycleEmitter::objective_completed");
        let completed = tasks.iter().filter(|t| t.status == TaskStatus::Completed).count();
        self.bus.emit(EngineEvent::ObjectiveCompleted {
            objective_id: objective.id.clone(),
            title: objective.title.clone(),
            completed,
        });

        for sink in &self.sinks {
            if let Err(e) = sink.on_objective_completed(objective, tasks).await {
                warn!(objective_id = %objective.id, error = %e, "Reflection sink failed");
            }
        }
    }

    /// Recent completion records, oldest first
    pub async fn history(&self) -> Vec<CompletionRecord> {
        self.history.lock().await.recent()
    }
}
