//! Scheduler engine
//!
//! The cooperative control loop: one tick inspects the task tree, decides
//! whether anything may start, and applies at most one transition. Exactly
//! one task is ever in flight; `pause` stops new selections but never aborts
//! the task already running.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use crate::domain::{Objective, Task, TaskStatus};
use crate::events::{EngineEvent, EventBus, UnmetDependency};
use crate::lifecycle::LifecycleEmitter;
use crate::resolver;
use crate::store::{StoreError, StoreHandle};

use super::config::EngineConfig;

/// Derived engine state; computed from a snapshot, never stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Processing is off and nothing is running
    Idle,
    /// Processing is on and an eligible task is about to be selected
    Selecting,
    /// One task executing, more pending behind it
    Running,
    /// One task executing, nothing pending behind it
    Draining,
    /// Pending tasks exist but none are eligible
    Blocked,
    /// Every task completed
    Done,
}

/// Outcome of a single tick
#[derive(Debug, Clone)]
pub enum Tick {
    /// A task is already in flight; the tick is a no-op
    InFlight,
    /// A task moved pending -> executing
    Started { task_id: String },
    /// Pending tasks exist but none are eligible; processing stopped
    Blocked { unmet: Vec<UnmetDependency> },
    /// Every task completed; processing stopped
    Done,
    /// No pending or executing tasks remain; processing stopped
    Drained,
}

/// Terminal result of driving the engine with `run`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// All tasks completed
    Done,
    /// Halted on unmet dependencies; needs a task edit and a new start
    Blocked,
    /// Tree was empty or emptied out from under the run
    Drained,
    /// Paused externally; the in-flight task was allowed to finish
    Paused,
}

/// The autonomous task-execution engine for one objective
pub struct Engine {
    store: StoreHandle,
    lifecycle: Arc<LifecycleEmitter>,
    bus: Arc<EventBus>,
    config: EngineConfig,
    objective: Objective,
    processing: AtomicBool,
    done_emitted: AtomicBool,
}

impl Engine {
    pub fn new(
        objective: Objective,
        store: StoreHandle,
        lifecycle: Arc<LifecycleEmitter>,
        bus: Arc<EventBus>,
        config: EngineConfig,
    ) -> Self {
        debug!(objective_id = %objective.id, "Engine::new: called");
        Self {
            store,
            lifecycle,
            bus,
            config,
            objective,
            processing: AtomicBool::new(false),
            done_emitted: AtomicBool::new(false),
        }
    }

    /// Turn processing on; the loop never self-resumes from Blocked
    pub fn start(&self) {
        debug!(objective_id = %self.objective.id, "Engine::start: called");
        self.processing.store(true, Ordering::SeqCst);
    }

    /// Turn processing off; an in-flight task still runs to completion
    pub fn pause(&self) {
        debug!(objective_id = %self.objective.id, "Engine::pause: called");
        self.processing.store(false, Ordering::SeqCst);
    }

    /// Whether the loop may issue new selections
    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::SeqCst)
    }

    /// The objective this engine is bound to
    pub fn objective(&self) -> &Objective {
        &self.objective
    }

    /// Derive the engine state from a snapshot
    pub fn state(&self, snapshot: &[Task]) -> EngineState {
        let executing = snapshot.iter().filter(|t| t.status == TaskStatus::Executing).count();
        let pending: Vec<&Task> = snapshot.iter().filter(|t| t.status == TaskStatus::Pending).collect();

        if executing > 0 {
            return if pending.is_empty() {
                EngineState::Draining
            } else {
                EngineState::Running
            };
        }
        if !snapshot.is_empty() && snapshot.iter().all(|t| t.status == TaskStatus::Completed) {
            return EngineState::Done;
        }
        if !self.is_processing() {
            return EngineState::Idle;
        }
        let completed: HashSet<String> = completed_ids(snapshot);
        if resolver::next_eligible(&pending, &completed).is_some() {
            EngineState::Selecting
        } else {
            EngineState::Blocked
        }
    }

    /// One evaluation of the scheduler loop
    ///
    /// Invoked whenever processing is on and the task tree changed or the
    /// simulated execution delay elapsed. Applies at most one transition.
    pub async fn tick(&self) -> Result<Tick, StoreError> {
        let snapshot = self.store.snapshot().await?;

        // At-most-one-in-flight: a tick that finds a running task is a no-op
        if snapshot.iter().any(|t| t.status == TaskStatus::Executing) {
            debug!("Engine::tick: task in flight, no-op");
            return Ok(Tick::InFlight);
        }

        let pending: Vec<&Task> = snapshot.iter().filter(|t| t.status == TaskStatus::Pending).collect();

        if pending.is_empty() {
            self.processing.store(false, Ordering::SeqCst);
            if !snapshot.is_empty() && snapshot.iter().all(|t| t.status == TaskStatus::Completed) {
                // Fire the completion event exactly once; later no-op ticks
                // find the latch already set
                if !self.done_emitted.swap(true, Ordering::SeqCst) {
                    info!(objective_id = %self.objective.id, "Engine::tick: objective complete");
                    self.lifecycle.objective_completed(&self.objective, &snapshot).await;
                }
                return Ok(Tick::Done);
            }
            debug!("Engine::tick: no pending or executing tasks, stopping");
            return Ok(Tick::Drained);
        }

        // Pending work exists again: re-arm the completion latch
        self.done_emitted.store(false, Ordering::SeqCst);

        let completed = completed_ids(&snapshot);
        match resolver::next_eligible(&pending, &completed) {
            Some(task) => {
                let started = self.store.set_status(&task.id, TaskStatus::Executing).await?;
                debug!(task_id = %started.id, "Engine::tick: task started");
                self.bus.emit(EngineEvent::TaskStarted {
                    task_id: started.id.clone(),
                    title: started.title.clone(),
                });
                Ok(Tick::Started { task_id: started.id })
            }
            None => {
                self.processing.store(false, Ordering::SeqCst);
                let unmet: Vec<UnmetDependency> = resolver::unmet_dependencies(&pending, &completed)
                    .into_iter()
                    .map(|(task_id, missing)| UnmetDependency { task_id, missing })
                    .collect();
                warn!(
                    pending = pending.len(),
                    "Engine::tick: blocked, pending tasks have unmet dependencies"
                );
                self.bus.emit(EngineEvent::Blocked {
                    pending: pending.len(),
                    unmet: unmet.clone(),
                });
                Ok(Tick::Blocked { unmet })
            }
        }
    }

    /// Drive ticks until the objective is done, blocked, drained, or paused
    ///
    /// Each started task is run through the simulated bounded execution (a
    /// real executor collaborator would be invoked instead), then completed
    /// and fed to the lifecycle emitter.
    pub async fn run(&self) -> Result<RunOutcome, StoreError> {
        debug!(objective_id = %self.objective.id, "Engine::run: called");
        loop {
            if !self.is_processing() {
                debug!("Engine::run: processing off, pausing");
                return Ok(RunOutcome::Paused);
            }

            match self.tick().await? {
                Tick::Started { task_id } => {
                    tokio::time::sleep(self.config.execution_delay()).await;
                    let task = self.store.set_status(&task_id, TaskStatus::Completed).await?;
                    self.lifecycle.task_completed(&task).await;
                }
                Tick::InFlight => {
                    // Another driver owns the in-flight task; wait out one
                    // execution delay before looking again
                    tokio::time::sleep(self.config.execution_delay()).await;
                }
                Tick::Blocked { .. } => return Ok(RunOutcome::Blocked),
                Tick::Done => return Ok(RunOutcome::Done),
                Tick::Drained => return Ok(RunOutcome::Drained),
            }
        }
    }
}

fn completed_ids(snapshot: &[Task]) -> HashSet<String> {
    snapshot
        .iter()
        .filter(|t| t.status == TaskStatus::Completed)
        .map(|t| t.id.clone())
        .collect()
}
