//! Periodic progress evaluation
//!
//! An advisory side channel: at a configurable interval the evaluation timer
//! snapshots the task tree, asks a `ProgressEvaluator` for recommendations,
//! and publishes them on the event bus. This path never mutates task state.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::{Objective, Task, TaskStatus, now_ms};
use crate::events::{EngineEvent, EventBus};
use crate::store::StoreHandle;

/// A task is considered stuck once it has been executing this many times
/// longer than its own estimate.
const STUCK_FACTOR: i64 = 3;

/// Errors from progress evaluation
#[derive(Debug, Error)]
pub enum EvaluatorError {
    #[error("Evaluation failed: {0}")]
    Failed(String),
}

/// Kind of advisory recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    /// Plain progress summary
    Progress,
    /// An executing task is far over its estimate
    StuckTask,
    /// Remaining estimates or ordering look off
    Estimates,
}

/// Advisory output of an evaluation; never acted on automatically
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub kind: RecommendationKind,
    pub message: String,
}

impl Recommendation {
    pub fn new(kind: RecommendationKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Health-check collaborator for an in-progress objective
#[async_trait]
pub trait ProgressEvaluator: Send + Sync {
    async fn evaluate(&self, objective: &Objective, tasks: &[Task]) -> Result<Vec<Recommendation>, EvaluatorError>;
}

/// Local heuristic evaluator: progress percentage and stuck-task detection
///
/// A task counts as stuck when it has been executing longer than three times
/// its own estimate.
#[derive(Debug, Default)]
pub struct HeuristicEvaluator;

impl HeuristicEvaluator {
    /// Parse the leading integer out of an estimate like "15 minutes"
    fn estimate_minutes(estimate: &str) -> Option<i64> {
        let digits: String = estimate.chars().take_while(|c| c.is_ascii_digit()).collect();
        digits.parse().ok()
    }

    fn is_stuck(task: &Task, now: i64) -> bool {
        if task.status != TaskStatus::Executing {
            return false;
        }
        let (Some(started), Some(estimate)) = (task.started_at, task.estimated_time.as_deref()) else {
            return false;
        };
        let Some(minutes) = Self::estimate_minutes(estimate) else {
            return false;
        };
        now - started > STUCK_FACTOR * minutes * 60_000
    }
}

#[async_trait]
impl ProgressEvaluator for HeuristicEvaluator {
    async fn evaluate(&self, objective: &Objective, tasks: &[Task]) -> Result<Vec<Recommendation>, EvaluatorError> {
        debug!(objective_id = %objective.id, task_count = tasks.len(), "HeuristicEvaluator::evaluate: called");

        if tasks.is_empty() {
            return Ok(vec![Recommendation::new(
                RecommendationKind::Progress,
                "No tasks generated yet",
            )]);
        }

        let total = tasks.len();
        let completed = tasks.iter().filter(|t| t.status == TaskStatus::Completed).count();
        let percent = completed * 100 / total;

        let mut recommendations = vec![Recommendation::new(
            RecommendationKind::Progress,
            format!("{}/{} tasks completed ({}%)", completed, total, percent),
        )];

        let now = now_ms();
        for task in tasks.iter().filter(|t| Self::is_stuck(t, now)) {
            recommendations.push(Recommendation::new(
                RecommendationKind::StuckTask,
                format!(
                    "Task '{}' has been executing over {}x its estimate of {}",
                    task.title,
                    STUCK_FACTOR,
                    task.estimated_time.as_deref().unwrap_or("?")
                ),
            ));
        }

        if completed == 0 && tasks.iter().any(|t| t.status == TaskStatus::Executing) {
            recommendations.push(Recommendation::new(
                RecommendationKind::Estimates,
                "Nothing completed yet; estimates for the remaining tasks are unverified",
            ));
        }

        Ok(recommendations)
    }
}

/// Cancellable interval timer driving the evaluation path
///
/// Bound to one objective's identity: any change of interval or active
/// objective cancels the previous schedule and starts a fresh one. Each
/// evaluation reschedules relative to the previous one finishing.
pub struct EvaluationTimer {
    handle: Option<JoinHandle<()>>,
}

impl EvaluationTimer {
    pub fn new() -> Self {
        Self { handle: None }
    }

    /// Start (or restart) the schedule for the given objective
    pub fn start(
        &mut self,
        interval: Duration,
        objective: Objective,
        store: StoreHandle,
        evaluator: Arc<dyn ProgressEvaluator>,
        bus: Arc<EventBus>,
    ) {
        debug!(objective_id = %objective.id, ?interval, "EvaluationTimer::start: called");
        self.cancel();

        self.handle = Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;

                let tasks = match store.snapshot().await {
                    Ok(tasks) => tasks,
                    Err(_) => {
                        debug!("EvaluationTimer: store gone, stopping");
                        break;
                    }
                };

                match evaluator.evaluate(&objective, &tasks).await {
                    Ok(recommendations) if !recommendations.is_empty() => {
                        bus.emit(EngineEvent::EvaluationReady {
                            objective_id: objective.id.clone(),
                            recommendations,
                        });
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "EvaluationTimer: evaluation failed");
                    }
                }
            }
        }));
    }

    /// Cancel the schedule, if any
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            debug!("EvaluationTimer::cancel: aborting scheduled task");
            handle.abort();
        }
    }

    /// True while a schedule is installed
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Default for EvaluationTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for EvaluationTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
