//! Scheduler engine configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Engine tuning knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Simulated per-task execution delay in milliseconds
    ///
    /// Stands in for a real task executor collaborator; each selected task
    /// runs for exactly this long before completing.
    #[serde(rename = "execution-delay-ms")]
    pub execution_delay_ms: u64,

    /// Most recent completions kept in the bounded history
    #[serde(rename = "history-cap")]
    pub history_cap: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            execution_delay_ms: 1500,
            history_cap: 50,
        }
    }
}

impl EngineConfig {
    /// Execution delay as a Duration
    pub fn execution_delay(&self) -> Duration {
        Duration::from_millis(self.execution_delay_ms)
    }
}
