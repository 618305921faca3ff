//! Objective persistence
//!
//! The objective list and active objective id survive across sessions as a
//! single JSON document under a fixed storage name in the data dir. The core
//! has no opinion on the medium; this module is the only place that touches
//! it.

use std::fs;
use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::{Objective, Task};

/// Fixed storage file name under the data dir
pub const STORAGE_FILE: &str = "objectives.json";

/// One objective together with its task tree (flat, walk order)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredObjective {
    pub objective: Objective,
    pub tasks: Vec<Task>,
}

/// Everything persisted across sessions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistedState {
    pub objectives: Vec<StoredObjective>,
    pub active: Option<String>,
}

/// JSON-backed storage for the persisted state
pub struct Storage {
    path: PathBuf,
}

impl Storage {
    /// Store under `<dir>/objectives.json`
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(STORAGE_FILE),
        }
    }

    /// Load persisted state
    ///
    /// A missing file is a fresh start; a corrupt file is logged and treated
    /// the same rather than bricking startup.
    pub fn load(&self) -> PersistedState {
        debug!(path = %self.path.display(), "Storage::load: called");
        if !self.path.exists() {
            return PersistedState::default();
        }

        match fs::read_to_string(&self.path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(state) => state,
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "Corrupt state file, starting fresh");
                    PersistedState::default()
                }
            },
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Unreadable state file, starting fresh");
                PersistedState::default()
            }
        }
    }

    /// Save persisted state (called on every mutation)
    pub fn save(&self, state: &PersistedState) -> Result<()> {
        debug!(path = %self.path.display(), objectives = state.objectives.len(), "Storage::save: called");
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).context("Failed to create storage directory")?;
        }
        let json = serde_json::to_string_pretty(state).context("Failed to serialize state")?;
        fs::write(&self.path, json).context("Failed to write state file")?;
        Ok(())
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }
}
