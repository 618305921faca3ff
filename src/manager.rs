//! Objective management
//!
//! Owns the objective list: creation (with task generation and fallback),
//! selection, reset, and deletion. The store holds only the active
//! objective's tree; inactive trees live in the persisted state and are
//! swapped in on selection. Every mutation saves.

use std::sync::Arc;

use eyre::Result;
use tracing::{debug, info, warn};

use crate::domain::{Objective, ObjectiveStatus, Task};
use crate::events::{EngineEvent, EventBus};
use crate::generator::{TaskGenerator, fallback_tasks};
use crate::persistence::{PersistedState, Storage, StoredObjective};
use crate::store::StoreHandle;

/// Manages objectives and their persisted task trees
pub struct ObjectiveManager {
    store: StoreHandle,
    storage: Storage,
    generator: Option<Arc<dyn TaskGenerator>>,
    bus: Arc<EventBus>,
    state: PersistedState,
}

impl ObjectiveManager {
    /// Open the manager, loading persisted state and restoring the active
    /// objective's tree into the store
    pub async fn open(
        storage: Storage,
        store: StoreHandle,
        generator: Option<Arc<dyn TaskGenerator>>,
        bus: Arc<EventBus>,
    ) -> Result<Self> {
        let state = storage.load();
        debug!(objectives = state.objectives.len(), active = ?state.active, "ObjectiveManager::open");

        let manager = Self {
            store,
            storage,
            generator,
            bus,
            state,
        };

        if let Some(active) = manager.active() {
            manager.store.replace_all(active.tasks.clone()).await?;
        }
        Ok(manager)
    }

    /// Create a new objective and populate its tasks
    ///
    /// The generator is called exactly once; any failure (or no generator
    /// configured) falls back to the fixed task list so creation never
    /// blocks. The new objective becomes active.
    pub async fn create_objective(&mut self, title: &str, description: &str) -> Result<Objective> {
        info!(%title, "ObjectiveManager::create_objective");
        let mut objective = Objective::new(title, description);

        let (generated, fallback) = match &self.generator {
            Some(generator) => match generator.generate(title, description, None).await {
                Ok(generated) => (generated, false),
                Err(e) => {
                    warn!(error = %e, "Task generation failed, using fallback task list");
                    (fallback_tasks(), true)
                }
            },
            None => (fallback_tasks(), true),
        };

        objective.ai_insights = generated.insights;
        let tasks: Vec<Task> = generated
            .seeds
            .into_iter()
            .map(|seed| Task::from_seed(seed, 0, None))
            .collect();
        let count = tasks.len();

        self.stash_active().await?;
        self.store.replace_all(tasks).await?;

        self.bus.emit(EngineEvent::TasksGenerated {
            objective_id: objective.id.clone(),
            count,
            fallback,
        });

        let snapshot = self.store.snapshot().await?;
        self.state.objectives.insert(
            0,
            StoredObjective {
                objective: objective.clone(),
                tasks: snapshot,
            },
        );
        self.state.active = Some(objective.id.clone());
        self.save().await?;
        Ok(objective)
    }

    /// Persist current state, refreshing the active tree from the store
    pub async fn save(&mut self) -> Result<()> {
        if let Some(active_id) = self.state.active.clone() {
            let snapshot = self.store.snapshot().await?;
            if let Some(stored) = self.state.objectives.iter_mut().find(|s| s.objective.id == active_id) {
                stored.tasks = snapshot;
            }
        }
        self.storage.save(&self.state)
    }

    /// All objectives, newest first
    pub fn objectives(&self) -> &[StoredObjective] {
        &self.state.objectives
    }

    /// The active objective, if any
    pub fn active(&self) -> Option<&StoredObjective> {
        let active_id = self.state.active.as_deref()?;
        self.state.objectives.iter().find(|s| s.objective.id == active_id)
    }

    /// Find an objective by id
    pub fn find(&self, id: &str) -> Option<&StoredObjective> {
        self.state.objectives.iter().find(|s| s.objective.id == id)
    }

    /// Make another objective active, swapping its tree into the store
    pub async fn set_active(&mut self, id: &str) -> Result<()> {
        debug!(%id, "ObjectiveManager::set_active");
        let target = self
            .find(id)
            .ok_or_else(|| eyre::eyre!("Objective not found: {}", id))?
            .tasks
            .clone();

        self.stash_active().await?;
        self.store.replace_all(target).await?;
        self.state.active = Some(id.to_string());
        self.save().await
    }

    /// Reset an objective: clear all tasks back to the empty set, reactivate
    pub async fn reset_objective(&mut self, id: &str) -> Result<()> {
        info!(%id, "ObjectiveManager::reset_objective");
        let stored = self
            .state
            .objectives
            .iter_mut()
            .find(|s| s.objective.id == id)
            .ok_or_else(|| eyre::eyre!("Objective not found: {}", id))?;

        stored.tasks.clear();
        stored.objective.status = ObjectiveStatus::Active;

        if self.state.active.as_deref() == Some(id) {
            self.store.clear().await?;
        }
        self.save().await
    }

    /// Delete an objective entirely
    pub async fn delete_objective(&mut self, id: &str) -> Result<()> {
        info!(%id, "ObjectiveManager::delete_objective");
        let before = self.state.objectives.len();
        self.state.objectives.retain(|s| s.objective.id != id);
        if self.state.objectives.len() == before {
            return Err(eyre::eyre!("Objective not found: {}", id));
        }

        if self.state.active.as_deref() == Some(id) {
            self.state.active = None;
            self.store.clear().await?;
        }
        self.save().await
    }

    /// Update an objective's report-level status label
    pub async fn set_status(&mut self, id: &str, status: ObjectiveStatus) -> Result<()> {
        let stored = self
            .state
            .objectives
            .iter_mut()
            .find(|s| s.objective.id == id)
            .ok_or_else(|| eyre::eyre!("Objective not found: {}", id))?;
        stored.objective.status = status;
        self.save().await
    }

    /// Snapshot the active objective's tree back into the persisted state
    async fn stash_active(&mut self) -> Result<()> {
        if let Some(active_id) = self.state.active.clone() {
            let snapshot = self.store.snapshot().await?;
            if let Some(stored) = self.state.objectives.iter_mut().find(|s| s.objective.id == active_id) {
                stored.tasks = snapshot;
            }
        }
        Ok(())
    }
}
