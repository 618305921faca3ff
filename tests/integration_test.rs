//! Integration tests for GoalDaemon
//!
//! These tests verify end-to-end behavior of the engine, manager, and
//! expander working against the public API.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use tempfile::TempDir;

use goaldaemon::domain::{Objective, ObjectiveStatus, Task, TaskStatus};
use goaldaemon::events::{EngineEvent, EventBus};
use goaldaemon::expander::SubtaskExpander;
use goaldaemon::lifecycle::{KnowledgeLog, LifecycleEmitter};
use goaldaemon::manager::ObjectiveManager;
use goaldaemon::persistence::Storage;
use goaldaemon::resolver::next_eligible;
use goaldaemon::scheduler::{Engine, EngineConfig, RunOutcome};
use goaldaemon::store::StoreHandle;

fn fast_config() -> EngineConfig {
    EngineConfig {
        execution_delay_ms: 5,
        history_cap: 50,
    }
}

// =============================================================================
// Full Pipeline Tests
// =============================================================================

#[tokio::test]
async fn test_objective_runs_to_completion_end_to_end() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let storage = Storage::new(temp.path());
    let store = StoreHandle::spawn();
    let bus = Arc::new(EventBus::with_default_capacity());
    let mut rx = bus.subscribe();

    // No generator configured: creation falls back to the fixed task list
    let mut manager = ObjectiveManager::open(storage, store.clone(), None, bus.clone())
        .await
        .expect("Failed to open manager");
    let objective = manager
        .create_objective("Write the quarterly report", "Q3 numbers")
        .await
        .expect("Failed to create objective");

    let lifecycle = Arc::new(
        LifecycleEmitter::new(bus.clone(), 50).with_sink(Arc::new(KnowledgeLog::new(temp.path()))),
    );
    let engine = Engine::new(objective.clone(), store.clone(), lifecycle.clone(), bus, fast_config());

    engine.start();
    let outcome = engine.run().await.expect("Engine run failed");
    assert_eq!(outcome, RunOutcome::Done);

    // Every task completed, exactly once each
    let snapshot = store.snapshot().await.unwrap();
    assert_eq!(snapshot.len(), 8);
    assert!(snapshot.iter().all(|t| t.status == TaskStatus::Completed));
    assert_eq!(lifecycle.history().await.len(), 8);

    // One objective completion, |tasks| task completions
    let mut task_completions = 0;
    let mut objective_completions = 0;
    while let Ok(event) = rx.try_recv() {
        match event {
            EngineEvent::TaskCompleted { .. } => task_completions += 1,
            EngineEvent::ObjectiveCompleted { .. } => objective_completions += 1,
            _ => {}
        }
    }
    assert_eq!(task_completions, 8);
    assert_eq!(objective_completions, 1);

    // Reflection sink wrote exactly one knowledge entry
    let entries = KnowledgeLog::new(temp.path()).entries().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].objective_id, objective.id);

    // Persisted state reflects the completed tree
    manager.set_status(&objective.id, ObjectiveStatus::Completed).await.unwrap();
    manager.save().await.unwrap();
    let state = Storage::new(temp.path()).load();
    assert_eq!(state.objectives[0].objective.status, ObjectiveStatus::Completed);
    assert!(state.objectives[0].tasks.iter().all(|t| t.status == TaskStatus::Completed));
}

#[tokio::test]
async fn test_completion_order_respects_priority_and_dependencies() {
    let store = StoreHandle::spawn();

    // Task 2 outranks task 1 despite later insertion; task 3 outranks both
    // but stays gated until they complete
    for (id, priority, deps) in [("1", 2, vec![]), ("2", 1, vec![]), ("3", 0, vec!["1", "2"])] {
        let mut task = Task::with_id(id, format!("Task {}", id), priority);
        task.dependencies = deps.into_iter().map(String::from).collect();
        store.insert(task).await.unwrap();
    }

    let bus = Arc::new(EventBus::with_default_capacity());
    let mut rx = bus.subscribe();
    let lifecycle = Arc::new(LifecycleEmitter::new(bus.clone(), 50));
    let engine = Engine::new(
        Objective::with_id("o1", "Ordering", ""),
        store,
        lifecycle,
        bus,
        fast_config(),
    );

    engine.start();
    assert_eq!(engine.run().await.unwrap(), RunOutcome::Done);

    let mut started = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let EngineEvent::TaskStarted { task_id, .. } = event {
            started.push(task_id);
        }
    }
    // Task 3 has the lowest priority value but is gated until both complete
    assert_eq!(started, vec!["2", "1", "3"]);
}

// =============================================================================
// Blockage Tests
// =============================================================================

#[tokio::test]
async fn test_mutual_dependency_reports_blocked_never_done() {
    let store = StoreHandle::spawn();
    for (id, dep) in [("a", "b"), ("b", "a")] {
        let mut task = Task::with_id(id, format!("Task {}", id), 1);
        task.dependencies = vec![dep.to_string()];
        store.insert(task).await.unwrap();
    }

    let bus = Arc::new(EventBus::with_default_capacity());
    let mut rx = bus.subscribe();
    let lifecycle = Arc::new(LifecycleEmitter::new(bus.clone(), 50));
    let engine = Engine::new(
        Objective::with_id("o1", "Deadlocked", ""),
        store.clone(),
        lifecycle,
        bus,
        fast_config(),
    );

    engine.start();
    assert_eq!(engine.run().await.unwrap(), RunOutcome::Blocked);
    assert!(!engine.is_processing());

    let mut saw_blocked = false;
    while let Ok(event) = rx.try_recv() {
        assert_ne!(event.event_type(), "TaskStarted");
        assert_ne!(event.event_type(), "ObjectiveCompleted");
        if event.event_type() == "Blocked" {
            saw_blocked = true;
        }
    }
    assert!(saw_blocked);

    // No executing transitions were ever issued
    let snapshot = store.snapshot().await.unwrap();
    assert!(snapshot.iter().all(|t| t.status == TaskStatus::Pending));
    assert!(snapshot.iter().all(|t| t.started_at.is_none()));
}

// =============================================================================
// Expansion Tests
// =============================================================================

#[tokio::test]
async fn test_expansion_mid_flight_then_children_complete() {
    let store = StoreHandle::spawn();
    store.insert(Task::with_id("root", "Big task", 1)).await.unwrap();

    let bus = Arc::new(EventBus::with_default_capacity());
    let lifecycle = Arc::new(LifecycleEmitter::new(bus.clone(), 50));
    let engine = Engine::new(
        Objective::with_id("o1", "Decompose", ""),
        store.clone(),
        lifecycle,
        bus.clone(),
        fast_config(),
    );
    let expander = SubtaskExpander::new(store.clone(), None, bus);

    // Start the root task, then break it down while it is in flight
    engine.start();
    engine.tick().await.unwrap();
    let children = expander.expand("root", "Decompose").await.unwrap();
    assert_eq!(children.len(), 3);

    // The parent completes independently of its children
    store.set_status("root", TaskStatus::Completed).await.unwrap();
    let root = store.find("root").await.unwrap().unwrap();
    assert_eq!(root.status, TaskStatus::Completed);

    // The children are ordinary pending work picked up by the engine
    engine.start();
    assert_eq!(engine.run().await.unwrap(), RunOutcome::Done);
    let snapshot = store.snapshot().await.unwrap();
    assert_eq!(snapshot.len(), 4);
    assert!(snapshot.iter().all(|t| t.status == TaskStatus::Completed));
}

#[tokio::test]
async fn test_expansion_at_depth_bound_rejected_tree_unchanged() {
    let store = StoreHandle::spawn();
    let mut deep = Task::with_id("deep", "Deep task", 1);
    deep.depth = 3;
    store.insert(deep).await.unwrap();
    store.set_status("deep", TaskStatus::Executing).await.unwrap();

    let bus = Arc::new(EventBus::with_default_capacity());
    let expander = SubtaskExpander::new(store.clone(), None, bus);

    assert!(expander.expand("deep", "Goal").await.is_err());
    let snapshot = store.snapshot().await.unwrap();
    assert_eq!(snapshot.len(), 1);
    assert!(snapshot[0].children.is_empty());
}

// =============================================================================
// Invariant Tests
// =============================================================================

#[tokio::test]
async fn test_at_most_one_executing_throughout_run() {
    let store = StoreHandle::spawn();
    for i in 0..6 {
        store
            .insert(Task::with_id(format!("t{}", i), format!("Task {}", i), i))
            .await
            .unwrap();
    }

    let bus = Arc::new(EventBus::with_default_capacity());
    let lifecycle = Arc::new(LifecycleEmitter::new(bus.clone(), 50));
    let engine = Arc::new(Engine::new(
        Objective::with_id("o1", "Invariant", ""),
        store.clone(),
        lifecycle,
        bus,
        EngineConfig {
            execution_delay_ms: 10,
            history_cap: 50,
        },
    ));

    engine.start();
    let runner = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.run().await })
    };

    // Sample the executing count while the run is in progress
    for _ in 0..12 {
        let snapshot = store.snapshot().await.unwrap();
        let executing = snapshot.iter().filter(|t| t.status == TaskStatus::Executing).count();
        assert!(executing <= 1, "invariant violated: {} tasks executing", executing);
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert_eq!(runner.await.unwrap().unwrap(), RunOutcome::Done);
}

#[tokio::test]
async fn test_completed_tasks_had_all_dependencies_completed_first() {
    let store = StoreHandle::spawn();
    for (id, priority, deps) in [
        ("a", 3, vec![]),
        ("b", 2, vec!["a"]),
        ("c", 1, vec!["a", "b"]),
    ] {
        let mut task = Task::with_id(id, format!("Task {}", id), priority);
        task.dependencies = deps.into_iter().map(String::from).collect();
        store.insert(task).await.unwrap();
    }

    let bus = Arc::new(EventBus::with_default_capacity());
    let lifecycle = Arc::new(LifecycleEmitter::new(bus.clone(), 50));
    let engine = Engine::new(
        Objective::with_id("o1", "Deps", ""),
        store.clone(),
        lifecycle,
        bus,
        fast_config(),
    );
    engine.start();
    assert_eq!(engine.run().await.unwrap(), RunOutcome::Done);

    // Completion timestamps must respect the dependency edges
    let snapshot = store.snapshot().await.unwrap();
    let at = |id: &str| {
        snapshot
            .iter()
            .find(|t| t.id == id)
            .and_then(|t| t.completed_at)
            .unwrap()
    };
    assert!(at("a") <= at("b"));
    assert!(at("b") <= at("c"));
}

// =============================================================================
// Resolver Property Tests
// =============================================================================

proptest! {
    #[test]
    fn prop_selection_is_minimal_by_priority_then_creation(priorities in prop::collection::vec(0i32..10, 1..20)) {
        let tasks: Vec<Task> = priorities
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let mut t = Task::with_id(format!("t{}", i), format!("Task {}", i), *p);
                t.created_at = i as i64;
                t
            })
            .collect();
        let refs: Vec<&Task> = tasks.iter().collect();

        let selected = next_eligible(&refs, &HashSet::new()).unwrap();
        let min_key = tasks.iter().map(|t| (t.priority, t.created_at)).min().unwrap();
        prop_assert_eq!((selected.priority, selected.created_at), min_key);
    }

    #[test]
    fn prop_ineligible_tasks_never_selected(gate in 0usize..5) {
        // Tasks 0..5 all depend on a single missing id except one
        let mut tasks: Vec<Task> = (0..5)
            .map(|i| {
                let mut t = Task::with_id(format!("t{}", i), format!("Task {}", i), i as i32);
                t.created_at = i as i64;
                t.dependencies = vec!["missing".to_string()];
                t
            })
            .collect();
        tasks[gate].dependencies.clear();
        let refs: Vec<&Task> = tasks.iter().collect();

        let selected = next_eligible(&refs, &HashSet::new()).unwrap();
        let expected = format!("t{}", gate);
        prop_assert_eq!(selected.id.as_str(), expected.as_str());
    }
}
