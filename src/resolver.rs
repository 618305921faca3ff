//! Dependency resolution
//!
//! Decides which pending task may run next and validates that the dependency
//! graph stays acyclic. Selection is greedy and non-backtracking: it returns
//! the first eligible task in priority order and does not search for an
//! ordering that would unblock more tasks later. That is a deliberate
//! simplicity trade-off, not a bug.

use std::collections::{HashMap, HashSet};

use crate::domain::Task;

/// Select the next eligible task from the pending set
///
/// Pending tasks are stable-sorted ascending by `(priority, created_at)`, so
/// equal priorities preserve creation order. The first task whose every
/// dependency id is in `completed` wins. `None` means blockage: pending work
/// exists but nothing can start. Callers distinguish that from an empty
/// pending set, which is not an error.
pub fn next_eligible<'a>(pending: &[&'a Task], completed: &HashSet<String>) -> Option<&'a Task> {
    let mut candidates: Vec<&Task> = pending.to_vec();
    candidates.sort_by_key(|t| (t.priority, t.created_at));

    candidates.into_iter().find(|t| t.is_eligible(completed))
}

/// Collect, per pending task, the dependency ids that are not yet completed
///
/// Used to build the advisory blockage notice.
pub fn unmet_dependencies(pending: &[&Task], completed: &HashSet<String>) -> Vec<(String, Vec<String>)> {
    pending
        .iter()
        .map(|t| {
            let missing: Vec<String> = t
                .dependencies
                .iter()
                .filter(|dep| !completed.contains(*dep))
                .cloned()
                .collect();
            (t.id.clone(), missing)
        })
        .filter(|(_, missing)| !missing.is_empty())
        .collect()
}

/// Validate a dependency graph for cycles
///
/// Uses DFS to detect cycles. Returns Ok(()) if no cycles, Err with the
/// cycle path if found.
pub fn validate_dependency_graph<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Result<(), Vec<String>> {
    let task_map: HashMap<&str, &Task> = tasks.into_iter().map(|t| (t.id.as_str(), t)).collect();

    let mut visited = HashSet::new();
    let mut rec_stack = HashSet::new();
    let mut cycle_path = Vec::new();

    for task_id in task_map.keys() {
        if !visited.contains(task_id)
            && has_cycle_dfs(task_id, &task_map, &mut visited, &mut rec_stack, &mut cycle_path)
        {
            return Err(cycle_path);
        }
    }

    Ok(())
}

/// DFS helper for cycle detection
fn has_cycle_dfs<'a>(
    node: &'a str,
    graph: &HashMap<&'a str, &'a Task>,
    visited: &mut HashSet<&'a str>,
    rec_stack: &mut HashSet<&'a str>,
    cycle_path: &mut Vec<String>,
) -> bool {
    visited.insert(node);
    rec_stack.insert(node);
    cycle_path.push(node.to_string());

    if let Some(task) = graph.get(node) {
        for dep_id in &task.dependencies {
            if !visited.contains(dep_id.as_str()) {
                if graph.contains_key(dep_id.as_str())
                    && has_cycle_dfs(dep_id.as_str(), graph, visited, rec_stack, cycle_path)
                {
                    return true;
                }
            } else if rec_stack.contains(dep_id.as_str()) {
                cycle_path.push(dep_id.clone());
                return true;
            }
        }
    }

    rec_stack.remove(node);
    cycle_path.pop();
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskStatus;

    fn task(id: &str, priority: i32, deps: &[&str]) -> Task {
        let mut t = Task::with_id(id, format!("Task {}", id), priority);
        t.dependencies = deps.iter().map(|d| d.to_string()).collect();
        t
    }

    fn completed(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_lowest_priority_value_selected_first() {
        let a = task("1", 2, &[]);
        let b = task("2", 1, &[]);
        let pending = vec![&a, &b];

        let next = next_eligible(&pending, &completed(&[])).unwrap();
        assert_eq!(next.id, "2");
    }

    #[test]
    fn test_equal_priority_preserves_creation_order() {
        let mut a = task("1", 1, &[]);
        let mut b = task("2", 1, &[]);
        a.created_at = 100;
        b.created_at = 200;
        let pending = vec![&b, &a];

        let next = next_eligible(&pending, &completed(&[])).unwrap();
        assert_eq!(next.id, "1");
    }

    #[test]
    fn test_dependency_beats_priority() {
        // Task 1 has higher precedence but depends on task 2
        let a = task("1", 1, &["2"]);
        let b = task("2", 2, &[]);
        let pending = vec![&a, &b];

        let next = next_eligible(&pending, &completed(&[])).unwrap();
        assert_eq!(next.id, "2");

        // Once 2 completes, 1 becomes eligible
        let next = next_eligible(&[&a], &completed(&["2"])).unwrap();
        assert_eq!(next.id, "1");
    }

    #[test]
    fn test_none_means_blockage() {
        let a = task("1", 1, &["2"]);
        let b = task("2", 2, &["1"]);
        let pending = vec![&a, &b];

        assert!(next_eligible(&pending, &completed(&[])).is_none());
    }

    #[test]
    fn test_eligible_lower_priority_task_found_past_blocked_pair() {
        // A cyclic high-precedence pair does not hide an eligible straggler
        let a = task("1", 1, &["2"]);
        let b = task("2", 1, &["1"]);
        let c = task("3", 9, &[]);
        let pending = vec![&a, &b, &c];

        let next = next_eligible(&pending, &completed(&[])).unwrap();
        assert_eq!(next.id, "3");
    }

    #[test]
    fn test_non_pending_tasks_never_selected() {
        let mut a = task("1", 1, &[]);
        a.status = TaskStatus::Executing;
        let pending = vec![&a];

        assert!(next_eligible(&pending, &completed(&[])).is_none());
    }

    #[test]
    fn test_unmet_dependencies_reporting() {
        let a = task("1", 1, &["2", "3"]);
        let b = task("4", 1, &[]);
        let pending = vec![&a, &b];

        let unmet = unmet_dependencies(&pending, &completed(&["3"]));
        assert_eq!(unmet.len(), 1);
        assert_eq!(unmet[0].0, "1");
        assert_eq!(unmet[0].1, vec!["2".to_string()]);
    }

    #[test]
    fn test_cycle_detection_no_cycle() {
        let tasks = vec![task("1", 1, &[]), task("2", 1, &["1"]), task("3", 1, &["1", "2"])];
        assert!(validate_dependency_graph(&tasks).is_ok());
    }

    #[test]
    fn test_cycle_detection_with_cycle() {
        let tasks = vec![task("1", 1, &["3"]), task("2", 1, &["1"]), task("3", 1, &["2"])];
        assert!(validate_dependency_graph(&tasks).is_err());
    }

    #[test]
    fn test_cycle_detection_self_cycle() {
        let tasks = vec![task("1", 1, &["1"])];
        assert!(validate_dependency_graph(&tasks).is_err());
    }

    #[test]
    fn test_cycle_detection_ignores_external_ids() {
        // Dependencies on ids outside the set are not cycles
        let tasks = vec![task("1", 1, &["missing"])];
        assert!(validate_dependency_graph(&tasks).is_ok());
    }
}
