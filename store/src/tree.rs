//! Rebuild a task hierarchy from flat rows.

use std::collections::{HashMap, HashSet};

use goalplan_planner::{Task, TaskId, TaskNode};

/// Nest `tasks` under their parents, siblings ordered by `order_idx` then id.
/// A task whose parent is not in `tasks` is treated as a root.
pub fn build_tree(tasks: Vec<Task>) -> Vec<TaskNode> {
    let ids: HashSet<TaskId> = tasks.iter().map(|t| t.id).collect();

    let mut children: HashMap<Option<TaskId>, Vec<Task>> = HashMap::new();
    for task in tasks {
        let parent = task.parent_id.filter(|p| ids.contains(p));
        children.entry(parent).or_default().push(task);
    }
    for siblings in children.values_mut() {
        siblings.sort_by_key(|t| (t.order_idx, t.id));
    }

    attach(None, &mut children)
}

fn attach(parent: Option<TaskId>, children: &mut HashMap<Option<TaskId>, Vec<Task>>) -> Vec<TaskNode> {
    let siblings = children.remove(&parent).unwrap_or_default();
    siblings
        .into_iter()
        .map(|task| {
            let subtasks = attach(Some(task.id), children);
            TaskNode { task, subtasks }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use goalplan_planner::TaskStatus;

    fn task(id: TaskId, parent_id: Option<TaskId>, order_idx: i64) -> Task {
        Task {
            id,
            title: format!("t{id}"),
            description: None,
            goal_id: 1,
            parent_id,
            created_at: Utc::now(),
            order_idx,
            status: TaskStatus::Active,
        }
    }

    #[test]
    fn test_empty() {
        assert!(build_tree(vec![]).is_empty());
    }

    #[test]
    fn test_orders_siblings_and_nests() {
        let tree = build_tree(vec![
            task(3, Some(1), 1),
            task(1, None, 1),
            task(2, None, 0),
            task(4, Some(1), 0),
            task(5, Some(4), 0),
        ]);

        let roots: Vec<TaskId> = tree.iter().map(|n| n.task.id).collect();
        assert_eq!(roots, vec![2, 1]);
        let under_one: Vec<TaskId> = tree[1].subtasks.iter().map(|n| n.task.id).collect();
        assert_eq!(under_one, vec![4, 3]);
        assert_eq!(tree[1].subtasks[0].subtasks[0].task.id, 5);
    }

    #[test]
    fn test_ties_broken_by_id() {
        let tree = build_tree(vec![task(9, None, 0), task(7, None, 0)]);
        assert_eq!(tree[0].task.id, 7);
    }

    #[test]
    fn test_missing_parent_promoted_to_root() {
        let tree = build_tree(vec![task(2, Some(99), 0)]);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].task.id, 2);
    }

    #[test]
    fn test_serializes_with_nested_subtasks() {
        let tree = build_tree(vec![task(1, None, 0), task(2, Some(1), 0)]);
        let json = serde_json::to_value(&tree).unwrap();
        assert_eq!(json[0]["id"], 1);
        assert_eq!(json[0]["status"], "active");
        assert_eq!(json[0]["subtasks"][0]["id"], 2);
        assert_eq!(json[0]["subtasks"][0]["subtasks"], serde_json::json!([]));
    }
}
