//! Tasks: creation with sibling ordering, batch insertion of generated
//! plans, updates, reordering and subtree deletion.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use goalplan_planner::{GoalId, NewTask, Task, TaskId, TaskNode, TaskStatus};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};

use crate::error::{found, Result, StoreError};
use crate::goals::fetch_goal;
use crate::tree::build_tree;
use crate::Store;

const TASK_COLUMNS: &str =
    "id, title, description, goal_id, parent_id, created_at, order_idx, status";

/// Partial update of a single task; `None` leaves the field unchanged
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub order_idx: Option<i64>,
}

/// One entry of a batch update
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskBatchUpdate {
    pub id: TaskId,
    pub title: Option<String>,
    pub status: Option<TaskStatus>,
    pub order_idx: Option<i64>,
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    let status: String = row.get(7)?;
    let status = status
        .parse::<TaskStatus>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e)))?;

    Ok(Task {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        goal_id: row.get(3)?,
        parent_id: row.get(4)?,
        created_at: row.get(5)?,
        order_idx: row.get(6)?,
        status,
    })
}

fn fetch_task(db: &Connection, task_id: TaskId) -> Result<Task> {
    found(
        db.query_row(
            &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
            [task_id],
            task_from_row,
        ),
        "task",
        task_id,
    )
}

fn non_blank(title: &str) -> Result<&str> {
    let title = title.trim();
    if title.is_empty() {
        return Err(StoreError::Invalid("task title must not be empty".into()));
    }
    Ok(title)
}

/// A task and its parent must belong to the same goal.
fn check_parent(db: &Connection, goal_id: GoalId, parent_id: Option<TaskId>) -> Result<()> {
    let Some(parent_id) = parent_id else {
        return Ok(());
    };
    let parent = fetch_task(db, parent_id)?;
    if parent.goal_id != goal_id {
        return Err(StoreError::Invalid(format!(
            "parent task {parent_id} belongs to goal {}, not goal {goal_id}",
            parent.goal_id
        )));
    }
    Ok(())
}

fn next_order(db: &Connection, goal_id: GoalId, parent_id: Option<TaskId>) -> Result<i64> {
    Ok(db.query_row(
        "SELECT COALESCE(MAX(order_idx) + 1, 0) FROM tasks WHERE goal_id = ?1 AND parent_id IS ?2",
        params![goal_id, parent_id],
        |row| row.get(0),
    )?)
}

fn insert_row(db: &Connection, task: &NewTask) -> Result<Task> {
    let created_at = Utc::now();
    db.execute(
        "INSERT INTO tasks (title, description, goal_id, parent_id, created_at, order_idx, status) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            task.title,
            task.description,
            task.goal_id,
            task.parent_id,
            created_at,
            task.order_idx,
            task.status.as_str(),
        ],
    )?;

    Ok(Task {
        id: db.last_insert_rowid(),
        title: task.title.clone(),
        description: Some(task.description.clone()),
        goal_id: task.goal_id,
        parent_id: task.parent_id,
        created_at,
        order_idx: task.order_idx,
        status: task.status,
    })
}

fn list_siblings(db: &Connection, goal_id: GoalId, parent_id: Option<TaskId>) -> Result<Vec<Task>> {
    let mut stmt = db.prepare(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks WHERE goal_id = ?1 AND parent_id IS ?2 \
         ORDER BY order_idx ASC, id ASC"
    ))?;
    let tasks = stmt
        .query_map(params![goal_id, parent_id], task_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(tasks)
}

impl Store {
    /// The `order_idx` a new sibling under (`goal_id`, `parent_id`) should get:
    /// one past the current maximum, or 0 for the first child.
    pub fn next_order_idx(&self, goal_id: GoalId, parent_id: Option<TaskId>) -> Result<i64> {
        next_order(&self.conn(), goal_id, parent_id)
    }

    /// Create one task at the end of its sibling list
    pub fn create_task(
        &self,
        goal_id: GoalId,
        parent_id: Option<TaskId>,
        title: &str,
        description: Option<&str>,
    ) -> Result<Task> {
        let title = non_blank(title)?;

        let mut db = self.conn();
        let tx = db.transaction()?;
        fetch_goal(&tx, goal_id)?;
        check_parent(&tx, goal_id, parent_id)?;

        let new_task = NewTask {
            title: title.to_string(),
            description: description.unwrap_or_default().to_string(),
            goal_id,
            parent_id,
            order_idx: next_order(&tx, goal_id, parent_id)?,
            status: TaskStatus::Active,
        };
        let task = insert_row(&tx, &new_task)?;
        tx.commit()?;

        tracing::info!(task_id = task.id, goal_id, parent_id = ?parent_id, "Task created");
        Ok(task)
    }

    /// Persist a batch of unpersisted tasks (typically a generated plan) in
    /// one transaction. Either every task is stored or none is. Returns the
    /// stored tasks in input order.
    pub fn insert_tasks(&self, tasks: &[NewTask]) -> Result<Vec<Task>> {
        self.insert_batch(tasks, false)
    }

    /// Like [`Store::insert_tasks`], but each sibling group in the batch is
    /// moved to start right after the group's existing children. The offset
    /// is read inside the insert transaction, so concurrent batches for the
    /// same parent never share an `order_idx`. Relative order within the
    /// batch is kept.
    pub fn append_tasks(&self, tasks: &[NewTask]) -> Result<Vec<Task>> {
        self.insert_batch(tasks, true)
    }

    fn insert_batch(&self, tasks: &[NewTask], append: bool) -> Result<Vec<Task>> {
        let mut db = self.conn();
        let tx = db.transaction()?;

        // lowest order_idx per sibling group in the batch
        let mut batch_start: HashMap<(GoalId, Option<TaskId>), i64> = HashMap::new();
        for task in tasks {
            batch_start
                .entry((task.goal_id, task.parent_id))
                .and_modify(|min| *min = (*min).min(task.order_idx))
                .or_insert(task.order_idx);
        }

        let mut known_goals: HashSet<GoalId> = HashSet::new();
        let mut shifts: HashMap<(GoalId, Option<TaskId>), i64> = HashMap::new();
        let mut stored = Vec::with_capacity(tasks.len());
        for task in tasks {
            if known_goals.insert(task.goal_id) {
                fetch_goal(&tx, task.goal_id)?;
            }
            check_parent(&tx, task.goal_id, task.parent_id)?;

            let group = (task.goal_id, task.parent_id);
            let shift = if append {
                match shifts.get(&group) {
                    Some(&shift) => shift,
                    None => {
                        let start = batch_start.get(&group).copied().unwrap_or_default();
                        let shift = next_order(&tx, task.goal_id, task.parent_id)? - start;
                        shifts.insert(group, shift);
                        shift
                    }
                }
            } else {
                0
            };

            let task = NewTask {
                title: non_blank(&task.title)?.to_string(),
                order_idx: task.order_idx + shift,
                ..task.clone()
            };
            stored.push(insert_row(&tx, &task)?);
        }

        tx.commit()?;
        tracing::info!(count = stored.len(), append, "Inserted task batch");
        Ok(stored)
    }

    pub fn get_task(&self, task_id: TaskId) -> Result<Task> {
        fetch_task(&self.conn(), task_id)
    }

    /// Every task of a goal, flat, grouped by parent and ordered among siblings
    pub fn list_tasks(&self, goal_id: GoalId) -> Result<Vec<Task>> {
        let db = self.conn();
        fetch_goal(&db, goal_id)?;
        let mut stmt = db.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE goal_id = ?1 \
             ORDER BY parent_id IS NOT NULL, parent_id, order_idx, id"
        ))?;
        let tasks = stmt
            .query_map([goal_id], task_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tasks)
    }

    /// Direct children of `parent_id` (or the goal's roots), ordered
    pub fn list_children(&self, goal_id: GoalId, parent_id: Option<TaskId>) -> Result<Vec<Task>> {
        list_siblings(&self.conn(), goal_id, parent_id)
    }

    /// The goal's tasks as a nested tree
    pub fn task_tree(&self, goal_id: GoalId) -> Result<Vec<TaskNode>> {
        Ok(build_tree(self.list_tasks(goal_id)?))
    }

    pub fn update_task(&self, task_id: TaskId, update: &TaskUpdate) -> Result<Task> {
        let mut db = self.conn();
        let tx = db.transaction()?;
        let mut task = fetch_task(&tx, task_id)?;

        if let Some(title) = &update.title {
            task.title = non_blank(title)?.to_string();
        }
        if let Some(description) = &update.description {
            task.description = Some(description.clone());
        }
        if let Some(status) = update.status {
            task.status = status;
        }
        if let Some(order_idx) = update.order_idx {
            task.order_idx = order_idx;
        }

        tx.execute(
            "UPDATE tasks SET title = ?1, description = ?2, status = ?3, order_idx = ?4 WHERE id = ?5",
            params![
                task.title,
                task.description,
                task.status.as_str(),
                task.order_idx,
                task_id
            ],
        )?;
        tx.commit()?;
        Ok(task)
    }

    /// Apply several updates atomically. An unknown id aborts the whole
    /// batch. Returns the number of tasks updated.
    pub fn batch_update(&self, updates: &[TaskBatchUpdate]) -> Result<usize> {
        if updates.is_empty() {
            return Err(StoreError::Invalid("no updates provided".into()));
        }

        let mut db = self.conn();
        let tx = db.transaction()?;
        for update in updates {
            fetch_task(&tx, update.id)?;
            if let Some(title) = &update.title {
                tx.execute(
                    "UPDATE tasks SET title = ?1 WHERE id = ?2",
                    params![non_blank(title)?, update.id],
                )?;
            }
            if let Some(status) = update.status {
                tx.execute(
                    "UPDATE tasks SET status = ?1 WHERE id = ?2",
                    params![status.as_str(), update.id],
                )?;
            }
            if let Some(order_idx) = update.order_idx {
                tx.execute(
                    "UPDATE tasks SET order_idx = ?1 WHERE id = ?2",
                    params![order_idx, update.id],
                )?;
            }
        }
        tx.commit()?;

        tracing::info!(count = updates.len(), "Batch update applied");
        Ok(updates.len())
    }

    /// Assign new sibling positions under (`goal_id`, `parent_id`) and return
    /// the siblings in their new order. Every id must be a child of that
    /// parent within that goal.
    pub fn reorder(
        &self,
        goal_id: GoalId,
        parent_id: Option<TaskId>,
        positions: &[(TaskId, i64)],
    ) -> Result<Vec<Task>> {
        let mut db = self.conn();
        let tx = db.transaction()?;
        fetch_goal(&tx, goal_id)?;

        for &(task_id, order_idx) in positions {
            let task = fetch_task(&tx, task_id)?;
            if task.goal_id != goal_id || task.parent_id != parent_id {
                return Err(StoreError::Invalid(format!(
                    "task {task_id} is not a child of {} in goal {goal_id}",
                    parent_id.map_or_else(|| "the root".to_string(), |p| format!("task {p}"))
                )));
            }
            tx.execute(
                "UPDATE tasks SET order_idx = ?1 WHERE id = ?2",
                params![order_idx, task_id],
            )?;
        }

        let siblings = list_siblings(&tx, goal_id, parent_id)?;
        tx.commit()?;
        Ok(siblings)
    }

    /// Delete a task and its whole subtree
    pub fn delete_task(&self, task_id: TaskId) -> Result<()> {
        let db = self.conn();
        let deleted = db.execute("DELETE FROM tasks WHERE id = ?1", [task_id])?;
        if deleted == 0 {
            return Err(StoreError::not_found("task", task_id));
        }
        tracing::info!(task_id, "Task deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use goalplan_planner::{PlanRecord, TaskMaterializer};

    fn store_with_goal() -> (Store, GoalId) {
        let store = Store::in_memory().unwrap();
        let user = store.create_user("ada", "hash").unwrap();
        let goal = store.create_goal(user.id, "Learn Rust").unwrap();
        (store, goal.id)
    }

    fn plan(titles: &[&str]) -> Vec<PlanRecord> {
        titles
            .iter()
            .map(|t| PlanRecord {
                title: Some(t.to_string()),
                description: None,
            })
            .collect()
    }

    #[test]
    fn test_create_task_appends_to_siblings() {
        let (store, goal_id) = store_with_goal();
        assert_eq!(store.next_order_idx(goal_id, None).unwrap(), 0);

        let a = store.create_task(goal_id, None, "A", Some("first")).unwrap();
        let b = store.create_task(goal_id, None, "B", None).unwrap();
        let child = store.create_task(goal_id, Some(a.id), "A.1", None).unwrap();

        assert_eq!(a.order_idx, 0);
        assert_eq!(b.order_idx, 1);
        assert_eq!(child.order_idx, 0);
        assert_eq!(a.description.as_deref(), Some("first"));
        assert_eq!(b.description.as_deref(), Some(""));
        assert_eq!(store.next_order_idx(goal_id, None).unwrap(), 2);
        assert_eq!(store.next_order_idx(goal_id, Some(a.id)).unwrap(), 1);
    }

    #[test]
    fn test_next_order_follows_max_not_count() {
        let (store, goal_id) = store_with_goal();
        let a = store.create_task(goal_id, None, "A", None).unwrap();
        store
            .update_task(
                a.id,
                &TaskUpdate {
                    order_idx: Some(9),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(store.next_order_idx(goal_id, None).unwrap(), 10);
    }

    #[test]
    fn test_parent_must_share_goal() {
        let (store, goal_id) = store_with_goal();
        let user = store.create_user("bob", "hash").unwrap();
        let other_goal = store.create_goal(user.id, "Other").unwrap();
        let foreign = store.create_task(other_goal.id, None, "Foreign", None).unwrap();

        let err = store
            .create_task(goal_id, Some(foreign.id), "Bad", None)
            .unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
    }

    #[test]
    fn test_insert_generated_plan() {
        let (store, goal_id) = store_with_goal();
        let tasks = TaskMaterializer::new(goal_id).materialize(&plan(&["A", "B", "C"]));
        let stored = store.insert_tasks(&tasks).unwrap();

        assert_eq!(stored.len(), 3);
        let titles: Vec<&str> = stored.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B", "C"]);
        let orders: Vec<i64> = store
            .list_children(goal_id, None)
            .unwrap()
            .iter()
            .map(|t| t.order_idx)
            .collect();
        assert_eq!(orders, vec![0, 1, 2]);
    }

    #[test]
    fn test_overlapping_batches_append_with_distinct_order() {
        let (store, goal_id) = store_with_goal();
        let parent = store.create_task(goal_id, None, "Parent", None).unwrap();
        store.create_task(goal_id, Some(parent.id), "Existing", None).unwrap();

        // both batches were materialized from base 0, as two generations
        // started at the same time would be
        let first = TaskMaterializer::new(goal_id)
            .under(Some(parent.id))
            .materialize(&plan(&["A", "B"]));
        let second = TaskMaterializer::new(goal_id)
            .under(Some(parent.id))
            .materialize(&plan(&["C", "D", "E"]));
        store.append_tasks(&first).unwrap();
        store.append_tasks(&second).unwrap();

        let children: Vec<(String, i64)> = store
            .list_children(goal_id, Some(parent.id))
            .unwrap()
            .into_iter()
            .map(|t| (t.title, t.order_idx))
            .collect();
        let expected: Vec<(String, i64)> = ["Existing", "A", "B", "C", "D", "E"]
            .iter()
            .zip(0..)
            .map(|(title, idx)| (title.to_string(), idx))
            .collect();
        assert_eq!(children, expected);
    }

    #[test]
    fn test_append_shifts_each_sibling_group() {
        let (store, goal_id) = store_with_goal();
        let root = store.create_task(goal_id, None, "Root", None).unwrap();
        let mut tasks = TaskMaterializer::new(goal_id)
            .starting_at(5)
            .materialize(&plan(&["Top"]));
        tasks.extend(
            TaskMaterializer::new(goal_id)
                .under(Some(root.id))
                .materialize(&plan(&["Child"])),
        );

        let stored = store.append_tasks(&tasks).unwrap();
        assert_eq!(stored[0].order_idx, 1);
        assert_eq!(stored[1].order_idx, 0);
    }

    #[test]
    fn test_failed_batch_leaves_nothing() {
        let (store, goal_id) = store_with_goal();
        let mut tasks = TaskMaterializer::new(goal_id).materialize(&plan(&["A", "B"]));
        tasks[1].parent_id = Some(12345);

        let err = store.insert_tasks(&tasks).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "task", .. }));
        assert!(store.list_tasks(goal_id).unwrap().is_empty());
    }

    #[test]
    fn test_batch_into_unknown_goal_fails() {
        let (store, _) = store_with_goal();
        let tasks = TaskMaterializer::new(777).materialize(&plan(&["A"]));
        assert!(matches!(
            store.insert_tasks(&tasks),
            Err(StoreError::NotFound { entity: "goal", .. })
        ));
    }

    #[test]
    fn test_update_task_fields() {
        let (store, goal_id) = store_with_goal();
        let task = store.create_task(goal_id, None, "Draft", None).unwrap();
        let updated = store
            .update_task(
                task.id,
                &TaskUpdate {
                    title: Some("Final".into()),
                    description: Some("polished".into()),
                    status: Some(TaskStatus::Done),
                    order_idx: None,
                },
            )
            .unwrap();

        assert_eq!(updated.title, "Final");
        assert_eq!(updated.status, TaskStatus::Done);
        assert_eq!(store.get_task(task.id).unwrap(), updated);
    }

    #[test]
    fn test_batch_update_is_atomic() {
        let (store, goal_id) = store_with_goal();
        let a = store.create_task(goal_id, None, "A", None).unwrap();

        let err = store
            .batch_update(&[
                TaskBatchUpdate {
                    id: a.id,
                    status: Some(TaskStatus::Archived),
                    ..Default::default()
                },
                TaskBatchUpdate {
                    id: 404,
                    title: Some("ghost".into()),
                    ..Default::default()
                },
            ])
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { id: 404, .. }));
        assert_eq!(store.get_task(a.id).unwrap().status, TaskStatus::Active);

        let count = store
            .batch_update(&[TaskBatchUpdate {
                id: a.id,
                title: Some("A2".into()),
                order_idx: Some(4),
                ..Default::default()
            }])
            .unwrap();
        assert_eq!(count, 1);
        let a = store.get_task(a.id).unwrap();
        assert_eq!((a.title.as_str(), a.order_idx), ("A2", 4));
    }

    #[test]
    fn test_reorder_roots() {
        let (store, goal_id) = store_with_goal();
        let a = store.create_task(goal_id, None, "A", None).unwrap();
        let b = store.create_task(goal_id, None, "B", None).unwrap();
        let c = store.create_task(goal_id, None, "C", None).unwrap();

        let ordered = store
            .reorder(goal_id, None, &[(c.id, 0), (a.id, 1), (b.id, 2)])
            .unwrap();
        let ids: Vec<TaskId> = ordered.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![c.id, a.id, b.id]);
    }

    #[test]
    fn test_reorder_rejects_non_siblings() {
        let (store, goal_id) = store_with_goal();
        let a = store.create_task(goal_id, None, "A", None).unwrap();
        let child = store.create_task(goal_id, Some(a.id), "A.1", None).unwrap();

        let err = store.reorder(goal_id, None, &[(child.id, 0)]).unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
    }

    #[test]
    fn test_delete_task_cascades_to_subtree() {
        let (store, goal_id) = store_with_goal();
        let a = store.create_task(goal_id, None, "A", None).unwrap();
        let b = store.create_task(goal_id, Some(a.id), "B", None).unwrap();
        let c = store.create_task(goal_id, Some(b.id), "C", None).unwrap();
        let keep = store.create_task(goal_id, None, "Keep", None).unwrap();

        store.delete_task(a.id).unwrap();

        let remaining: Vec<TaskId> = store.list_tasks(goal_id).unwrap().iter().map(|t| t.id).collect();
        assert_eq!(remaining, vec![keep.id]);
        assert!(store.get_task(c.id).is_err());
        assert!(matches!(
            store.delete_task(a.id),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn test_task_tree_nests_children() {
        let (store, goal_id) = store_with_goal();
        let a = store.create_task(goal_id, None, "A", None).unwrap();
        store.create_task(goal_id, None, "B", None).unwrap();
        store.create_task(goal_id, Some(a.id), "A.1", None).unwrap();
        store.create_task(goal_id, Some(a.id), "A.2", None).unwrap();

        let tree = store.task_tree(goal_id).unwrap();
        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].task.title, "A");
        let sub: Vec<&str> = tree[0].subtasks.iter().map(|n| n.task.title.as_str()).collect();
        assert_eq!(sub, vec!["A.1", "A.2"]);
        assert!(tree[1].subtasks.is_empty());
    }
}
