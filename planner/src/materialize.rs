//! Task materializer: turns normalized plan records into unpersisted tasks
//!
//! Sibling order follows list position. Persisting the result, and doing so
//! atomically, is the caller's job.

use crate::model::{GoalId, NewTask, TaskId, TaskStatus};
use crate::normalize::PlanRecord;

/// Title given to records that arrive without one
pub const UNTITLED: &str = "Untitled";

/// Where materialized tasks land in the goal's tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskMaterializer {
    goal_id: GoalId,
    parent_id: Option<TaskId>,
    base_order: i64,
}

impl TaskMaterializer {
    pub fn new(goal_id: GoalId) -> Self {
        Self {
            goal_id,
            parent_id: None,
            base_order: 0,
        }
    }

    /// Place the tasks under `parent_id` instead of at the goal's root
    pub fn under(mut self, parent_id: Option<TaskId>) -> Self {
        self.parent_id = parent_id;
        self
    }

    /// Offset the first `order_idx`, e.g. to append after existing siblings
    pub fn starting_at(mut self, base_order: i64) -> Self {
        self.base_order = base_order;
        self
    }

    pub fn materialize(&self, records: &[PlanRecord]) -> Vec<NewTask> {
        records
            .iter()
            .zip(self.base_order..)
            .map(|(record, order_idx)| NewTask {
                title: record
                    .title
                    .as_deref()
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .unwrap_or(UNTITLED)
                    .to_string(),
                description: record.description.clone().unwrap_or_default(),
                goal_id: self.goal_id,
                parent_id: self.parent_id,
                order_idx,
                status: TaskStatus::Active,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn titled(title: &str) -> PlanRecord {
        PlanRecord {
            title: Some(title.into()),
            description: Some(format!("about {title}")),
        }
    }

    #[test]
    fn test_orders_follow_list_position() {
        let tasks = TaskMaterializer::new(3).materialize(&[titled("a"), titled("b"), titled("c")]);
        let orders: Vec<i64> = tasks.iter().map(|t| t.order_idx).collect();
        assert_eq!(orders, vec![0, 1, 2]);
        assert_eq!(tasks[1].title, "b");
        assert_eq!(tasks[1].description, "about b");
    }

    #[test]
    fn test_missing_title_gets_placeholder() {
        let tasks = TaskMaterializer::new(1).materialize(&[PlanRecord::default()]);
        assert_eq!(tasks[0].title, UNTITLED);
        assert_eq!(tasks[0].description, "");
        assert_eq!(tasks[0].status, TaskStatus::Active);
    }

    #[test]
    fn test_blank_title_gets_placeholder() {
        let tasks = TaskMaterializer::new(1).materialize(&[PlanRecord {
            title: Some("   ".into()),
            description: None,
        }]);
        assert_eq!(tasks[0].title, UNTITLED);
    }

    #[test]
    fn test_context_applied_to_every_task() {
        let tasks = TaskMaterializer::new(8)
            .under(Some(21))
            .materialize(&[titled("x"), titled("y")]);
        assert!(tasks.iter().all(|t| t.goal_id == 8 && t.parent_id == Some(21)));
    }

    #[test]
    fn test_base_order_offsets_all_tasks() {
        let tasks = TaskMaterializer::new(1)
            .starting_at(5)
            .materialize(&[titled("x"), titled("y")]);
        assert_eq!(tasks[0].order_idx, 5);
        assert_eq!(tasks[1].order_idx, 6);
    }

    #[test]
    fn test_empty_plan_is_empty() {
        assert!(TaskMaterializer::new(1).materialize(&[]).is_empty());
    }

    #[test]
    fn test_serde_roundtrip_preserves_fields() {
        let tasks = TaskMaterializer::new(2).materialize(&[titled("one"), PlanRecord::default()]);
        let json = serde_json::to_string(&tasks).unwrap();
        let back: Vec<NewTask> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tasks);
    }

    proptest! {
        #[test]
        fn prop_order_idx_is_position(titles in proptest::collection::vec(proptest::option::of(".{0,12}"), 0..40)) {
            let records: Vec<PlanRecord> = titles
                .iter()
                .map(|t| PlanRecord { title: t.clone(), description: None })
                .collect();
            let tasks = TaskMaterializer::new(1).materialize(&records);
            prop_assert_eq!(tasks.len(), records.len());
            for (i, task) in tasks.iter().enumerate() {
                prop_assert_eq!(task.order_idx, i as i64);
            }
        }
    }
}
