//! Domain entities shared by the planner and the store
//!
//! Tasks form a tree through a nullable `parent_id`. Nothing here holds a
//! live back-reference; the tree is rebuilt on read from the flat rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub type UserId = i64;
pub type GoalId = i64;
pub type TaskId = i64;

/// Lifecycle state of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Active,
    Done,
    Archived,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Done => "done",
            Self::Archived => "archived",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown task status: {0:?}")]
pub struct UnknownStatus(pub String);

impl FromStr for TaskStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "done" => Ok(Self::Done),
            "archived" => Ok(Self::Archived),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// A registered user. The password hash never leaves the process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
}

/// The authenticated caller of a core operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub username: String,
}

impl From<&User> for Principal {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    pub id: GoalId,
    pub title: String,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
}

/// A persisted task row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: Option<String>,
    pub goal_id: GoalId,
    pub parent_id: Option<TaskId>,
    pub created_at: DateTime<Utc>,
    pub order_idx: i64,
    pub status: TaskStatus,
}

/// A task that has been constructed but not yet persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub goal_id: GoalId,
    pub parent_id: Option<TaskId>,
    pub order_idx: i64,
    #[serde(default)]
    pub status: TaskStatus,
}

/// A task together with its ordered subtasks
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskNode {
    #[serde(flatten)]
    pub task: Task,
    pub subtasks: Vec<TaskNode>,
}

/// The task that generated subtasks will hang under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentTask {
    pub task_id: TaskId,
    pub title: String,
    pub description: Option<String>,
}

/// Everything the pipeline needs to know about where a plan goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanContext {
    pub goal_id: GoalId,
    pub goal_title: String,
    pub parent: Option<ParentTask>,
}

impl PlanContext {
    pub fn for_goal(goal: &Goal) -> Self {
        Self {
            goal_id: goal.id,
            goal_title: goal.title.clone(),
            parent: None,
        }
    }

    pub fn for_task(goal: &Goal, task: &Task) -> Self {
        Self {
            goal_id: goal.id,
            goal_title: goal.title.clone(),
            parent: Some(ParentTask {
                task_id: task.id,
                title: task.title.clone(),
                description: task.description.clone(),
            }),
        }
    }

    pub fn parent_id(&self) -> Option<TaskId> {
        self.parent.as_ref().map(|p| p.task_id)
    }
}
