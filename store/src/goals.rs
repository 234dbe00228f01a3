use chrono::Utc;
use goalplan_planner::{Goal, GoalId, UserId};
use rusqlite::{params, Connection, Row};

use crate::error::{found, Result, StoreError};
use crate::Store;

const GOAL_COLUMNS: &str = "id, title, user_id, created_at";

fn goal_from_row(row: &Row<'_>) -> rusqlite::Result<Goal> {
    Ok(Goal {
        id: row.get(0)?,
        title: row.get(1)?,
        user_id: row.get(2)?,
        created_at: row.get(3)?,
    })
}

pub(crate) fn fetch_goal(db: &Connection, goal_id: GoalId) -> Result<Goal> {
    found(
        db.query_row(
            &format!("SELECT {GOAL_COLUMNS} FROM goals WHERE id = ?1"),
            [goal_id],
            goal_from_row,
        ),
        "goal",
        goal_id,
    )
}

impl Store {
    pub fn create_goal(&self, user_id: UserId, title: &str) -> Result<Goal> {
        let title = title.trim();
        if title.is_empty() {
            return Err(StoreError::Invalid("goal title must not be empty".into()));
        }

        let db = self.conn();
        let user_exists: bool = db.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
            [user_id],
            |row| row.get(0),
        )?;
        if !user_exists {
            return Err(StoreError::not_found("user", user_id));
        }

        let created_at = Utc::now();
        db.execute(
            "INSERT INTO goals (title, user_id, created_at) VALUES (?1, ?2, ?3)",
            params![title, user_id, created_at],
        )?;

        let goal = Goal {
            id: db.last_insert_rowid(),
            title: title.to_string(),
            user_id,
            created_at,
        };
        tracing::info!(goal_id = goal.id, user_id, "Goal created");
        Ok(goal)
    }

    pub fn get_goal(&self, goal_id: GoalId) -> Result<Goal> {
        fetch_goal(&self.conn(), goal_id)
    }

    /// A user's goals, newest first
    pub fn list_goals(&self, user_id: UserId) -> Result<Vec<Goal>> {
        let db = self.conn();
        let mut stmt = db.prepare(&format!(
            "SELECT {GOAL_COLUMNS} FROM goals WHERE user_id = ?1 ORDER BY created_at DESC, id DESC"
        ))?;
        let goals = stmt
            .query_map([user_id], goal_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(goals)
    }

    /// Delete a goal together with every task under it
    pub fn delete_goal(&self, goal_id: GoalId) -> Result<()> {
        let db = self.conn();
        let deleted = db.execute("DELETE FROM goals WHERE id = ?1", [goal_id])?;
        if deleted == 0 {
            return Err(StoreError::not_found("goal", goal_id));
        }
        tracing::info!(goal_id, "Goal deleted");
        Ok(())
    }
}
