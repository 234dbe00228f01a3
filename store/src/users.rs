//! Users. Hashing and verifying passwords happens outside this crate; only
//! the hash is stored.

use goalplan_planner::{User, UserId};
use rusqlite::{params, OptionalExtension, Row};

use crate::error::{found, is_unique_violation, Result, StoreError};
use crate::Store;

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
    })
}

impl Store {
    pub fn create_user(&self, username: &str, password_hash: &str) -> Result<User> {
        let username = username.trim();
        if username.is_empty() {
            return Err(StoreError::Invalid("username must not be empty".into()));
        }

        let db = self.conn();
        db.execute(
            "INSERT INTO users (username, password_hash) VALUES (?1, ?2)",
            params![username, password_hash],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Conflict(format!("username {username:?} is taken"))
            } else {
                e.into()
            }
        })?;

        let user = User {
            id: db.last_insert_rowid(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
        };
        tracing::info!(user_id = user.id, "User created");
        Ok(user)
    }

    pub fn get_user(&self, user_id: UserId) -> Result<User> {
        let db = self.conn();
        found(
            db.query_row(
                "SELECT id, username, password_hash FROM users WHERE id = ?1",
                [user_id],
                user_from_row,
            ),
            "user",
            user_id,
        )
    }

    pub fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let db = self.conn();
        Ok(db
            .query_row(
                "SELECT id, username, password_hash FROM users WHERE username = ?1",
                [username.trim()],
                user_from_row,
            )
            .optional()?)
    }
}
