//! goalplan store: SQLite persistence for users, goals and task trees
//!
//! One connection behind a mutex (rusqlite's Connection is !Sync). Every
//! multi-row write runs in a single transaction so a failed batch leaves no
//! trace. Tasks are stored flat with a nullable `parent_id`; `task_tree`
//! rebuilds the hierarchy on read.

use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::Connection;

mod error;
mod goals;
mod tasks;
pub mod tree;
mod users;

pub use error::{Result, StoreError};
pub use tasks::{TaskBatchUpdate, TaskUpdate};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS goals (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        created_at TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS tasks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        description TEXT,
        goal_id INTEGER NOT NULL REFERENCES goals(id) ON DELETE CASCADE,
        parent_id INTEGER REFERENCES tasks(id) ON DELETE CASCADE,
        created_at TEXT NOT NULL,
        order_idx INTEGER NOT NULL DEFAULT 0,
        status TEXT NOT NULL DEFAULT 'active'
            CHECK (status IN ('active', 'done', 'archived'))
    );
    CREATE INDEX IF NOT EXISTS idx_goals_user ON goals(user_id);
    CREATE INDEX IF NOT EXISTS idx_tasks_siblings ON tasks(goal_id, parent_id, order_idx);
";

/// Handle to the goalplan database
pub struct Store {
    db: Mutex<Connection>,
}

impl Store {
    /// Open (creating if needed) the database at `db_path`.
    pub fn open(db_path: &str) -> Result<Self> {
        if let Some(parent) = std::path::Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let db = Connection::open(db_path)?;
        db.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        let store = Self::init(db)?;

        tracing::info!("Store opened at {db_path}");
        Ok(store)
    }

    /// A private in-memory database, for tests and throwaway runs
    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(db: Connection) -> Result<Self> {
        db.execute_batch("PRAGMA foreign_keys = ON;")?;
        db.execute_batch(SCHEMA)?;
        Ok(Self { db: Mutex::new(db) })
    }

    /// A panic while holding the lock cannot leave a half-applied write
    /// behind (transactions roll back on drop), so a poisoned lock is safe
    /// to reuse.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
