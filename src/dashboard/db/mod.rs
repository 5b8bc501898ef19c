use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use rusqlite::Connection;

use crate::errors::DashboardError;

mod feed;
mod people;
mod requests;
mod tasks;

pub use people::ProfileUpdate;
pub use requests::{ApprovalOutcome, ResourceOutcome};
pub use tasks::TaskOutcome;

/// Async-safe handle to the dashboard database.
///
/// Wraps `DashboardDb` behind `Arc<Mutex>` and runs all access on tokio's
/// blocking thread pool via `spawn_blocking`, so synchronous SQLite I/O never
/// ties up async worker threads.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<std::sync::Mutex<DashboardDb>>,
}

impl DbHandle {
    pub fn new(db: DashboardDb) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(db)),
        }
    }

    /// Run a closure with access to the database on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&DashboardDb) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db.lock().map_err(|_| DashboardError::LockPoisoned)?;
            f(&guard)
        })
        .await
        .context("DB task panicked")?
    }
}

pub struct DashboardDb {
    conn: Connection,
}

impl DashboardDb {
    /// Open (or create) a SQLite database at the given path and run migrations.
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Create an in-memory SQLite database (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        self.conn
            .execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;
        self.run_migrations().context("Failed to run migrations")?;
        Ok(())
    }

    fn run_migrations(&self) -> Result<()> {
        let had_awards: bool = self
            .conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM sqlite_master
                 WHERE type = 'table' AND name = 'task_rating_awards'",
                [],
                |row| row.get(0),
            )
            .context("Failed to inspect schema")?;

        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS employees (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    role TEXT NOT NULL,
                    avatar TEXT NOT NULL,
                    points INTEGER NOT NULL DEFAULT 0,
                    username TEXT NOT NULL UNIQUE,
                    password_hash TEXT NOT NULL,
                    contact_number TEXT,
                    dob TEXT,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS clients (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    contact_email TEXT NOT NULL,
                    username TEXT NOT NULL UNIQUE,
                    password_hash TEXT NOT NULL,
                    contact_number TEXT,
                    dob TEXT,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS sessions (
                    token TEXT PRIMARY KEY,
                    principal_kind TEXT NOT NULL,
                    principal_id INTEGER NOT NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    expires_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS tasks (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    title TEXT NOT NULL,
                    description TEXT NOT NULL,
                    client_id INTEGER NOT NULL REFERENCES clients(id),
                    due_date TEXT NOT NULL,
                    status TEXT NOT NULL DEFAULT 'Pending',
                    rating INTEGER NOT NULL DEFAULT 0,
                    created_by INTEGER NOT NULL REFERENCES employees(id),
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS task_assignees (
                    task_id INTEGER NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
                    employee_id INTEGER NOT NULL REFERENCES employees(id),
                    position INTEGER NOT NULL DEFAULT 0,
                    PRIMARY KEY (task_id, employee_id)
                );

                CREATE TABLE IF NOT EXISTS task_rating_awards (
                    task_id INTEGER NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
                    employee_id INTEGER NOT NULL REFERENCES employees(id),
                    awarded INTEGER NOT NULL,
                    PRIMARY KEY (task_id, employee_id)
                );

                CREATE TABLE IF NOT EXISTS task_comments (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    task_id INTEGER NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
                    author_name TEXT NOT NULL,
                    author_role TEXT NOT NULL,
                    content TEXT NOT NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS task_requests (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    title TEXT NOT NULL,
                    description TEXT NOT NULL DEFAULT '',
                    client_id INTEGER NOT NULL REFERENCES clients(id),
                    status TEXT NOT NULL DEFAULT 'Pending',
                    task_id INTEGER REFERENCES tasks(id) ON DELETE SET NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS resource_requests (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    requester_id INTEGER NOT NULL REFERENCES employees(id),
                    requester_name TEXT NOT NULL,
                    item_name TEXT NOT NULL,
                    reason TEXT NOT NULL,
                    status TEXT NOT NULL DEFAULT 'Pending',
                    due_date TEXT,
                    assigned_to_id INTEGER REFERENCES employees(id),
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS reports (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    employee_id INTEGER NOT NULL REFERENCES employees(id),
                    date TEXT NOT NULL,
                    content TEXT NOT NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS messages (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    kind TEXT NOT NULL,
                    author_id INTEGER NOT NULL REFERENCES employees(id),
                    content TEXT NOT NULL,
                    task_id INTEGER REFERENCES tasks(id) ON DELETE SET NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE INDEX IF NOT EXISTS idx_task_assignees_employee ON task_assignees(employee_id);
                CREATE INDEX IF NOT EXISTS idx_tasks_client ON tasks(client_id);
                CREATE INDEX IF NOT EXISTS idx_task_comments_task ON task_comments(task_id);
                CREATE INDEX IF NOT EXISTS idx_task_requests_status ON task_requests(status);
                CREATE INDEX IF NOT EXISTS idx_resource_requests_requester ON resource_requests(requester_id);
                CREATE INDEX IF NOT EXISTS idx_reports_employee ON reports(employee_id);
                CREATE INDEX IF NOT EXISTS idx_sessions_expiry ON sessions(expires_at);
                ",
            )
            .context("Failed to create tables")?;

        // Databases created before awards were tracked: credit the current
        // assignees of rated tasks with the rating they were given.
        if !had_awards {
            self.conn
                .execute(
                    "INSERT OR IGNORE INTO task_rating_awards (task_id, employee_id, awarded)
                     SELECT a.task_id, a.employee_id, t.rating
                     FROM task_assignees a JOIN tasks t ON t.id = a.task_id
                     WHERE t.rating > 0",
                    [],
                )
                .context("Failed to backfill rating awards")?;
        }
        Ok(())
    }
}

/// Parse a stored enum column, reporting which table held the bad value.
fn parse_column<T: std::str::FromStr<Err = String>>(value: &str, what: &str) -> Result<T> {
    value
        .parse::<T>()
        .map_err(|e| anyhow::anyhow!("invalid {} in database: {}", what, e))
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Seed helpers shared by the store tests.

    use super::DashboardDb;
    use crate::dashboard::models::*;

    pub fn manager(db: &DashboardDb) -> Employee {
        db.create_employee("Morgan", MANAGER_TITLE, "morgan", "pw").unwrap()
    }

    pub fn employee(db: &DashboardDb, name: &str) -> Employee {
        db.create_employee(name, "Designer", &name.to_lowercase(), "pw")
            .unwrap()
    }

    pub fn client(db: &DashboardDb, name: &str) -> Client {
        db.create_client(name, "hello@acme.test", &name.to_lowercase(), "pw")
            .unwrap()
    }

    pub fn new_task(title: &str, client_id: i64, assignees: Vec<i64>) -> NewTask {
        NewTask {
            title: title.to_string(),
            description: format!("{} description", title),
            assignees,
            client_id,
            due_date: "2024-06-01".to_string(),
            status: TaskStatus::Pending,
        }
    }
}
