// ABOUTME: SQLite ledger of scheduled task handles, kept by callers that want routing hints.
// ABOUTME: Maps task ids to the backend that accepted them so later calls can skip probing.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use thiserror::Error;

use crate::orchestrator::types::{Backend, TaskHandle};

const APP_DIR: &str = "task-orchestrator";
const DB_FILE: &str = "handles.db";

#[derive(Debug, Error)]
pub enum HandleStoreError {
    #[error("handle store database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to create handle store directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("no user data directory available on this platform")]
    NoDataDir,

    #[error("task {id} is already recorded on {existing}, refusing to record it on {requested}")]
    Conflict {
        id: String,
        existing: Backend,
        requested: Backend,
    },

    #[error("stored handle {id} has unreadable {field} '{value}'")]
    Corrupt {
        id: String,
        field: &'static str,
        value: String,
    },
}

/// A handle as recorded in the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredHandle {
    pub handle: TaskHandle,
    pub task_type: String,
    pub created_at: jiff::Timestamp,
}

/// Persistent id → backend map.
///
/// The router never consults this; callers look up the backend here and pass
/// it as the hint to `get_status` / `cancel`.
pub struct HandleStore {
    conn: Mutex<Connection>,
}

impl HandleStore {
    /// Open or create the store at `path`, creating parent directories.
    pub fn open(path: &Path) -> Result<Self, HandleStoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    /// Open the store in the platform data directory.
    pub fn open_default() -> Result<Self, HandleStoreError> {
        Self::open(&Self::default_path()?)
    }

    pub fn open_in_memory() -> Result<Self, HandleStoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    pub fn default_path() -> Result<PathBuf, HandleStoreError> {
        let data_dir = dirs::data_dir().ok_or(HandleStoreError::NoDataDir)?;
        Ok(data_dir.join(APP_DIR).join(DB_FILE))
    }

    fn init(conn: Connection) -> Result<Self, HandleStoreError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS task_handles (
                id TEXT PRIMARY KEY,
                backend TEXT NOT NULL,
                task_type TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_task_handles_backend ON task_handles(backend);",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record a freshly scheduled handle.
    ///
    /// Re-recording an id on the same backend refreshes it. Recording it on a
    /// different backend is a `Conflict` and leaves the stored handle alone.
    pub fn record(&self, handle: &TaskHandle, task_type: &str) -> Result<(), HandleStoreError> {
        let conn = self.conn();
        let existing: Option<String> = conn
            .query_row(
                "SELECT backend FROM task_handles WHERE id = ?1",
                params![handle.id],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(existing) = existing {
            let existing = parse_backend(&handle.id, existing)?;
            if existing != handle.backend {
                log::warn!(
                    "[HandleStore] {} already recorded on {}, not {}",
                    handle.id,
                    existing,
                    handle.backend
                );
                return Err(HandleStoreError::Conflict {
                    id: handle.id.clone(),
                    existing,
                    requested: handle.backend,
                });
            }
        }

        let now = jiff::Timestamp::now().as_millisecond();
        conn.execute(
            "INSERT OR REPLACE INTO task_handles (id, backend, task_type, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![handle.id, handle.backend.as_str(), task_type, now],
        )?;
        log::debug!("[HandleStore] Recorded {} on {}", handle.id, handle.backend);
        Ok(())
    }

    pub fn lookup(&self, id: &str) -> Result<Option<TaskHandle>, HandleStoreError> {
        let backend: Option<String> = self
            .conn()
            .query_row(
                "SELECT backend FROM task_handles WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;

        backend
            .map(|backend| {
                Ok(TaskHandle {
                    id: id.to_string(),
                    backend: parse_backend(id, backend)?,
                })
            })
            .transpose()
    }

    /// Backend hint for `id`, if it was recorded.
    pub fn hint(&self, id: &str) -> Result<Option<Backend>, HandleStoreError> {
        Ok(self.lookup(id)?.map(|handle| handle.backend))
    }

    /// Drop a handle. Returns whether it was present.
    pub fn forget(&self, id: &str) -> Result<bool, HandleStoreError> {
        let removed = self
            .conn()
            .execute("DELETE FROM task_handles WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }

    /// All recorded handles, oldest first, optionally for one backend only.
    pub fn list(&self, backend: Option<Backend>) -> Result<Vec<StoredHandle>, HandleStoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, backend, task_type, created_at FROM task_handles
             WHERE ?1 IS NULL OR backend = ?1
             ORDER BY created_at, rowid",
        )?;
        let rows = stmt
            .query_map(params![backend.map(|b| b.as_str())], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, backend, task_type, created_at)| {
                let created_at = jiff::Timestamp::from_millisecond(created_at).map_err(|_| {
                    HandleStoreError::Corrupt {
                        id: id.clone(),
                        field: "created_at",
                        value: created_at.to_string(),
                    }
                })?;
                let backend = parse_backend(&id, backend)?;
                Ok(StoredHandle {
                    handle: TaskHandle { id, backend },
                    task_type,
                    created_at,
                })
            })
            .collect()
    }
}

fn parse_backend(id: &str, value: String) -> Result<Backend, HandleStoreError> {
    value.parse().map_err(|_| HandleStoreError::Corrupt {
        id: id.to_string(),
        field: "backend",
        value,
    })
}
