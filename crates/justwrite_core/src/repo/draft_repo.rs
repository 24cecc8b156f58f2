//! Draft state store contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist the single current draft for autosave and startup restore.
//! - Keep SQL details inside the storage boundary.
//!
//! # Invariants
//! - `save` replaces the whole draft in one statement; readers observe either
//!   the previous or the new draft, never a mix.
//! - `load` on a store that never saved returns an empty draft.
//! - Store methods report failures and never retry internally.

use crate::db::{open_db, open_db_in_memory, DbError, DbResult};
use crate::logging::redacted;
use crate::model::draft::Draft;
use log::debug;
use rusqlite::{params, Connection, OptionalExtension};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::path::Path;
use std::sync::{Arc, Mutex};

pub type StoreResult<T> = Result<T, StoreError>;

/// Draft store failure.
#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    /// The shared connection lock was poisoned by a panicking writer.
    Poisoned,
    /// The blocking worker running the statement panicked or was cancelled.
    Task(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Poisoned => write!(f, "draft store connection lock poisoned"),
            Self::Task(message) => write!(f, "draft store task failed: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Poisoned | Self::Task(_) => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Persistence interface for the autosaved draft.
pub trait DraftStore: Send + Sync {
    /// Overwrites the persisted draft.
    fn save(&self, draft: Draft) -> impl Future<Output = StoreResult<()>> + Send;
    /// Returns the persisted draft, or an empty draft when none exists.
    fn load(&self) -> impl Future<Output = StoreResult<Draft>> + Send;
    /// Resets persisted state to empty.
    fn clear(&self) -> impl Future<Output = StoreResult<()>> + Send;
}

/// SQLite-backed draft store sharing one connection across blocking workers.
#[derive(Clone)]
pub struct SqliteDraftStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDraftStore {
    /// Opens the state database at `path`, applying migrations.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        Ok(Self::from_connection(open_db(path)?))
    }

    pub fn open_in_memory() -> DbResult<Self> {
        Ok(Self::from_connection(open_db_in_memory()?))
    }

    /// Wraps a migrated connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    async fn run<T, F>(&self, op: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> StoreResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|_| StoreError::Poisoned)?;
            op(&*guard)
        })
        .await
        .map_err(|err| StoreError::Task(err.to_string()))?
    }
}

impl DraftStore for SqliteDraftStore {
    fn save(&self, draft: Draft) -> impl Future<Output = StoreResult<()>> + Send {
        self.run(move |conn| write_draft(conn, &draft))
    }

    fn load(&self) -> impl Future<Output = StoreResult<Draft>> + Send {
        self.run(read_draft)
    }

    fn clear(&self) -> impl Future<Output = StoreResult<()>> + Send {
        self.run(clear_draft)
    }
}

/// Upserts the single draft row.
pub fn write_draft(conn: &Connection, draft: &Draft) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO draft_state (slot, text, notebook_id, updated_at, write_count)
         VALUES (1, ?1, ?2, (strftime('%s', 'now') * 1000), 1)
         ON CONFLICT(slot) DO UPDATE SET
            text = excluded.text,
            notebook_id = excluded.notebook_id,
            updated_at = excluded.updated_at,
            write_count = draft_state.write_count + 1;",
        params![draft.text, draft.notebook_id],
    )?;
    debug!(
        "event=draft_write module=repo status=ok text={} notebook={}",
        redacted(&draft.text),
        draft.notebook_id
    );
    Ok(())
}

/// Reads the single draft row, defaulting to an empty draft.
pub fn read_draft(conn: &Connection) -> StoreResult<Draft> {
    let draft = conn
        .query_row(
            "SELECT text, notebook_id FROM draft_state WHERE slot = 1;",
            [],
            |row| {
                Ok(Draft {
                    text: row.get("text")?,
                    notebook_id: row.get("notebook_id")?,
                })
            },
        )
        .optional()?;
    Ok(draft.unwrap_or_default())
}

/// Removes the draft row.
pub fn clear_draft(conn: &Connection) -> StoreResult<()> {
    conn.execute("DELETE FROM draft_state WHERE slot = 1;", [])?;
    debug!("event=draft_clear module=repo status=ok");
    Ok(())
}

/// Number of writes applied to the current draft row, for diagnostics.
pub fn draft_write_count(conn: &Connection) -> StoreResult<u64> {
    let count = conn
        .query_row(
            "SELECT write_count FROM draft_state WHERE slot = 1;",
            [],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    Ok(count.map_or(0, |value| value.max(0) as u64))
}
