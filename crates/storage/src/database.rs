//! SQLite connection wrapper and error mapping.

use rusqlite::types::Type;
use rusqlite::{Connection, ErrorCode, OpenFlags, Row};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tujali_shared::{HealthError, HealthResult};

/// Database errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON column error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Lock error: {0}")]
    Lock(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A domain rule rejected the write inside a transaction
    #[error(transparent)]
    Rejected(#[from] HealthError),
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;

impl From<DatabaseError> for HealthError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::Rejected(inner) => inner,
            DatabaseError::NotFound(what) => HealthError::NotFound(what),
            DatabaseError::Sqlite(rusqlite::Error::SqliteFailure(code, msg))
                if code.code == ErrorCode::ConstraintViolation =>
            {
                HealthError::Conflict(msg.unwrap_or_else(|| "constraint violation".to_string()))
            }
            other => HealthError::StorageError(other.to_string()),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    /// Enable WAL mode for concurrent readers
    pub wal_mode: bool,
    pub foreign_keys: bool,
    /// Cache size (pages, negative = KB)
    pub cache_size: Option<i32>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/tujali.db"),
            wal_mode: true,
            foreign_keys: true,
            cache_size: Some(-16000),
        }
    }
}

impl DatabaseConfig {
    pub fn in_memory() -> Self {
        Self {
            path: PathBuf::from(":memory:"),
            wal_mode: false,
            foreign_keys: true,
            cache_size: None,
        }
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }
}

/// Thread-safe database handle; one connection behind a mutex
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    config: DatabaseConfig,
}

impl Database {
    /// Open (creating if needed) and migrate the database
    pub fn open(config: DatabaseConfig) -> DatabaseResult<Self> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
        let conn = Connection::open_with_flags(&config.path, flags)?;
        Self::configure_connection(&conn, &config)?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
            config,
        };
        crate::migrations::run_migrations(&db)?;
        tracing::info!(path = %db.config.path.display(), "database ready");
        Ok(db)
    }

    pub fn open_in_memory() -> DatabaseResult<Self> {
        Self::open(DatabaseConfig::in_memory())
    }

    fn configure_connection(conn: &Connection, config: &DatabaseConfig) -> DatabaseResult<()> {
        if config.foreign_keys {
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        }
        if config.wal_mode {
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }
        if let Some(size) = config.cache_size {
            conn.execute_batch(&format!("PRAGMA cache_size = {};", size))?;
        }
        conn.execute_batch("PRAGMA synchronous = NORMAL; PRAGMA busy_timeout = 5000;")?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    pub fn with_connection<F, T>(&self, f: F) -> DatabaseResult<T>
    where
        F: FnOnce(&Connection) -> DatabaseResult<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DatabaseError::Lock(e.to_string()))?;
        f(&conn)
    }

    pub fn with_connection_mut<F, T>(&self, f: F) -> DatabaseResult<T>
    where
        F: FnOnce(&mut Connection) -> DatabaseResult<T>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| DatabaseError::Lock(e.to_string()))?;
        f(&mut conn)
    }

    /// Run `f` in a transaction; any error rolls back
    pub fn transaction<F, T>(&self, f: F) -> DatabaseResult<T>
    where
        F: FnOnce(&rusqlite::Transaction) -> DatabaseResult<T>,
    {
        self.with_connection_mut(|conn| {
            let tx = conn.transaction()?;
            let result = f(&tx)?;
            tx.commit()?;
            Ok(result)
        })
    }

    /// [`with_connection`](Self::with_connection) with errors mapped for store callers
    pub(crate) fn read<F, T>(&self, f: F) -> HealthResult<T>
    where
        F: FnOnce(&Connection) -> DatabaseResult<T>,
    {
        self.with_connection(f).map_err(|e| log_failure(e.into()))
    }

    /// [`transaction`](Self::transaction) with errors mapped for store callers
    pub(crate) fn write<F, T>(&self, f: F) -> HealthResult<T>
    where
        F: FnOnce(&rusqlite::Transaction) -> DatabaseResult<T>,
    {
        self.transaction(f).map_err(|e| log_failure(e.into()))
    }

    pub fn table_count(&self) -> DatabaseResult<usize> {
        self.with_connection(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
                [],
                |row| row.get(0),
            )?;
            Ok(count as usize)
        })
    }
}

fn log_failure(err: HealthError) -> HealthError {
    if err.is_storage() {
        tracing::error!(error = %err, "storage operation failed");
    }
    err
}

// ============================================================================
// Column helpers
// ============================================================================

/// Read a TEXT column holding a `string_enum` value
pub(crate) fn text_enum<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = HealthError>,
{
    let text: String = row.get(idx)?;
    text.parse()
        .map_err(|e: HealthError| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn opt_text_enum<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr<Err = HealthError>,
{
    let text: Option<String> = row.get(idx)?;
    text.map(|t| {
        t.parse()
            .map_err(|e: HealthError| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

/// Read a TEXT column holding JSON
pub(crate) fn json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn opt_json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>> {
    let text: Option<String> = row.get(idx)?;
    text.map(|t| {
        serde_json::from_str(&t)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

/// `QueryReturnedNoRows` becomes `None`
pub(crate) fn optional<T>(result: rusqlite::Result<T>) -> DatabaseResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(DatabaseError::Sqlite(e)),
    }
}
