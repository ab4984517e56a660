//! One embedded database file per namespace

use super::{ensure_dir, StorageBackend};
use crate::config::CacheConfig;
use crate::errors::{CacheError, Result, StoreType};
use crate::lock::OpLock;
use crate::namespace::Namespace;
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Database file name inside the namespace directory
pub const DATABASE_FILE: &str = "cache.db";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS entries (
    key   TEXT PRIMARY KEY,
    value BLOB NOT NULL
)";

/// All keys of a namespace in `<namespace dir>/cache.db`
///
/// Without `thread_safe` the connection is opened at construction and held
/// until [`persist`](StorageBackend::persist); the next operation reopens
/// it. With `thread_safe` every operation opens and closes its own
/// connection while the handle's reentrant lock is held.
pub struct SingleFileBackend {
    path: PathBuf,
    namespace: String,
    per_operation: bool,
    conn: Mutex<Option<Connection>>,
    lock: OpLock,
}

impl SingleFileBackend {
    fn connect(path: &Path) -> rusqlite::Result<Connection> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;
        Ok(conn)
    }

    fn with_conn<R>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<R>) -> rusqlite::Result<R> {
        if self.per_operation {
            let conn = Self::connect(&self.path)?;
            let result = f(&conn);
            conn.close().map_err(|(_, e)| e)?;
            return result;
        }

        let mut slot = self.conn.lock();
        let conn = match slot.take() {
            Some(conn) => conn,
            None => {
                tracing::debug!(path = %self.path.display(), "reopening cache database");
                Self::connect(&self.path)?
            }
        };
        let result = f(&conn);
        *slot = Some(conn);
        result
    }

    fn read_value(conn: &Connection, key: &str) -> rusqlite::Result<Option<Vec<u8>>> {
        let mut stmt = conn.prepare_cached("SELECT value FROM entries WHERE key = ?1")?;
        let mut rows = stmt.query(params![key])?;
        let value = match rows.next()? {
            Some(row) => Some(row.get(0)?),
            None => None,
        };
        Ok(value)
    }

    fn read_failed(&self, e: rusqlite::Error) -> CacheError {
        CacheError::storage(StoreType::SingleFile, "read entry", e.to_string())
    }
}

impl StorageBackend for SingleFileBackend {
    const KIND: StoreType = StoreType::SingleFile;

    fn open(namespace: &Namespace, config: &CacheConfig) -> Result<Self> {
        let dir = namespace.path();
        ensure_dir(&dir)?;
        let path = dir.join(DATABASE_FILE);

        let conn = Self::connect(&path)
            .map_err(|e| CacheError::init_failed(&path, format!("cannot open database: {e}")))?;

        let held = if config.thread_safe {
            conn.close()
                .map_err(|(_, e)| CacheError::init_failed(&path, e.to_string()))?;
            None
        } else {
            Some(conn)
        };

        Ok(Self {
            path,
            namespace: namespace.name().to_string(),
            per_operation: config.thread_safe,
            conn: Mutex::new(held),
            lock: OpLock::new(config.thread_safe),
        })
    }

    /// The namespace directory holding the database file
    fn location(&self) -> String {
        self.path
            .parent()
            .map(|dir| dir.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    fn op_lock(&self) -> &OpLock {
        &self.lock
    }

    fn contains(&self, key: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached("SELECT 1 FROM entries WHERE key = ?1")?;
            let found = stmt.exists(params![key])?;
            Ok(found)
        })
        .map_err(|e| self.read_failed(e))
    }

    fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.with_conn(|conn| Self::read_value(conn, key))
            .map_err(|e| self.read_failed(e))
    }

    fn store(&self, key: &str, bytes: &[u8]) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO entries (key, value) VALUES (?1, ?2)",
                params![key, bytes],
            )
        })
        .map(|_| ())
        .map_err(|e| CacheError::write_failed(&self.namespace, key, e.to_string()))
    }

    fn remove(&self, key: &str) -> Result<bool> {
        self.with_conn(|conn| conn.execute("DELETE FROM entries WHERE key = ?1", params![key]))
            .map(|deleted| deleted > 0)
            .map_err(|e| CacheError::storage(StoreType::SingleFile, "delete entry", e.to_string()))
    }

    fn persist(&self) -> Result<()> {
        let Some(conn) = self.conn.lock().take() else {
            return Ok(());
        };
        conn.close()
            .map_err(|(_, e)| CacheError::storage(StoreType::SingleFile, "close database", e.to_string()))
    }
}

impl std::fmt::Debug for SingleFileBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleFileBackend")
            .field("path", &self.path)
            .field("per_operation", &self.per_operation)
            .field("open", &self.conn.try_lock().map(|conn| conn.is_some()))
            .finish()
    }
}
