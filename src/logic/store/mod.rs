//! Engine Store - durable backing for baselines and the audit ledger.
//!
//! One SQLite file, three tables mirroring the three logical partitions:
//! `baselines`, `ledger`, `meta`. Every write is a single transaction.
//!
//! # Failure Strategy
//! Corruption or schema mismatch on open is fatal: the engine refuses to
//! start and signals for restore-from-backup rather than run against
//! unverified data. A failed ledger write at runtime degrades to an
//! in-memory tail while enforcement continues (safety over durability).

pub mod baseline;
pub mod ledger;

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};
use rusqlite::Connection;

use crate::constants::SCHEMA_VERSION;
use baseline::BaselineRecord;
use ledger::LedgerEntry;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Sql(rusqlite::Error),
    Serialization(serde_json::Error),
    /// integrity_check failed or the file is not a database
    Corrupt(String),
    SchemaMismatch {
        found: u32,
        expected: u32,
    },
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Io(e) => write!(f, "store io error: {}", e),
            StoreError::Sql(e) => write!(f, "store sql error: {}", e),
            StoreError::Serialization(e) => write!(f, "store serialization error: {}", e),
            StoreError::Corrupt(msg) => {
                write!(f, "store corrupt: {} (restore from backup required)", msg)
            }
            StoreError::SchemaMismatch { found, expected } => write!(
                f,
                "schema version mismatch: found v{}, engine expects v{} (migration required)",
                found, expected
            ),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Sql(e)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e)
    }
}

// ============================================================================
// ENGINE STORE
// ============================================================================

/// Durable store shared by the baseline partition and the ledger.
///
/// The backing store supports one writer: every write path funnels through
/// the single connection mutex. Reads of baselines go through the in-memory
/// index and never touch the connection on the scoring path.
pub struct EngineStore {
    conn: Mutex<Connection>,
    baseline_index: RwLock<HashMap<String, BaselineRecord>>,
    /// Ledger entries that could not be persisted (disk full). Enforcement
    /// continues from memory; the tail is visible to operators.
    overflow: Mutex<Vec<LedgerEntry>>,
    degraded: AtomicBool,
}

impl EngineStore {
    /// Open or create the store. Fatal on corruption or schema mismatch.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path).map_err(|e| match e {
            rusqlite::Error::SqliteFailure(err, _)
                if err.code == rusqlite::ErrorCode::NotADatabase =>
            {
                StoreError::Corrupt("file is not a valid database".to_string())
            }
            other => StoreError::Sql(other),
        })?;

        // Verified before anything else; a corrupt file must never serve.
        let verdict: String = conn
            .query_row("PRAGMA integrity_check", [], |row| row.get(0))
            .map_err(|e| StoreError::Corrupt(format!("integrity_check failed: {}", e)))?;
        if verdict != "ok" {
            return Err(StoreError::Corrupt(verdict));
        }

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "FULL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        Self::init_schema(&conn)?;
        Self::check_schema_version(&conn)?;

        let store = Self {
            conn: Mutex::new(conn),
            baseline_index: RwLock::new(HashMap::new()),
            overflow: Mutex::new(Vec::new()),
            degraded: AtomicBool::new(false),
        };
        let loaded = store.rebuild_baseline_index()?;
        log::info!("Store opened at {:?} ({} baselines indexed)", path, loaded);
        Ok(store)
    }

    fn init_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS baselines (
                key        TEXT PRIMARY KEY,
                exe_path   TEXT NOT NULL,
                record     TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS ledger (
                key      TEXT PRIMARY KEY,
                ts_nanos INTEGER NOT NULL,
                pid      INTEGER NOT NULL,
                entry    TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_ledger_ts ON ledger (ts_nanos);
            CREATE TABLE IF NOT EXISTS meta (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    fn check_schema_version(conn: &Connection) -> Result<(), StoreError> {
        let existing: Option<String> = conn
            .query_row(
                "SELECT value FROM meta WHERE key = 'schema_version'",
                [],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(StoreError::Sql(other)),
            })?;

        match existing {
            Some(v) => {
                let found: u32 = v
                    .parse()
                    .map_err(|_| StoreError::Corrupt(format!("unparseable schema version '{}'", v)))?;
                if found != SCHEMA_VERSION {
                    return Err(StoreError::SchemaMismatch {
                        found,
                        expected: SCHEMA_VERSION,
                    });
                }
            }
            None => {
                conn.execute(
                    "INSERT INTO meta (key, value) VALUES ('schema_version', ?1)",
                    [SCHEMA_VERSION.to_string()],
                )?;
            }
        }
        Ok(())
    }

    /// True once a ledger write has failed and enforcement is running from
    /// in-memory state only.
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    pub(super) fn set_degraded(&self) {
        if !self.degraded.swap(true, Ordering::SeqCst) {
            log::error!("Store entered degraded mode: persistence unavailable, enforcement continues from memory");
        }
    }

    pub(super) fn conn(&self) -> &Mutex<Connection> {
        &self.conn
    }

    pub(super) fn index(&self) -> &RwLock<HashMap<String, BaselineRecord>> {
        &self.baseline_index
    }

    pub(super) fn overflow_buf(&self) -> &Mutex<Vec<LedgerEntry>> {
        &self.overflow
    }
}

// ============================================================================
// TESTS
// ============================================================================
