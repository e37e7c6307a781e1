//! Baseline partition - per-binary statistical profiles.
//!
//! Records are produced by the external training pipeline and read-only from
//! the scorer's perspective. The write path persists first, then refreshes
//! the in-memory index; scoring reads only the index and never waits on a
//! durable write. Baselines are retained indefinitely, never pruned.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{EngineStore, StoreError};
use crate::logic::now_nanos;

// ============================================================================
// BASELINE RECORD
// ============================================================================

/// Learned statistical profile for one monitored binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineRecord {
    pub id: String,
    /// Absolute path of the binary this profile describes.
    pub exe_path: String,
    pub feature_version: u8,
    pub layout_hash: u32,
    /// Mean feature vector.
    pub mean: Vec<f64>,
    /// n x n sample covariance matrix, row major.
    pub covariance: Vec<Vec<f64>>,
    /// Shannon entropy of the baseline behavior distribution.
    pub entropy: f64,
    /// Samples the training pipeline folded into this profile.
    pub samples: u64,
    /// Unix nanoseconds, stamped by `put_baseline`.
    pub updated_at: i64,
}

impl BaselineRecord {
    pub fn new(exe_path: &str, mean: Vec<f64>, covariance: Vec<Vec<f64>>, entropy: f64, samples: u64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            exe_path: exe_path.to_string(),
            feature_version: crate::logic::features::FEATURE_VERSION,
            layout_hash: crate::logic::features::layout_hash(),
            mean,
            covariance,
            entropy,
            samples,
            updated_at: 0,
        }
    }

    pub fn dim(&self) -> usize {
        self.mean.len()
    }
}

/// Deterministic key for a binary path: lowercase hex SHA-256.
pub fn baseline_key(exe_path: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(exe_path.as_bytes());
    hex::encode(hasher.finalize())
}

// ============================================================================
// STORE OPERATIONS
// ============================================================================

impl EngineStore {
    /// Persist (insert or overwrite) a baseline in one transaction, stamping
    /// `updated_at`, then refresh the read index.
    pub fn put_baseline(&self, mut record: BaselineRecord) -> Result<(), StoreError> {
        record.updated_at = now_nanos();
        let key = baseline_key(&record.exe_path);
        let json = serde_json::to_string(&record)?;

        {
            let mut conn = self.conn().lock();
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT OR REPLACE INTO baselines (key, exe_path, record, updated_at)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![key, record.exe_path, json, record.updated_at],
            )?;
            tx.commit()?;
        }

        self.index().write().insert(key, record);
        Ok(())
    }

    /// Current profile for a binary path, or None. Absence is not an error.
    /// Served from the in-memory index; never blocks on the write path.
    pub fn get_baseline(&self, exe_path: &str) -> Option<BaselineRecord> {
        self.index().read().get(&baseline_key(exe_path)).cloned()
    }

    /// Number of baselines currently indexed.
    pub fn baseline_count(&self) -> usize {
        self.index().read().len()
    }

    /// Rebuild the read index from the durable partition. Runs at startup.
    pub(super) fn rebuild_baseline_index(&self) -> Result<usize, StoreError> {
        let conn = self.conn().lock();
        let mut stmt = conn.prepare("SELECT key, record FROM baselines")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut index = self.index().write();
        index.clear();
        for row in rows {
            let (key, json) = row?;
            match serde_json::from_str::<BaselineRecord>(&json) {
                Ok(record) => {
                    index.insert(key, record);
                }
                Err(e) => {
                    // One bad row does not disable scoring for every binary.
                    log::error!("Skipping undecodable baseline {}: {}", key, e);
                }
            }
        }
        Ok(index.len())
    }
}

// ============================================================================
// TESTS
// ============================================================================
