//! Audit Ledger - append-only record of every isolation transition.
//!
//! Keys are `{ts_nanos:020}{pid:010}` so lexicographic order equals
//! chronological order, which makes retention pruning a single range delete.
//! Rows are write-once: there is no update path, and a reader either sees a
//! committed entry or nothing (every append is one transaction).

use serde::{Deserialize, Serialize};

use super::{EngineStore, StoreError};
use crate::logic::state::{IsolationState, TransitionCause};

// ============================================================================
// LEDGER ENTRY
// ============================================================================

/// Immutable record of one state transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Transition time, unix nanoseconds.
    pub ts_nanos: i64,
    pub pid: u32,
    pub state_from: IsolationState,
    pub state_to: IsolationState,
    /// Severity score that triggered the transition.
    pub severity: f64,
    /// Token budget remaining at transition time.
    pub tokens_remaining: f64,
    pub cause: TransitionCause,
    /// Identifier of the enforcing node.
    pub node: String,
}

impl LedgerEntry {
    /// Sortable key: zero-padded timestamp concatenated with zero-padded pid.
    pub fn key(&self) -> String {
        ledger_key(self.ts_nanos, self.pid)
    }
}

pub fn ledger_key(ts_nanos: i64, pid: u32) -> String {
    format!("{:020}{:010}", ts_nanos, pid)
}

// ============================================================================
// STORE OPERATIONS
// ============================================================================

impl EngineStore {
    /// Append one entry within a single durable transaction.
    pub fn append(&self, entry: &LedgerEntry) -> Result<(), StoreError> {
        let json = serde_json::to_string(entry)?;
        let mut conn = self.conn().lock();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO ledger (key, ts_nanos, pid, entry) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![entry.key(), entry.ts_nanos, entry.pid, json],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Append, falling back to the in-memory overflow tail when persistence
    /// fails (disk full). Enforcement state is already updated by the caller;
    /// losing durability must not lose the decision.
    pub fn append_or_buffer(&self, entry: LedgerEntry) {
        match self.append(&entry) {
            Ok(()) => {}
            Err(e) => {
                log::error!(
                    "Ledger append failed for pid {} ({} -> {}): {}",
                    entry.pid,
                    entry.state_from,
                    entry.state_to,
                    e
                );
                self.set_degraded();
                self.overflow_buf().lock().push(entry);
            }
        }
    }

    /// Delete all entries strictly older than the cutoff. Returns the count
    /// removed. One transaction; idempotent.
    pub fn prune(&self, cutoff_nanos: i64) -> Result<usize, StoreError> {
        let mut conn = self.conn().lock();
        let tx = conn.transaction()?;
        let removed = tx.execute(
            "DELETE FROM ledger WHERE ts_nanos < ?1",
            rusqlite::params![cutoff_nanos],
        )?;
        tx.commit()?;
        if removed > 0 {
            log::info!("Pruned {} ledger entries older than cutoff", removed);
        }
        Ok(removed)
    }

    /// All entries in chronological order. Operational inspection only, not
    /// on the hot path.
    pub fn read_all(&self) -> Result<Vec<LedgerEntry>, StoreError> {
        let conn = self.conn().lock();
        let mut stmt = conn.prepare("SELECT entry FROM ledger ORDER BY key")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(serde_json::from_str(&row?)?);
        }
        Ok(entries)
    }

    /// Chronological history for one pid.
    pub fn read_for_pid(&self, pid: u32) -> Result<Vec<LedgerEntry>, StoreError> {
        let conn = self.conn().lock();
        let mut stmt = conn.prepare("SELECT entry FROM ledger WHERE pid = ?1 ORDER BY key")?;
        let rows = stmt.query_map([pid], |row| row.get::<_, String>(0))?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(serde_json::from_str(&row?)?);
        }
        Ok(entries)
    }

    /// Entries stranded in memory by degraded mode.
    pub fn overflow_len(&self) -> usize {
        self.overflow_buf().lock().len()
    }

    /// Snapshot of the in-memory tail, for operator inspection alongside
    /// `read_all` when running degraded.
    pub fn overflow_entries(&self) -> Vec<LedgerEntry> {
        self.overflow_buf().lock().clone()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> (tempfile::TempDir, EngineStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = EngineStore::open(&dir.path().join("t.db")).unwrap();
        (dir, store)
    }

    fn entry(ts: i64, pid: u32) -> LedgerEntry {
        LedgerEntry {
            ts_nanos: ts,
            pid,
            state_from: IsolationState::Normal,
            state_to: IsolationState::Observed,
            severity: 3.5,
            tokens_remaining: 6.0,
            cause: TransitionCause::SeverityThreshold,
            node: "test-node".to_string(),
        }
    }

    #[test]
    fn test_key_orders_chronologically() {
        // Lexicographic order must equal chronological order, including a
        // later timestamp with a smaller pid.
        let a = ledger_key(1_000, 99999);
        let b = ledger_key(2_000, 1);
        assert!(a < b);
        // Same nanosecond: pid breaks the tie deterministically.
        assert!(ledger_key(1_000, 1) < ledger_key(1_000, 2));
    }

    #[test]
    fn test_append_and_read_all_ordered() {
        let (_dir, store) = test_store();
        // Insert out of order; read must come back chronological.
        store.append(&entry(3_000, 10)).unwrap();
        store.append(&entry(1_000, 20)).unwrap();
        store.append(&entry(2_000, 30)).unwrap();

        let all = store.read_all().unwrap();
        let times: Vec<i64> = all.iter().map(|e| e.ts_nanos).collect();
        assert_eq!(times, vec![1_000, 2_000, 3_000]);
    }

    #[test]
    fn test_double_read_is_identical() {
        let (_dir, store) = test_store();
        for i in 0..5 {
            store.append(&entry(i * 100, i as u32)).unwrap();
        }
        let first = store.read_all().unwrap();
        let second = store.read_all().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_prune_exact_and_idempotent() {
        let (_dir, store) = test_store();
        store.append(&entry(100, 1)).unwrap();
        store.append(&entry(200, 2)).unwrap();
        store.append(&entry(300, 3)).unwrap();

        // Strictly older than 200: only ts=100 goes.
        assert_eq!(store.prune(200).unwrap(), 1);
        let remaining = store.read_all().unwrap();
        assert_eq!(remaining.len(), 2);
        assert_eq!(remaining[0].ts_nanos, 200);

        // Second run removes nothing.
        assert_eq!(store.prune(200).unwrap(), 0);
    }

    #[test]
    fn test_read_for_pid_filters() {
        let (_dir, store) = test_store();
        store.append(&entry(100, 7)).unwrap();
        store.append(&entry(200, 8)).unwrap();
        store.append(&entry(300, 7)).unwrap();

        let history = store.read_for_pid(7).unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|e| e.pid == 7));
        assert!(history[0].ts_nanos < history[1].ts_nanos);
    }

    #[test]
    fn test_failed_append_degrades_to_overflow() {
        let (_dir, store) = test_store();
        store.append(&entry(100, 1)).unwrap();
        assert!(!store.is_degraded());

        // A second append with the same (ts, pid) key violates the primary
        // key and cannot persist; the entry must land in the overflow tail
        // with the store flagged degraded, not vanish.
        let mut duplicate = entry(100, 1);
        duplicate.severity = 99.0;
        store.append_or_buffer(duplicate.clone());

        assert!(store.is_degraded());
        assert_eq!(store.overflow_len(), 1);
        assert_eq!(store.overflow_entries(), vec![duplicate]);
        // The persisted ledger is untouched by the failed write.
        let persisted = store.read_all().unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].severity, 3.5);
    }

    #[test]
    fn test_entry_round_trips_through_json() {
        let e = entry(123, 456);
        let json = serde_json::to_string(&e).unwrap();
        let back: LedgerEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(e, back);
    }
}
