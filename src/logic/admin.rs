//! Operator actions - the in-core half of the administration surface.
//!
//! The console/CLI that invokes these is external; the core only exposes
//! inspection and the two state-changing actions (force-quarantine and
//! release). Both actions produce ordinary ledger entries: an operator
//! decision is as auditable as an automatic one.

use crate::logic::engine::Engine;
use crate::logic::now_nanos;
use crate::logic::store::baseline::BaselineRecord;
use crate::logic::store::ledger::LedgerEntry;
use crate::logic::store::StoreError;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug)]
pub enum AdminError {
    UnknownPid(u32),
    NotQuarantined(u32),
    Store(StoreError),
}

impl std::fmt::Display for AdminError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdminError::UnknownPid(pid) => write!(f, "pid {} is not tracked", pid),
            AdminError::NotQuarantined(pid) => write!(f, "pid {} is not quarantined", pid),
            AdminError::Store(e) => write!(f, "store error: {}", e),
        }
    }
}

impl std::error::Error for AdminError {}

impl From<StoreError> for AdminError {
    fn from(e: StoreError) -> Self {
        AdminError::Store(e)
    }
}

// ============================================================================
// OPERATOR SURFACE
// ============================================================================

impl Engine {
    /// Full chronological ledger, capped at `limit` most recent entries.
    /// Includes the in-memory overflow tail when running degraded.
    pub fn list_ledger(&self, limit: usize) -> Result<Vec<LedgerEntry>, AdminError> {
        let mut entries = self.store().read_all()?;
        entries.extend(self.store().overflow_entries());
        let start = entries.len().saturating_sub(limit);
        Ok(entries.split_off(start))
    }

    /// Chronological transition history for one pid.
    pub fn ledger_for_pid(&self, pid: u32) -> Result<Vec<LedgerEntry>, AdminError> {
        Ok(self.store().read_for_pid(pid)?)
    }

    /// Current baseline for a binary path, if one exists.
    pub fn inspect_baseline(&self, exe_path: &str) -> Option<BaselineRecord> {
        self.store().get_baseline(exe_path)
    }

    /// Force a pid into quarantine. Creates a tracking entry if the engine
    /// has not seen the pid yet, so an operator can confine a process ahead
    /// of its first telemetry. No-op error-free if already quarantined.
    pub fn force_quarantine(&self, pid: u32) {
        let now = now_nanos();
        let transition =
            self.registry()
                .with_entry(pid, "", now, |entry| entry.machine.operator_quarantine());
        if let Some(t) = transition {
            self.record(pid, &t);
        }
    }

    /// Release a pid from quarantine: the only path down the ladder. Logged
    /// as a transition like any other; affects exactly this pid.
    pub fn release(&self, pid: u32) -> Result<(), AdminError> {
        if !self.registry().contains(pid) {
            return Err(AdminError::UnknownPid(pid));
        }
        let now = now_nanos();
        let transition = self
            .registry()
            .with_existing(pid, |entry| entry.machine.operator_release(now))
            .flatten();
        match transition {
            Some(t) => {
                self.record(pid, &t);
                Ok(())
            }
            None => Err(AdminError::NotQuarantined(pid)),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::logic::config::EngineConfig;
    use crate::logic::policy::OpCategory;
    use crate::logic::state::{IsolationState, TransitionCause};
    use crate::logic::store::EngineStore;

    fn test_engine() -> (tempfile::TempDir, Engine) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(EngineStore::open(&dir.path().join("t.db")).unwrap());
        (dir, Engine::new(EngineConfig::default(), store))
    }

    #[test]
    fn test_force_quarantine_then_deny() {
        let (_dir, engine) = test_engine();
        engine.force_quarantine(1234);

        assert_eq!(engine.registry().state_of(1234), IsolationState::Quarantined);
        assert!(!engine.decide(1234, OpCategory::NetConnect).allow);

        let entries = engine.ledger_for_pid(1234).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].cause, TransitionCause::OperatorQuarantine);
    }

    #[test]
    fn test_release_writes_one_entry_and_spares_others() {
        let (_dir, engine) = test_engine();
        engine.force_quarantine(10);
        engine.force_quarantine(11);

        engine.release(10).unwrap();

        assert_eq!(engine.registry().state_of(10), IsolationState::Normal);
        // The other quarantined pid is untouched.
        assert_eq!(engine.registry().state_of(11), IsolationState::Quarantined);

        let entries = engine.ledger_for_pid(10).unwrap();
        assert_eq!(entries.len(), 2);
        let release = &entries[1];
        assert_eq!(release.state_from, IsolationState::Quarantined);
        assert_eq!(release.state_to, IsolationState::Normal);
        assert_eq!(release.cause, TransitionCause::OperatorRelease);
    }

    #[test]
    fn test_release_refuses_unknown_and_unquarantined() {
        let (_dir, engine) = test_engine();
        assert!(matches!(engine.release(99), Err(AdminError::UnknownPid(99))));

        engine.registry().with_entry(5, "/usr/bin/x", 0, |_| ());
        assert!(matches!(engine.release(5), Err(AdminError::NotQuarantined(5))));
    }

    #[test]
    fn test_double_force_quarantine_logs_once() {
        let (_dir, engine) = test_engine();
        engine.force_quarantine(7);
        engine.force_quarantine(7);
        assert_eq!(engine.ledger_for_pid(7).unwrap().len(), 1);
    }

    #[test]
    fn test_list_ledger_caps_and_orders() {
        let (_dir, engine) = test_engine();
        for pid in 0..10u32 {
            engine.force_quarantine(pid);
        }
        let recent = engine.list_ledger(3).unwrap();
        assert_eq!(recent.len(), 3);
        assert!(recent.windows(2).all(|w| w[0].ts_nanos <= w[1].ts_nanos));
    }
}
