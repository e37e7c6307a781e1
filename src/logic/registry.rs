//! Process Registry - sharded per-process state.
//!
//! High-cardinality concurrent map keyed by pid. Shards with independent
//! locks keep contention flat as the number of monitored processes grows;
//! there is no global lock anywhere on the evaluation path. Entries are
//! created on first telemetry and reaped once the process exits, which
//! bounds memory. Ledger history for a reaped pid is untouched.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::logic::config::EngineConfig;
use crate::logic::machine::IsolationMachine;
use crate::logic::state::IsolationState;

const SHARDS: usize = 16;

// ============================================================================
// PROCESS ENTRY
// ============================================================================

#[derive(Debug, Clone)]
pub struct ProcessEntry {
    pub pid: u32,
    pub exe_path: String,
    pub machine: IsolationMachine,
    pub first_seen_nanos: i64,
    pub last_seen_nanos: i64,
}

// ============================================================================
// REGISTRY
// ============================================================================

pub struct ProcessRegistry {
    shards: Vec<RwLock<HashMap<u32, ProcessEntry>>>,
    config: EngineConfig,
}

impl ProcessRegistry {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            shards: (0..SHARDS).map(|_| RwLock::new(HashMap::new())).collect(),
            config,
        }
    }

    fn shard(&self, pid: u32) -> &RwLock<HashMap<u32, ProcessEntry>> {
        &self.shards[pid as usize % SHARDS]
    }

    /// Run `f` against the entry for `pid`, creating it on first sight.
    /// Holds only the one shard's write lock for the duration of `f`.
    pub fn with_entry<R>(
        &self,
        pid: u32,
        exe_path: &str,
        now_nanos: i64,
        f: impl FnOnce(&mut ProcessEntry) -> R,
    ) -> R {
        let mut shard = self.shard(pid).write();
        let entry = shard.entry(pid).or_insert_with(|| {
            log::debug!("Tracking new process {} ({})", pid, exe_path);
            ProcessEntry {
                pid,
                exe_path: exe_path.to_string(),
                machine: IsolationMachine::new(&self.config, now_nanos),
                first_seen_nanos: now_nanos,
                last_seen_nanos: now_nanos,
            }
        });
        entry.last_seen_nanos = now_nanos;
        f(entry)
    }

    /// Run `f` against an existing entry only. Used by operator actions,
    /// which must not conjure state for pids the engine never saw.
    pub fn with_existing<R>(
        &self,
        pid: u32,
        f: impl FnOnce(&mut ProcessEntry) -> R,
    ) -> Option<R> {
        let mut shard = self.shard(pid).write();
        shard.get_mut(&pid).map(f)
    }

    /// Current confinement state. Unknown pids are unconfined; the hook
    /// boundary only carries state for processes the engine tracks.
    pub fn state_of(&self, pid: u32) -> IsolationState {
        self.shard(pid)
            .read()
            .get(&pid)
            .map(|e| e.machine.state())
            .unwrap_or(IsolationState::Normal)
    }

    pub fn contains(&self, pid: u32) -> bool {
        self.shard(pid).read().contains_key(&pid)
    }

    pub fn remove(&self, pid: u32) -> Option<ProcessEntry> {
        self.shard(pid).write().remove(&pid)
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pids(&self) -> Vec<u32> {
        let mut pids = Vec::new();
        for shard in &self.shards {
            pids.extend(shard.read().keys().copied());
        }
        pids
    }

    /// Drop entries whose pid is no longer alive. Returns reaped pids.
    pub fn remove_dead(&self, is_alive: impl Fn(u32) -> bool) -> Vec<u32> {
        let mut reaped = Vec::new();
        for shard in &self.shards {
            let mut map = shard.write();
            map.retain(|pid, _| {
                if is_alive(*pid) {
                    true
                } else {
                    reaped.push(*pid);
                    false
                }
            });
        }
        if !reaped.is_empty() {
            log::debug!("Reaped {} exited process entries", reaped.len());
        }
        reaped
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::state::TransitionCause;

    fn registry() -> ProcessRegistry {
        ProcessRegistry::new(EngineConfig::default())
    }

    #[test]
    fn test_entry_created_on_first_sight() {
        let r = registry();
        assert!(!r.contains(42));
        r.with_entry(42, "/usr/bin/x", 0, |e| {
            assert_eq!(e.pid, 42);
            assert_eq!(e.machine.state(), IsolationState::Normal);
        });
        assert!(r.contains(42));
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn test_unknown_pid_reads_as_normal() {
        let r = registry();
        assert_eq!(r.state_of(9999), IsolationState::Normal);
    }

    #[test]
    fn test_state_visible_across_shards() {
        let r = registry();
        r.with_entry(7, "/usr/bin/x", 0, |e| {
            e.machine.evaluate(100.0, TransitionCause::SeverityThreshold, 0);
        });
        assert_eq!(r.state_of(7), IsolationState::Quarantined);
        // Neighbors in other shards are unaffected.
        assert_eq!(r.state_of(8), IsolationState::Normal);
    }

    #[test]
    fn test_with_existing_refuses_unknown() {
        let r = registry();
        assert!(r.with_existing(1, |_| ()).is_none());
        r.with_entry(1, "/usr/bin/x", 0, |_| ());
        assert!(r.with_existing(1, |_| ()).is_some());
    }

    #[test]
    fn test_remove_dead_reaps_only_dead() {
        let r = registry();
        for pid in [1u32, 2, 3, 17, 18] {
            r.with_entry(pid, "/usr/bin/x", 0, |_| ());
        }
        let reaped = r.remove_dead(|pid| pid % 2 == 1);
        let mut reaped_sorted = reaped;
        reaped_sorted.sort_unstable();
        assert_eq!(reaped_sorted, vec![2, 18]);
        assert_eq!(r.len(), 3);
        assert!(r.contains(17));
    }

    #[test]
    fn test_many_pids_spread_over_shards() {
        let r = registry();
        for pid in 0..1000u32 {
            r.with_entry(pid, "/usr/bin/x", 0, |_| ());
        }
        assert_eq!(r.len(), 1000);
        let mut pids = r.pids();
        pids.sort_unstable();
        assert_eq!(pids.len(), 1000);
        assert_eq!(pids[0], 0);
        assert_eq!(pids[999], 999);
    }
}
