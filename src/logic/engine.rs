//! Engine - wiring between scorer, state machines, ledger and policy.
//!
//! One `Engine` owns the store, the process registry and the configuration.
//! Telemetry flows in through a dispatcher that routes each pid to a fixed
//! worker, preserving per-pid ordering while samples for different processes
//! score in parallel. The kernel-hook boundary enters through `decide`,
//! which reads one shard lock and then runs the pure policy function.

use std::sync::Arc;
use std::time::Duration;

use sysinfo::{Pid, System};
use tokio::sync::{mpsc, watch};

use crate::logic::config::EngineConfig;
use crate::logic::machine::Transition;
use crate::logic::now_nanos;
use crate::logic::policy::{self, Decision, OpCategory};
use crate::logic::registry::ProcessRegistry;
use crate::logic::scorer;
use crate::logic::state::TransitionCause;
use crate::logic::store::ledger::LedgerEntry;
use crate::logic::store::EngineStore;
use crate::logic::telemetry::SensorEvent;

// ============================================================================
// ENGINE
// ============================================================================

pub struct Engine {
    config: EngineConfig,
    store: Arc<EngineStore>,
    registry: ProcessRegistry,
    node: String,
}

impl Engine {
    pub fn new(config: EngineConfig, store: Arc<EngineStore>) -> Self {
        let node = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "unknown-node".to_string());
        Self {
            registry: ProcessRegistry::new(config.clone()),
            config,
            store,
            node,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<EngineStore> {
        &self.store
    }

    pub fn registry(&self) -> &ProcessRegistry {
        &self.registry
    }

    // ------------------------------------------------------------------
    // Telemetry path
    // ------------------------------------------------------------------

    pub fn handle_event(&self, event: SensorEvent) {
        match event {
            SensorEvent::Sample(sample) => {
                let baseline = self.store.get_baseline(&sample.exe_path);
                let severity = scorer::severity(
                    &sample,
                    baseline.as_ref(),
                    self.config.max_uncertainty_severity,
                    self.config.min_baseline_samples,
                );
                self.apply(sample.pid, &sample.exe_path, severity, TransitionCause::SeverityThreshold);
            }
            SensorEvent::SensorFailure { pid, exe_path, detail } => {
                // No score is itself a signal. Substitute maximal
                // uncertainty and escalate under the failure cause.
                log::warn!("Sensor failure for pid {}: {}", pid, detail);
                self.apply(
                    pid,
                    &exe_path,
                    self.config.max_uncertainty_severity,
                    TransitionCause::SensorFailure,
                );
            }
        }
    }

    fn apply(&self, pid: u32, exe_path: &str, severity: f64, cause: TransitionCause) {
        let now = now_nanos();
        let transition = self.registry.with_entry(pid, exe_path, now, |entry| {
            entry.machine.evaluate(severity, cause, now)
        });
        if let Some(t) = transition {
            self.record(pid, &t);
        }
    }

    /// Exactly one ledger entry per transition, computed or forced. The
    /// registry state is already updated when this runs, so enforcement
    /// takes effect even if the durable write degrades.
    pub(crate) fn record(&self, pid: u32, t: &Transition) {
        log::warn!(
            "pid {} {} -> {} (severity {:.2}, cause {}, {:.1} tokens left)",
            pid,
            t.from,
            t.to,
            t.severity,
            t.cause,
            t.tokens_remaining
        );
        self.store.append_or_buffer(LedgerEntry {
            ts_nanos: now_nanos(),
            pid,
            state_from: t.from,
            state_to: t.to,
            severity: t.severity,
            tokens_remaining: t.tokens_remaining,
            cause: t.cause,
            node: self.node.clone(),
        });
    }

    // ------------------------------------------------------------------
    // Hook boundary
    // ------------------------------------------------------------------

    /// Entry point for the external kernel-hook mechanism: one call per
    /// intercepted operation. Reads one shard lock, then the pure table.
    /// Never performs I/O and never waits on the ledger or baseline paths.
    pub fn decide(&self, pid: u32, category: OpCategory) -> Decision {
        let state = self.registry.state_of(pid);
        policy::decide_checked(pid, category, state)
    }
}

// ============================================================================
// WORKER POOL
// ============================================================================

/// Dispatch telemetry to a pool of workers, routed by pid so that samples
/// for one process are always evaluated in arrival order.
pub fn spawn_workers(
    engine: Arc<Engine>,
    mut feed: mpsc::Receiver<SensorEvent>,
    shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    let workers = engine.config().workers;
    let mut senders = Vec::with_capacity(workers);
    let mut handles = Vec::with_capacity(workers);
    for worker_id in 0..workers {
        let (tx, mut rx) = mpsc::channel::<SensorEvent>(256);
        senders.push(tx);
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                engine.handle_event(event);
            }
            log::debug!("Worker {} drained", worker_id);
        }));
    }

    let mut shutdown = shutdown;
    tokio::spawn(async move {
        loop {
            tokio::select! {
                maybe = feed.recv() => match maybe {
                    Some(event) => {
                        let idx = event.pid() as usize % senders.len();
                        if senders[idx].send(event).await.is_err() {
                            log::error!("Worker {} channel closed; dropping event", idx);
                        }
                    }
                    None => break,
                },
                _ = shutdown.changed() => break,
            }
        }
        // Dropping the routes lets each worker drain its queue; joining
        // them means every event already routed reaches the ledger before
        // the dispatcher reports stopped.
        drop(senders);
        for handle in handles {
            let _ = handle.await;
        }
        log::info!("Telemetry dispatcher stopped");
    })
}

// ============================================================================
// BACKGROUND TASKS
// ============================================================================

/// Retention pruning: once at startup, then on a fixed cycle. Cancelling at
/// shutdown is safe; an in-flight delete either commits or rolls back.
pub async fn run_pruner(
    store: Arc<EngineStore>,
    config: EngineConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(config.prune_interval_secs));
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let cutoff = now_nanos() - config.retention_nanos();
                match store.prune(cutoff) {
                    Ok(removed) => log::debug!("Retention prune removed {} entries", removed),
                    Err(e) => log::error!("Retention prune failed: {}", e),
                }
            }
            _ = shutdown.changed() => {
                log::info!("Pruner stopped");
                return;
            }
        }
    }
}

/// Drop registry entries for processes that have exited, keeping per-process
/// state bounded by the live process count.
pub async fn run_reaper(engine: Arc<Engine>, mut shutdown: watch::Receiver<bool>) {
    let interval_secs = engine.config().reap_interval_secs;
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    let mut system = System::new();
    loop {
        tokio::select! {
            _ = interval.tick() => {
                system.refresh_processes();
                engine
                    .registry()
                    .remove_dead(|pid| system.process(Pid::from_u32(pid)).is_some());
            }
            _ = shutdown.changed() => {
                log::info!("Reaper stopped");
                return;
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
