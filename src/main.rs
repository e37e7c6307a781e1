//! isolation-core - headless behavioral isolation engine.
//!
//! Startup order matters: config validation and store integrity are hard
//! gates (a corrupt store or broken threshold ladder refuses to start),
//! everything after that degrades rather than dies.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::watch;

use behavior_isolation_core::constants;
use behavior_isolation_core::logic::{self, config::EngineConfig, telemetry};
use behavior_isolation_core::logic::engine::{self, Engine};
use behavior_isolation_core::logic::store::EngineStore;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting {} v{}", constants::APP_NAME, constants::APP_VERSION);

    let config_path = constants::get_config_path().map(PathBuf::from);
    let config = match EngineConfig::load(config_path.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            log::error!("Refusing to start: {}", e);
            std::process::exit(1);
        }
    };

    let store = match EngineStore::open(&config.db_path()) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            // Corruption and schema mismatch are fatal by design: running
            // against unverified data is worse than not running.
            log::error!("Refusing to start: {}", e);
            std::process::exit(1);
        }
    };

    // Retention runs before anything else so a long-stopped node does not
    // serve a ledger full of expired entries.
    let startup_cutoff = logic::now_nanos() - config.retention_nanos();
    match store.prune(startup_cutoff) {
        Ok(removed) => log::info!("Startup retention prune removed {} entries", removed),
        Err(e) => log::error!("Startup retention prune failed: {}", e),
    }

    let engine = Arc::new(Engine::new(config.clone(), Arc::clone(&store)));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // The external feature-extraction pipeline writes into this feed. The
    // sender half is handed to the collaborator boundary; dropping it here
    // would stop the dispatcher, so it stays alive for the process lifetime.
    let (feed_tx, feed_rx) = telemetry::feed(1024);
    let _feed_tx = feed_tx;

    let dispatcher = engine::spawn_workers(Arc::clone(&engine), feed_rx, shutdown_rx.clone());
    let pruner = tokio::spawn(engine::run_pruner(
        Arc::clone(&store),
        config.clone(),
        shutdown_rx.clone(),
    ));
    let reaper = tokio::spawn(engine::run_reaper(Arc::clone(&engine), shutdown_rx));

    log::info!(
        "Engine running: {} workers, retention {} days, prune every {}s",
        config.workers,
        config.retention_days,
        config.prune_interval_secs
    );

    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Signal handler failed: {}", e);
    }
    log::info!("Shutdown requested");

    let _ = shutdown_tx.send(true);
    let _ = tokio::join!(dispatcher, pruner, reaper);

    if store.is_degraded() {
        log::warn!(
            "Exiting degraded: {} ledger entries were never persisted",
            store.overflow_len()
        );
    }
    log::info!("Stopped");
}
