//! Engine logic.
//!
//! Dependency order, leaves first: `features`/`state`/`budget` are plain
//! data, `store` persists, `scorer` reads baselines, `machine` consumes
//! scores and budgets, `registry` holds machines per pid, `policy` is the
//! pure decision table, `engine` wires it together, `admin` and `redteam`
//! sit on top.

pub mod admin;
pub mod budget;
pub mod config;
pub mod engine;
pub mod features;
pub mod machine;
pub mod policy;
pub mod redteam;
pub mod registry;
pub mod scorer;
pub mod state;
pub mod store;
pub mod telemetry;

/// Current time as unix nanoseconds. Saturates far in the future rather
/// than panicking if the platform clock is out of chrono's range.
pub fn now_nanos() -> i64 {
    chrono::Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX)
}
