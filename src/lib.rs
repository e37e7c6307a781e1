//! behavior-isolation-core - behavioral anomaly detection and process
//! isolation, core engine.
//!
//! The binary runs the daemon; this library surface is what the external
//! collaborators link against: the kernel-hook shim calls
//! [`logic::engine::Engine::decide`], the operator console calls the
//! actions in [`logic::admin`], the telemetry pipeline writes into
//! [`logic::telemetry::feed`], and the validation harness drives
//! [`logic::redteam::run_all`].

pub mod constants;
pub mod logic;
