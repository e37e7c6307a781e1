//! Telemetry boundary - where the external feature pipeline hands off.
//!
//! Feature extraction is a collaborator, not part of this core. It delivers
//! `SensorEvent`s into the feed channel; the engine's worker pool consumes
//! them. A pipeline that cannot produce a score for a pid reports
//! `SensorFailure` instead of going silent, and the engine escalates on
//! principle (fail toward restriction, never toward trust).

use tokio::sync::mpsc;

use crate::logic::features::FeatureVector;

/// One message from the telemetry pipeline.
#[derive(Debug, Clone)]
pub enum SensorEvent {
    /// A behavioral sample for a monitored process.
    Sample(FeatureVector),
    /// The pipeline could not produce a usable vector for this pid.
    SensorFailure {
        pid: u32,
        exe_path: String,
        detail: String,
    },
}

impl SensorEvent {
    pub fn pid(&self) -> u32 {
        match self {
            SensorEvent::Sample(v) => v.pid,
            SensorEvent::SensorFailure { pid, .. } => *pid,
        }
    }
}

/// Create the feed channel the external pipeline writes into.
pub fn feed(capacity: usize) -> (mpsc::Sender<SensorEvent>, mpsc::Receiver<SensorEvent>) {
    mpsc::channel(capacity)
}
