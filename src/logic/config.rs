//! Engine Configuration
//!
//! Externally supplied tunables, validated once at startup. Anything that
//! fails validation refuses to start the engine rather than running with a
//! threshold ladder that cannot be reasoned about.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::{self, DB_FILE_NAME};

/// Upper bound on the retention window (100 years). Keeps the nanosecond
/// cutoff arithmetic comfortably inside i64 range.
const MAX_RETENTION_DAYS: u32 = 36_500;

// ============================================================================
// ESCALATION THRESHOLDS
// ============================================================================

/// Severity thresholds mapping scorer output onto the state ladder.
/// Strictly increasing; a severity below `observed` maps to NORMAL.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EscalationThresholds {
    pub observed: f64,
    pub restricted: f64,
    pub isolated: f64,
    pub quarantined: f64,
}

impl Default for EscalationThresholds {
    fn default() -> Self {
        // Calibrated as Mahalanobis distances: ~3 sigma begins observation,
        // ~12 sigma is an outright quarantine.
        Self {
            observed: 3.0,
            restricted: 6.0,
            isolated: 9.0,
            quarantined: 12.0,
        }
    }
}

// ============================================================================
// ENGINE CONFIG
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Ledger retention window in days. Entries older than this are pruned.
    pub retention_days: u32,
    /// Interval between background prune runs, seconds.
    pub prune_interval_secs: u64,
    /// Severity thresholds for the state ladder.
    pub thresholds: EscalationThresholds,
    /// Severity assigned when no baseline exists or the scorer is
    /// unavailable. Must land above the isolated threshold: absence of
    /// evidence biases toward caution, not trust.
    pub max_uncertainty_severity: f64,
    /// Token bucket capacity per process.
    pub token_capacity: f64,
    /// Token refill rate, tokens per second.
    pub token_refill_per_sec: f64,
    /// Tokens consumed per ladder step of an escalation.
    pub tokens_per_step: f64,
    /// Baselines with fewer samples than this are treated as absent.
    pub min_baseline_samples: u64,
    /// Telemetry worker count.
    pub workers: usize,
    /// Interval between dead-process registry sweeps, seconds.
    pub reap_interval_secs: u64,
    /// Data directory. Defaults to the platform-local data dir.
    pub data_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retention_days: 30,
            prune_interval_secs: 6 * 60 * 60,
            thresholds: EscalationThresholds::default(),
            max_uncertainty_severity: 10.0,
            token_capacity: 8.0,
            token_refill_per_sec: 1.0 / 60.0, // one token a minute
            tokens_per_step: 2.0,
            min_baseline_samples: 10,
            workers: 4,
            reap_interval_secs: 30,
            data_dir: None,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config io error: {}", e),
            ConfigError::Parse(e) => write!(f, "config parse error: {}", e),
            ConfigError::Invalid(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e)
    }
}

impl EngineConfig {
    /// Load from a JSON file, or defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(p) => {
                let data = std::fs::read(p)?;
                serde_json::from_slice(&data)?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Startup validation. Rejects ladders the state machine cannot honor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.thresholds;
        if !(t.observed < t.restricted && t.restricted < t.isolated && t.isolated < t.quarantined) {
            return Err(ConfigError::Invalid(
                "escalation thresholds must be strictly increasing".to_string(),
            ));
        }
        if t.observed <= 0.0 {
            return Err(ConfigError::Invalid(
                "observed threshold must be positive".to_string(),
            ));
        }
        if self.max_uncertainty_severity <= t.isolated {
            return Err(ConfigError::Invalid(
                "max_uncertainty_severity must exceed the isolated threshold".to_string(),
            ));
        }
        if self.retention_days == 0 || self.retention_days > MAX_RETENTION_DAYS {
            return Err(ConfigError::Invalid(format!(
                "retention_days must be in 1..={}",
                MAX_RETENTION_DAYS
            )));
        }
        if self.token_refill_per_sec <= 0.0 {
            return Err(ConfigError::Invalid(
                "token_refill_per_sec must be > 0".to_string(),
            ));
        }
        if self.token_capacity < 1.0 {
            return Err(ConfigError::Invalid("token_capacity must be >= 1".to_string()));
        }
        if self.tokens_per_step <= 0.0 {
            return Err(ConfigError::Invalid("tokens_per_step must be > 0".to_string()));
        }
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be > 0".to_string()));
        }
        Ok(())
    }

    /// Resolved data directory.
    pub fn data_dir(&self) -> PathBuf {
        if let Some(dir) = constants::get_data_dir_override() {
            return PathBuf::from(dir);
        }
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(constants::APP_NAME)
        })
    }

    /// Resolved database path.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir().join(DB_FILE_NAME)
    }

    /// Retention window in nanoseconds.
    pub fn retention_nanos(&self) -> i64 {
        self.retention_days as i64 * 24 * 60 * 60 * 1_000_000_000
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_non_monotonic_thresholds() {
        let mut cfg = EngineConfig::default();
        cfg.thresholds.restricted = cfg.thresholds.isolated + 1.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_trusting_uncertainty() {
        let mut cfg = EngineConfig::default();
        cfg.max_uncertainty_severity = cfg.thresholds.observed;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_retention_and_refill() {
        let mut cfg = EngineConfig::default();
        cfg.retention_days = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = EngineConfig::default();
        cfg.token_refill_per_sec = 0.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_retention_beyond_cutoff_range() {
        // An absurd window would overflow the nanosecond cutoff and turn
        // pruning into a no-op; validation refuses it up front.
        let mut cfg = EngineConfig::default();
        cfg.retention_days = 200_000;
        assert!(cfg.validate().is_err());

        let mut cfg = EngineConfig::default();
        cfg.retention_days = 36_500;
        assert!(cfg.validate().is_ok());
        assert!(cfg.retention_nanos() > 0);
    }

    #[test]
    fn test_partial_file_round_trip() {
        // A partial config file falls back to defaults for missing fields.
        let json = r#"{ "retention_days": 7 }"#;
        let cfg: EngineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.retention_days, 7);
        assert_eq!(cfg.workers, EngineConfig::default().workers);
        assert!(cfg.validate().is_ok());
    }
}
