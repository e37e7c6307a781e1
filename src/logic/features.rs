//! Feature Vector - the unit of behavioral telemetry
//!
//! **Versioned feature vector with layout validation**
//!
//! The extraction pipeline that produces these vectors is external; the
//! engine only consumes them. Layout versioning follows the same rules as
//! the baseline schema:
//! 1. Add feature -> increment FEATURE_VERSION
//! 2. Change order -> increment FEATURE_VERSION
//! 3. Remove feature -> increment FEATURE_VERSION

use crc32fast::Hasher;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

// ============================================================================
// FEATURE VERSION
// ============================================================================

/// Current feature layout version.
/// MUST be incremented when the upstream extractor changes its layout.
pub const FEATURE_VERSION: u8 = 1;

/// Feature names in the exact order they appear in the vector.
/// Single source of truth for the layout hash; the engine itself treats the
/// values as an opaque point in feature space.
pub const FEATURE_LAYOUT: &[&str] = &[
    "syscall_rate",
    "syscall_entropy",
    "net_connect_rate",
    "net_bytes_out_rate",
    "net_bytes_in_rate",
    "fs_write_rate",
    "fs_unique_paths",
    "proc_spawn_rate",
    "ipc_op_rate",
    "mem_map_churn",
    "cpu_percent",
    "fd_count",
];

/// Total number of features in the default layout.
pub const FEATURE_COUNT: usize = 12;

static LAYOUT_HASH: Lazy<u32> = Lazy::new(|| {
    let mut hasher = Hasher::new();
    for name in FEATURE_LAYOUT {
        hasher.update(name.as_bytes());
        hasher.update(b"|");
    }
    hasher.finalize()
});

/// CRC32 hash of the feature layout, computed once.
/// Used to detect vector/baseline layout mismatches at scoring time.
pub fn layout_hash() -> u32 {
    *LAYOUT_HASH
}

// ============================================================================
// VERSIONED FEATURE VECTOR
// ============================================================================

/// One behavioral sample for one monitored process.
///
/// Never pass raw `Vec<f64>` around for features; the version and layout
/// hash travel with the values so a stale extractor or stale baseline is
/// detected instead of silently mis-scored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Feature layout version
    pub version: u8,
    /// CRC32 hash of the feature layout
    pub layout_hash: u32,
    /// Process this sample was taken from
    pub pid: u32,
    /// Absolute path of the process binary (baseline lookup key source)
    pub exe_path: String,
    /// Feature values in layout order
    pub values: Vec<f64>,
    /// Capture time, unix nanoseconds
    pub captured_at: i64,
}

impl FeatureVector {
    /// Create from raw values with the current layout version.
    pub fn new(pid: u32, exe_path: &str, values: Vec<f64>, captured_at: i64) -> Self {
        Self {
            version: FEATURE_VERSION,
            layout_hash: layout_hash(),
            pid,
            exe_path: exe_path.to_string(),
            values,
            captured_at,
        }
    }

    /// Number of dimensions carried by this sample.
    pub fn dim(&self) -> usize {
        self.values.len()
    }

    /// Check layout compatibility against a baseline's recorded layout.
    pub fn layout_matches(&self, version: u8, hash: u32) -> bool {
        self.version == version && self.layout_hash == hash
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_hash_is_stable() {
        assert_eq!(layout_hash(), layout_hash());
        assert_eq!(FEATURE_LAYOUT.len(), FEATURE_COUNT);
    }

    #[test]
    fn test_vector_carries_layout() {
        let v = FeatureVector::new(42, "/usr/bin/true", vec![0.0; FEATURE_COUNT], 0);
        assert!(v.layout_matches(FEATURE_VERSION, layout_hash()));
        assert!(!v.layout_matches(FEATURE_VERSION + 1, layout_hash()));
        assert_eq!(v.dim(), FEATURE_COUNT);
    }
}
