//! Central configuration constants.
//!
//! Single source of truth for engine-wide fixed values. Operator tunables
//! (thresholds, retention, refill rates) live in `logic::config`.

/// On-disk schema version. Incremented on any change to the table layout.
/// A mismatch on open is fatal and requires explicit migration.
pub const SCHEMA_VERSION: u32 = 1;

/// Default database file name under the data directory.
pub const DB_FILE_NAME: &str = "isolation-core.db";

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// App name
pub const APP_NAME: &str = "isolation-core";

/// Get config file path from environment, if set.
pub fn get_config_path() -> Option<String> {
    std::env::var("ISOLATION_CORE_CONFIG").ok()
}

/// Get data directory override from environment, if set.
pub fn get_data_dir_override() -> Option<String> {
    std::env::var("ISOLATION_CORE_DATA_DIR").ok()
}
