//! Application constants
//!
//! Centralized location for all domain-level constants used throughout the
//! application.

// Step pipeline configuration
pub const DEFAULT_MIN_UPDATE_INTERVAL_MS: u64 = 500;
pub const DEFAULT_DAILY_CUTOFF_HOUR: u32 = 22;
pub const DEFAULT_MAX_STEPS_PER_SECOND: u32 = 20;
pub const DEFAULT_MAX_STEPS_PER_DAY: u32 = 100_000;
pub const DEFAULT_DAILY_STEP_TARGET: u32 = 10_000;

// Driver configuration
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 3_000;
pub const DEFAULT_FALLBACK_TIMEOUT_SECS: u64 = 10;

// Activity classifier configuration
pub const DEFAULT_MIN_WALKING_MAGNITUDE: f64 = 0.1;
pub const DEFAULT_MAX_WALKING_MAGNITUDE: f64 = 2.0;
pub const DEFAULT_MIN_VERTICAL_RATIO: f64 = 0.3;
pub const DEFAULT_IDEAL_WALKING_MAGNITUDE: f64 = 0.5;
pub const HIGH_CONFIDENCE_BAND: f64 = 0.2;
pub const MEDIUM_CONFIDENCE_BAND: f64 = 0.5;

// Sync configuration
pub const DEFAULT_MIN_SYNC_INTERVAL_SECS: u64 = 10;

// Rollover configuration
pub const DEFAULT_ROLLOVER_CHECK_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_RETENTION_DAYS: i64 = 90;
