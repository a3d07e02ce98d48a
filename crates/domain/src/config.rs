//! Application configuration structures
//!
//! Loaded by the infra configuration loader from environment variables or a
//! config file; every section has sensible defaults so partial files work.

use serde::{Deserialize, Serialize};

use crate::constants::*;

/// Top-level application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
}

/// Local cache database configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: "stridearc.db".to_string(), pool_size: 4 }
    }
}

/// Remote sync configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    pub enabled: bool,
    /// Minimum interval between actual network writes, in seconds. Local
    /// accepts arriving faster than this are coalesced.
    pub min_interval_seconds: u64,
    pub base_url: String,
    pub request_timeout_seconds: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_interval_seconds: DEFAULT_MIN_SYNC_INTERVAL_SECS,
            base_url: "https://api.stridearc.app/v1".to_string(),
            request_timeout_seconds: 30,
        }
    }
}

/// Step tracking configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Whether the platform health-data path may be used at all.
    pub health_source_enabled: bool,
    /// Whether the raw motion-sensor path may be used at all.
    pub motion_source_enabled: bool,
    /// Minimum gap between accepted pipeline updates, in milliseconds.
    pub min_update_interval_ms: u64,
    /// Hour of day (local wall clock, 0-23) after which increments are
    /// ignored.
    pub daily_cutoff_hour: u32,
    /// Sustained step rate above this is flagged as implausible.
    pub max_steps_per_second: u32,
    /// Anti-gaming cap on the daily total.
    pub max_steps_per_day: u32,
    pub daily_step_target: u32,
    /// Driver poll interval, in milliseconds.
    pub poll_interval_ms: u64,
    /// Driver start timeout; expiry counts as a driver failure.
    pub fallback_timeout_seconds: u64,
    /// Interval for the periodic rollover check, in seconds.
    pub rollover_check_interval_seconds: u64,
    /// Days of history kept in the local cache.
    pub retention_days: i64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            health_source_enabled: true,
            motion_source_enabled: true,
            min_update_interval_ms: DEFAULT_MIN_UPDATE_INTERVAL_MS,
            daily_cutoff_hour: DEFAULT_DAILY_CUTOFF_HOUR,
            max_steps_per_second: DEFAULT_MAX_STEPS_PER_SECOND,
            max_steps_per_day: DEFAULT_MAX_STEPS_PER_DAY,
            daily_step_target: DEFAULT_DAILY_STEP_TARGET,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            fallback_timeout_seconds: DEFAULT_FALLBACK_TIMEOUT_SECS,
            rollover_check_interval_seconds: DEFAULT_ROLLOVER_CHECK_INTERVAL_SECS,
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }
}

/// Motion activity classifier configuration
///
/// Magnitudes are normalized: a stationary device reads near 0, fast running
/// near 2.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    pub min_walking_magnitude: f64,
    pub max_walking_magnitude: f64,
    pub min_vertical_ratio: f64,
    pub ideal_walking_magnitude: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            min_walking_magnitude: DEFAULT_MIN_WALKING_MAGNITUDE,
            max_walking_magnitude: DEFAULT_MAX_WALKING_MAGNITUDE,
            min_vertical_ratio: DEFAULT_MIN_VERTICAL_RATIO,
            ideal_walking_magnitude: DEFAULT_IDEAL_WALKING_MAGNITUDE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.tracking.min_update_interval_ms, 500);
        assert_eq!(config.tracking.daily_cutoff_hour, 22);
        assert_eq!(config.tracking.max_steps_per_day, 100_000);
        assert_eq!(config.sync.min_interval_seconds, 10);
        assert_eq!(config.classifier.min_vertical_ratio, 0.3);
    }

    #[test]
    fn partial_file_fills_missing_sections() {
        let parsed: Config = serde_json::from_str(r#"{"sync": {"enabled": false,
            "min_interval_seconds": 5, "base_url": "http://localhost",
            "request_timeout_seconds": 10}}"#)
            .unwrap();
        assert!(!parsed.sync.enabled);
        assert_eq!(parsed.tracking.daily_cutoff_hour, 22);
    }
}
