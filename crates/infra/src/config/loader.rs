//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If the environment is not configured, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! `STRIDEARC_DB_PATH` marks the environment as configured; everything else
//! overrides a default when present:
//! - `STRIDEARC_DB_PATH`: Database file path
//! - `STRIDEARC_DB_POOL_SIZE`: Connection pool size
//! - `STRIDEARC_SYNC_ENABLED`: Whether remote sync is enabled (true/false)
//! - `STRIDEARC_SYNC_INTERVAL`: Minimum seconds between remote writes
//! - `STRIDEARC_SYNC_BASE_URL`: Remote step API base URL
//! - `STRIDEARC_HEALTH_SOURCE_ENABLED`: Allow the health-data path
//! - `STRIDEARC_MOTION_SOURCE_ENABLED`: Allow the raw motion path
//! - `STRIDEARC_DAILY_CUTOFF_HOUR`: Hour after which readings are ignored
//! - `STRIDEARC_MAX_STEPS_PER_DAY`: Anti-gaming cap
//! - `STRIDEARC_DAILY_STEP_TARGET`: Default daily target
//!
//! ## File Locations
//! The loader probes, in order: `./config.json`, `./config.toml`,
//! `./stridearc.json`, `./stridearc.toml`, then the same names one and two
//! directories up.

use std::path::{Path, PathBuf};

use stridearc_domain::{Config, Result, StrideArcError};

/// Load configuration with automatic fallback strategy.
///
/// # Errors
/// Returns `StrideArcError::Config` if configuration cannot be loaded from
/// either source, the file format is invalid, or values fail to parse.
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables.
///
/// `STRIDEARC_DB_PATH` must be present; any other variable overrides the
/// corresponding default.
pub fn load_from_env() -> Result<Config> {
    let db_path = std::env::var("STRIDEARC_DB_PATH").map_err(|_| {
        StrideArcError::Config("STRIDEARC_DB_PATH not set".to_string())
    })?;

    let mut config = Config::default();
    config.database.path = db_path;

    if let Some(pool_size) = env_parse::<u32>("STRIDEARC_DB_POOL_SIZE")? {
        config.database.pool_size = pool_size;
    }
    if let Some(enabled) = env_bool("STRIDEARC_SYNC_ENABLED")? {
        config.sync.enabled = enabled;
    }
    if let Some(interval) = env_parse::<u64>("STRIDEARC_SYNC_INTERVAL")? {
        config.sync.min_interval_seconds = interval;
    }
    if let Ok(base_url) = std::env::var("STRIDEARC_SYNC_BASE_URL") {
        config.sync.base_url = base_url;
    }
    if let Some(enabled) = env_bool("STRIDEARC_HEALTH_SOURCE_ENABLED")? {
        config.tracking.health_source_enabled = enabled;
    }
    if let Some(enabled) = env_bool("STRIDEARC_MOTION_SOURCE_ENABLED")? {
        config.tracking.motion_source_enabled = enabled;
    }
    if let Some(hour) = env_parse::<u32>("STRIDEARC_DAILY_CUTOFF_HOUR")? {
        config.tracking.daily_cutoff_hour = hour;
    }
    if let Some(cap) = env_parse::<u32>("STRIDEARC_MAX_STEPS_PER_DAY")? {
        config.tracking.max_steps_per_day = cap;
    }
    if let Some(target) = env_parse::<u32>("STRIDEARC_DAILY_STEP_TARGET")? {
        config.tracking.daily_step_target = target;
    }

    Ok(config)
}

/// Load configuration from a file.
///
/// If `path` is `None`, probes the standard locations. Format is detected
/// by extension (`.json` or `.toml`).
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(StrideArcError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            StrideArcError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| StrideArcError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| StrideArcError::Config(format!("Invalid TOML config: {e}"))),
        _ => serde_json::from_str(contents)
            .map_err(|e| StrideArcError::Config(format!("Invalid JSON config: {e}"))),
    }
}

fn probe_config_paths() -> Option<PathBuf> {
    const NAMES: [&str; 4] = ["config.json", "config.toml", "stridearc.json", "stridearc.toml"];
    const PREFIXES: [&str; 3] = [".", "..", "../.."];

    for prefix in PREFIXES {
        for name in NAMES {
            let candidate = Path::new(prefix).join(name);
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }
    None
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| StrideArcError::Config(format!("Invalid {name}: {e}"))),
        Err(_) => Ok(None),
    }
}

fn env_bool(name: &str) -> Result<Option<bool>> {
    match std::env::var(name) {
        Ok(raw) => match raw.to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(Some(true)),
            "false" | "0" | "no" => Ok(Some(false)),
            other => Err(StrideArcError::Config(format!("Invalid {name}: {other}"))),
        },
        Err(_) => Ok(None),
    }
}
