//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for StrideArc
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum StrideArcError {
    /// Permission denied by the user; not retryable until system settings
    /// change. Surfaced to the UI, never retried automatically.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// A step source driver could not start or died mid-flight. Triggers a
    /// mode demotion in the tracking service.
    #[error("Driver unavailable: {0}")]
    DriverUnavailable(String),

    /// A single read from an otherwise healthy source failed. Logged; the
    /// next scheduled read retries naturally.
    #[error("Transient read failure: {0}")]
    TransientRead(String),

    /// Remote sync failed. Logged and dropped; superseded by the next
    /// accepted local update.
    #[error("Sync error: {0}")]
    Sync(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Tracking was requested before `initialize()` completed.
    #[error("Not initialized: {0}")]
    NotInitialized(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for StrideArc operations
pub type Result<T> = std::result::Result<T, StrideArcError>;
