//! Sync-specific error types
//!
//! Provides error classification for sync operations. The throttler itself
//! never retries (log-and-drop; the next accepted local update re-arms the
//! sync), but the category metadata is kept so callers can distinguish
//! transient from terminal failures in logs.

use stridearc_domain::StrideArcError;
use thiserror::Error;

/// Categories of sync errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncErrorCategory {
    /// Rate limiting (429) - transient
    RateLimit,
    /// Server errors (5xx) - transient
    Server,
    /// Client errors (4xx) - terminal
    Client,
    /// Network/connection errors - transient
    Network,
    /// Configuration errors - terminal
    Config,
}

/// Sync operation errors
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Client error: {0}")]
    Client(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Timeout after {0:?}")]
    Timeout(std::time::Duration),
}

impl SyncError {
    /// Get the error category for this error
    pub fn category(&self) -> SyncErrorCategory {
        match self {
            Self::RateLimit(_) => SyncErrorCategory::RateLimit,
            Self::Server(_) => SyncErrorCategory::Server,
            Self::Client(_) => SyncErrorCategory::Client,
            Self::Network(_) | Self::Timeout(_) => SyncErrorCategory::Network,
            Self::Config(_) => SyncErrorCategory::Config,
        }
    }

    /// Whether a later attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.category(),
            SyncErrorCategory::RateLimit | SyncErrorCategory::Server | SyncErrorCategory::Network
        )
    }
}

impl From<SyncError> for StrideArcError {
    fn from(err: SyncError) -> Self {
        match err.category() {
            SyncErrorCategory::Network => StrideArcError::Network(err.to_string()),
            SyncErrorCategory::Config => StrideArcError::Config(err.to_string()),
            _ => StrideArcError::Sync(err.to_string()),
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(std::time::Duration::from_secs(0))
        } else if err.is_connect() || err.is_request() {
            Self::Network(err.to_string())
        } else {
            Self::Server(err.to_string())
        }
    }
}
