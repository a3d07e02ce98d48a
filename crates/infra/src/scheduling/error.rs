//! Scheduler error types

use stridearc_domain::StrideArcError;
use thiserror::Error;

/// Worker lifecycle errors
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Worker is already running
    #[error("Worker already running")]
    AlreadyRunning,

    /// Worker is not running
    #[error("Worker not running")]
    NotRunning,

    /// Operation timed out
    #[error("Operation timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// Task join failed
    #[error("Task join failed: {0}")]
    TaskJoinFailed(String),
}

impl From<SchedulerError> for StrideArcError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::AlreadyRunning | SchedulerError::NotRunning => {
                StrideArcError::InvalidInput(err.to_string())
            }
            _ => StrideArcError::Internal(err.to_string()),
        }
    }
}

/// Convenience type alias for worker lifecycle operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;
