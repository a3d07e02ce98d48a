//! Rollover scheduler
//!
//! Periodic safety net for the day boundary. Rollover is also checked on
//! driver start and app-foreground; this worker covers long idle stretches
//! where neither happens (a phone left tracking overnight).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use stridearc_core::StepTrackingService;
use stridearc_domain::Result as DomainResult;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::scheduling::error::{SchedulerError, SchedulerResult};

/// The slice of the tracking service the scheduler drives.
#[async_trait]
pub trait RolloverCheck: Send + Sync {
    /// Retire the record if the calendar day changed; returns whether a
    /// rollover happened.
    async fn check_rollover(&self) -> DomainResult<bool>;
}

#[async_trait]
impl RolloverCheck for StepTrackingService {
    async fn check_rollover(&self) -> DomainResult<bool> {
        StepTrackingService::check_rollover(self).await
    }
}

/// Configuration for the rollover scheduler.
#[derive(Debug, Clone)]
pub struct RolloverSchedulerConfig {
    /// Interval between day-boundary checks.
    pub interval: Duration,
    /// Join timeout when stopping.
    pub join_timeout: Duration,
}

impl Default for RolloverSchedulerConfig {
    fn default() -> Self {
        Self { interval: Duration::from_secs(300), join_timeout: Duration::from_secs(5) }
    }
}

/// Periodic rollover check worker.
pub struct RolloverScheduler {
    target: Arc<dyn RolloverCheck>,
    config: RolloverSchedulerConfig,
    cancellation: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

impl RolloverScheduler {
    pub fn new(target: Arc<dyn RolloverCheck>, config: RolloverSchedulerConfig) -> Self {
        Self { target, config, cancellation: CancellationToken::new(), task_handle: None }
    }

    /// Start the scheduler, spawning the background check loop.
    #[instrument(skip(self))]
    pub fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        info!("Starting rollover scheduler");
        self.cancellation = CancellationToken::new();

        let target = Arc::clone(&self.target);
        let interval = self.config.interval;
        let cancel = self.cancellation.clone();

        let handle = tokio::spawn(async move {
            Self::check_loop(target, interval, cancel).await;
        });
        self.task_handle = Some(handle);
        info!("Rollover scheduler started");

        Ok(())
    }

    /// Stop the scheduler gracefully.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }

        info!("Stopping rollover scheduler");
        self.cancellation.cancel();

        if let Some(handle) = self.task_handle.take() {
            tokio::time::timeout(self.config.join_timeout, handle).await.map_err(|_| {
                SchedulerError::Timeout { seconds: self.config.join_timeout.as_secs() }
            })?
            .map_err(|e| SchedulerError::TaskJoinFailed(e.to_string()))?;
        }

        info!("Rollover scheduler stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.task_handle.as_ref().map(|h| !h.is_finished()).unwrap_or(false)
    }

    async fn check_loop(
        target: Arc<dyn RolloverCheck>,
        interval: Duration,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Rollover check loop cancelled");
                    break;
                }
                _ = tokio::time::sleep(interval) => {
                    match target.check_rollover().await {
                        Ok(true) => info!("Scheduled check triggered daily rollover"),
                        Ok(false) => debug!("No rollover needed"),
                        Err(err) => warn!(error = %err, "Rollover check failed"),
                    }
                }
            }
        }
    }
}

impl Drop for RolloverScheduler {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("RolloverScheduler dropped while running; cancelling");
            self.cancellation.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct CountingTarget {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl RolloverCheck for CountingTarget {
        async fn check_rollover(&self) -> DomainResult<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(false)
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn scheduler_lifecycle_and_ticks() {
        let calls = Arc::new(AtomicUsize::new(0));
        let target = Arc::new(CountingTarget { calls: Arc::clone(&calls) });

        let mut scheduler = RolloverScheduler::new(
            target,
            RolloverSchedulerConfig {
                interval: Duration::from_millis(20),
                join_timeout: Duration::from_secs(5),
            },
        );

        assert!(!scheduler.is_running());
        scheduler.start().expect("start succeeds");
        assert!(scheduler.is_running());

        tokio::time::sleep(Duration::from_millis(120)).await;
        scheduler.stop().await.expect("stop succeeds");
        assert!(!scheduler.is_running());

        assert!(calls.load(Ordering::SeqCst) >= 2, "checks fire on the interval");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn double_start_fails() {
        let target =
            Arc::new(CountingTarget { calls: Arc::new(AtomicUsize::new(0)) });
        let mut scheduler =
            RolloverScheduler::new(target, RolloverSchedulerConfig::default());

        scheduler.start().expect("first start succeeds");
        assert!(matches!(scheduler.start(), Err(SchedulerError::AlreadyRunning)));
        scheduler.stop().await.expect("stop succeeds");
    }
}
