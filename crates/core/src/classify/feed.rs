//! Accelerometer sampling feed
//!
//! Pumps raw samples from the motion-sensor gateway into the classifier on
//! its own task, independent of whichever step driver is active. Join
//! handles are tracked and cancellation is explicit so a mode switch can
//! tear the feed down without leaking the loop.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::classify::ActivityClassifier;
use crate::tracking::ports::MotionSensorGateway;

/// Consecutive sampling failures tolerated before the feed gives up and
/// installs the permissive fallback.
const MAX_CONSECUTIVE_FAILURES: u32 = 5;

const FAILURE_BACKOFF: Duration = Duration::from_secs(1);

/// Background task feeding the activity classifier.
pub struct ClassifierFeed {
    gateway: Arc<dyn MotionSensorGateway>,
    classifier: Arc<ActivityClassifier>,
    cancellation: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

impl ClassifierFeed {
    pub fn new(gateway: Arc<dyn MotionSensorGateway>, classifier: Arc<ActivityClassifier>) -> Self {
        Self { gateway, classifier, cancellation: CancellationToken::new(), task_handle: None }
    }

    /// Start sampling. If the motion path is entirely unavailable on this
    /// device the classifier falls back to permissive defaults and no task
    /// is spawned.
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }

        if !self.gateway.is_available() {
            info!("Motion sensors unavailable; classifier using permissive fallback");
            self.classifier.mark_unavailable(Utc::now());
            return;
        }

        self.cancellation = CancellationToken::new();
        let gateway = Arc::clone(&self.gateway);
        let classifier = Arc::clone(&self.classifier);
        let cancel = self.cancellation.clone();

        let handle = tokio::spawn(async move {
            Self::sample_loop(gateway, classifier, cancel).await;
        });
        self.task_handle = Some(handle);
        info!("Classifier feed started");
    }

    /// Stop sampling. Idempotent.
    pub async fn stop(&mut self) {
        self.cancellation.cancel();
        if let Some(handle) = self.task_handle.take() {
            if tokio::time::timeout(Duration::from_secs(5), handle).await.is_err() {
                warn!("Classifier feed did not stop within timeout");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.task_handle.as_ref().map(|h| !h.is_finished()).unwrap_or(false)
    }

    async fn sample_loop(
        gateway: Arc<dyn MotionSensorGateway>,
        classifier: Arc<ActivityClassifier>,
        cancel: CancellationToken,
    ) {
        let mut consecutive_failures = 0u32;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Classifier feed cancelled");
                    break;
                }
                sample = gateway.next_accel_sample() => {
                    match sample {
                        Ok(sample) => {
                            consecutive_failures = 0;
                            classifier.ingest(&sample);
                        }
                        Err(err) => {
                            consecutive_failures += 1;
                            warn!(
                                error = %err,
                                failures = consecutive_failures,
                                "Accelerometer sample failed"
                            );
                            if consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                                classifier.mark_unavailable(Utc::now());
                                break;
                            }
                            tokio::time::sleep(FAILURE_BACKOFF).await;
                        }
                    }
                }
            }
        }
    }
}

impl Drop for ClassifierFeed {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("ClassifierFeed dropped while running; cancelling");
            self.cancellation.cancel();
        }
    }
}
