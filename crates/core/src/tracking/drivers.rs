//! Step source drivers
//!
//! One driver per acquisition mode, interchangeable behind [`StepDriver`].
//! Drivers poll their gateway on an interval and push readings into the
//! service's event channel; an API failure is pushed as a failure event and
//! never thrown across the service boundary. The registry is the
//! capability-checked factory: absence of a platform path is a normal,
//! statically-represented case (`None`), not a caught exception.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Local, Utc};
use parking_lot::Mutex;
use stridearc_domain::{
    AcquisitionMode, Confidence, Result, StepReading, StepSource, StrideArcError, TrackingConfig,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::tracking::ports::{HealthDataGateway, MotionSensorGateway};

/// Transient read failures tolerated before a driver reports itself dead.
const MAX_TRANSIENT_FAILURES: u32 = 3;

/// What a running driver pushes into the tracking service.
#[derive(Debug, Clone)]
pub enum DriverEvent {
    Reading(StepReading),
    /// The source itself failed (not a bad reading). The service responds
    /// with a one-step mode demotion.
    Failed(StrideArcError),
}

/// A single step acquisition source with an explicit lifecycle.
#[async_trait]
pub trait StepDriver: Send + Sync {
    fn mode(&self) -> AcquisitionMode;

    /// Begin delivering events. Fails fast when the source cannot serve a
    /// first reading; the caller bounds this with its fallback timeout.
    async fn start(&self, events: mpsc::Sender<DriverEvent>) -> Result<()>;

    /// Stop delivering events and release the polling task. Idempotent.
    async fn stop(&self);
}

type TaskSlot = Mutex<Option<(CancellationToken, JoinHandle<()>)>>;

async fn halt(slot: &TaskSlot) {
    let taken = slot.lock().take();
    if let Some((cancel, handle)) = taken {
        cancel.cancel();
        if tokio::time::timeout(Duration::from_secs(5), handle).await.is_err() {
            warn!("Driver poll task did not stop within timeout");
        }
    }
}

/// Primary source: the platform health-data service.
pub struct HealthStepDriver {
    gateway: Arc<dyn HealthDataGateway>,
    poll_interval: Duration,
    task: TaskSlot,
}

impl HealthStepDriver {
    pub fn new(gateway: Arc<dyn HealthDataGateway>, poll_interval: Duration) -> Self {
        Self { gateway, poll_interval, task: Mutex::new(None) }
    }
}

#[async_trait]
impl StepDriver for HealthStepDriver {
    fn mode(&self) -> AcquisitionMode {
        AcquisitionMode::Primary
    }

    async fn start(&self, events: mpsc::Sender<DriverEvent>) -> Result<()> {
        if self.task.lock().is_some() {
            return Ok(());
        }

        // Prove the source is live before claiming to have started.
        let today = Local::now().date_naive();
        let initial = self
            .gateway
            .step_total(today)
            .await
            .map_err(|e| StrideArcError::DriverUnavailable(format!("health source: {e}")))?;

        let _ = events
            .send(DriverEvent::Reading(StepReading::new(
                initial,
                Utc::now(),
                StepSource::Primary,
                Confidence::High,
            )))
            .await;

        let cancel = CancellationToken::new();
        let gateway = Arc::clone(&self.gateway);
        let poll_interval = self.poll_interval;
        let loop_cancel = cancel.clone();

        let handle = tokio::spawn(async move {
            poll_totals(
                move || {
                    let gateway = Arc::clone(&gateway);
                    async move { gateway.step_total(Local::now().date_naive()).await }
                },
                StepSource::Primary,
                Confidence::High,
                poll_interval,
                events,
                loop_cancel,
            )
            .await;
        });

        *self.task.lock() = Some((cancel, handle));
        info!("Health step driver started");
        Ok(())
    }

    async fn stop(&self) {
        halt(&self.task).await;
    }
}

/// Secondary source: the raw motion-sensor pedometer.
pub struct MotionStepDriver {
    gateway: Arc<dyn MotionSensorGateway>,
    poll_interval: Duration,
    task: TaskSlot,
}

impl MotionStepDriver {
    pub fn new(gateway: Arc<dyn MotionSensorGateway>, poll_interval: Duration) -> Self {
        Self { gateway, poll_interval, task: Mutex::new(None) }
    }

    fn start_of_day() -> chrono::DateTime<Utc> {
        let midnight = Local::now().date_naive().and_hms_opt(0, 0, 0).unwrap_or_default();
        midnight.and_local_timezone(Local).earliest().map(|t| t.with_timezone(&Utc)).unwrap_or_else(Utc::now)
    }
}

#[async_trait]
impl StepDriver for MotionStepDriver {
    fn mode(&self) -> AcquisitionMode {
        AcquisitionMode::Secondary
    }

    async fn start(&self, events: mpsc::Sender<DriverEvent>) -> Result<()> {
        if self.task.lock().is_some() {
            return Ok(());
        }
        if !self.gateway.is_available() {
            return Err(StrideArcError::DriverUnavailable("motion sensors absent".into()));
        }

        let initial = self
            .gateway
            .step_total_since(Self::start_of_day())
            .await
            .map_err(|e| StrideArcError::DriverUnavailable(format!("motion source: {e}")))?;

        let _ = events
            .send(DriverEvent::Reading(StepReading::new(
                initial,
                Utc::now(),
                StepSource::Secondary,
                Confidence::Medium,
            )))
            .await;

        let cancel = CancellationToken::new();
        let gateway = Arc::clone(&self.gateway);
        let poll_interval = self.poll_interval;
        let loop_cancel = cancel.clone();

        let handle = tokio::spawn(async move {
            poll_totals(
                move || {
                    let gateway = Arc::clone(&gateway);
                    async move { gateway.step_total_since(Self::start_of_day()).await }
                },
                StepSource::Secondary,
                Confidence::Medium,
                poll_interval,
                events,
                loop_cancel,
            )
            .await;
        });

        *self.task.lock() = Some((cancel, handle));
        info!("Motion step driver started");
        Ok(())
    }

    async fn stop(&self) {
        halt(&self.task).await;
    }
}

/// Manual mode: no background source. Readings arrive through
/// `StepTrackingService::record_manual_steps`; the driver only exists so
/// Manual participates in the same lifecycle as the other modes.
pub struct ManualStepDriver;

#[async_trait]
impl StepDriver for ManualStepDriver {
    fn mode(&self) -> AcquisitionMode {
        AcquisitionMode::Manual
    }

    async fn start(&self, _events: mpsc::Sender<DriverEvent>) -> Result<()> {
        info!("Manual step entry active");
        Ok(())
    }

    async fn stop(&self) {}
}

/// Shared polling loop for the total-reporting sources.
async fn poll_totals<F, Fut>(
    fetch: F,
    source: StepSource,
    confidence: Confidence,
    poll_interval: Duration,
    events: mpsc::Sender<DriverEvent>,
    cancel: CancellationToken,
) where
    F: Fn() -> Fut + Send,
    Fut: std::future::Future<Output = Result<u32>> + Send,
{
    let mut transient_failures = 0u32;
    let mut interval = tokio::time::interval(poll_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(source = %source, "Driver poll loop cancelled");
                break;
            }
            _ = interval.tick() => {
                match fetch().await {
                    Ok(total) => {
                        transient_failures = 0;
                        let reading =
                            StepReading::new(total, Utc::now(), source, confidence);
                        if events.send(DriverEvent::Reading(reading)).await.is_err() {
                            debug!(source = %source, "Event channel closed; stopping driver");
                            break;
                        }
                    }
                    Err(StrideArcError::TransientRead(message)) => {
                        transient_failures += 1;
                        warn!(
                            source = %source,
                            failures = transient_failures,
                            message = %message,
                            "Transient read failure"
                        );
                        if transient_failures >= MAX_TRANSIENT_FAILURES {
                            let _ = events
                                .send(DriverEvent::Failed(StrideArcError::DriverUnavailable(
                                    format!("{source} source failed {transient_failures} reads"),
                                )))
                                .await;
                            break;
                        }
                    }
                    Err(err) => {
                        warn!(source = %source, error = %err, "Driver failed");
                        let _ = events.send(DriverEvent::Failed(err)).await;
                        break;
                    }
                }
            }
        }
    }
}

/// Capability-checked driver factory.
///
/// Returns `Option<driver>` per source: a platform path that does not exist
/// or is disabled in configuration yields `None`, and the mode selector's
/// ladder simply walks past it.
pub struct DriverRegistry {
    health: Option<Arc<dyn HealthDataGateway>>,
    motion: Option<Arc<dyn MotionSensorGateway>>,
    config: TrackingConfig,
}

impl DriverRegistry {
    pub fn new(
        health: Option<Arc<dyn HealthDataGateway>>,
        motion: Option<Arc<dyn MotionSensorGateway>>,
        config: TrackingConfig,
    ) -> Self {
        Self { health, motion, config }
    }

    pub fn driver_for(&self, mode: AcquisitionMode) -> Option<Arc<dyn StepDriver>> {
        let poll_interval = Duration::from_millis(self.config.poll_interval_ms.max(1));
        match mode {
            AcquisitionMode::Primary => {
                if !self.config.health_source_enabled {
                    return None;
                }
                self.health.as_ref().map(|gateway| {
                    Arc::new(HealthStepDriver::new(Arc::clone(gateway), poll_interval))
                        as Arc<dyn StepDriver>
                })
            }
            AcquisitionMode::Secondary => {
                if !self.config.motion_source_enabled {
                    return None;
                }
                match &self.motion {
                    Some(gateway) if gateway.is_available() => Some(Arc::new(
                        MotionStepDriver::new(Arc::clone(gateway), poll_interval),
                    )
                        as Arc<dyn StepDriver>),
                    _ => None,
                }
            }
            AcquisitionMode::Manual => Some(Arc::new(ManualStepDriver) as Arc<dyn StepDriver>),
            AcquisitionMode::Disabled => None,
        }
    }
}
