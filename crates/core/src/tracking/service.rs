//! Step tracking service - core business logic
//!
//! Owns the mode state machine, supervises the active driver, and routes
//! readings through the update pipeline into the cache and sync queue. One
//! instance per process, constructed at application start and handed to
//! consumers by reference; no global state.

use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{Local, Timelike, Utc};
use parking_lot::Mutex;
use stridearc_domain::{
    AcquisitionMode, Config, Confidence, DailyStepRecord, PermissionSet, Result, StepReading,
    StepSource, StrideArcError, SyncTask,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::classify::{ActivityClassifier, ClassifierFeed};
use crate::events::{EventHub, Subscription};
use crate::tracking::drivers::{DriverEvent, DriverRegistry, StepDriver};
use crate::tracking::mode::{demote, select_mode};
use crate::tracking::permissions::PermissionGate;
use crate::tracking::pipeline::{PipelineOutcome, StepUpdatePipeline};
use crate::tracking::ports::{
    HealthDataGateway, MotionSensorGateway, StepRecordCache, SyncQueue,
};
use crate::tracking::rollover;

const EVENT_CHANNEL_CAPACITY: usize = 64;
const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// The driver currently feeding the pipeline, plus its consumer task.
struct ActiveDriver {
    driver: Arc<dyn StepDriver>,
    consumer: JoinHandle<()>,
    cancel: CancellationToken,
}

#[derive(Default)]
struct TrackingState {
    initialized: bool,
    mode: Option<AcquisitionMode>,
    pipeline: Option<StepUpdatePipeline>,
    active: Option<ActiveDriver>,
}

/// Step tracking service.
///
/// All mutable state lives behind a single lock; only one driver is ever
/// active, so readings are applied in receipt order with no cross-driver
/// interleaving.
pub struct StepTrackingService {
    self_ref: Weak<Self>,
    config: Config,
    user_id: String,
    registry: DriverRegistry,
    permission_gate: PermissionGate,
    classifier: Arc<ActivityClassifier>,
    feed: tokio::sync::Mutex<Option<ClassifierFeed>>,
    cache: Arc<dyn StepRecordCache>,
    sync: Arc<dyn SyncQueue>,
    state: Mutex<TrackingState>,
    steps_updated: EventHub<DailyStepRecord>,
    status_changed: EventHub<AcquisitionMode>,
    errors: EventHub<StrideArcError>,
}

impl StepTrackingService {
    /// Construct the service. Gateways are optional capabilities: a device
    /// without one of the platform paths simply passes `None`.
    pub fn new(
        config: Config,
        user_id: impl Into<String>,
        health: Option<Arc<dyn HealthDataGateway>>,
        motion: Option<Arc<dyn MotionSensorGateway>>,
        cache: Arc<dyn StepRecordCache>,
        sync: Arc<dyn SyncQueue>,
    ) -> Arc<Self> {
        let classifier = Arc::new(ActivityClassifier::new(config.classifier.clone()));
        let feed = motion
            .as_ref()
            .map(|gateway| ClassifierFeed::new(Arc::clone(gateway), Arc::clone(&classifier)));
        let registry =
            DriverRegistry::new(health.clone(), motion.clone(), config.tracking.clone());
        let permission_gate = PermissionGate::new(health, motion);

        Arc::new_cyclic(|self_ref| Self {
            self_ref: self_ref.clone(),
            config,
            user_id: user_id.into(),
            registry,
            permission_gate,
            classifier,
            feed: tokio::sync::Mutex::new(feed),
            cache,
            sync,
            state: Mutex::new(TrackingState::default()),
            steps_updated: EventHub::new(),
            status_changed: EventHub::new(),
            errors: EventHub::new(),
        })
    }

    /// Query permissions, pick the acquisition mode, and restore the cached
    /// record for today (zeroed if the cache is stale or empty). Must
    /// complete before `start_tracking`.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> Result<AcquisitionMode> {
        let permissions = self.permission_gate.query().await;
        let mode = select_mode(&permissions, &self.config.tracking);

        let today = Local::now().date_naive();
        let cached = match self.cache.load(today).await {
            Ok(cached) => cached,
            Err(err) => {
                warn!(error = %err, "Cache read failed on cold start");
                None
            }
        };
        let record = rollover::resolve_initial(
            cached,
            today,
            self.config.tracking.daily_step_target,
            Utc::now(),
        );

        {
            let mut state = self.state.lock();
            state.pipeline =
                Some(StepUpdatePipeline::new(self.config.tracking.clone(), record));
            state.mode = Some(mode);
            state.initialized = true;
        }

        info!(mode = %mode, "Step tracking initialized");
        self.status_changed.emit(&mode);
        Ok(mode)
    }

    /// Prompt the user for any undetermined permissions and re-run mode
    /// selection with the result. May suspend until the system dialog is
    /// answered.
    pub async fn request_permissions(&self) -> Result<PermissionSet> {
        let permissions = self.permission_gate.request().await;
        let mode = select_mode(&permissions, &self.config.tracking);

        let changed = {
            let mut state = self.state.lock();
            if !state.initialized {
                return Err(StrideArcError::NotInitialized(
                    "initialize() must complete before requesting permissions".into(),
                ));
            }
            let changed = state.mode != Some(mode);
            state.mode = Some(mode);
            changed
        };
        if changed {
            self.status_changed.emit(&mode);
        }
        Ok(permissions)
    }

    /// Start acquiring steps in the current mode, walking down the degrade
    /// ladder until a driver starts. Idempotent while tracking.
    #[instrument(skip(self))]
    pub async fn start_tracking(&self) -> Result<AcquisitionMode> {
        let mode = {
            let state = self.state.lock();
            if !state.initialized {
                return Err(StrideArcError::NotInitialized(
                    "initialize() must complete before start_tracking()".into(),
                ));
            }
            if state.active.is_some() {
                return Ok(state.mode.unwrap_or(AcquisitionMode::Disabled));
            }
            state.mode.unwrap_or(AcquisitionMode::Disabled)
        };

        // Driver start is one of the rollover trigger points.
        self.check_rollover().await?;
        self.start_feed().await;

        Ok(self.start_in_mode(mode).await)
    }

    /// Stop acquiring steps. Idempotent; releases the driver subscription,
    /// the consumer task, and the classifier feed before returning so a
    /// mode switch can safely re-initialize.
    #[instrument(skip(self))]
    pub async fn stop_tracking(&self) {
        let active = self.state.lock().active.take();
        if let Some(active) = active {
            active.cancel.cancel();
            active.driver.stop().await;
            if tokio::time::timeout(JOIN_TIMEOUT, active.consumer).await.is_err() {
                warn!("Reading consumer did not stop within timeout");
            }
            info!("Tracking stopped");
        } else {
            debug!("Stop requested while not tracking");
        }
        self.stop_feed().await;
    }

    /// The canonical record for today.
    pub fn get_today_steps(&self) -> Result<DailyStepRecord> {
        let state = self.state.lock();
        state
            .pipeline
            .as_ref()
            .map(|pipeline| pipeline.record().clone())
            .ok_or_else(|| {
                StrideArcError::NotInitialized("no record before initialize()".into())
            })
    }

    /// The current acquisition mode, if initialized.
    pub fn current_mode(&self) -> Option<AcquisitionMode> {
        self.state.lock().mode
    }

    pub fn is_tracking(&self) -> bool {
        self.state.lock().active.is_some()
    }

    /// Apply a user-entered step increment. Only meaningful in Manual mode;
    /// in the automatic modes the running totals from the platform would
    /// immediately supersede it.
    pub async fn record_manual_steps(&self, steps: u32) -> Result<DailyStepRecord> {
        if steps == 0 {
            return Err(StrideArcError::InvalidInput("step count must be positive".into()));
        }
        let mode = self.current_mode();
        if mode != Some(AcquisitionMode::Manual) {
            return Err(StrideArcError::InvalidInput(format!(
                "manual entries require manual mode (current: {})",
                mode.map(|m| m.to_string()).unwrap_or_else(|| "uninitialized".into())
            )));
        }

        let reading =
            StepReading::new(steps, Utc::now(), StepSource::Manual, Confidence::High);
        match self.handle_reading(reading).await {
            Some(record) => Ok(record),
            None => self.get_today_steps(),
        }
    }

    /// Retire the record if the calendar day changed. Called on driver
    /// start, on app-foreground, and by the periodic scheduler. Returns
    /// whether a rollover happened.
    pub async fn check_rollover(&self) -> Result<bool> {
        let today = Local::now().date_naive();
        let fresh = {
            let mut state = self.state.lock();
            let pipeline = state.pipeline.as_mut().ok_or_else(|| {
                StrideArcError::NotInitialized("no record before initialize()".into())
            })?;
            if !rollover::needs_rollover(pipeline.record(), today) {
                return Ok(false);
            }
            let fresh = DailyStepRecord::empty(
                today,
                self.config.tracking.daily_step_target,
                Utc::now(),
            );
            // A new logical record: any in-flight sync still carries the
            // old date key and completes against yesterday's row.
            pipeline.replace_record(fresh.clone());
            fresh
        };

        if let Err(err) = self.cache.store(&fresh).await {
            warn!(error = %err, "Failed to persist rolled-over record");
        }
        let horizon = today - chrono::Duration::days(self.config.tracking.retention_days);
        match self.cache.clear_before(horizon).await {
            Ok(pruned) if pruned > 0 => debug!(pruned = pruned, "Pruned cached records"),
            Ok(_) => {}
            Err(err) => warn!(error = %err, "Failed to prune cached records"),
        }

        info!(date = %today, "Daily rollover completed");
        self.steps_updated.emit(&fresh);
        Ok(true)
    }

    /// The classifier owned by this service, for consumers that render
    /// activity state.
    pub fn classifier(&self) -> Arc<ActivityClassifier> {
        Arc::clone(&self.classifier)
    }

    // Observer registration. Handles must be passed back to the matching
    // unsubscribe method.

    pub fn on_steps_updated<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&DailyStepRecord) + Send + Sync + 'static,
    {
        self.steps_updated.subscribe(callback)
    }

    pub fn unsubscribe_steps_updated(&self, subscription: Subscription) {
        self.steps_updated.unsubscribe(subscription);
    }

    pub fn on_tracking_status_changed<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&AcquisitionMode) + Send + Sync + 'static,
    {
        self.status_changed.subscribe(callback)
    }

    pub fn unsubscribe_tracking_status(&self, subscription: Subscription) {
        self.status_changed.unsubscribe(subscription);
    }

    pub fn on_error<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&StrideArcError) + Send + Sync + 'static,
    {
        self.errors.subscribe(callback)
    }

    pub fn unsubscribe_errors(&self, subscription: Subscription) {
        self.errors.unsubscribe(subscription);
    }

    /// Walk the degrade ladder starting at `mode` until a driver starts or
    /// the ladder bottoms out at Disabled.
    async fn start_in_mode(&self, mut mode: AcquisitionMode) -> AcquisitionMode {
        loop {
            if mode == AcquisitionMode::Disabled {
                self.state.lock().mode = Some(AcquisitionMode::Disabled);
                self.status_changed.emit(&AcquisitionMode::Disabled);
                warn!("No step source available; tracking disabled");
                return AcquisitionMode::Disabled;
            }

            let Some(driver) = self.registry.driver_for(mode) else {
                debug!(mode = %mode, "No driver for mode; degrading");
                mode = demote(mode);
                continue;
            };

            let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
            let timeout = Duration::from_secs(self.config.tracking.fallback_timeout_seconds);
            match tokio::time::timeout(timeout, driver.start(tx)).await {
                Ok(Ok(())) => {
                    let cancel = CancellationToken::new();
                    let consumer = self.spawn_consumer(rx, cancel.clone());
                    {
                        let mut state = self.state.lock();
                        state.mode = Some(mode);
                        state.active = Some(ActiveDriver { driver, consumer, cancel });
                    }
                    info!(mode = %mode, "Tracking started");
                    self.status_changed.emit(&mode);
                    return mode;
                }
                Ok(Err(err)) => {
                    warn!(mode = %mode, error = %err, "Driver failed to start; degrading");
                    self.errors.emit(&err);
                    mode = demote(mode);
                }
                Err(_) => {
                    let err = StrideArcError::DriverUnavailable(format!(
                        "{mode} driver start timed out after {}s",
                        self.config.tracking.fallback_timeout_seconds
                    ));
                    warn!(mode = %mode, "Driver start timed out; degrading");
                    self.errors.emit(&err);
                    mode = demote(mode);
                }
            }
        }
    }

    fn spawn_consumer(
        &self,
        mut rx: mpsc::Receiver<DriverEvent>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let service = self.self_ref.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Reading consumer cancelled");
                        break;
                    }
                    event = rx.recv() => {
                        let Some(service) = service.upgrade() else {
                            break;
                        };
                        match event {
                            Some(DriverEvent::Reading(reading)) => {
                                service.handle_reading(reading).await;
                            }
                            Some(DriverEvent::Failed(err)) => {
                                service.handle_driver_failure(err).await;
                                break;
                            }
                            None => {
                                debug!("Driver event channel closed");
                                break;
                            }
                        }
                    }
                }
            }
        })
    }

    /// Push one reading through the pipeline and commit the result. Returns
    /// the updated record when the reading was accepted.
    async fn handle_reading(&self, reading: StepReading) -> Option<DailyStepRecord> {
        if let Err(err) = self.check_rollover().await {
            warn!(error = %err, "Rollover check failed");
        }

        let activity = self.classifier.latest();
        let now = Utc::now();
        let local_hour = Local::now().hour();

        let outcome = {
            let mut state = self.state.lock();
            let mode = state.mode.unwrap_or(AcquisitionMode::Disabled);
            let pipeline = state.pipeline.as_mut()?;
            pipeline.apply(&reading, Some(&activity), mode, now, local_hour)
        };

        match outcome {
            PipelineOutcome::Accepted { record, flagged } => {
                if flagged {
                    debug!(
                        total = record.total_steps,
                        confidence = %record.confidence,
                        "Reading accepted with downgraded confidence"
                    );
                }
                // Best-effort local persistence; losing one write only
                // costs freshness, never correctness of the live record.
                if let Err(err) = self.cache.store(&record).await {
                    warn!(error = %err, "Failed to persist step record");
                }
                if self.config.sync.enabled {
                    let task = SyncTask::new(self.user_id.clone(), record.clone(), now);
                    if let Err(err) = self.sync.enqueue(task).await {
                        warn!(error = %err, "Failed to enqueue sync task");
                    }
                }
                self.steps_updated.emit(&record);
                Some(record)
            }
            PipelineOutcome::Rejected(reason) => {
                debug!(reason = ?reason, source = %reading.source, "Reading rejected");
                None
            }
        }
    }

    /// One-step demotion after an active driver failed. Never promotes;
    /// promotion requires a fresh `initialize()`.
    async fn handle_driver_failure(&self, err: StrideArcError) {
        warn!(error = %err, "Active driver failed; degrading one step");
        self.errors.emit(&err);

        // The failed driver's consumer is the caller; it exits after this
        // returns, so only the driver itself is torn down here.
        let active = self.state.lock().active.take();
        if let Some(active) = active {
            active.driver.stop().await;
        }

        let mode = self.state.lock().mode.unwrap_or(AcquisitionMode::Disabled);
        self.start_in_mode(demote(mode)).await;
    }

    async fn start_feed(&self) {
        let mut feed = self.feed.lock().await;
        match feed.as_mut() {
            Some(feed) => feed.start(),
            None => self.classifier.mark_unavailable(Utc::now()),
        }
    }

    async fn stop_feed(&self) {
        if let Some(feed) = self.feed.lock().await.as_mut() {
            feed.stop().await;
        }
    }
}
