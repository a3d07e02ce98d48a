//! Port interfaces for step tracking
//!
//! These traits define the boundaries between core business logic and
//! infrastructure implementations. The platform health-data and
//! motion-sensor services are external collaborators consumed exclusively
//! through these narrow, mockable interfaces.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use stridearc_domain::{
    AccelSample, DailyStepRecord, PermissionStatus, RemoteStepFields, Result, SyncTask,
};

/// The platform health-data service (pre-vetted step totals).
#[async_trait]
pub trait HealthDataGateway: Send + Sync {
    /// Current authorization without prompting the user.
    async fn authorization_status(&self) -> Result<PermissionStatus>;

    /// Prompt the user if still undetermined. User-interaction-bound, so
    /// callers must treat this as a long-running, cancellable operation.
    async fn request_authorization(&self) -> Result<PermissionStatus>;

    /// Step total recorded by the platform for the given calendar day.
    async fn step_total(&self, date: NaiveDate) -> Result<u32>;
}

/// The raw motion-sensor service (pedometer + accelerometer).
#[async_trait]
pub trait MotionSensorGateway: Send + Sync {
    /// Whether the hardware path exists on this device at all.
    fn is_available(&self) -> bool;

    async fn authorization_status(&self) -> Result<PermissionStatus>;

    async fn request_authorization(&self) -> Result<PermissionStatus>;

    /// Pedometer step total accumulated since `start`.
    async fn step_total_since(&self, start: DateTime<Utc>) -> Result<u32>;

    /// Next raw accelerometer sample; resolves when one is available.
    async fn next_accel_sample(&self) -> Result<AccelSample>;
}

/// Durable last-known-good record store, keyed by calendar day.
///
/// Single-writer resource: only the update pipeline writes, and every write
/// is atomic at record granularity so readers always see a fully-formed
/// snapshot.
#[async_trait]
pub trait StepRecordCache: Send + Sync {
    async fn load(&self, date: NaiveDate) -> Result<Option<DailyStepRecord>>;

    async fn store(&self, record: &DailyStepRecord) -> Result<()>;

    /// Prune records older than `date`. Returns the number removed.
    async fn clear_before(&self, date: NaiveDate) -> Result<usize>;
}

/// The remote store the sync layer writes to. `upsert` must be idempotent.
#[async_trait]
pub trait RemoteStepStore: Send + Sync {
    async fn exists(&self, user_id: &str, date: NaiveDate) -> Result<bool>;

    async fn upsert(
        &self,
        user_id: &str,
        date: NaiveDate,
        fields: &RemoteStepFields,
    ) -> Result<()>;
}

/// Accepts sync work from the pipeline. Fire-and-forget: enqueueing must
/// never block the accept path on network I/O.
#[async_trait]
pub trait SyncQueue: Send + Sync {
    async fn enqueue(&self, task: SyncTask) -> Result<()>;
}
