//! Shared mock ports for service-level tests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use stridearc_core::{
    HealthDataGateway, MotionSensorGateway, StepRecordCache, SyncQueue,
};
use stridearc_domain::{
    AccelSample, DailyStepRecord, PermissionStatus, Result as DomainResult, StrideArcError,
    SyncTask,
};
use tokio::sync::Mutex as TokioMutex;

/// Scripted health-data gateway. Responses are served in order; the last
/// one repeats once the script is exhausted.
pub struct MockHealthGateway {
    status: PermissionStatus,
    granted: PermissionStatus,
    responses: TokioMutex<Vec<DomainResult<u32>>>,
}

impl MockHealthGateway {
    pub fn new(status: PermissionStatus) -> Self {
        Self { status, granted: status, responses: TokioMutex::new(vec![Ok(0)]) }
    }

    pub fn with_totals(self, totals: Vec<u32>) -> Self {
        Self { responses: TokioMutex::new(totals.into_iter().map(Ok).collect()), ..self }
    }

    pub fn with_responses(self, responses: Vec<DomainResult<u32>>) -> Self {
        Self { responses: TokioMutex::new(responses), ..self }
    }

    pub fn granting(self, granted: PermissionStatus) -> Self {
        Self { granted, ..self }
    }

    async fn next(&self) -> DomainResult<u32> {
        let mut responses = self.responses.lock().await;
        if responses.len() > 1 {
            responses.remove(0)
        } else {
            responses
                .first()
                .cloned()
                .unwrap_or_else(|| Err(StrideArcError::TransientRead("script empty".into())))
        }
    }
}

#[async_trait]
impl HealthDataGateway for MockHealthGateway {
    async fn authorization_status(&self) -> DomainResult<PermissionStatus> {
        Ok(self.status)
    }

    async fn request_authorization(&self) -> DomainResult<PermissionStatus> {
        Ok(self.granted)
    }

    async fn step_total(&self, _date: NaiveDate) -> DomainResult<u32> {
        self.next().await
    }
}

/// Scripted motion-sensor gateway. Accelerometer samples are served once;
/// an exhausted queue parks the caller forever, mimicking a quiet sensor.
pub struct MockMotionGateway {
    available: bool,
    status: PermissionStatus,
    responses: TokioMutex<Vec<DomainResult<u32>>>,
    accel_samples: TokioMutex<Vec<AccelSample>>,
}

impl MockMotionGateway {
    pub fn new(status: PermissionStatus) -> Self {
        Self {
            available: true,
            status,
            responses: TokioMutex::new(vec![Ok(0)]),
            accel_samples: TokioMutex::new(Vec::new()),
        }
    }

    pub fn unavailable() -> Self {
        Self { available: false, ..Self::new(PermissionStatus::Denied) }
    }

    pub fn with_totals(self, totals: Vec<u32>) -> Self {
        Self { responses: TokioMutex::new(totals.into_iter().map(Ok).collect()), ..self }
    }

    pub fn with_accel_samples(self, samples: Vec<AccelSample>) -> Self {
        Self { accel_samples: TokioMutex::new(samples), ..self }
    }

    async fn next(&self) -> DomainResult<u32> {
        let mut responses = self.responses.lock().await;
        if responses.len() > 1 {
            responses.remove(0)
        } else {
            responses
                .first()
                .cloned()
                .unwrap_or_else(|| Err(StrideArcError::TransientRead("script empty".into())))
        }
    }
}

#[async_trait]
impl MotionSensorGateway for MockMotionGateway {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn authorization_status(&self) -> DomainResult<PermissionStatus> {
        Ok(self.status)
    }

    async fn request_authorization(&self) -> DomainResult<PermissionStatus> {
        Ok(self.status)
    }

    async fn step_total_since(&self, _start: DateTime<Utc>) -> DomainResult<u32> {
        self.next().await
    }

    async fn next_accel_sample(&self) -> DomainResult<AccelSample> {
        let sample = self.accel_samples.lock().await.pop();
        match sample {
            Some(sample) => Ok(sample),
            None => futures::future::pending().await,
        }
    }
}

/// In-memory cache with switchable failure injection.
pub struct MockStepCache {
    records: TokioMutex<HashMap<NaiveDate, DailyStepRecord>>,
    fail_writes: bool,
}

impl MockStepCache {
    pub fn new() -> Self {
        Self { records: TokioMutex::new(HashMap::new()), fail_writes: false }
    }

    pub fn with_record(self, record: DailyStepRecord) -> Self {
        let records = HashMap::from([(record.date, record)]);
        Self { records: TokioMutex::new(records), ..self }
    }

    pub fn failing_writes(self) -> Self {
        Self { fail_writes: true, ..self }
    }

    pub async fn stored(&self, date: NaiveDate) -> Option<DailyStepRecord> {
        self.records.lock().await.get(&date).cloned()
    }
}

#[async_trait]
impl StepRecordCache for MockStepCache {
    async fn load(&self, date: NaiveDate) -> DomainResult<Option<DailyStepRecord>> {
        Ok(self.records.lock().await.get(&date).cloned())
    }

    async fn store(&self, record: &DailyStepRecord) -> DomainResult<()> {
        if self.fail_writes {
            return Err(StrideArcError::Database("write failure injected".into()));
        }
        self.records.lock().await.insert(record.date, record.clone());
        Ok(())
    }

    async fn clear_before(&self, date: NaiveDate) -> DomainResult<usize> {
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|key, _| *key >= date);
        Ok(before - records.len())
    }
}

/// Records enqueued sync tasks for assertions.
pub struct MockSyncQueue {
    tasks: TokioMutex<Vec<SyncTask>>,
}

impl MockSyncQueue {
    pub fn new() -> Self {
        Self { tasks: TokioMutex::new(Vec::new()) }
    }

    pub async fn tasks(&self) -> Vec<SyncTask> {
        self.tasks.lock().await.clone()
    }
}

#[async_trait]
impl SyncQueue for MockSyncQueue {
    async fn enqueue(&self, task: SyncTask) -> DomainResult<()> {
        self.tasks.lock().await.push(task);
        Ok(())
    }
}
