//! Remote sync types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::steps::DailyStepRecord;

/// A pending remote write of one day's canonical record.
///
/// Transient; owned by the sync throttler until acknowledged or abandoned.
/// At most one task per calendar day is ever pending: a superseding update
/// replaces the queued task rather than appending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncTask {
    pub user_id: String,
    pub record: DailyStepRecord,
    pub attempts: u32,
    pub enqueued_at: DateTime<Utc>,
}

impl SyncTask {
    pub fn new(user_id: impl Into<String>, record: DailyStepRecord, now: DateTime<Utc>) -> Self {
        Self { user_id: user_id.into(), record, attempts: 0, enqueued_at: now }
    }

    /// Stable idempotency key for the remote upsert: one logical row per
    /// user per day.
    pub fn idempotency_key(&self) -> String {
        format!("{}:{}", self.user_id, self.record.date)
    }
}

/// Fields written to the remote store for one day.
///
/// The record's step value overwrites whatever is there (last writer wins);
/// target and defaults are only supplied when the row is first created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteStepFields {
    pub total_steps: u32,
    pub target: u32,
    pub source: String,
    pub confidence: String,
    pub updated_at: DateTime<Utc>,
}

impl From<&DailyStepRecord> for RemoteStepFields {
    fn from(record: &DailyStepRecord) -> Self {
        Self {
            total_steps: record.total_steps,
            target: record.target,
            source: record.source.to_string(),
            confidence: record.confidence.to_string(),
            updated_at: record.last_updated,
        }
    }
}
