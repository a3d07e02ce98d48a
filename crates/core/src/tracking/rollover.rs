//! Daily rollover
//!
//! Boundary logic that retires one calendar day's record and begins a new
//! one. Rollover creates a new logical record rather than mutating the old
//! one in place, so an in-flight sync for the old date still completes
//! against the old date key. Yesterday's final value is whatever was last
//! successfully synced before rollover; it is never retroactively fixed.

use chrono::{DateTime, NaiveDate, Utc};
use stridearc_domain::DailyStepRecord;

/// True when the record belongs to an earlier calendar day than `today`.
pub fn needs_rollover(record: &DailyStepRecord, today: NaiveDate) -> bool {
    record.date != today
}

/// Resolve the record to start tracking with on cold start: the cached
/// record if it is for today, otherwise a zeroed record for today.
pub fn resolve_initial(
    cached: Option<DailyStepRecord>,
    today: NaiveDate,
    target: u32,
    now: DateTime<Utc>,
) -> DailyStepRecord {
    match cached {
        Some(record) if record.date == today => record,
        _ => DailyStepRecord::empty(today, target, now),
    }
}
