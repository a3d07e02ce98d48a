//! Step acquisition types
//!
//! `StepReading` is the ephemeral unit a source driver produces;
//! `DailyStepRecord` is the durable, canonical value derived from accepted
//! readings. Only the update pipeline writes `DailyStepRecord`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::impl_domain_status_conversions;

/// Which acquisition path produced a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepSource {
    /// Platform health-data service (pre-vetted step totals).
    Primary,
    /// Raw motion-sensor pedometer path.
    Secondary,
    /// User-entered increments.
    Manual,
    /// Value restored from the local cache on cold start.
    Cache,
}

impl_domain_status_conversions!(StepSource {
    Primary => "primary",
    Secondary => "secondary",
    Manual => "manual",
    Cache => "cache",
});

/// Confidence attached to a reading or record.
///
/// Downgraded (never upgraded) by the pipeline's accept-but-flag checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl_domain_status_conversions!(Confidence {
    Low => "low",
    Medium => "medium",
    High => "high",
});

/// The single active acquisition mode. Transitions only through the mode
/// selector rules; demotion is one-directional at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcquisitionMode {
    Primary,
    Secondary,
    Manual,
    Disabled,
}

impl_domain_status_conversions!(AcquisitionMode {
    Primary => "primary",
    Secondary => "secondary",
    Manual => "manual",
    Disabled => "disabled",
});

impl AcquisitionMode {
    /// Whether any step acquisition happens in this mode.
    pub fn is_tracking(&self) -> bool {
        !matches!(self, Self::Disabled)
    }
}

/// Tri-state permission result for a platform data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionStatus {
    Authorized,
    Denied,
    /// The user has not been asked yet.
    Undetermined,
}

impl_domain_status_conversions!(PermissionStatus {
    Authorized => "authorized",
    Denied => "denied",
    Undetermined => "undetermined",
});

/// Snapshot of both source permissions, captured by the permission gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSet {
    pub health: PermissionStatus,
    pub motion: PermissionStatus,
}

impl PermissionSet {
    pub fn new(health: PermissionStatus, motion: PermissionStatus) -> Self {
        Self { health, motion }
    }

    /// True if either source is still undetermined.
    pub fn any_undetermined(&self) -> bool {
        self.health == PermissionStatus::Undetermined
            || self.motion == PermissionStatus::Undetermined
    }

    /// True if either source is authorized.
    pub fn any_authorized(&self) -> bool {
        self.health == PermissionStatus::Authorized
            || self.motion == PermissionStatus::Authorized
    }
}

/// A raw step value delivered by the active driver.
///
/// Immutable; produced by a driver, consumed once by the pipeline.
/// Primary/Secondary readings carry a same-day running total, Manual
/// readings carry an increment; the pipeline normalizes both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepReading {
    pub steps: u32,
    pub timestamp: DateTime<Utc>,
    pub source: StepSource,
    pub confidence: Confidence,
}

impl StepReading {
    pub fn new(
        steps: u32,
        timestamp: DateTime<Utc>,
        source: StepSource,
        confidence: Confidence,
    ) -> Self {
        Self { steps, timestamp, source, confidence }
    }
}

/// The canonical "steps taken today" record.
///
/// One live instance per calendar day. Invariants: `total_steps` stays within
/// `[0, max_steps_per_day]`, and `date` only changes through daily rollover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyStepRecord {
    pub date: NaiveDate,
    pub total_steps: u32,
    pub target: u32,
    pub last_updated: DateTime<Utc>,
    pub source: StepSource,
    pub confidence: Confidence,
}

impl DailyStepRecord {
    /// A zeroed record for the given day, used at first reading of a new
    /// calendar day and after rollover.
    pub fn empty(date: NaiveDate, target: u32, now: DateTime<Utc>) -> Self {
        Self {
            date,
            total_steps: 0,
            target,
            last_updated: now,
            source: StepSource::Cache,
            confidence: Confidence::High,
        }
    }

    /// Progress toward the daily target in `[0.0, 1.0]`.
    pub fn progress(&self) -> f64 {
        if self.target == 0 {
            return 0.0;
        }
        (f64::from(self.total_steps) / f64::from(self.target)).min(1.0)
    }
}
