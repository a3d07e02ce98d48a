//! Activity classification types
//!
//! `ActivitySample` is owned by the classifier; consumers read the latest
//! value as an immutable snapshot, never through a live reference.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::impl_domain_status_conversions;
use crate::types::steps::Confidence;

/// Coarse motion category derived from accelerometer data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityType {
    Unknown,
    Stationary,
    Walking,
    Running,
    Automotive,
    Cycling,
}

impl_domain_status_conversions!(ActivityType {
    Unknown => "unknown",
    Stationary => "stationary",
    Walking => "walking",
    Running => "running",
    Automotive => "automotive",
    Cycling => "cycling",
});

/// A single classified activity observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivitySample {
    pub activity: ActivityType,
    pub confidence: Confidence,
    pub timestamp: DateTime<Utc>,
    pub is_walking: bool,
    /// Gate for the step pipeline: walking with at least medium confidence.
    pub is_valid_for_steps: bool,
}

impl ActivitySample {
    pub fn new(
        activity: ActivityType,
        confidence: Confidence,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let is_walking = matches!(activity, ActivityType::Walking | ActivityType::Running);
        Self {
            activity,
            confidence,
            timestamp,
            is_walking,
            is_valid_for_steps: is_walking && confidence != Confidence::Low,
        }
    }

    /// Permissive fallback used when no motion hardware is available.
    ///
    /// Absence of activity data must never block step acquisition, so the
    /// fallback reads as plausible walking.
    pub fn permissive(timestamp: DateTime<Utc>) -> Self {
        Self::new(ActivityType::Walking, Confidence::Medium, timestamp)
    }
}

/// One raw three-axis accelerometer sample, normalized so that a stationary
/// device reads near zero and fast running reads near 2.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccelSample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub timestamp: DateTime<Utc>,
}

impl AccelSample {
    pub fn new(x: f64, y: f64, z: f64, timestamp: DateTime<Utc>) -> Self {
        Self { x, y, z, timestamp }
    }

    /// Overall acceleration magnitude.
    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Share of the magnitude carried by the vertical axis.
    ///
    /// Walking gait is dominated by vertical bounce; hand-waving and lateral
    /// vehicle motion are not.
    pub fn vertical_ratio(&self) -> f64 {
        let magnitude = self.magnitude();
        if magnitude == 0.0 {
            return 0.0;
        }
        self.y.abs() / magnitude
    }
}
