//! Accelerometer-based activity classifier
//!
//! A lightweight heuristic, not an activity-recognition model: its only job
//! is to stop non-ambulatory motion (a shaken phone, a vibrating dashboard)
//! from inflating the step count. False negatives during legitimate slow
//! walking are tolerated because the pipeline only downgrades confidence,
//! never drops steps.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use stridearc_domain::constants::{HIGH_CONFIDENCE_BAND, MEDIUM_CONFIDENCE_BAND};
use stridearc_domain::{AccelSample, ActivitySample, ActivityType, ClassifierConfig, Confidence};
use tracing::debug;

use crate::events::{EventHub, Subscription};

/// Classifies accelerometer samples and holds the latest result.
///
/// Single producer (the sampling feed), many readers; the latest sample is
/// swapped atomically and always read by value.
pub struct ActivityClassifier {
    config: ClassifierConfig,
    latest: RwLock<ActivitySample>,
    changes: EventHub<ActivitySample>,
}

impl ActivityClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        let initial = ActivitySample::new(ActivityType::Unknown, Confidence::Low, Utc::now());
        Self { config, latest: RwLock::new(initial), changes: EventHub::new() }
    }

    /// Classify one sample. Pure for a given configuration.
    ///
    /// Walking requires the overall magnitude to sit inside the configured
    /// band and the vertical axis to dominate; confidence falls off with
    /// distance from the ideal walking magnitude.
    pub fn classify(&self, sample: &AccelSample) -> ActivitySample {
        let magnitude = sample.magnitude();
        let confidence = self.confidence_for(magnitude);

        let activity = if magnitude < self.config.min_walking_magnitude {
            ActivityType::Stationary
        } else if magnitude > self.config.max_walking_magnitude {
            ActivityType::Unknown
        } else if sample.vertical_ratio() >= self.config.min_vertical_ratio {
            ActivityType::Walking
        } else {
            ActivityType::Unknown
        };

        ActivitySample::new(activity, confidence, sample.timestamp)
    }

    /// Classify and publish. Emits a change notification only when the
    /// activity type or the step gate flips, so downstream consumers are not
    /// flooded at sensor rate.
    pub fn ingest(&self, sample: &AccelSample) -> ActivitySample {
        let classified = self.classify(sample);

        let flipped = {
            let mut latest = self.latest.write();
            let flipped = latest.activity != classified.activity
                || latest.is_valid_for_steps != classified.is_valid_for_steps;
            *latest = classified;
            flipped
        };

        if flipped {
            debug!(
                activity = %classified.activity,
                valid_for_steps = classified.is_valid_for_steps,
                "Activity classification changed"
            );
            self.changes.emit(&classified);
        }

        classified
    }

    /// The latest classification, read by value.
    pub fn latest(&self) -> ActivitySample {
        *self.latest.read()
    }

    /// Install the permissive fallback used when the motion-sensor path is
    /// unavailable on this device. Absence of activity data must never
    /// block step acquisition.
    pub fn mark_unavailable(&self, now: DateTime<Utc>) {
        let fallback = ActivitySample::permissive(now);
        let flipped = {
            let mut latest = self.latest.write();
            let flipped = latest.is_valid_for_steps != fallback.is_valid_for_steps
                || latest.activity != fallback.activity;
            *latest = fallback;
            flipped
        };
        if flipped {
            self.changes.emit(&fallback);
        }
    }

    /// Subscribe to debounced classification changes.
    pub fn on_change<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ActivitySample) + Send + Sync + 'static,
    {
        self.changes.subscribe(callback)
    }

    pub fn unsubscribe(&self, subscription: Subscription) {
        self.changes.unsubscribe(subscription);
    }

    fn confidence_for(&self, magnitude: f64) -> Confidence {
        let distance = (magnitude - self.config.ideal_walking_magnitude).abs();
        if distance <= HIGH_CONFIDENCE_BAND {
            Confidence::High
        } else if distance <= MEDIUM_CONFIDENCE_BAND {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    fn classifier() -> ActivityClassifier {
        ActivityClassifier::new(ClassifierConfig::default())
    }

    #[test]
    fn clean_gait_sample_is_high_confidence_walking() {
        let sample = AccelSample::new(0.05, 0.5, 0.1, Utc::now());
        let classified = classifier().classify(&sample);

        assert_eq!(classified.activity, ActivityType::Walking);
        assert_eq!(classified.confidence, Confidence::High);
        assert!(classified.is_valid_for_steps);
    }

    #[test]
    fn near_zero_magnitude_is_stationary() {
        let sample = AccelSample::new(0.01, 0.02, 0.01, Utc::now());
        let classified = classifier().classify(&sample);

        assert_eq!(classified.activity, ActivityType::Stationary);
        assert!(!classified.is_valid_for_steps);
    }

    #[test]
    fn lateral_motion_fails_the_vertical_ratio() {
        // Strong sideways shake: magnitude in band, almost no vertical
        // component.
        let sample = AccelSample::new(0.6, 0.05, 0.1, Utc::now());
        let classified = classifier().classify(&sample);

        assert_eq!(classified.activity, ActivityType::Unknown);
        assert!(!classified.is_valid_for_steps);
    }

    #[test]
    fn excessive_magnitude_is_not_walking() {
        let sample = AccelSample::new(1.0, 2.5, 1.0, Utc::now());
        let classified = classifier().classify(&sample);

        assert_ne!(classified.activity, ActivityType::Walking);
        assert!(!classified.is_valid_for_steps);
    }

    #[test]
    fn change_notifications_are_debounced() {
        let classifier = classifier();
        let notifications = Arc::new(AtomicUsize::new(0));
        let n = Arc::clone(&notifications);
        classifier.on_change(move |_| {
            n.fetch_add(1, Ordering::SeqCst);
        });

        let walking = AccelSample::new(0.05, 0.5, 0.1, Utc::now());
        // Unknown -> Walking flips once; repeats are silent.
        classifier.ingest(&walking);
        classifier.ingest(&walking);
        classifier.ingest(&walking);
        assert_eq!(notifications.load(Ordering::SeqCst), 1);

        let still = AccelSample::new(0.0, 0.01, 0.0, Utc::now());
        classifier.ingest(&still);
        assert_eq!(notifications.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unavailable_sensor_falls_back_to_permissive() {
        let classifier = classifier();
        classifier.mark_unavailable(Utc::now());

        let latest = classifier.latest();
        assert_eq!(latest.activity, ActivityType::Walking);
        assert_eq!(latest.confidence, Confidence::Medium);
        assert!(latest.is_valid_for_steps);
    }
}
