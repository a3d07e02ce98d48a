//! Step update pipeline
//!
//! The accept path for raw readings. Applies, in order: duplicate no-op,
//! throttle, daily cutoff gate, rate-of-change smoothing, activity gate,
//! anti-gaming clamp. Smoothing and the activity gate are accept-but-flag:
//! a suspicious reading still updates the total but its confidence is
//! downgraded, because dropping real steps is worse than counting doubtful
//! ones in a wellness-motivation product. The pipeline is the only writer
//! of `DailyStepRecord`.

use chrono::{DateTime, Utc};
use stridearc_domain::{
    AcquisitionMode, ActivitySample, Confidence, DailyStepRecord, StepReading, StepSource,
    TrackingConfig,
};
use tracing::debug;

/// Why a reading produced no update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Identical (timestamp, value) to the previously accepted reading.
    Duplicate,
    /// Arrived sooner than the minimum update interval. A render guard, not
    /// a correctness control.
    Throttled,
    /// Arrived at or after the daily cutoff hour.
    AfterCutoff,
    /// Normalized total does not exceed the current total.
    NoIncrement,
}

/// Result of pushing one reading through the accept path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    Rejected(RejectReason),
    Accepted {
        record: DailyStepRecord,
        /// True when smoothing or the activity gate downgraded confidence.
        flagged: bool,
    },
}

/// Owns the canonical record for the current day and applies readings to it.
pub struct StepUpdatePipeline {
    config: TrackingConfig,
    record: DailyStepRecord,
    last_accepted_at: Option<DateTime<Utc>>,
    last_reading: Option<(DateTime<Utc>, u32)>,
}

impl StepUpdatePipeline {
    pub fn new(config: TrackingConfig, record: DailyStepRecord) -> Self {
        Self { config, record, last_accepted_at: None, last_reading: None }
    }

    /// The current canonical record.
    pub fn record(&self) -> &DailyStepRecord {
        &self.record
    }

    /// Swap in a fresh record at rollover. Resets accept-path history so the
    /// new day starts clean.
    pub fn replace_record(&mut self, record: DailyStepRecord) {
        self.record = record;
        self.last_accepted_at = None;
        self.last_reading = None;
    }

    /// Apply one reading.
    ///
    /// `activity` is the classifier's latest snapshot; it only gates when
    /// the active mode is the raw motion path, since the health service
    /// performs its own vetting. `local_hour` is the wall-clock hour used
    /// by the cutoff gate; both are passed in so the accept path stays
    /// deterministic under test.
    pub fn apply(
        &mut self,
        reading: &StepReading,
        activity: Option<&ActivitySample>,
        active_mode: AcquisitionMode,
        now: DateTime<Utc>,
        local_hour: u32,
    ) -> PipelineOutcome {
        if self.last_reading == Some((reading.timestamp, reading.steps)) {
            return PipelineOutcome::Rejected(RejectReason::Duplicate);
        }

        if let Some(last) = self.last_accepted_at {
            let elapsed_ms = (now - last).num_milliseconds();
            if elapsed_ms >= 0 && (elapsed_ms as u64) < self.config.min_update_interval_ms {
                return PipelineOutcome::Rejected(RejectReason::Throttled);
            }
        }

        if local_hour >= self.config.daily_cutoff_hour {
            debug!(hour = local_hour, "Reading ignored after daily cutoff");
            return PipelineOutcome::Rejected(RejectReason::AfterCutoff);
        }

        let new_total = self.normalize(reading);
        let increment = new_total.saturating_sub(self.record.total_steps);
        if increment == 0 {
            return PipelineOutcome::Rejected(RejectReason::NoIncrement);
        }

        let mut confidence = reading.confidence;
        let mut flagged = false;

        // Rate-of-change smoothing: implausibly fast bursts still count,
        // but are marked for audit rather than silently trusted.
        let elapsed_seconds = self.elapsed_seconds(now);
        let plausible = (elapsed_seconds * f64::from(self.config.max_steps_per_second)).ceil();
        if f64::from(increment) > plausible {
            confidence = downgrade(confidence);
            flagged = true;
            debug!(
                increment = increment,
                elapsed_seconds = elapsed_seconds,
                "Implausible step rate; confidence downgraded"
            );
        }

        // Activity gate, raw motion path only. The classifier can have
        // false negatives during legitimate slow walking, so an invalid
        // sample downgrades confidence instead of blocking the increment.
        if active_mode == AcquisitionMode::Secondary {
            if let Some(sample) = activity {
                if !sample.is_valid_for_steps {
                    confidence = Confidence::Low;
                    flagged = true;
                    debug!(activity = %sample.activity, "Non-walking activity; confidence low");
                }
            }
        }

        let capped = self
            .record
            .total_steps
            .saturating_add(increment)
            .min(self.config.max_steps_per_day);

        self.record.total_steps = capped;
        self.record.last_updated = now;
        self.record.source = reading.source;
        self.record.confidence = confidence;
        self.last_accepted_at = Some(now);
        self.last_reading = Some((reading.timestamp, reading.steps));

        PipelineOutcome::Accepted { record: self.record.clone(), flagged }
    }

    /// Normalize a reading to "new total for today". Primary and Secondary
    /// deliver same-day running totals; Manual and Cache deliver increments.
    fn normalize(&self, reading: &StepReading) -> u32 {
        match reading.source {
            StepSource::Primary | StepSource::Secondary => reading.steps,
            StepSource::Manual | StepSource::Cache => {
                self.record.total_steps.saturating_add(reading.steps)
            }
        }
    }

    fn elapsed_seconds(&self, now: DateTime<Utc>) -> f64 {
        let since = self.last_accepted_at.unwrap_or(self.record.last_updated);
        ((now - since).num_milliseconds().max(0) as f64) / 1_000.0
    }
}

fn downgrade(confidence: Confidence) -> Confidence {
    match confidence {
        Confidence::High => Confidence::Medium,
        Confidence::Medium | Confidence::Low => Confidence::Low,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, TimeZone};

    use super::*;

    const NOON_HOUR: u32 = 12;

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    fn pipeline() -> StepUpdatePipeline {
        let record = DailyStepRecord::empty(date(), 10_000, base_time());
        StepUpdatePipeline::new(TrackingConfig::default(), record)
    }

    fn reading(steps: u32, at: DateTime<Utc>, source: StepSource) -> StepReading {
        StepReading::new(steps, at, source, Confidence::High)
    }

    fn accepted(outcome: PipelineOutcome) -> (DailyStepRecord, bool) {
        match outcome {
            PipelineOutcome::Accepted { record, flagged } => (record, flagged),
            other => panic!("expected acceptance, got {other:?}"),
        }
    }

    #[test]
    fn running_total_advances_the_record() {
        let mut pipeline = pipeline();
        let at = base_time() + Duration::seconds(60);

        let (record, flagged) = accepted(pipeline.apply(
            &reading(150, at, StepSource::Primary),
            None,
            AcquisitionMode::Primary,
            at,
            NOON_HOUR,
        ));

        assert_eq!(record.total_steps, 150);
        assert_eq!(record.source, StepSource::Primary);
        assert_eq!(record.confidence, Confidence::High);
        assert!(!flagged);
    }

    #[test]
    fn manual_readings_are_increments() {
        let mut pipeline = pipeline();
        let t1 = base_time() + Duration::seconds(60);
        let t2 = t1 + Duration::seconds(60);

        accepted(pipeline.apply(
            &reading(100, t1, StepSource::Manual),
            None,
            AcquisitionMode::Manual,
            t1,
            NOON_HOUR,
        ));
        let (record, _) = accepted(pipeline.apply(
            &reading(50, t2, StepSource::Manual),
            None,
            AcquisitionMode::Manual,
            t2,
            NOON_HOUR,
        ));

        assert_eq!(record.total_steps, 150);
    }

    #[test]
    fn throttle_rejects_rapid_updates() {
        let mut pipeline = pipeline();
        let t1 = base_time() + Duration::seconds(60);
        let t2 = t1 + Duration::milliseconds(100);

        accepted(pipeline.apply(
            &reading(10, t1, StepSource::Primary),
            None,
            AcquisitionMode::Primary,
            t1,
            NOON_HOUR,
        ));
        let outcome = pipeline.apply(
            &reading(20, t2, StepSource::Primary),
            None,
            AcquisitionMode::Primary,
            t2,
            NOON_HOUR,
        );

        assert_eq!(outcome, PipelineOutcome::Rejected(RejectReason::Throttled));
        assert_eq!(pipeline.record().total_steps, 10);
    }

    #[test]
    fn cutoff_hour_ignores_late_readings() {
        let mut pipeline = pipeline();
        let at = base_time() + Duration::seconds(60);

        let outcome = pipeline.apply(
            &reading(10, at, StepSource::Primary),
            None,
            AcquisitionMode::Primary,
            at,
            22,
        );
        assert_eq!(outcome, PipelineOutcome::Rejected(RejectReason::AfterCutoff));
    }

    #[test]
    fn implausible_burst_is_accepted_but_flagged() {
        let mut pipeline = pipeline();
        let t1 = base_time() + Duration::seconds(60);
        let t2 = t1 + Duration::seconds(1);

        accepted(pipeline.apply(
            &reading(10, t1, StepSource::Primary),
            None,
            AcquisitionMode::Primary,
            t1,
            NOON_HOUR,
        ));
        // 500 steps in one second against a 20 steps/sec ceiling.
        let (record, flagged) = accepted(pipeline.apply(
            &reading(510, t2, StepSource::Primary),
            None,
            AcquisitionMode::Primary,
            t2,
            NOON_HOUR,
        ));

        assert_eq!(record.total_steps, 510);
        assert!(flagged);
        assert!(record.confidence <= Confidence::Medium);
    }

    #[test]
    fn plausible_rate_keeps_confidence() {
        let mut pipeline = pipeline();
        let t1 = base_time() + Duration::seconds(60);
        let t2 = t1 + Duration::seconds(10);

        accepted(pipeline.apply(
            &reading(10, t1, StepSource::Primary),
            None,
            AcquisitionMode::Primary,
            t1,
            NOON_HOUR,
        ));
        let (record, flagged) = accepted(pipeline.apply(
            &reading(40, t2, StepSource::Primary),
            None,
            AcquisitionMode::Primary,
            t2,
            NOON_HOUR,
        ));

        assert_eq!(record.confidence, Confidence::High);
        assert!(!flagged);
    }

    #[test]
    fn invalid_activity_downgrades_secondary_readings() {
        let mut pipeline = pipeline();
        let at = base_time() + Duration::seconds(60);
        let sample =
            ActivitySample::new(stridearc_domain::ActivityType::Automotive, Confidence::High, at);

        let (record, flagged) = accepted(pipeline.apply(
            &reading(30, at, StepSource::Secondary),
            Some(&sample),
            AcquisitionMode::Secondary,
            at,
            NOON_HOUR,
        ));

        // Accept-but-flag: the increment lands, confidence drops.
        assert_eq!(record.total_steps, 30);
        assert_eq!(record.confidence, Confidence::Low);
        assert!(flagged);
    }

    #[test]
    fn activity_gate_does_not_apply_to_primary() {
        let mut pipeline = pipeline();
        let at = base_time() + Duration::seconds(60);
        let sample =
            ActivitySample::new(stridearc_domain::ActivityType::Automotive, Confidence::High, at);

        let (record, flagged) = accepted(pipeline.apply(
            &reading(30, at, StepSource::Primary),
            Some(&sample),
            AcquisitionMode::Primary,
            at,
            NOON_HOUR,
        ));

        assert_eq!(record.confidence, Confidence::High);
        assert!(!flagged);
    }

    #[test]
    fn daily_cap_bounds_the_total() {
        let mut pipeline = pipeline();
        let at = base_time() + Duration::days(0) + Duration::seconds(60);

        let (record, _) = accepted(pipeline.apply(
            &reading(250_000, at, StepSource::Primary),
            None,
            AcquisitionMode::Primary,
            at,
            NOON_HOUR,
        ));

        assert_eq!(record.total_steps, TrackingConfig::default().max_steps_per_day);
    }

    #[test]
    fn replayed_reading_does_not_double_count() {
        let mut pipeline = pipeline();
        let at = base_time() + Duration::seconds(60);
        let replayed = reading(100, at, StepSource::Manual);

        accepted(pipeline.apply(&replayed, None, AcquisitionMode::Manual, at, NOON_HOUR));
        let outcome = pipeline.apply(
            &replayed,
            None,
            AcquisitionMode::Manual,
            at + Duration::seconds(5),
            NOON_HOUR,
        );

        assert_eq!(outcome, PipelineOutcome::Rejected(RejectReason::Duplicate));
        assert_eq!(pipeline.record().total_steps, 100);
    }

    #[test]
    fn stale_total_never_decreases_the_record() {
        let mut pipeline = pipeline();
        let t1 = base_time() + Duration::seconds(60);
        let t2 = t1 + Duration::seconds(60);

        accepted(pipeline.apply(
            &reading(500, t1, StepSource::Primary),
            None,
            AcquisitionMode::Primary,
            t1,
            NOON_HOUR,
        ));
        let outcome = pipeline.apply(
            &reading(200, t2, StepSource::Primary),
            None,
            AcquisitionMode::Primary,
            t2,
            NOON_HOUR,
        );

        assert_eq!(outcome, PipelineOutcome::Rejected(RejectReason::NoIncrement));
        assert_eq!(pipeline.record().total_steps, 500);
    }

    #[test]
    fn totals_stay_within_bounds_across_sequences() {
        let mut pipeline = pipeline();
        let max = TrackingConfig::default().max_steps_per_day;
        let mut at = base_time();

        for steps in [100u32, 5_000, 90_000, 200_000, 150] {
            at += Duration::seconds(30);
            pipeline.apply(
                &reading(steps, at, StepSource::Primary),
                None,
                AcquisitionMode::Primary,
                at,
                NOON_HOUR,
            );
            assert!(pipeline.record().total_steps <= max);
        }
    }

    #[test]
    fn replace_record_resets_accept_history() {
        let mut pipeline = pipeline();
        let at = base_time() + Duration::seconds(60);
        accepted(pipeline.apply(
            &reading(100, at, StepSource::Primary),
            None,
            AcquisitionMode::Primary,
            at,
            NOON_HOUR,
        ));

        let next_day = date() + Duration::days(1);
        pipeline.replace_record(DailyStepRecord::empty(next_day, 10_000, at));

        assert_eq!(pipeline.record().total_steps, 0);
        assert_eq!(pipeline.record().date, next_day);

        // A reading identical to yesterday's is fresh again after rollover.
        let (record, _) = accepted(pipeline.apply(
            &reading(100, at, StepSource::Primary),
            None,
            AcquisitionMode::Primary,
            at + Duration::seconds(61),
            NOON_HOUR,
        ));
        assert_eq!(record.total_steps, 100);
    }
}
