//! Observability metrics for the scheduler.
//!
//! Prometheus-compatible metrics exposed through the `metrics` crate
//! facade. Exporter wiring (e.g. `metrics-exporter-prometheus`) belongs to
//! the embedding process.
//!
//! ## Metrics Exported
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `strata_scheduler_materialize_requests_total` | Counter | `state` | Materialize requests by coordinator state at arrival |
//! | `strata_scheduler_transitions_total` | Counter | `from_state`, `to_state` | Coordinator state transitions |
//! | `strata_scheduler_transformations_total` | Counter | `result` | Transformation verdicts |
//! | `strata_scheduler_retries_total` | Counter | `attempt` | Scheduled retries by attempt number |
//! | `strata_scheduler_coordinators` | Gauge | - | Live coordinators |
//! | `strata_scheduler_round_duration_seconds` | Histogram | `outcome` | Materialization round duration |

use std::time::Duration;

use metrics::{counter, gauge, histogram};

/// Metric names as constants for consistency.
pub mod names {
    /// Counter: Materialize requests by coordinator state at arrival.
    pub const MATERIALIZE_REQUESTS_TOTAL: &str = "strata_scheduler_materialize_requests_total";
    /// Counter: Coordinator state transitions.
    pub const TRANSITIONS_TOTAL: &str = "strata_scheduler_transitions_total";
    /// Counter: Transformation verdicts.
    pub const TRANSFORMATIONS_TOTAL: &str = "strata_scheduler_transformations_total";
    /// Counter: Scheduled retries by attempt number.
    pub const RETRIES_TOTAL: &str = "strata_scheduler_retries_total";
    /// Gauge: Live coordinators.
    pub const COORDINATORS: &str = "strata_scheduler_coordinators";
    /// Histogram: Materialization round duration in seconds.
    pub const ROUND_DURATION_SECONDS: &str = "strata_scheduler_round_duration_seconds";
}

/// Label keys used across metrics.
pub mod labels {
    /// Coordinator state label.
    pub const STATE: &str = "state";
    /// Previous state (for transitions).
    pub const FROM_STATE: &str = "from_state";
    /// Target state (for transitions).
    pub const TO_STATE: &str = "to_state";
    /// Verdict label (success, failure).
    pub const RESULT: &str = "result";
    /// Retry attempt number.
    pub const ATTEMPT: &str = "attempt";
    /// Round outcome label (materialized, no_data, failed).
    pub const OUTCOME: &str = "outcome";
}

/// High-level interface for recording scheduler metrics.
///
/// Cheap to clone and share across coordinator tasks.
#[derive(Debug, Clone, Default)]
pub struct SchedulerMetrics;

impl SchedulerMetrics {
    /// Creates a new metrics recorder.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Records a `Materialize` request arriving at a coordinator.
    pub fn record_request(&self, state: &str) {
        counter!(
            names::MATERIALIZE_REQUESTS_TOTAL,
            labels::STATE => state.to_string(),
        )
        .increment(1);
    }

    /// Records a coordinator state transition.
    pub fn record_transition(&self, from_state: &str, to_state: &str) {
        counter!(
            names::TRANSITIONS_TOTAL,
            labels::FROM_STATE => from_state.to_string(),
            labels::TO_STATE => to_state.to_string(),
        )
        .increment(1);
    }

    /// Records a transformation verdict.
    pub fn record_transformation(&self, result: &str) {
        counter!(
            names::TRANSFORMATIONS_TOTAL,
            labels::RESULT => result.to_string(),
        )
        .increment(1);
    }

    /// Records a scheduled retry.
    pub fn record_retry(&self, attempt: u32) {
        counter!(
            names::RETRIES_TOTAL,
            labels::ATTEMPT => attempt.to_string(),
        )
        .increment(1);
    }

    /// Sets the number of live coordinators.
    #[allow(clippy::cast_precision_loss)] // Gauge values are typically small
    pub fn set_coordinators(&self, count: usize) {
        gauge!(names::COORDINATORS).set(count as f64);
    }

    /// Records the duration of one materialization round.
    pub fn observe_round_duration(&self, outcome: &str, duration: Duration) {
        histogram!(
            names::ROUND_DURATION_SECONDS,
            labels::OUTCOME => outcome.to_string(),
        )
        .record(duration.as_secs_f64());
    }
}
