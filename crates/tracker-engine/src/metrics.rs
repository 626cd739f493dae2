//! Event lifecycle metrics.
//!
//! Two series exist: a counter incremented on event creation and on
//! terminal-status transitions, and a histogram observed once per
//! terminal-status transition. Recording goes through the
//! [`LifecycleMetrics`] trait so engines receive the recorder as an injected
//! collaborator and tests can substitute [`RecordingLifecycleMetrics`].

use std::sync::Mutex;

use metrics::{counter, describe_counter, describe_histogram, histogram};

use tracker_core::{Environment, Status};

/// Counter of events by status, service, and environment.
pub const EVENT_STATUS_TOTAL: &str = "tracker_event_status_total";

/// Histogram of event durations in seconds.
pub const EVENT_DURATION_SECONDS: &str = "tracker_event_duration_seconds";

/// Registers metric descriptions with the installed recorder.
pub fn describe_metrics() {
    describe_counter!(EVENT_STATUS_TOTAL, "Total number of events by status");
    describe_histogram!(EVENT_DURATION_SECONDS, "Duration of events in seconds");
}

/// Recorder for event lifecycle metrics.
pub trait LifecycleMetrics: Send + Sync {
    /// Increments the event status counter.
    fn record_status(&self, service: &str, status: Status, environment: Environment);

    /// Observes one event duration.
    fn observe_duration(
        &self,
        service: &str,
        status: Status,
        environment: Environment,
        seconds: f64,
    );
}

/// Production recorder backed by the process-wide `metrics` registry.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrometheusLifecycleMetrics;

impl LifecycleMetrics for PrometheusLifecycleMetrics {
    fn record_status(&self, service: &str, status: Status, environment: Environment) {
        counter!(
            EVENT_STATUS_TOTAL,
            "service" => service.to_string(),
            "status" => status.to_string(),
            "environment" => environment.to_string()
        )
        .increment(1);
    }

    fn observe_duration(
        &self,
        service: &str,
        status: Status,
        environment: Environment,
        seconds: f64,
    ) {
        histogram!(
            EVENT_DURATION_SECONDS,
            "service" => service.to_string(),
            "status" => status.to_string(),
            "environment" => environment.to_string()
        )
        .record(seconds);
    }
}

/// Test recorder capturing every emission.
#[derive(Debug, Default)]
pub struct RecordingLifecycleMetrics {
    /// `(service, status, environment)` per counter increment.
    pub counts: Mutex<Vec<(String, String, String)>>,
    /// `(service, status, environment, seconds)` per observation.
    pub observations: Mutex<Vec<(String, String, String, f64)>>,
}

impl RecordingLifecycleMetrics {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of counter increments recorded so far.
    ///
    /// # Panics
    ///
    /// Panics if the inner mutex is poisoned.
    #[must_use]
    pub fn count_total(&self) -> usize {
        self.counts.lock().expect("counts mutex").len()
    }

    /// Number of histogram observations recorded so far.
    ///
    /// # Panics
    ///
    /// Panics if the inner mutex is poisoned.
    #[must_use]
    pub fn observation_total(&self) -> usize {
        self.observations.lock().expect("observations mutex").len()
    }
}

impl LifecycleMetrics for RecordingLifecycleMetrics {
    fn record_status(&self, service: &str, status: Status, environment: Environment) {
        self.counts.lock().expect("counts mutex").push((
            service.to_string(),
            status.to_string(),
            environment.to_string(),
        ));
    }

    fn observe_duration(
        &self,
        service: &str,
        status: Status,
        environment: Environment,
        seconds: f64,
    ) {
        self.observations.lock().expect("observations mutex").push((
            service.to_string(),
            status.to_string(),
            environment.to_string(),
            seconds,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_metrics_capture_labels() {
        let recorder = RecordingLifecycleMetrics::new();
        recorder.record_status("api", Status::Start, Environment::Production);
        recorder.observe_duration("api", Status::Success, Environment::Production, 12.5);

        assert_eq!(recorder.count_total(), 1);
        assert_eq!(recorder.observation_total(), 1);
        let counts = recorder.counts.lock().unwrap();
        assert_eq!(
            counts[0],
            (
                "api".to_string(),
                "start".to_string(),
                "production".to_string()
            )
        );
    }

    #[test]
    fn prometheus_recorder_does_not_panic_without_registry() {
        // The metrics facade no-ops when no recorder is installed.
        let recorder = PrometheusLifecycleMetrics;
        recorder.record_status("api", Status::Start, Environment::Uat);
        recorder.observe_duration("api", Status::Done, Environment::Uat, 1.0);
        describe_metrics();
    }
}
