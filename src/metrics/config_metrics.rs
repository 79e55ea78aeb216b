//! Polling metrics using OpenTelemetry.

use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Gauge, Histogram, Meter};
use std::sync::Arc;
use std::time::Instant;

/// Metrics collector for polling client operations.
///
/// # Examples
///
/// ```rust,no_run
/// use hotswap_settings::metrics::ConfigMetrics;
/// use opentelemetry::global;
///
/// let metrics = ConfigMetrics::new(global::meter("hotswap-settings"));
///
/// let timer = metrics.start_fetch();
/// // ... fetch a namespace ...
/// metrics.record_fetch(timer, "application", true);
/// ```
#[derive(Clone)]
pub struct ConfigMetrics {
    poll_cycles: Counter<u64>,
    poll_failures: Counter<u64>,
    fetch_duration: Histogram<f64>,
    namespace_updates: Counter<u64>,
    subscriber_failures: Counter<u64>,
    validation_failures: Counter<u64>,
    active_subscribers: Gauge<i64>,
    config_age_seconds: Gauge<i64>,
    last_update: Arc<parking_lot::Mutex<Instant>>,
}

impl ConfigMetrics {
    /// Create a new metrics collector with the provided meter.
    pub fn new(meter: Meter) -> Self {
        let poll_cycles = meter
            .u64_counter("hotswap_settings.poll.cycles")
            .with_description("Total number of long-poll cycles")
            .build();

        let poll_failures = meter
            .u64_counter("hotswap_settings.poll.failures")
            .with_description("Number of long-poll cycles that failed")
            .build();

        let fetch_duration = meter
            .f64_histogram("hotswap_settings.fetch.duration")
            .with_description("Duration of namespace config fetches in seconds")
            .with_unit("s")
            .build();

        let namespace_updates = meter
            .u64_counter("hotswap_settings.namespace.updates")
            .with_description("Number of namespace snapshots published")
            .build();

        let subscriber_failures = meter
            .u64_counter("hotswap_settings.subscriber.failures")
            .with_description("Number of subscriber invocations that failed")
            .build();

        let validation_failures = meter
            .u64_counter("hotswap_settings.validation.failures")
            .with_description("Number of update cycles rejected by validation")
            .build();

        let active_subscribers = meter
            .i64_gauge("hotswap_settings.subscribers.active")
            .with_description("Number of registered subscribers")
            .build();

        let config_age_seconds = meter
            .i64_gauge("hotswap_settings.age")
            .with_description("Time since the last namespace update in seconds")
            .with_unit("s")
            .build();

        Self {
            poll_cycles,
            poll_failures,
            fetch_duration,
            namespace_updates,
            subscriber_failures,
            validation_failures,
            active_subscribers,
            config_age_seconds,
            last_update: Arc::new(parking_lot::Mutex::new(Instant::now())),
        }
    }

    /// Count a long-poll cycle.
    pub fn record_poll(&self) {
        self.poll_cycles.add(1, &[]);
    }

    /// Count a failed long-poll cycle.
    pub fn record_poll_failure(&self) {
        self.poll_failures.add(1, &[]);
    }

    /// Start a fetch timer.
    pub fn start_fetch(&self) -> Instant {
        Instant::now()
    }

    /// Record the outcome of a namespace fetch started at `start`.
    pub fn record_fetch(&self, start: Instant, namespace: &str, success: bool) {
        self.fetch_duration.record(
            start.elapsed().as_secs_f64(),
            &[
                KeyValue::new("namespace", namespace.to_string()),
                KeyValue::new("success", success),
            ],
        );
    }

    /// Count a published namespace snapshot.
    pub fn record_namespace_update(&self, namespace: &str) {
        self.namespace_updates
            .add(1, &[KeyValue::new("namespace", namespace.to_string())]);
        *self.last_update.lock() = Instant::now();
    }

    /// Count a failed subscriber invocation.
    pub fn record_subscriber_failure(&self) {
        self.subscriber_failures.add(1, &[]);
    }

    /// Count an update cycle rejected by validation.
    pub fn record_validation_failure(&self) {
        self.validation_failures.add(1, &[]);
    }

    /// Update the number of registered subscribers.
    pub fn update_subscriber_count(&self, count: i64) {
        self.active_subscribers.record(count, &[]);
    }

    /// Update the configuration age metric.
    ///
    /// This should be called periodically to track how stale the configuration is.
    pub fn update_config_age(&self) {
        let age_secs = self.last_update.lock().elapsed().as_secs() as i64;
        self.config_age_seconds.record(age_secs, &[]);
    }
}
