//! Configuration metrics tracking using OpenTelemetry.

use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Gauge, Histogram, Meter};
use std::sync::Arc;
use std::time::Instant;

/// Metrics collector for directory reloads and observer notifications.
///
/// # Examples
///
/// ```rust,no_run
/// use confwatch::metrics::ConfigMetrics;
/// use opentelemetry::global;
///
/// let meter = global::meter("confwatch");
/// let metrics = ConfigMetrics::new(meter);
///
/// let timer = metrics.start_reload();
/// // ... reload a.json ...
/// metrics.record_reload_success("a.json", timer, 1);
/// ```
#[derive(Clone)]
pub struct ConfigMetrics {
    reload_attempts: Counter<u64>,
    reload_success: Counter<u64>,
    reload_failures: Counter<u64>,
    reload_duration: Histogram<f64>,
    documents: Gauge<i64>,
    config_age_seconds: Gauge<i64>,
    observer_failures: Counter<u64>,
    last_update: Arc<parking_lot::Mutex<Instant>>,
}

impl ConfigMetrics {
    /// Create a new metrics collector with the provided meter.
    pub fn new(meter: Meter) -> Self {
        let reload_attempts = meter
            .u64_counter("confwatch.reload.attempts")
            .with_description("Total number of file reload attempts")
            .build();

        let reload_success = meter
            .u64_counter("confwatch.reload.success")
            .with_description("Number of successful file reloads")
            .build();

        let reload_failures = meter
            .u64_counter("confwatch.reload.failures")
            .with_description("Number of rejected file reloads")
            .build();

        let reload_duration = meter
            .f64_histogram("confwatch.reload.duration")
            .with_description("Duration of reload operations in seconds")
            .with_unit("s")
            .build();

        let documents = meter
            .i64_gauge("confwatch.documents")
            .with_description("Number of loaded configuration documents")
            .build();

        let config_age_seconds = meter
            .i64_gauge("confwatch.age")
            .with_description("Time since last configuration change in seconds")
            .with_unit("s")
            .build();

        let observer_failures = meter
            .u64_counter("confwatch.observer.failures")
            .with_description("Number of observer panics during notification")
            .build();

        Self {
            reload_attempts,
            reload_success,
            reload_failures,
            reload_duration,
            documents,
            config_age_seconds,
            observer_failures,
            last_update: Arc::new(parking_lot::Mutex::new(Instant::now())),
        }
    }

    /// Start a reload timer.
    ///
    /// Also records the age of the configuration as it was before this reload.
    pub fn start_reload(&self) -> Instant {
        self.reload_attempts.add(1, &[]);
        self.update_config_age();
        Instant::now()
    }

    /// Record a successful reload of `file`, leaving `documents` loaded.
    pub fn record_reload_success(&self, file: &str, start: Instant, documents: usize) {
        let attrs = [KeyValue::new("file", file.to_string())];
        self.reload_success.add(1, &attrs);
        self.reload_duration.record(start.elapsed().as_secs_f64(), &attrs);
        self.record_change(documents);
    }

    /// Record a rejected reload of `file`.
    pub fn record_reload_failure(&self, file: &str, start: Instant) {
        let attrs = [KeyValue::new("file", file.to_string())];
        self.reload_failures.add(1, &attrs);
        self.reload_duration.record(start.elapsed().as_secs_f64(), &attrs);
    }

    /// Record a change to the document set that was not a reload (a removal).
    pub fn record_change(&self, documents: usize) {
        self.documents.record(documents as i64, &[]);
        *self.last_update.lock() = Instant::now();
    }

    /// Record observers that panicked during one notification.
    pub fn record_observer_failures(&self, count: usize) {
        if count > 0 {
            self.observer_failures.add(count as u64, &[]);
        }
    }

    /// Update the configuration age metric.
    ///
    /// Recorded on every reload attempt. Call it periodically as well to track
    /// staleness while no file changes.
    pub fn update_config_age(&self) {
        let age_secs = self.last_update.lock().elapsed().as_secs() as i64;
        self.config_age_seconds.record(age_secs, &[]);
    }
}

impl std::fmt::Debug for ConfigMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigMetrics").finish_non_exhaustive()
    }
}
