use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters about the engine itself. Every increment is also forwarded to
/// the `metrics` facade so an installed recorder can export it.
#[derive(Debug, Default)]
pub struct EngineStats {
    points_recorded: AtomicU64,
    points_evicted: AtomicU64,
    store_errors: AtomicU64,
    rollup_runs: AtomicU64,
    rollup_rows: AtomicU64,
    rollup_failures: AtomicU64,
    cleanup_runs: AtomicU64,
    alerts_triggered: AtomicU64,
}

impl EngineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn point_recorded(&self, metric: &str) {
        self.points_recorded.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("vitals_points_recorded_total", "metric" => metric.to_string())
            .increment(1);
    }

    pub fn points_evicted(&self, count: u64) {
        if count == 0 {
            return;
        }
        self.points_evicted.fetch_add(count, Ordering::Relaxed);
        metrics::counter!("vitals_points_evicted_total").increment(count);
    }

    pub fn store_error(&self, operation: &'static str) {
        self.store_errors.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("vitals_store_errors_total", "operation" => operation).increment(1);
    }

    pub fn rollup_finished(&self, rows: u64, failures: u64) {
        self.rollup_runs.fetch_add(1, Ordering::Relaxed);
        self.rollup_rows.fetch_add(rows, Ordering::Relaxed);
        self.rollup_failures.fetch_add(failures, Ordering::Relaxed);
        metrics::counter!("vitals_rollup_runs_total").increment(1);
        metrics::counter!("vitals_rollup_rows_total").increment(rows);
        metrics::counter!("vitals_rollup_failures_total").increment(failures);
    }

    pub fn cleanup_finished(&self) {
        self.cleanup_runs.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("vitals_cleanup_runs_total").increment(1);
    }

    pub fn alert_triggered(&self) {
        self.alerts_triggered.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("vitals_alerts_triggered_total").increment(1);
    }

    pub fn points_recorded_count(&self) -> u64 {
        self.points_recorded.load(Ordering::Relaxed)
    }

    pub fn store_error_count(&self) -> u64 {
        self.store_errors.load(Ordering::Relaxed)
    }

    pub fn rollup_failure_count(&self) -> u64 {
        self.rollup_failures.load(Ordering::Relaxed)
    }

    pub fn rollup_run_count(&self) -> u64 {
        self.rollup_runs.load(Ordering::Relaxed)
    }

    pub fn cleanup_run_count(&self) -> u64 {
        self.cleanup_runs.load(Ordering::Relaxed)
    }

    pub(crate) fn fill(&self, status: &mut SystemStatus) {
        status.points_recorded = self.points_recorded.load(Ordering::Relaxed);
        status.points_evicted = self.points_evicted.load(Ordering::Relaxed);
        status.store_errors = self.store_errors.load(Ordering::Relaxed);
        status.rollup_runs = self.rollup_runs.load(Ordering::Relaxed);
        status.rollup_rows = self.rollup_rows.load(Ordering::Relaxed);
        status.rollup_failures = self.rollup_failures.load(Ordering::Relaxed);
        status.cleanup_runs = self.cleanup_runs.load(Ordering::Relaxed);
        status.alerts_triggered = self.alerts_triggered.load(Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemStatus {
    pub status: String,
    pub store: String,
    pub uptime_seconds: u64,
    pub workers_running: bool,
    pub metrics_registered: usize,
    pub points_buffered: usize,
    pub points_recorded: u64,
    pub points_evicted: u64,
    pub store_errors: u64,
    pub rollup_runs: u64,
    pub rollup_rows: u64,
    pub rollup_failures: u64,
    pub cleanup_runs: u64,
    pub alerts_triggered: u64,
    pub active_alerts: usize,
    pub subscribers: usize,
}

impl SystemStatus {
    pub fn is_degraded(&self) -> bool {
        self.store_errors > 0 || self.rollup_failures > 0
    }
}
