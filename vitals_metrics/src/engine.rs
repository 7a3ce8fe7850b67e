use crate::{
    aggregator::{MetricsAggregator, RollupFailure, RollupKind, RollupReport},
    alerts::{AlertManager, AlertTransition},
    anomaly::AnomalyDetector,
    kpi::KpiTracker,
    snapshot::DashboardSnapshot,
    stats::{EngineStats, SystemStatus},
    workers,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};
use vitals_config::{duration_millis, EngineConfig};
use vitals_core::{
    now_millis, raw_key, rollup_key, AlertCondition, AlertSeverity, DynStore, KpiTarget, Labels,
    MetricAlert, MetricDefinition, MetricEvent, MetricKind, MetricPoint, MetricRegistry,
    Registration, Result, SeriesHandle, TrackedKpi, VitalsError,
};

/// Inclusive `[start, end]` range in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: i64,
    pub end: i64,
}

impl TimeRange {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }
}

/// Cumulative histogram buckets; the last bucket is `+Inf`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketCounts {
    pub buckets: Vec<(f64, u64)>,
    pub count: u64,
    pub sum: f64,
}

impl BucketCounts {
    pub fn compute(bounds: &[f64], values: impl IntoIterator<Item = f64>) -> Self {
        let mut counts = vec![0u64; bounds.len()];
        let mut count = 0u64;
        let mut sum = 0.0;

        for value in values {
            count += 1;
            sum += value;
            for (slot, bound) in counts.iter_mut().zip(bounds) {
                if value <= *bound {
                    *slot += 1;
                }
            }
        }

        let mut buckets: Vec<(f64, u64)> = bounds.iter().copied().zip(counts).collect();
        buckets.push((f64::INFINITY, count));
        Self {
            buckets,
            count,
            sum,
        }
    }
}

/// Count of in-flight mirror writes, so `flush` can wait for them without
/// closing the task tracker.
#[derive(Default)]
struct PendingWrites {
    count: AtomicUsize,
    idle: Notify,
}

impl PendingWrites {
    fn begin(self: &Arc<Self>) -> PendingGuard {
        self.count.fetch_add(1, Ordering::AcqRel);
        PendingGuard(self.clone())
    }

    async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.count.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }
}

struct PendingGuard(Arc<PendingWrites>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleanupReport {
    pub cutoff: i64,
    pub points_evicted: usize,
    pub rows_deleted: usize,
    pub store_failures: usize,
}

/// Metrics collection engine. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct MetricsEngine {
    config: Arc<EngineConfig>,
    registry: Arc<MetricRegistry>,
    store: DynStore,
    kpis: Arc<KpiTracker>,
    alerts: Arc<AlertManager>,
    events: broadcast::Sender<MetricEvent>,
    stats: Arc<EngineStats>,
    mirror_tasks: TaskTracker,
    pending_writes: Arc<PendingWrites>,
    shutdown: CancellationToken,
    workers: Arc<Mutex<Vec<JoinHandle<()>>>>,
    running: Arc<AtomicBool>,
    started_at: chrono::DateTime<chrono::Utc>,
}

impl MetricsEngine {
    pub fn new(config: EngineConfig, store: DynStore) -> Result<Self> {
        config.validate()?;

        let (events, _) = broadcast::channel(config.event_capacity);
        info!(
            "Creating metrics engine (retention {:?}, {} windows, {} points/series, store {})",
            config.retention,
            config.windows.len(),
            config.max_points_per_series,
            store.describe()
        );

        Ok(Self {
            registry: Arc::new(MetricRegistry::new(config.max_points_per_series)),
            kpis: Arc::new(KpiTracker::new(config.kpi_table())),
            alerts: Arc::new(AlertManager::new()),
            config: Arc::new(config),
            store,
            events,
            stats: Arc::new(EngineStats::new()),
            mirror_tasks: TaskTracker::new(),
            pending_writes: Arc::new(PendingWrites::default()),
            shutdown: CancellationToken::new(),
            workers: Arc::new(Mutex::new(Vec::new())),
            running: Arc::new(AtomicBool::new(false)),
            started_at: chrono::Utc::now(),
        })
    }

    /// Registers the definitions and alert rules listed in the config.
    pub async fn register_configured(&self) -> Result<()> {
        for definition in &self.config.metrics {
            self.register(definition.clone()).await?;
        }
        for rule in &self.config.alerts {
            self.add_alert(&rule.metric, rule.condition, rule.threshold, rule.severity)
                .await?;
        }
        Ok(())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> DynStore {
        self.store.clone()
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    pub fn kpi_defaults(&self) -> Vec<KpiTarget> {
        self.kpis.defaults()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MetricEvent> {
        self.events.subscribe()
    }

    // ----------------------------------------------------------------------
    // Registry
    // ----------------------------------------------------------------------

    pub async fn register(&self, definition: MetricDefinition) -> Result<Registration> {
        let outcome = self.registry.register(definition.clone()).await?;
        if outcome == Registration::Created && definition.is_kpi_eligible() {
            self.kpis.seed(&definition).await;
        }
        Ok(outcome)
    }

    pub async fn lookup(&self, name: &str) -> Result<Arc<MetricDefinition>> {
        self.registry.lookup(name).await
    }

    pub async fn list_definitions(&self) -> Vec<MetricDefinition> {
        self.registry
            .list_definitions()
            .await
            .into_iter()
            .map(|definition| (*definition).clone())
            .collect()
    }

    // ----------------------------------------------------------------------
    // Recording
    // ----------------------------------------------------------------------

    /// Appends an observation, then evaluates alerts and KPIs for it.
    pub async fn record(
        &self,
        name: &str,
        value: f64,
        labels: Labels,
        timestamp: Option<i64>,
    ) -> Result<()> {
        let (definition, series) = self.registry.entry(name).await?;
        self.record_point(definition, series, value, labels, timestamp)
            .await
    }

    pub async fn increment(&self, name: &str, labels: Labels) -> Result<()> {
        self.increment_by(name, 1.0, labels).await
    }

    /// Counters store each delta; totals are summed at query time.
    pub async fn increment_by(&self, name: &str, delta: f64, labels: Labels) -> Result<()> {
        if delta < 0.0 {
            return Err(VitalsError::InvalidValue {
                name: name.to_string(),
                reason: format!("counter increment {} is negative", delta),
            });
        }
        self.record_kind(name, MetricKind::Counter, delta, labels).await
    }

    pub async fn gauge(&self, name: &str, value: f64, labels: Labels) -> Result<()> {
        self.record_kind(name, MetricKind::Gauge, value, labels).await
    }

    pub async fn histogram(&self, name: &str, value: f64, labels: Labels) -> Result<()> {
        self.record_kind(name, MetricKind::Histogram, value, labels).await
    }

    pub async fn summary(&self, name: &str, value: f64, labels: Labels) -> Result<()> {
        self.record_kind(name, MetricKind::Summary, value, labels).await
    }

    async fn record_kind(
        &self,
        name: &str,
        expected: MetricKind,
        value: f64,
        labels: Labels,
    ) -> Result<()> {
        let (definition, series) = self.registry.entry(name).await?;
        if definition.kind != expected {
            return Err(VitalsError::KindMismatch {
                name: name.to_string(),
                expected: expected.to_string(),
                actual: definition.kind.to_string(),
            });
        }
        self.record_point(definition, series, value, labels, None)
            .await
    }

    async fn record_point(
        &self,
        definition: Arc<MetricDefinition>,
        series: SeriesHandle,
        value: f64,
        labels: Labels,
        timestamp: Option<i64>,
    ) -> Result<()> {
        if !value.is_finite() {
            return Err(VitalsError::InvalidValue {
                name: definition.name.clone(),
                reason: format!("{} is not a finite number", value),
            });
        }

        let labels = Self::declared_labels(&definition, labels);
        let requested = timestamp.unwrap_or_else(now_millis);

        let point = {
            let mut series = series.lock().await;
            let timestamp = series
                .last_timestamp()
                .map_or(requested, |last| requested.max(last));
            let point = MetricPoint::with_labels(timestamp, value, labels);
            if series.push(point.clone()).is_some() {
                self.stats.points_evicted(1);
            }
            point
        };

        self.stats.point_recorded(&definition.name);
        self.mirror(&definition.name, &point);

        for transition in self
            .alerts
            .evaluate(&definition.name, value, point.timestamp)
            .await
        {
            match transition {
                AlertTransition::Triggered(alert) => {
                    self.stats.alert_triggered();
                    self.publish(MetricEvent::AlertTriggered { alert });
                }
                AlertTransition::Resolved(alert) => {
                    self.publish(MetricEvent::AlertResolved { alert });
                }
            }
        }

        if definition.is_kpi_eligible() {
            let update = self.kpis.update(&definition, value, point.timestamp).await;
            if let Some(breach) = update.breach {
                let alert = self
                    .alerts
                    .record_kpi_breach(
                        breach.metric,
                        breach.condition,
                        breach.threshold,
                        breach.severity,
                        breach.value,
                        point.timestamp,
                    )
                    .await;
                self.stats.alert_triggered();
                self.publish(MetricEvent::AlertTriggered { alert });
            }
            self.publish(MetricEvent::KpiUpdated { kpi: update.kpi });
        }

        self.publish(MetricEvent::PointRecorded {
            metric: definition.name.clone(),
            point,
        });

        Ok(())
    }

    fn declared_labels(definition: &MetricDefinition, labels: Labels) -> Labels {
        labels
            .into_iter()
            .filter(|(key, _)| {
                let declared = definition.allows_label(key);
                if !declared {
                    debug!("Dropping undeclared label '{}' on '{}'", key, definition.name);
                }
                declared
            })
            .collect()
    }

    fn publish(&self, event: MetricEvent) {
        // No receivers is the only send error; delivery is best-effort.
        let _ = self.events.send(event);
    }

    fn mirror(&self, metric: &str, point: &MetricPoint) {
        let row = match serde_json::to_value(point) {
            Ok(row) => row,
            Err(e) => {
                warn!("Failed to encode point for '{}': {}", metric, e);
                self.stats.store_error("encode");
                return;
            }
        };

        let store = self.store.clone();
        let stats = self.stats.clone();
        let key = raw_key(metric);
        let timestamp = point.timestamp;
        let ttl = self.config.retention_seconds();
        let pending = self.pending_writes.begin();

        self.mirror_tasks.spawn(async move {
            let _pending = pending;
            if let Err(e) = store.append(&key, timestamp, row).await {
                warn!("Mirror write to '{}' failed: {}", key, e);
                stats.store_error("append");
                return;
            }
            if let Err(e) = store.expire(&key, ttl).await {
                warn!("Setting TTL on '{}' failed: {}", key, e);
                stats.store_error("expire");
            }
        });
    }

    /// Waits until no mirror write is in flight. Safe to call alongside
    /// `close()`.
    pub async fn flush(&self) {
        self.pending_writes.wait_idle().await;
    }

    // ----------------------------------------------------------------------
    // Queries
    // ----------------------------------------------------------------------

    /// Copy of the buffered points, oldest first.
    pub async fn get_series(&self, name: &str) -> Result<Vec<MetricPoint>> {
        let series = self.registry.series(name).await?;
        let points = series.lock().await.snapshot();
        Ok(points)
    }

    pub async fn latest_point(&self, name: &str) -> Result<Option<MetricPoint>> {
        let series = self.registry.series(name).await?;
        let latest = series.lock().await.latest().cloned();
        Ok(latest)
    }

    /// Nearest-rank percentiles, as `(quantile, value)` pairs in request
    /// order. An empty selection yields 0 for every quantile.
    pub async fn calculate_percentiles(
        &self,
        name: &str,
        quantiles: &[f64],
        range: Option<TimeRange>,
    ) -> Result<Vec<(f64, f64)>> {
        let series = self.registry.series(name).await?;
        let mut values: Vec<f64> = {
            let series = series.lock().await;
            series
                .iter()
                .filter(|p| range.map_or(true, |r| r.contains(p.timestamp)))
                .map(|p| p.value)
                .collect()
        };
        values.sort_by(|a, b| a.total_cmp(b));

        Ok(quantiles
            .iter()
            .map(|q| (*q, MetricsAggregator::percentile(&values, q.clamp(0.0, 1.0))))
            .collect())
    }

    pub async fn calculate_rate(&self, name: &str, window: Duration) -> Result<f64> {
        self.calculate_rate_at(name, window, now_millis()).await
    }

    pub async fn calculate_rate_at(&self, name: &str, window: Duration, now: i64) -> Result<f64> {
        let series = self.registry.series(name).await?;
        let from = now.saturating_sub(duration_millis(window));
        let points = series.lock().await.since(from);
        Ok(MetricsAggregator::rate(&points))
    }

    /// Z-score outliers among the latest `window_size` points. A buffer
    /// shorter than the window is an insufficient sample.
    pub async fn detect_anomalies(
        &self,
        name: &str,
        z_threshold: f64,
        window_size: usize,
    ) -> Result<Vec<MetricPoint>> {
        let series = self.registry.series(name).await?;
        let sample = {
            let series = series.lock().await;
            if window_size == 0 || series.len() < window_size {
                return Ok(Vec::new());
            }
            series.tail(window_size)
        };
        Ok(AnomalyDetector::detect(&sample, z_threshold))
    }

    pub async fn bucket_counts(&self, name: &str) -> Result<BucketCounts> {
        let (definition, series) = self.registry.entry(name).await?;
        if definition.kind != MetricKind::Histogram {
            return Err(VitalsError::KindMismatch {
                name: name.to_string(),
                expected: MetricKind::Histogram.to_string(),
                actual: definition.kind.to_string(),
            });
        }
        let series = series.lock().await;
        Ok(BucketCounts::compute(
            &definition.histogram_buckets,
            series.iter().map(|p| p.value),
        ))
    }

    // ----------------------------------------------------------------------
    // Alerts and KPIs
    // ----------------------------------------------------------------------

    pub async fn add_alert(
        &self,
        metric: &str,
        condition: AlertCondition,
        threshold: f64,
        severity: AlertSeverity,
    ) -> Result<String> {
        if !self.registry.contains(metric).await {
            return Err(VitalsError::NotRegistered(metric.to_string()));
        }
        if !threshold.is_finite() {
            return Err(VitalsError::InvalidValue {
                name: metric.to_string(),
                reason: "alert threshold must be finite".to_string(),
            });
        }
        Ok(self
            .alerts
            .add_alert(metric, condition, threshold, severity)
            .await)
    }

    pub async fn acknowledge_alert(&self, id: &str) -> Result<MetricAlert> {
        let alert = self.alerts.acknowledge(id, now_millis()).await?;
        self.publish(MetricEvent::AlertAcknowledged {
            alert: alert.clone(),
        });
        Ok(alert)
    }

    pub async fn get_alert(&self, id: &str) -> Option<MetricAlert> {
        self.alerts.get(id).await
    }

    pub async fn list_alerts(&self) -> Vec<MetricAlert> {
        self.alerts.list().await
    }

    pub async fn active_alerts(&self) -> Vec<MetricAlert> {
        self.alerts.active().await
    }

    pub async fn kpi(&self, metric: &str) -> Option<TrackedKpi> {
        self.kpis.get(metric).await
    }

    pub async fn kpis(&self) -> Vec<TrackedKpi> {
        self.kpis.list().await
    }

    // ----------------------------------------------------------------------
    // Rollups and retention
    // ----------------------------------------------------------------------

    pub async fn run_rollup(&self) -> RollupReport {
        self.run_rollup_at(now_millis()).await
    }

    /// Rolls up every metric over every configured window ending at `now`.
    /// A failed write only loses that metric/window pair.
    pub async fn run_rollup_at(&self, now: i64) -> RollupReport {
        let mut report = RollupReport {
            timestamp: now,
            ..Default::default()
        };

        for (definition, series) in self.registry.entries().await {
            let snapshot = series.lock().await.snapshot();
            report.metrics_scanned += 1;

            for window in &self.config.windows {
                let from = now.saturating_sub(window.as_millis());
                let start = snapshot.partition_point(|p| p.timestamp < from);
                let in_window = &snapshot[start..];

                let Some(stats) = MetricsAggregator::aggregate(in_window) else {
                    report.windows_skipped += 1;
                    continue;
                };

                let labels = MetricsAggregator::common_labels(in_window);
                let rows = MetricsAggregator::rows(
                    &definition.name,
                    window.label(),
                    &stats,
                    &labels,
                    now,
                );

                match self.persist_rollup(&rows).await {
                    Ok(written) => report.rows_written += written,
                    Err(e) => {
                        warn!(
                            "Rollup of '{}' over {} failed: {}",
                            definition.name, window, e
                        );
                        self.stats.store_error("rollup");
                        report.failures.push(RollupFailure {
                            metric: definition.name.clone(),
                            window: window.label().to_string(),
                            error: e.to_string(),
                        });
                    }
                }
            }
        }

        self.stats
            .rollup_finished(report.rows_written as u64, report.failures.len() as u64);
        debug!(
            "Rollup scanned {} metrics, wrote {} rows, {} failures",
            report.metrics_scanned,
            report.rows_written,
            report.failures.len()
        );
        report
    }

    async fn persist_rollup(&self, rows: &[crate::aggregator::AggregatedMetric]) -> Result<usize> {
        let ttl = self.config.retention_seconds();
        for row in rows {
            let key = rollup_key(&row.metric_name, &row.window, row.kind.as_str());
            let value = serde_json::to_value(row)?;
            self.store.append(&key, row.timestamp, value).await?;
            self.store.expire(&key, ttl).await?;
        }
        Ok(rows.len())
    }

    /// Store keys owned by one metric: the raw series and every rollup bucket.
    fn store_keys(&self, metric: &str) -> Vec<String> {
        let mut keys = vec![raw_key(metric)];
        for window in &self.config.windows {
            for kind in RollupKind::ALL {
                keys.push(rollup_key(metric, window.label(), kind.as_str()));
            }
        }
        keys
    }

    pub async fn run_cleanup(&self) -> CleanupReport {
        self.run_cleanup_at(now_millis()).await
    }

    /// Drops everything strictly older than `now - retention`, in memory and
    /// in the store.
    pub async fn run_cleanup_at(&self, now: i64) -> CleanupReport {
        let cutoff = now.saturating_sub(self.config.retention_millis());
        let mut report = CleanupReport {
            cutoff,
            ..Default::default()
        };

        for (definition, series) in self.registry.entries().await {
            let evicted = series.lock().await.evict_before(cutoff);
            report.points_evicted += evicted;
            self.stats.points_evicted(evicted as u64);

            for key in self.store_keys(&definition.name) {
                match self.store.delete_range(&key, i64::MIN, cutoff.saturating_sub(1)).await {
                    Ok(deleted) => report.rows_deleted += deleted,
                    Err(e) => {
                        warn!("Cleanup of '{}' failed: {}", key, e);
                        self.stats.store_error("delete_range");
                        report.store_failures += 1;
                    }
                }
            }
        }

        self.stats.cleanup_finished();
        info!(
            "Cleanup evicted {} points and deleted {} stored rows older than {}",
            report.points_evicted, report.rows_deleted, cutoff
        );
        report
    }

    // ----------------------------------------------------------------------
    // Read projections
    // ----------------------------------------------------------------------

    pub async fn system_status(&self) -> SystemStatus {
        let entries = self.registry.entries().await;
        let mut buffered = 0;
        for (_, series) in &entries {
            buffered += series.lock().await.len();
        }
        self.build_status(entries.len(), buffered, self.alerts.active_count().await)
    }

    fn build_status(&self, registered: usize, buffered: usize, active_alerts: usize) -> SystemStatus {
        let mut status = SystemStatus {
            store: self.store.describe(),
            uptime_seconds: (chrono::Utc::now() - self.started_at).num_seconds().max(0) as u64,
            workers_running: self.running.load(Ordering::Relaxed),
            metrics_registered: registered,
            points_buffered: buffered,
            active_alerts,
            subscribers: self.events.receiver_count(),
            ..Default::default()
        };
        self.stats.fill(&mut status);
        status.status = if self.shutdown.is_cancelled() {
            "stopped"
        } else if status.is_degraded() {
            "degraded"
        } else {
            "healthy"
        }
        .to_string();
        status
    }

    pub async fn dashboard_snapshot(&self) -> DashboardSnapshot {
        let mut definitions = Vec::new();
        let mut time_series = BTreeMap::new();
        let mut buffered = 0;

        for (definition, series) in self.registry.entries().await {
            let points = series.lock().await.snapshot();
            buffered += points.len();
            time_series.insert(definition.name.clone(), points);
            definitions.push((*definition).clone());
        }

        let kpis = self.kpis.list().await;
        let active_alerts = self.alerts.active().await;
        let system_status = self.build_status(definitions.len(), buffered, active_alerts.len());

        DashboardSnapshot {
            generated_at: chrono::Utc::now(),
            definitions,
            time_series,
            kpis,
            active_alerts,
            system_status,
        }
    }

    // ----------------------------------------------------------------------
    // Lifecycle
    // ----------------------------------------------------------------------

    /// Spawns the aggregation and cleanup workers. Calling it again is a no-op.
    pub async fn start(&self) {
        let mut workers = self.workers.lock().await;
        if !workers.is_empty() || self.shutdown.is_cancelled() {
            return;
        }

        workers.push(workers::spawn_aggregation_worker(
            self.clone(),
            self.config.aggregation_interval,
            self.shutdown.clone(),
        ));
        workers.push(workers::spawn_cleanup_worker(
            self.clone(),
            self.config.cleanup_interval,
            self.shutdown.clone(),
        ));
        self.running.store(true, Ordering::Relaxed);

        info!(
            "Started background workers (aggregation every {:?}, cleanup every {:?})",
            self.config.aggregation_interval, self.config.cleanup_interval
        );
    }

    /// Stops the workers after their current tick and drains mirror writes.
    pub async fn close(&self) -> Result<()> {
        info!("Shutting down metrics engine");
        self.shutdown.cancel();

        let handles: Vec<JoinHandle<()>> = self.workers.lock().await.drain(..).collect();
        let mut failed = 0;
        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                warn!("Worker did not stop cleanly: {}", e);
                failed += 1;
            }
        }
        self.running.store(false, Ordering::Relaxed);

        self.mirror_tasks.close();
        self.mirror_tasks.wait().await;

        if failed > 0 {
            return Err(VitalsError::Other(anyhow::anyhow!(
                "{} background worker(s) failed during shutdown",
                failed
            )));
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}
