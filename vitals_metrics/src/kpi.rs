use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use vitals_core::{
    AlertCondition, AlertSeverity, KpiStatus, KpiTarget, MetricDefinition, Polarity, TrackedKpi,
    Trend,
};

/// Threshold crossing produced by a KPI update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiBreach {
    pub metric: String,
    pub severity: AlertSeverity,
    pub condition: AlertCondition,
    pub threshold: f64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KpiUpdate {
    pub kpi: TrackedKpi,
    pub breach: Option<KpiBreach>,
}

/// Current-state KPIs for classified metrics. Entries are created on the
/// first observation and never removed.
pub struct KpiTracker {
    defaults: HashMap<String, KpiTarget>,
    targets: Arc<RwLock<HashMap<String, KpiTarget>>>,
    kpis: Arc<RwLock<HashMap<String, TrackedKpi>>>,
}

impl KpiTracker {
    pub fn new(table: Vec<KpiTarget>) -> Self {
        Self {
            defaults: table.into_iter().map(|t| (t.metric.clone(), t)).collect(),
            targets: Arc::new(RwLock::new(HashMap::new())),
            kpis: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn default_for(&self, metric: &str) -> KpiTarget {
        self.defaults
            .get(metric)
            .cloned()
            .unwrap_or_else(|| KpiTarget::permissive(metric))
    }

    /// Pins target and thresholds for a newly registered KPI metric.
    pub async fn seed(&self, definition: &MetricDefinition) {
        let target = self.default_for(&definition.name);
        debug!(
            "Seeded KPI '{}' target={} warning={} critical={} ({:?})",
            definition.name, target.target, target.warning, target.critical, target.polarity
        );
        self.targets
            .write()
            .await
            .entry(definition.name.clone())
            .or_insert(target);
    }

    pub async fn target(&self, metric: &str) -> KpiTarget {
        match self.targets.read().await.get(metric) {
            Some(target) => target.clone(),
            None => self.default_for(metric),
        }
    }

    pub async fn update(&self, definition: &MetricDefinition, value: f64, now: i64) -> KpiUpdate {
        let target = self.target(&definition.name).await;
        let category = definition
            .classification
            .as_ref()
            .map(|c| c.category.clone())
            .unwrap_or_default();
        let status = target.status_for(value);

        let kpi = {
            let mut kpis = self.kpis.write().await;
            let kpi = kpis
                .entry(definition.name.clone())
                .or_insert_with(|| TrackedKpi {
                    metric: definition.name.clone(),
                    category: category.clone(),
                    value,
                    target: target.target,
                    warning: target.warning,
                    critical: target.critical,
                    polarity: target.polarity,
                    trend: Trend::Stable,
                    status,
                    last_updated: now,
                });

            kpi.trend = Trend::between(kpi.value, value);
            kpi.value = value;
            kpi.status = status;
            kpi.last_updated = now;
            kpi.clone()
        };

        let breach = match status {
            KpiStatus::Critical => Some((AlertSeverity::Critical, target.critical)),
            KpiStatus::Warning => Some((AlertSeverity::Warning, target.warning)),
            KpiStatus::Healthy => None,
        }
        .map(|(severity, threshold)| KpiBreach {
            metric: definition.name.clone(),
            severity,
            condition: match target.polarity {
                Polarity::LowerIsWorse => AlertCondition::Below,
                Polarity::HigherIsWorse => AlertCondition::Above,
            },
            threshold,
            value,
        });

        KpiUpdate { kpi, breach }
    }

    pub async fn get(&self, metric: &str) -> Option<TrackedKpi> {
        self.kpis.read().await.get(metric).cloned()
    }

    pub async fn list(&self) -> Vec<TrackedKpi> {
        let mut kpis: Vec<TrackedKpi> = self.kpis.read().await.values().cloned().collect();
        kpis.sort_by(|a, b| a.metric.cmp(&b.metric));
        kpis
    }

    pub fn defaults(&self) -> Vec<KpiTarget> {
        let mut table: Vec<KpiTarget> = self.defaults.values().cloned().collect();
        table.sort_by(|a, b| a.metric.cmp(&b.metric));
        table
    }
}

impl Default for KpiTracker {
    fn default() -> Self {
        Self::new(vitals_core::default_kpi_targets())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kpi_metric(name: &str) -> MetricDefinition {
        MetricDefinition::gauge(name).category("quality").build()
    }

    #[tokio::test]
    async fn test_trend_and_lazy_creation() {
        let tracker = KpiTracker::default();
        let def = kpi_metric("patient_satisfaction_score");
        tracker.seed(&def).await;
        assert!(tracker.get(&def.name).await.is_none());

        let first = tracker.update(&def, 92.0, 1).await;
        assert_eq!(first.kpi.trend, Trend::Stable);
        assert_eq!(first.kpi.target, 90.0);
        assert!(first.breach.is_none());

        let second = tracker.update(&def, 95.0, 2).await;
        assert_eq!(second.kpi.trend, Trend::Up);
        assert_eq!(second.kpi.last_updated, 2);

        let third = tracker.update(&def, 95.0, 3).await;
        assert_eq!(third.kpi.trend, Trend::Stable);

        let fourth = tracker.update(&def, 91.0, 4).await;
        assert_eq!(fourth.kpi.trend, Trend::Down);
        assert_eq!(tracker.list().await.len(), 1);
    }

    #[tokio::test]
    async fn test_threshold_breaches() {
        let tracker = KpiTracker::default();
        let def = kpi_metric("appointment_show_rate");
        tracker.seed(&def).await;

        let warning = tracker.update(&def, 84.0, 1).await.breach.unwrap();
        assert_eq!(warning.severity, AlertSeverity::Warning);
        assert_eq!(warning.threshold, 85.0);
        assert_eq!(warning.condition, AlertCondition::Below);

        let critical = tracker.update(&def, 70.0, 2).await.breach.unwrap();
        assert_eq!(critical.severity, AlertSeverity::Critical);
        assert_eq!(critical.threshold, 75.0);
    }

    #[tokio::test]
    async fn test_higher_is_worse_polarity() {
        let tracker = KpiTracker::default();
        let def = kpi_metric("average_wait_time_minutes");
        tracker.seed(&def).await;

        assert!(tracker.update(&def, 10.0, 1).await.breach.is_none());
        let breach = tracker.update(&def, 50.0, 2).await.breach.unwrap();
        assert_eq!(breach.severity, AlertSeverity::Critical);
        assert_eq!(breach.condition, AlertCondition::Above);
    }

    #[tokio::test]
    async fn test_unknown_metric_gets_permissive_defaults() {
        let tracker = KpiTracker::default();
        let def = kpi_metric("bespoke_quality_index");
        tracker.seed(&def).await;

        let target = tracker.target(&def.name).await;
        assert_eq!((target.target, target.warning, target.critical), (0.0, 0.0, 0.0));
        assert!(tracker.update(&def, 3.0, 1).await.breach.is_none());
    }
}
