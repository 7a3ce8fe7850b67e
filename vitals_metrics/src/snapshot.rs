use crate::stats::SystemStatus;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use vitals_core::{MetricAlert, MetricDefinition, MetricPoint, TrackedKpi};

/// Read-only projection of engine state for dashboards and exporters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub generated_at: chrono::DateTime<chrono::Utc>,
    pub definitions: Vec<MetricDefinition>,
    pub time_series: BTreeMap<String, Vec<MetricPoint>>,
    pub kpis: Vec<TrackedKpi>,
    pub active_alerts: Vec<MetricAlert>,
    pub system_status: SystemStatus,
}

impl DashboardSnapshot {
    pub fn series(&self, metric: &str) -> &[MetricPoint] {
        self.time_series
            .get(metric)
            .map(|points| points.as_slice())
            .unwrap_or(&[])
    }

    pub fn latest_point(&self, metric: &str) -> Option<&MetricPoint> {
        self.series(metric).last()
    }
}
