use crate::{alert::MetricAlert, kpi::TrackedKpi, point::MetricPoint};
use serde::{Deserialize, Serialize};

/// Notification published to live subscribers. Delivery is best-effort.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MetricEvent {
    PointRecorded { metric: String, point: MetricPoint },
    AlertTriggered { alert: MetricAlert },
    AlertResolved { alert: MetricAlert },
    AlertAcknowledged { alert: MetricAlert },
    KpiUpdated { kpi: TrackedKpi },
}

impl MetricEvent {
    pub fn metric(&self) -> &str {
        match self {
            MetricEvent::PointRecorded { metric, .. } => metric,
            MetricEvent::AlertTriggered { alert }
            | MetricEvent::AlertResolved { alert }
            | MetricEvent::AlertAcknowledged { alert } => &alert.metric,
            MetricEvent::KpiUpdated { kpi } => &kpi.metric,
        }
    }
}
