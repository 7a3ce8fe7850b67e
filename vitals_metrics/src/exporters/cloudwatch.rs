use crate::snapshot::DashboardSnapshot;
use anyhow::Result;
use serde::Serialize;
use vitals_core::{MetricDefinition, MetricKind, MetricPoint};

pub const DEFAULT_NAMESPACE: &str = "Vitals";

/// Body of a CloudWatch `PutMetricData` call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PutMetricData {
    pub namespace: String,
    pub metric_data: Vec<MetricDatum>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct MetricDatum {
    pub metric_name: String,
    pub dimensions: Vec<Dimension>,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistic_values: Option<StatisticSet>,
    pub unit: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Dimension {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StatisticSet {
    pub sample_count: f64,
    pub sum: f64,
    pub minimum: f64,
    pub maximum: f64,
}

pub struct CloudWatchExporter;

impl CloudWatchExporter {
    /// One datum per metric with data: counters report their total, gauges
    /// their latest value, histograms and summaries a statistic set.
    pub fn build(snapshot: &DashboardSnapshot, namespace: &str) -> PutMetricData {
        let metric_data = snapshot
            .definitions
            .iter()
            .filter_map(|definition| Self::datum(definition, snapshot.series(&definition.name)))
            .collect();

        PutMetricData {
            namespace: namespace.to_string(),
            metric_data,
        }
    }

    pub fn to_string(snapshot: &DashboardSnapshot, namespace: &str) -> Result<String> {
        Ok(serde_json::to_string_pretty(&Self::build(snapshot, namespace))?)
    }

    fn datum(definition: &MetricDefinition, points: &[MetricPoint]) -> Option<MetricDatum> {
        let latest = points.last()?;
        let dimensions = latest
            .labels
            .iter()
            .map(|(name, value)| Dimension {
                name: name.clone(),
                value: value.to_string(),
            })
            .collect();
        let timestamp = chrono::DateTime::from_timestamp_millis(latest.timestamp)
            .map(|t| t.to_rfc3339())
            .unwrap_or_default();

        let (value, statistic_values) = match definition.kind {
            MetricKind::Counter => (Some(points.iter().map(|p| p.value).sum()), None),
            MetricKind::Gauge => (Some(latest.value), None),
            MetricKind::Histogram | MetricKind::Summary => {
                let values = points.iter().map(|p| p.value);
                let stats = StatisticSet {
                    sample_count: points.len() as f64,
                    sum: values.clone().sum(),
                    minimum: values.clone().fold(f64::INFINITY, f64::min),
                    maximum: values.fold(f64::NEG_INFINITY, f64::max),
                };
                (None, Some(stats))
            }
        };

        Some(MetricDatum {
            metric_name: definition.name.clone(),
            dimensions,
            timestamp,
            value,
            statistic_values,
            unit: Self::unit(definition).to_string(),
        })
    }

    fn unit(definition: &MetricDefinition) -> &'static str {
        match definition.unit.to_ascii_lowercase().as_str() {
            "s" | "sec" | "seconds" => "Seconds",
            "ms" | "milliseconds" => "Milliseconds",
            "us" | "microseconds" => "Microseconds",
            "bytes" => "Bytes",
            "kb" | "kilobytes" => "Kilobytes",
            "mb" | "megabytes" => "Megabytes",
            "percent" | "%" => "Percent",
            "count" => "Count",
            "" if definition.kind == MetricKind::Counter => "Count",
            _ => "None",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::SystemStatus;
    use std::collections::BTreeMap;
    use vitals_core::Labels;

    fn snapshot() -> DashboardSnapshot {
        let mut labels = Labels::new();
        labels.insert("clinic".into(), "north".into());

        let definitions = vec![
            MetricDefinition::counter("visits").label("clinic").build(),
            MetricDefinition::gauge("system_uptime_percent").unit("percent").build(),
            MetricDefinition::histogram("wait_ms").unit("ms").buckets([10.0]).build(),
            MetricDefinition::gauge("idle").build(),
        ];
        let mut time_series = BTreeMap::new();
        time_series.insert(
            "visits".to_string(),
            vec![
                MetricPoint::with_labels(1_700_000_000_000, 2.0, labels.clone()),
                MetricPoint::with_labels(1_700_000_001_000, 3.0, labels),
            ],
        );
        time_series.insert(
            "system_uptime_percent".to_string(),
            vec![MetricPoint::new(1_700_000_000_000, 99.9)],
        );
        time_series.insert(
            "wait_ms".to_string(),
            vec![MetricPoint::new(1, 4.0), MetricPoint::new(2, 16.0)],
        );

        DashboardSnapshot {
            generated_at: chrono::Utc::now(),
            definitions,
            time_series,
            kpis: Vec::new(),
            active_alerts: Vec::new(),
            system_status: SystemStatus::default(),
        }
    }

    #[test]
    fn test_builds_metric_data() {
        let body = CloudWatchExporter::build(&snapshot(), DEFAULT_NAMESPACE);
        assert_eq!(body.namespace, "Vitals");
        // idle has no points
        assert_eq!(body.metric_data.len(), 3);

        let visits = &body.metric_data[0];
        assert_eq!(visits.value, Some(5.0));
        assert_eq!(visits.unit, "Count");
        assert_eq!(visits.dimensions[0].name, "clinic");
        assert_eq!(visits.dimensions[0].value, "north");
        assert!(visits.timestamp.starts_with("2023-11-14T22:13:21"));

        assert_eq!(body.metric_data[1].unit, "Percent");

        let wait = body.metric_data[2].statistic_values.as_ref().unwrap();
        assert_eq!(wait.sample_count, 2.0);
        assert_eq!((wait.minimum, wait.maximum, wait.sum), (4.0, 16.0, 20.0));
        assert_eq!(body.metric_data[2].unit, "Milliseconds");
    }

    #[test]
    fn test_json_uses_pascal_case() {
        let json = CloudWatchExporter::to_string(&snapshot(), "Clinic/Prod").unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["Namespace"], "Clinic/Prod");
        assert_eq!(value["MetricData"][0]["MetricName"], "visits");
        assert!(value["MetricData"][0].get("StatisticValues").is_none());
        assert_eq!(value["MetricData"][2]["StatisticValues"]["SampleCount"], 2.0);
    }
}
