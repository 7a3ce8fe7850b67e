use crate::aggregator::MetricsAggregator;
use crate::engine::BucketCounts;
use crate::snapshot::DashboardSnapshot;
use std::collections::BTreeMap;
use std::fmt::Write;
use vitals_core::{Labels, MetricDefinition, MetricKind, MetricPoint};

/// Quantiles exported for summaries that declare no objectives.
const DEFAULT_QUANTILES: [f64; 3] = [0.5, 0.9, 0.99];

/// Prometheus text exposition (format 0.0.4) over a snapshot.
pub struct PrometheusExporter;

impl PrometheusExporter {
    pub fn format(snapshot: &DashboardSnapshot) -> String {
        let mut out = String::new();
        for definition in &snapshot.definitions {
            Self::write_family(&mut out, definition, snapshot.series(&definition.name));
        }
        out
    }

    fn write_family(out: &mut String, definition: &MetricDefinition, points: &[MetricPoint]) {
        let name = sanitize_name(&definition.name);
        let help = if definition.help.is_empty() {
            definition.name.as_str()
        } else {
            definition.help.as_str()
        };

        let _ = writeln!(out, "# HELP {} {}", name, escape_help(help));
        let _ = writeln!(out, "# TYPE {} {}", name, definition.kind);

        match definition.kind {
            MetricKind::Counter => {
                for (labels, values) in group_by_labels(points) {
                    let total: f64 = values.iter().sum();
                    let _ = writeln!(out, "{}{} {}", name, render_labels(&labels, None), total);
                }
            }
            MetricKind::Gauge => {
                for (labels, values) in group_by_labels(points) {
                    if let Some(latest) = values.last() {
                        let _ = writeln!(out, "{}{} {}", name, render_labels(&labels, None), latest);
                    }
                }
            }
            MetricKind::Histogram => {
                for (labels, values) in group_by_labels(points) {
                    let counts =
                        BucketCounts::compute(&definition.histogram_buckets, values.iter().copied());
                    for (bound, count) in &counts.buckets {
                        let le = if bound.is_infinite() {
                            "+Inf".to_string()
                        } else {
                            bound.to_string()
                        };
                        let _ = writeln!(
                            out,
                            "{}_bucket{} {}",
                            name,
                            render_labels(&labels, Some(("le", &le))),
                            count
                        );
                    }
                    let rendered = render_labels(&labels, None);
                    let _ = writeln!(out, "{}_sum{} {}", name, rendered, counts.sum);
                    let _ = writeln!(out, "{}_count{} {}", name, rendered, counts.count);
                }
            }
            MetricKind::Summary => {
                let quantiles: Vec<f64> = if definition.summary_objectives.is_empty() {
                    DEFAULT_QUANTILES.to_vec()
                } else {
                    definition
                        .summary_objectives
                        .iter()
                        .map(|o| o.quantile)
                        .collect()
                };

                for (labels, mut values) in group_by_labels(points) {
                    values.sort_by(|a, b| a.total_cmp(b));
                    for q in &quantiles {
                        let value = MetricsAggregator::percentile(&values, *q);
                        let _ = writeln!(
                            out,
                            "{}{} {}",
                            name,
                            render_labels(&labels, Some(("quantile", &q.to_string()))),
                            value
                        );
                    }
                    let rendered = render_labels(&labels, None);
                    let _ = writeln!(out, "{}_sum{} {}", name, rendered, values.iter().sum::<f64>());
                    let _ = writeln!(out, "{}_count{} {}", name, rendered, values.len());
                }
            }
        }
        out.push('\n');
    }
}

fn group_by_labels(points: &[MetricPoint]) -> Vec<(Labels, Vec<f64>)> {
    let mut groups: BTreeMap<String, (Labels, Vec<f64>)> = BTreeMap::new();
    for point in points {
        let key = render_labels(&point.labels, None);
        groups
            .entry(key)
            .or_insert_with(|| (point.labels.clone(), Vec::new()))
            .1
            .push(point.value);
    }
    groups.into_values().collect()
}

fn render_labels(labels: &Labels, extra: Option<(&str, &str)>) -> String {
    let mut pairs: Vec<String> = labels
        .iter()
        .map(|(key, value)| {
            format!(
                "{}=\"{}\"",
                sanitize_name(key),
                escape_label_value(&value.to_string())
            )
        })
        .collect();
    if let Some((key, value)) = extra {
        pairs.push(format!("{}=\"{}\"", key, escape_label_value(value)));
    }

    if pairs.is_empty() {
        String::new()
    } else {
        format!("{{{}}}", pairs.join(","))
    }
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .enumerate()
        .map(|(i, c)| match c {
            'a'..='z' | 'A'..='Z' | '_' | ':' => c,
            '0'..='9' if i > 0 => c,
            _ => '_',
        })
        .collect()
}

fn escape_label_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

fn escape_help(help: &str) -> String {
    help.replace('\\', "\\\\").replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::SystemStatus;

    fn snapshot(series: Vec<(MetricDefinition, Vec<MetricPoint>)>) -> DashboardSnapshot {
        let mut time_series = BTreeMap::new();
        let mut definitions = Vec::new();
        for (definition, points) in series {
            time_series.insert(definition.name.clone(), points);
            definitions.push(definition);
        }
        DashboardSnapshot {
            generated_at: chrono::Utc::now(),
            definitions,
            time_series,
            kpis: Vec::new(),
            active_alerts: Vec::new(),
            system_status: SystemStatus::default(),
        }
    }

    fn labelled(ts: i64, value: f64, clinic: &str) -> MetricPoint {
        let mut labels = Labels::new();
        labels.insert("clinic".into(), clinic.into());
        MetricPoint::with_labels(ts, value, labels)
    }

    #[test]
    fn test_counter_totals_per_label_set() {
        let text = PrometheusExporter::format(&snapshot(vec![(
            MetricDefinition::counter("visits_total")
                .help("Patient visits")
                .label("clinic")
                .build(),
            vec![
                labelled(1, 1.0, "north"),
                labelled(2, 2.0, "south"),
                labelled(3, 4.0, "north"),
            ],
        )]));

        assert!(text.contains("# HELP visits_total Patient visits"));
        assert!(text.contains("# TYPE visits_total counter"));
        assert!(text.contains("visits_total{clinic=\"north\"} 5"));
        assert!(text.contains("visits_total{clinic=\"south\"} 2"));
    }

    #[test]
    fn test_gauge_exports_latest_point() {
        let text = PrometheusExporter::format(&snapshot(vec![(
            MetricDefinition::gauge("queue_depth").build(),
            vec![MetricPoint::new(1, 5.0), MetricPoint::new(2, 12.0)],
        )]));

        assert!(text.contains("# HELP queue_depth queue_depth"));
        assert!(text.contains("queue_depth 12\n"));
        assert!(!text.contains("queue_depth 5\n"));
    }

    #[test]
    fn test_gauge_exports_latest_per_label_set() {
        let text = PrometheusExporter::format(&snapshot(vec![(
            MetricDefinition::gauge("beds_free").label("clinic").build(),
            vec![
                labelled(1, 4.0, "north"),
                labelled(2, 7.0, "south"),
                labelled(3, 3.0, "north"),
            ],
        )]));

        assert!(text.contains("beds_free{clinic=\"north\"} 3\n"));
        assert!(text.contains("beds_free{clinic=\"south\"} 7\n"));
        assert!(!text.contains("beds_free{clinic=\"north\"} 4"));
    }

    #[test]
    fn test_histogram_buckets() {
        let text = PrometheusExporter::format(&snapshot(vec![(
            MetricDefinition::histogram("wait_seconds")
                .buckets([1.0, 5.0])
                .build(),
            vec![
                MetricPoint::new(1, 0.5),
                MetricPoint::new(2, 3.0),
                MetricPoint::new(3, 9.0),
            ],
        )]));

        assert!(text.contains("wait_seconds_bucket{le=\"1\"} 1"));
        assert!(text.contains("wait_seconds_bucket{le=\"5\"} 2"));
        assert!(text.contains("wait_seconds_bucket{le=\"+Inf\"} 3"));
        assert!(text.contains("wait_seconds_sum 12.5"));
        assert!(text.contains("wait_seconds_count 3"));
    }

    #[test]
    fn test_summary_quantiles_from_objectives() {
        let points = (1..=100).map(|v| MetricPoint::new(v, v as f64)).collect();
        let text = PrometheusExporter::format(&snapshot(vec![(
            MetricDefinition::summary("latency_ms")
                .objective(0.5, 0.05)
                .objective(0.99, 0.001)
                .build(),
            points,
        )]));

        assert!(text.contains("latency_ms{quantile=\"0.5\"} 51"));
        assert!(text.contains("latency_ms{quantile=\"0.99\"} 100"));
        assert!(text.contains("latency_ms_count 100"));
        assert!(!text.contains("quantile=\"0.9\""));
    }

    #[test]
    fn test_escaping() {
        assert_eq!(escape_label_value("a\"b\\c\nd"), "a\\\"b\\\\c\\nd");
        assert_eq!(sanitize_name("http.requests-total"), "http_requests_total");
        assert_eq!(sanitize_name("9lives"), "_lives");
    }
}
