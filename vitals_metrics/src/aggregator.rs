use serde::{Deserialize, Serialize};
use std::fmt;
use vitals_core::{Labels, MetricPoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RollupKind {
    Sum,
    Avg,
    Min,
    Max,
    Count,
    Rate,
    P50,
    P95,
    P99,
}

impl RollupKind {
    pub const ALL: [RollupKind; 9] = [
        RollupKind::Sum,
        RollupKind::Avg,
        RollupKind::Min,
        RollupKind::Max,
        RollupKind::Count,
        RollupKind::Rate,
        RollupKind::P50,
        RollupKind::P95,
        RollupKind::P99,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RollupKind::Sum => "sum",
            RollupKind::Avg => "avg",
            RollupKind::Min => "min",
            RollupKind::Max => "max",
            RollupKind::Count => "count",
            RollupKind::Rate => "rate",
            RollupKind::P50 => "p50",
            RollupKind::P95 => "p95",
            RollupKind::P99 => "p99",
        }
    }
}

impl fmt::Display for RollupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary statistics for the points of one window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowStats {
    pub sum: f64,
    pub avg: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
    pub rate: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

impl WindowStats {
    pub fn get(&self, kind: RollupKind) -> f64 {
        match kind {
            RollupKind::Sum => self.sum,
            RollupKind::Avg => self.avg,
            RollupKind::Min => self.min,
            RollupKind::Max => self.max,
            RollupKind::Count => self.count as f64,
            RollupKind::Rate => self.rate,
            RollupKind::P50 => self.p50,
            RollupKind::P95 => self.p95,
            RollupKind::P99 => self.p99,
        }
    }
}

/// One persisted rollup row. Rows are append-only; each run writes new ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedMetric {
    pub metric_name: String,
    pub kind: RollupKind,
    pub window: String,
    pub value: f64,
    pub timestamp: i64,
    #[serde(default)]
    pub labels: Labels,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollupFailure {
    pub metric: String,
    pub window: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RollupReport {
    pub timestamp: i64,
    pub metrics_scanned: usize,
    pub windows_skipped: usize,
    pub rows_written: usize,
    pub failures: Vec<RollupFailure>,
}

impl RollupReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct MetricsAggregator;

impl MetricsAggregator {
    /// Statistics over `points`, or `None` when there is nothing to roll up.
    pub fn aggregate(points: &[MetricPoint]) -> Option<WindowStats> {
        if points.is_empty() {
            return None;
        }

        let mut values: Vec<f64> = points.iter().map(|p| p.value).collect();
        // Sort values for percentile calculation
        values.sort_by(|a, b| a.total_cmp(b));

        let sum: f64 = values.iter().sum();
        let count = values.len();

        Some(WindowStats {
            sum,
            avg: sum / count as f64,
            min: values[0],
            max: values[count - 1],
            count,
            rate: Self::rate(points),
            p50: Self::percentile(&values, 0.50),
            p95: Self::percentile(&values, 0.95),
            p99: Self::percentile(&values, 0.99),
        })
    }

    /// Nearest-rank percentile over ascending `sorted` values:
    /// `index = floor(quantile * n)` clamped to `[0, n - 1]`.
    pub fn percentile(sorted: &[f64], quantile: f64) -> f64 {
        if sorted.is_empty() {
            return 0.0;
        }

        let index = ((sorted.len() as f64) * quantile.max(0.0)) as usize;
        let index = index.min(sorted.len() - 1);
        sorted[index]
    }

    /// `(latest - earliest) / elapsed_seconds` over time-ordered points.
    /// Fewer than two points, or no elapsed time, is a rate of 0.
    pub fn rate(points: &[MetricPoint]) -> f64 {
        let (Some(first), Some(last)) = (points.first(), points.last()) else {
            return 0.0;
        };
        if points.len() < 2 {
            return 0.0;
        }

        let elapsed_seconds = (last.timestamp - first.timestamp) as f64 / 1000.0;
        if elapsed_seconds <= 0.0 {
            return 0.0;
        }
        (last.value - first.value) / elapsed_seconds
    }

    /// Labels on which every point agrees.
    pub fn common_labels(points: &[MetricPoint]) -> Labels {
        let Some((first, rest)) = points.split_first() else {
            return Labels::new();
        };

        first
            .labels
            .iter()
            .filter(|(key, value)| rest.iter().all(|p| p.labels.get(*key) == Some(*value)))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    pub fn rows(
        metric: &str,
        window: &str,
        stats: &WindowStats,
        labels: &Labels,
        timestamp: i64,
    ) -> Vec<AggregatedMetric> {
        RollupKind::ALL
            .iter()
            .map(|kind| AggregatedMetric {
                metric_name: metric.to_string(),
                kind: *kind,
                window: window.to_string(),
                value: stats.get(*kind),
                timestamp,
                labels: labels.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn series(values: &[f64]) -> Vec<MetricPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| MetricPoint::new(i as i64 * 1000, *v))
            .collect()
    }

    #[test]
    fn test_aggregation() {
        let points = series(&[4.0, 1.0, 3.0, 2.0]);
        let stats = MetricsAggregator::aggregate(&points).unwrap();

        assert_eq!(stats.sum, 10.0);
        assert_eq!(stats.avg, 2.5);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 4.0);
        assert_eq!(stats.count, 4);
        // (2 - 4) / 3s
        assert!((stats.rate + 2.0 / 3.0).abs() < 1e-9);
        assert!(MetricsAggregator::aggregate(&[]).is_none());
    }

    #[test]
    fn test_nearest_rank_on_one_to_hundred() {
        let values: Vec<f64> = (1..=100).map(|v| v as f64).collect();

        assert_eq!(MetricsAggregator::percentile(&values, 0.50), 51.0);
        assert_eq!(MetricsAggregator::percentile(&values, 0.95), 96.0);
        assert_eq!(MetricsAggregator::percentile(&values, 0.99), 100.0);
        assert_eq!(MetricsAggregator::percentile(&values, 1.0), 100.0);
        assert_eq!(MetricsAggregator::percentile(&values, 0.0), 1.0);
    }

    #[test]
    fn test_single_point_percentiles() {
        let stats = MetricsAggregator::aggregate(&series(&[7.5])).unwrap();
        assert_eq!(stats.p50, 7.5);
        assert_eq!(stats.p95, 7.5);
        assert_eq!(stats.p99, 7.5);
        assert_eq!(stats.rate, 0.0);
    }

    #[test]
    fn test_rate_needs_elapsed_time() {
        let same_instant = vec![MetricPoint::new(5, 1.0), MetricPoint::new(5, 9.0)];
        assert_eq!(MetricsAggregator::rate(&same_instant), 0.0);

        let points = vec![MetricPoint::new(0, 10.0), MetricPoint::new(2000, 30.0)];
        assert_eq!(MetricsAggregator::rate(&points), 10.0);
    }

    #[test]
    fn test_common_labels() {
        let mut a = MetricPoint::new(0, 1.0);
        a.labels.insert("ward".into(), "icu".into());
        a.labels.insert("shift".into(), "day".into());
        let mut b = MetricPoint::new(1, 2.0);
        b.labels.insert("ward".into(), "icu".into());
        b.labels.insert("shift".into(), "night".into());

        let common = MetricsAggregator::common_labels(&[a, b]);
        assert_eq!(common.len(), 1);
        assert!(common.contains_key("ward"));
    }

    #[test]
    fn test_rows_cover_every_kind() {
        let stats = MetricsAggregator::aggregate(&series(&[1.0, 2.0])).unwrap();
        let rows = MetricsAggregator::rows("m", "5m", &stats, &Labels::new(), 42);

        assert_eq!(rows.len(), RollupKind::ALL.len());
        let count = rows.iter().find(|r| r.kind == RollupKind::Count).unwrap();
        assert_eq!(count.value, 2.0);
        assert!(rows.iter().all(|r| r.timestamp == 42 && r.window == "5m"));
    }

    proptest! {
        #[test]
        fn prop_percentile_is_member_at_nearest_rank(
            mut values in proptest::collection::vec(-1e6f64..1e6, 1..200),
            quantile in 0.0f64..=1.0,
        ) {
            values.sort_by(|a, b| a.total_cmp(b));
            let result = MetricsAggregator::percentile(&values, quantile);
            let index = ((values.len() as f64 * quantile) as usize).min(values.len() - 1);
            prop_assert_eq!(result, values[index]);
        }
    }
}
