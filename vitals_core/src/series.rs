use crate::point::MetricPoint;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const DEFAULT_MAX_POINTS: usize = 10_000;

/// Shared handle to one metric's buffer. Appends on the same metric
/// serialize on this lock; different metrics never share it.
pub type SeriesHandle = Arc<Mutex<TimeSeries>>;

/// Bounded, timestamp-ordered point buffer with FIFO eviction.
#[derive(Debug, Clone)]
pub struct TimeSeries {
    points: VecDeque<MetricPoint>,
    capacity: usize,
}

impl TimeSeries {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            points: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Appends a point, returning the evicted oldest point when full.
    /// A timestamp earlier than the current tail is raised to the tail's
    /// timestamp so the series stays non-decreasing.
    pub fn push(&mut self, mut point: MetricPoint) -> Option<MetricPoint> {
        if let Some(last) = self.points.back() {
            if point.timestamp < last.timestamp {
                point.timestamp = last.timestamp;
            }
        }

        let evicted = if self.points.len() >= self.capacity {
            self.points.pop_front()
        } else {
            None
        };
        self.points.push_back(point);
        evicted
    }

    /// Removes every point strictly older than `cutoff`.
    pub fn evict_before(&mut self, cutoff: i64) -> usize {
        let mut removed = 0;
        while self
            .points
            .front()
            .is_some_and(|point| point.timestamp < cutoff)
        {
            self.points.pop_front();
            removed += 1;
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<&MetricPoint> {
        self.points.back()
    }

    pub fn last_timestamp(&self) -> Option<i64> {
        self.points.back().map(|p| p.timestamp)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetricPoint> {
        self.points.iter()
    }

    pub fn snapshot(&self) -> Vec<MetricPoint> {
        self.points.iter().cloned().collect()
    }

    /// Points with `from <= timestamp <= to`.
    pub fn range(&self, from: i64, to: i64) -> Vec<MetricPoint> {
        self.points
            .iter()
            .filter(|p| p.timestamp >= from && p.timestamp <= to)
            .cloned()
            .collect()
    }

    pub fn since(&self, from: i64) -> Vec<MetricPoint> {
        self.points
            .iter()
            .filter(|p| p.timestamp >= from)
            .cloned()
            .collect()
    }

    /// The most recent `n` points, oldest first.
    pub fn tail(&self, n: usize) -> Vec<MetricPoint> {
        let skip = self.points.len().saturating_sub(n);
        self.points.iter().skip(skip).cloned().collect()
    }
}

impl Default for TimeSeries {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_POINTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_fifo_eviction() {
        let mut series = TimeSeries::new(3);
        for ts in 0..5 {
            series.push(MetricPoint::new(ts, ts as f64));
        }

        assert_eq!(series.len(), 3);
        let values: Vec<f64> = series.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_out_of_order_timestamp_is_clamped() {
        let mut series = TimeSeries::new(10);
        series.push(MetricPoint::new(100, 1.0));
        series.push(MetricPoint::new(50, 2.0));

        assert_eq!(series.last_timestamp(), Some(100));
    }

    #[test]
    fn test_evict_before_is_strict() {
        let mut series = TimeSeries::new(10);
        for ts in [10, 20, 30, 40] {
            series.push(MetricPoint::new(ts, 0.0));
        }

        assert_eq!(series.evict_before(30), 2);
        assert_eq!(series.iter().next().map(|p| p.timestamp), Some(30));
        assert_eq!(series.evict_before(0), 0);
    }

    #[test]
    fn test_tail_and_range() {
        let mut series = TimeSeries::new(10);
        for ts in 0..6 {
            series.push(MetricPoint::new(ts, ts as f64));
        }

        let tail: Vec<i64> = series.tail(2).iter().map(|p| p.timestamp).collect();
        assert_eq!(tail, vec![4, 5]);
        assert_eq!(series.tail(100).len(), 6);
        assert_eq!(series.range(1, 3).len(), 3);
        assert_eq!(series.since(4).len(), 2);
    }

    proptest! {
        #[test]
        fn prop_buffer_keeps_most_recent(capacity in 1usize..64, extra in 0usize..200) {
            let mut series = TimeSeries::new(capacity);
            let total = capacity + extra;
            for ts in 0..total {
                series.push(MetricPoint::new(ts as i64, ts as f64));
            }

            prop_assert_eq!(series.len(), capacity);
            let kept: Vec<i64> = series.iter().map(|p| p.timestamp).collect();
            let expected: Vec<i64> = ((total - capacity)..total).map(|t| t as i64).collect();
            prop_assert_eq!(kept, expected);
        }
    }
}
