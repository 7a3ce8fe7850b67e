use vitals_core::MetricPoint;

pub const DEFAULT_Z_THRESHOLD: f64 = 2.0;
pub const DEFAULT_WINDOW_SIZE: usize = 100;

/// Z-score outlier detection over a fixed sample. Stateless.
pub struct AnomalyDetector;

impl AnomalyDetector {
    /// Flags points whose population z-score exceeds `z_threshold`.
    /// A zero-variance sample has no anomalies.
    pub fn detect(sample: &[MetricPoint], z_threshold: f64) -> Vec<MetricPoint> {
        if sample.is_empty() {
            return Vec::new();
        }

        let n = sample.len() as f64;
        let mean = sample.iter().map(|p| p.value).sum::<f64>() / n;
        let variance = sample
            .iter()
            .map(|p| (p.value - mean).powi(2))
            .sum::<f64>()
            / n;
        let stddev = variance.sqrt();

        if stddev == 0.0 || !stddev.is_finite() {
            return Vec::new();
        }

        sample
            .iter()
            .filter(|p| ((p.value - mean) / stddev).abs() > z_threshold)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(values: &[f64]) -> Vec<MetricPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| MetricPoint::new(i as i64, *v))
            .collect()
    }

    #[test]
    fn test_constant_series_has_no_anomalies() {
        let sample = points(&[5.0; 100]);
        assert!(AnomalyDetector::detect(&sample, DEFAULT_Z_THRESHOLD).is_empty());
    }

    #[test]
    fn test_spike_is_flagged() {
        let mut values = vec![10.0; 99];
        values.push(100.0);
        let anomalies = AnomalyDetector::detect(&points(&values), DEFAULT_Z_THRESHOLD);

        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].value, 100.0);
        assert_eq!(anomalies[0].timestamp, 99);
    }

    #[test]
    fn test_threshold_controls_sensitivity() {
        // mean 3, population stddev sqrt(2)
        let sample = points(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert!(AnomalyDetector::detect(&sample, 2.0).is_empty());
        assert_eq!(AnomalyDetector::detect(&sample, 1.0).len(), 2);
    }
}
