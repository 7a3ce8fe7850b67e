use serde::{Deserialize, Serialize};

/// Which side of the thresholds is bad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    /// Breach when `value <= threshold` (rates, scores, compliance).
    #[default]
    LowerIsWorse,
    /// Breach when `value >= threshold` (error rates, wait times).
    HigherIsWorse,
}

impl Polarity {
    pub fn breaches(&self, value: f64, threshold: f64) -> bool {
        match self {
            Polarity::LowerIsWorse => value <= threshold,
            Polarity::HigherIsWorse => value >= threshold,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiTarget {
    pub metric: String,
    pub target: f64,
    pub warning: f64,
    pub critical: f64,
    #[serde(default)]
    pub polarity: Polarity,
}

impl KpiTarget {
    pub fn new(metric: impl Into<String>, target: f64, warning: f64, critical: f64) -> Self {
        Self {
            metric: metric.into(),
            target,
            warning,
            critical,
            polarity: Polarity::LowerIsWorse,
        }
    }

    pub fn higher_is_worse(mut self) -> Self {
        self.polarity = Polarity::HigherIsWorse;
        self
    }

    /// Fallback for metrics missing from the table: target 0, thresholds 0/0.
    pub fn permissive(metric: impl Into<String>) -> Self {
        Self::new(metric, 0.0, 0.0, 0.0)
    }

    pub fn status_for(&self, value: f64) -> KpiStatus {
        if self.polarity.breaches(value, self.critical) {
            KpiStatus::Critical
        } else if self.polarity.breaches(value, self.warning) {
            KpiStatus::Warning
        } else {
            KpiStatus::Healthy
        }
    }
}

/// Built-in target table keyed by metric name.
pub fn default_kpi_targets() -> Vec<KpiTarget> {
    vec![
        KpiTarget::new("patient_satisfaction_score", 90.0, 80.0, 70.0),
        KpiTarget::new("appointment_show_rate", 95.0, 85.0, 75.0),
        KpiTarget::new("claim_approval_rate", 98.0, 92.0, 85.0),
        KpiTarget::new("compliance_audit_score", 100.0, 95.0, 90.0),
        KpiTarget::new("hipaa_training_completion", 100.0, 90.0, 80.0),
        KpiTarget::new("system_uptime_percent", 99.9, 99.5, 99.0),
        KpiTarget::new("medication_reconciliation_rate", 98.0, 90.0, 80.0),
        KpiTarget::new("api_error_rate", 0.01, 0.05, 0.1).higher_is_worse(),
        KpiTarget::new("average_wait_time_minutes", 15.0, 30.0, 45.0).higher_is_worse(),
        KpiTarget::new("readmission_rate", 0.1, 0.15, 0.2).higher_is_worse(),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Stable,
}

impl Trend {
    pub fn between(previous: f64, current: f64) -> Self {
        if current > previous {
            Trend::Up
        } else if current < previous {
            Trend::Down
        } else {
            Trend::Stable
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KpiStatus {
    Healthy,
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedKpi {
    pub metric: String,
    pub category: String,
    pub value: f64,
    pub target: f64,
    pub warning: f64,
    pub critical: f64,
    pub polarity: Polarity,
    pub trend: Trend,
    pub status: KpiStatus,
    pub last_updated: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lower_is_worse_status() {
        let target = KpiTarget::new("score", 90.0, 80.0, 70.0);
        assert_eq!(target.status_for(95.0), KpiStatus::Healthy);
        assert_eq!(target.status_for(80.0), KpiStatus::Warning);
        assert_eq!(target.status_for(65.0), KpiStatus::Critical);
    }

    #[test]
    fn test_higher_is_worse_status() {
        let target = KpiTarget::new("wait", 15.0, 30.0, 45.0).higher_is_worse();
        assert_eq!(target.status_for(10.0), KpiStatus::Healthy);
        assert_eq!(target.status_for(31.0), KpiStatus::Warning);
        assert_eq!(target.status_for(45.0), KpiStatus::Critical);
    }

    #[test]
    fn test_trend() {
        assert_eq!(Trend::between(1.0, 2.0), Trend::Up);
        assert_eq!(Trend::between(2.0, 1.0), Trend::Down);
        assert_eq!(Trend::between(2.0, 2.0), Trend::Stable);
    }

    #[test]
    fn test_default_table_has_unique_names() {
        let targets = default_kpi_targets();
        let mut names: Vec<_> = targets.iter().map(|t| t.metric.as_str()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), targets.len());
    }
}
