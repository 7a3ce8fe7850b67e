use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertCondition {
    Above,
    Below,
    Equal,
}

impl AlertCondition {
    pub fn matches(&self, value: f64, threshold: f64) -> bool {
        match self {
            AlertCondition::Above => value > threshold,
            AlertCondition::Below => value < threshold,
            AlertCondition::Equal => (value - threshold).abs() <= f64::EPSILON,
        }
    }
}

impl fmt::Display for AlertCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AlertCondition::Above => "above",
            AlertCondition::Below => "below",
            AlertCondition::Equal => "equal",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AlertSeverity::Info => "info",
            AlertSeverity::Warning => "warning",
            AlertSeverity::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// Where an alert row came from. KPI breach alerts are one-off event rows
/// and are skipped by rule evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSource {
    Rule,
    Kpi,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricAlert {
    pub id: String,
    pub metric: String,
    pub condition: AlertCondition,
    pub threshold: f64,
    pub severity: AlertSeverity,
    pub source: AlertSource,
    pub is_active: bool,
    /// Milliseconds since the epoch.
    pub triggered_at: Option<i64>,
    pub acknowledged_at: Option<i64>,
    /// Observation that last flipped the alert on.
    pub last_value: Option<f64>,
}

impl MetricAlert {
    pub fn new(
        metric: impl Into<String>,
        condition: AlertCondition,
        threshold: f64,
        severity: AlertSeverity,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            metric: metric.into(),
            condition,
            threshold,
            severity,
            source: AlertSource::Rule,
            is_active: false,
            triggered_at: None,
            acknowledged_at: None,
            last_value: None,
        }
    }

    pub fn description(&self) -> String {
        format!(
            "[{}] {} {} {}",
            self.severity, self.metric, self.condition, self.threshold
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conditions() {
        assert!(AlertCondition::Above.matches(30.0, 25.0));
        assert!(!AlertCondition::Above.matches(25.0, 25.0));
        assert!(AlertCondition::Below.matches(1.0, 2.0));
        assert!(AlertCondition::Equal.matches(0.1 + 0.2, 0.3));
        assert!(!AlertCondition::Equal.matches(1.0, 1.5));
    }

    #[test]
    fn test_new_alert_is_inactive() {
        let alert = MetricAlert::new("queue_depth", AlertCondition::Above, 25.0, AlertSeverity::Critical);
        assert!(!alert.is_active);
        assert_eq!(alert.source, AlertSource::Rule);
        assert_eq!(alert.description(), "[critical] queue_depth above 25");
    }
}
