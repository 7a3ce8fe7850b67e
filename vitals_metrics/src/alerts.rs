use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};
use vitals_core::{
    AlertCondition, AlertSeverity, AlertSource, MetricAlert, Result, VitalsError,
};

#[derive(Debug, Clone, PartialEq)]
pub enum AlertTransition {
    Triggered(MetricAlert),
    Resolved(MetricAlert),
}

/// Threshold alerts with an inactive/active cycle. Alerts are never removed.
pub struct AlertManager {
    alerts: Arc<RwLock<HashMap<String, MetricAlert>>>,
}

impl AlertManager {
    pub fn new() -> Self {
        Self {
            alerts: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn add_alert(
        &self,
        metric: impl Into<String>,
        condition: AlertCondition,
        threshold: f64,
        severity: AlertSeverity,
    ) -> String {
        let alert = MetricAlert::new(metric, condition, threshold, severity);
        let id = alert.id.clone();
        info!("Added alert {} ({})", id, alert.description());
        self.alerts.write().await.insert(id.clone(), alert);
        id
    }

    /// Runs every rule bound to `metric` against a new observation.
    pub async fn evaluate(&self, metric: &str, value: f64, now: i64) -> Vec<AlertTransition> {
        let mut transitions = Vec::new();
        let mut alerts = self.alerts.write().await;

        for alert in alerts
            .values_mut()
            .filter(|a| a.metric == metric && a.source == AlertSource::Rule)
        {
            let firing = alert.condition.matches(value, alert.threshold);
            if firing && !alert.is_active {
                alert.is_active = true;
                alert.triggered_at = Some(now);
                alert.last_value = Some(value);
                warn!("Alert triggered: {} (value {})", alert.description(), value);
                transitions.push(AlertTransition::Triggered(alert.clone()));
            } else if !firing && alert.is_active {
                alert.is_active = false;
                alert.acknowledged_at = Some(now);
                info!("Alert resolved: {} (value {})", alert.description(), value);
                transitions.push(AlertTransition::Resolved(alert.clone()));
            }
        }

        transitions
    }

    /// Stores a KPI breach as its own active alert row.
    pub async fn record_kpi_breach(
        &self,
        metric: impl Into<String>,
        condition: AlertCondition,
        threshold: f64,
        severity: AlertSeverity,
        value: f64,
        now: i64,
    ) -> MetricAlert {
        let mut alert = MetricAlert::new(metric, condition, threshold, severity);
        alert.source = AlertSource::Kpi;
        alert.is_active = true;
        alert.triggered_at = Some(now);
        alert.last_value = Some(value);

        warn!("KPI alert: {} (value {})", alert.description(), value);
        self.alerts
            .write()
            .await
            .insert(alert.id.clone(), alert.clone());
        alert
    }

    /// Manually deactivates an alert. The rule stays armed and fires again
    /// on the next matching observation.
    pub async fn acknowledge(&self, id: &str, now: i64) -> Result<MetricAlert> {
        let mut alerts = self.alerts.write().await;
        let alert = alerts
            .get_mut(id)
            .ok_or_else(|| VitalsError::AlertNotFound(id.to_string()))?;

        if alert.is_active {
            alert.is_active = false;
            alert.acknowledged_at = Some(now);
            info!("Alert acknowledged: {}", alert.description());
        }

        Ok(alert.clone())
    }

    pub async fn get(&self, id: &str) -> Option<MetricAlert> {
        self.alerts.read().await.get(id).cloned()
    }

    pub async fn list(&self) -> Vec<MetricAlert> {
        let mut alerts: Vec<MetricAlert> = self.alerts.read().await.values().cloned().collect();
        alerts.sort_by(|a, b| a.metric.cmp(&b.metric).then(a.id.cmp(&b.id)));
        alerts
    }

    pub async fn active(&self) -> Vec<MetricAlert> {
        let mut alerts: Vec<MetricAlert> = self
            .alerts
            .read()
            .await
            .values()
            .filter(|a| a.is_active)
            .cloned()
            .collect();
        alerts.sort_by_key(|a| a.triggered_at);
        alerts
    }

    pub async fn active_count(&self) -> usize {
        self.alerts.read().await.values().filter(|a| a.is_active).count()
    }
}

impl Default for AlertManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lifecycle_is_idempotent() {
        let manager = AlertManager::new();
        let id = manager
            .add_alert("queue_depth", AlertCondition::Above, 25.0, AlertSeverity::Critical)
            .await;
        assert!(!manager.get(&id).await.unwrap().is_active);

        assert_eq!(manager.evaluate("queue_depth", 30.0, 1).await.len(), 1);
        assert!(manager.evaluate("queue_depth", 40.0, 2).await.is_empty());
        assert!(manager.evaluate("queue_depth", 50.0, 3).await.is_empty());

        let alert = manager.get(&id).await.unwrap();
        assert!(alert.is_active);
        assert_eq!(alert.triggered_at, Some(1));

        let resolved = manager.evaluate("queue_depth", 10.0, 4).await;
        assert!(matches!(resolved.as_slice(), [AlertTransition::Resolved(_)]));
        assert!(manager.evaluate("queue_depth", 5.0, 5).await.is_empty());

        manager.evaluate("queue_depth", 26.0, 6).await;
        let alert = manager.get(&id).await.unwrap();
        assert_eq!(alert.triggered_at, Some(6));
        assert_eq!(alert.acknowledged_at, Some(4));
    }

    #[tokio::test]
    async fn test_other_metrics_are_ignored() {
        let manager = AlertManager::new();
        manager
            .add_alert("cpu", AlertCondition::Below, 1.0, AlertSeverity::Info)
            .await;

        assert!(manager.evaluate("memory", 0.0, 1).await.is_empty());
        assert_eq!(manager.active_count().await, 0);
    }

    #[tokio::test]
    async fn test_acknowledge_then_retrigger() {
        let manager = AlertManager::new();
        let id = manager
            .add_alert("errors", AlertCondition::Equal, 1.0, AlertSeverity::Warning)
            .await;

        manager.evaluate("errors", 1.0, 10).await;
        let acked = manager.acknowledge(&id, 11).await.unwrap();
        assert!(!acked.is_active);
        assert_eq!(acked.acknowledged_at, Some(11));

        manager.evaluate("errors", 1.0, 12).await;
        assert_eq!(manager.get(&id).await.unwrap().triggered_at, Some(12));

        assert!(matches!(
            manager.acknowledge("nope", 13).await,
            Err(VitalsError::AlertNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_kpi_breaches_are_separate_rows() {
        let manager = AlertManager::new();
        let a = manager
            .record_kpi_breach("show_rate", AlertCondition::Below, 75.0, AlertSeverity::Critical, 70.0, 1)
            .await;
        let b = manager
            .record_kpi_breach("show_rate", AlertCondition::Below, 75.0, AlertSeverity::Critical, 69.0, 2)
            .await;

        assert_ne!(a.id, b.id);
        assert_eq!(manager.active().await.len(), 2);

        // Rule evaluation leaves KPI rows alone.
        assert!(manager.evaluate("show_rate", 99.0, 3).await.is_empty());
        assert_eq!(manager.active_count().await, 2);
    }
}
