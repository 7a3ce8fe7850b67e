use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;
use vitals_core::{
    default_kpi_targets, AlertCondition, AlertSeverity, KpiTarget, MetricDefinition, Result,
    VitalsError,
};

pub const DEFAULT_RETENTION: Duration = Duration::from_secs(7 * 24 * 60 * 60);
pub const DEFAULT_MAX_POINTS: usize = vitals_core::series::DEFAULT_MAX_POINTS;
pub const DEFAULT_AGGREGATION_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;
pub const DEFAULT_WINDOWS: [&str; 5] = ["1m", "5m", "15m", "1h", "24h"];

/// Longest retention or window that fits in epoch-millisecond arithmetic.
pub const MAX_DURATION: Duration = Duration::from_millis(i64::MAX as u64);

/// Milliseconds as `i64`, saturating at `i64::MAX`.
pub fn duration_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

/// A rolling aggregation window such as `5m`. Serialized as its label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RollupWindow {
    label: String,
    duration: Duration,
}

impl RollupWindow {
    pub fn parse(label: &str) -> Result<Self> {
        let label = label.trim();
        let duration = humantime::parse_duration(label).map_err(|e| {
            VitalsError::InvalidConfig(format!("invalid window '{}': {}", label, e))
        })?;
        if duration.is_zero() {
            return Err(VitalsError::InvalidConfig(format!(
                "window '{}' must be longer than zero",
                label
            )));
        }
        if duration > MAX_DURATION {
            return Err(VitalsError::InvalidConfig(format!(
                "window '{}' is too long",
                label
            )));
        }
        Ok(Self {
            label: label.to_string(),
            duration,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn as_millis(&self) -> i64 {
        duration_millis(self.duration)
    }

    pub fn defaults() -> Vec<RollupWindow> {
        DEFAULT_WINDOWS
            .iter()
            .filter_map(|label| RollupWindow::parse(label).ok())
            .collect()
    }
}

impl TryFrom<String> for RollupWindow {
    type Error = VitalsError;

    fn try_from(value: String) -> Result<Self> {
        RollupWindow::parse(&value)
    }
}

impl From<RollupWindow> for String {
    fn from(window: RollupWindow) -> Self {
        window.label
    }
}

impl fmt::Display for RollupWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_target")]
    pub target: String,
}

fn default_store_target() -> String {
    "memory://".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            target: default_store_target(),
        }
    }
}

/// Alert rule added to the engine at start-up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRuleConfig {
    pub metric: String,
    pub condition: AlertCondition,
    pub threshold: f64,
    #[serde(default = "default_severity")]
    pub severity: AlertSeverity,
}

fn default_severity() -> AlertSeverity {
    AlertSeverity::Warning
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(with = "humantime_serde", default = "default_retention")]
    pub retention: Duration,
    #[serde(default = "RollupWindow::defaults")]
    pub windows: Vec<RollupWindow>,
    #[serde(default = "default_max_points")]
    pub max_points_per_series: usize,
    #[serde(with = "humantime_serde", default = "default_aggregation_interval")]
    pub aggregation_interval: Duration,
    #[serde(with = "humantime_serde", default = "default_cleanup_interval")]
    pub cleanup_interval: Duration,
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub metrics: Vec<MetricDefinition>,
    #[serde(default)]
    pub alerts: Vec<AlertRuleConfig>,
    #[serde(default)]
    pub kpi_targets: Vec<KpiTarget>,
}

fn default_retention() -> Duration {
    DEFAULT_RETENTION
}

fn default_max_points() -> usize {
    DEFAULT_MAX_POINTS
}

fn default_aggregation_interval() -> Duration {
    DEFAULT_AGGREGATION_INTERVAL
}

fn default_cleanup_interval() -> Duration {
    DEFAULT_CLEANUP_INTERVAL
}

fn default_event_capacity() -> usize {
    DEFAULT_EVENT_CAPACITY
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retention: DEFAULT_RETENTION,
            windows: RollupWindow::defaults(),
            max_points_per_series: DEFAULT_MAX_POINTS,
            aggregation_interval: DEFAULT_AGGREGATION_INTERVAL,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            store: StoreConfig::default(),
            metrics: Vec::new(),
            alerts: Vec::new(),
            kpi_targets: Vec::new(),
        }
    }
}

/// TOML files nest the engine settings under an `[engine]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    pub engine: EngineConfig,
}

impl EngineConfig {
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    pub fn retention_millis(&self) -> i64 {
        duration_millis(self.retention)
    }

    pub fn retention_seconds(&self) -> i64 {
        i64::try_from(self.retention.as_secs()).unwrap_or(i64::MAX)
    }

    /// Built-in KPI targets with `kpi_targets` entries layered on top.
    pub fn kpi_table(&self) -> Vec<KpiTarget> {
        let mut table = default_kpi_targets();
        for custom in &self.kpi_targets {
            match table.iter_mut().find(|t| t.metric == custom.metric) {
                Some(existing) => *existing = custom.clone(),
                None => table.push(custom.clone()),
            }
        }
        table
    }

    pub fn validate(&self) -> Result<()> {
        if self.retention.is_zero() {
            return Err(VitalsError::InvalidConfig(
                "retention must be > 0".to_string(),
            ));
        }

        if self.retention > MAX_DURATION {
            return Err(VitalsError::InvalidConfig(format!(
                "retention must be at most {} ms",
                i64::MAX
            )));
        }

        if self.windows.is_empty() {
            return Err(VitalsError::InvalidConfig(
                "at least one aggregation window is required".to_string(),
            ));
        }

        let mut labels = HashSet::new();
        for window in &self.windows {
            if !labels.insert(window.label()) {
                return Err(VitalsError::InvalidConfig(format!(
                    "window '{}' is listed twice",
                    window
                )));
            }
        }

        if self.max_points_per_series == 0 {
            return Err(VitalsError::InvalidConfig(
                "max_points_per_series must be > 0".to_string(),
            ));
        }

        if self.aggregation_interval.is_zero() || self.cleanup_interval.is_zero() {
            return Err(VitalsError::InvalidConfig(
                "worker intervals must be > 0".to_string(),
            ));
        }

        if self.event_capacity == 0 {
            return Err(VitalsError::InvalidConfig(
                "event_capacity must be > 0".to_string(),
            ));
        }

        if self.store.target.trim().is_empty() {
            return Err(VitalsError::InvalidConfig(
                "store target cannot be empty".to_string(),
            ));
        }

        for definition in &self.metrics {
            definition.validate()?;
        }

        for (i, rule) in self.alerts.iter().enumerate() {
            if rule.metric.is_empty() {
                return Err(VitalsError::InvalidConfig(format!(
                    "alert {} must name a metric",
                    i
                )));
            }
            if !rule.threshold.is_finite() {
                return Err(VitalsError::InvalidConfig(format!(
                    "alert {} on '{}' has a non-finite threshold",
                    i, rule.metric
                )));
            }
        }

        for target in &self.kpi_targets {
            if ![target.target, target.warning, target.critical]
                .iter()
                .all(|v| v.is_finite())
            {
                return Err(VitalsError::InvalidConfig(format!(
                    "KPI target for '{}' has a non-finite value",
                    target.metric
                )));
            }
        }

        Ok(())
    }
}

#[derive(Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    pub fn retention(mut self, retention: Duration) -> Self {
        self.config.retention = retention;
        self
    }

    pub fn windows(mut self, windows: Vec<RollupWindow>) -> Self {
        self.config.windows = windows;
        self
    }

    pub fn max_points_per_series(mut self, max_points: usize) -> Self {
        self.config.max_points_per_series = max_points;
        self
    }

    pub fn aggregation_interval(mut self, interval: Duration) -> Self {
        self.config.aggregation_interval = interval;
        self
    }

    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.config.cleanup_interval = interval;
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity;
        self
    }

    pub fn store_target(mut self, target: impl Into<String>) -> Self {
        self.config.store.target = target.into();
        self
    }

    pub fn metric(mut self, definition: MetricDefinition) -> Self {
        self.config.metrics.push(definition);
        self
    }

    pub fn alert(mut self, rule: AlertRuleConfig) -> Self {
        self.config.alerts.push(rule);
        self
    }

    pub fn kpi_target(mut self, target: KpiTarget) -> Self {
        self.config.kpi_targets.push(target);
        self
    }

    pub fn build(self) -> EngineConfig {
        self.config
    }
}

mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vitals_core::Polarity;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();

        assert_eq!(config.retention, Duration::from_secs(604_800));
        assert_eq!(config.max_points_per_series, 10_000);
        assert_eq!(config.aggregation_interval, Duration::from_secs(60));
        assert_eq!(config.cleanup_interval, Duration::from_secs(3600));
        let labels: Vec<&str> = config.windows.iter().map(|w| w.label()).collect();
        assert_eq!(labels, vec!["1m", "5m", "15m", "1h", "24h"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_window_parsing() {
        let window = RollupWindow::parse("15m").unwrap();
        assert_eq!(window.duration(), Duration::from_secs(900));
        assert_eq!(window.as_millis(), 900_000);

        assert!(RollupWindow::parse("0s").is_err());
        assert!(RollupWindow::parse("soon").is_err());
        assert!(RollupWindow::parse("500000000years").is_err());
    }

    #[test]
    fn test_oversized_retention() {
        let config = EngineConfig::builder()
            .retention(Duration::from_secs(u64::MAX))
            .build();
        assert!(config.validate().is_err());
        assert_eq!(config.retention_millis(), i64::MAX);
        assert_eq!(config.retention_seconds(), i64::MAX);

        let config = EngineConfig::builder().retention(MAX_DURATION).build();
        assert!(config.validate().is_ok());
        assert_eq!(config.retention_millis(), i64::MAX);
        assert!(config.retention_seconds() > 0);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let config = EngineConfig::builder().max_points_per_series(0).build();
        assert!(config.validate().is_err());

        let config = EngineConfig::builder().windows(Vec::new()).build();
        assert!(config.validate().is_err());

        let five = RollupWindow::parse("5m").unwrap();
        let config = EngineConfig::builder()
            .windows(vec![five.clone(), five])
            .build();
        assert!(config.validate().is_err());

        let config = EngineConfig::builder()
            .metric(MetricDefinition::histogram("h").buckets([3.0, 1.0]).build())
            .build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_kpi_table_overrides() {
        let config = EngineConfig::builder()
            .kpi_target(KpiTarget::new("patient_satisfaction_score", 85.0, 75.0, 60.0))
            .kpi_target(KpiTarget::new("bed_turnover_hours", 4.0, 6.0, 8.0).higher_is_worse())
            .build();

        let table = config.kpi_table();
        let satisfaction = table
            .iter()
            .find(|t| t.metric == "patient_satisfaction_score")
            .unwrap();
        assert_eq!(satisfaction.target, 85.0);

        let turnover = table.iter().find(|t| t.metric == "bed_turnover_hours").unwrap();
        assert_eq!(turnover.polarity, Polarity::HigherIsWorse);
        assert_eq!(table.len(), default_kpi_targets().len() + 1);
    }
}
