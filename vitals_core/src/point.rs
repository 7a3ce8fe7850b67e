use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LabelValue {
    Number(f64),
    Text(String),
}

impl fmt::Display for LabelValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelValue::Number(n) => write!(f, "{}", n),
            LabelValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for LabelValue {
    fn from(value: &str) -> Self {
        LabelValue::Text(value.to_string())
    }
}

impl From<String> for LabelValue {
    fn from(value: String) -> Self {
        LabelValue::Text(value)
    }
}

impl From<f64> for LabelValue {
    fn from(value: f64) -> Self {
        LabelValue::Number(value)
    }
}

impl From<i64> for LabelValue {
    fn from(value: i64) -> Self {
        LabelValue::Number(value as f64)
    }
}

pub type Labels = BTreeMap<String, LabelValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    /// Wall-clock milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub value: f64,
    #[serde(default)]
    pub labels: Labels,
}

impl MetricPoint {
    pub fn new(timestamp: i64, value: f64) -> Self {
        Self {
            timestamp,
            value,
            labels: Labels::new(),
        }
    }

    pub fn with_labels(timestamp: i64, value: f64, labels: Labels) -> Self {
        Self {
            timestamp,
            value,
            labels,
        }
    }
}

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
