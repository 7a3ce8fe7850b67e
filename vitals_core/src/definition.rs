use crate::error::{Result, VitalsError};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
    Summary,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
            MetricKind::Summary => "summary",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplianceLevel {
    Critical,
    High,
    Medium,
    Low,
}

/// Domain tags attached to a definition. A definition that carries a
/// classification is tracked as a KPI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub category: String,
    #[serde(default)]
    pub sensitivity: Option<String>,
    #[serde(default)]
    pub compliance_level: Option<ComplianceLevel>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SummaryObjective {
    pub quantile: f64,
    pub error: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDefinition {
    pub name: String,
    pub kind: MetricKind,
    #[serde(default)]
    pub help: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub label_names: Vec<String>,
    #[serde(default)]
    pub histogram_buckets: Vec<f64>,
    #[serde(default)]
    pub summary_objectives: Vec<SummaryObjective>,
    #[serde(default)]
    pub classification: Option<Classification>,
}

impl MetricDefinition {
    pub fn builder(name: impl Into<String>, kind: MetricKind) -> DefinitionBuilder {
        DefinitionBuilder::new(name, kind)
    }

    pub fn counter(name: impl Into<String>) -> DefinitionBuilder {
        Self::builder(name, MetricKind::Counter)
    }

    pub fn gauge(name: impl Into<String>) -> DefinitionBuilder {
        Self::builder(name, MetricKind::Gauge)
    }

    pub fn histogram(name: impl Into<String>) -> DefinitionBuilder {
        Self::builder(name, MetricKind::Histogram)
    }

    pub fn summary(name: impl Into<String>) -> DefinitionBuilder {
        Self::builder(name, MetricKind::Summary)
    }

    pub fn is_kpi_eligible(&self) -> bool {
        self.classification.is_some()
    }

    pub fn allows_label(&self, key: &str) -> bool {
        self.label_names.iter().any(|name| name == key)
    }

    /// Kind and label schema are the immutable part of a definition.
    pub fn same_shape(&self, other: &MetricDefinition) -> bool {
        self.kind == other.kind && self.label_names == other.label_names
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(VitalsError::InvalidDefinition(
                "metric name cannot be empty".to_string(),
            ));
        }

        for (i, label) in self.label_names.iter().enumerate() {
            if label.is_empty() {
                return Err(VitalsError::InvalidDefinition(format!(
                    "label {} of '{}' has an empty name",
                    i, self.name
                )));
            }
            if self.label_names[..i].contains(label) {
                return Err(VitalsError::InvalidDefinition(format!(
                    "label '{}' is declared twice on '{}'",
                    label, self.name
                )));
            }
        }

        match self.kind {
            MetricKind::Histogram => {
                if self.histogram_buckets.iter().any(|b| !b.is_finite()) {
                    return Err(VitalsError::InvalidDefinition(format!(
                        "histogram '{}' has a non-finite bucket boundary",
                        self.name
                    )));
                }
                if self.histogram_buckets.windows(2).any(|w| w[0] >= w[1]) {
                    return Err(VitalsError::InvalidDefinition(format!(
                        "histogram '{}' buckets must be strictly increasing",
                        self.name
                    )));
                }
            }
            MetricKind::Summary => {
                for objective in &self.summary_objectives {
                    if !(objective.quantile > 0.0 && objective.quantile < 1.0) {
                        return Err(VitalsError::InvalidDefinition(format!(
                            "summary '{}' objective quantile {} is outside (0, 1)",
                            self.name, objective.quantile
                        )));
                    }
                }
            }
            MetricKind::Counter | MetricKind::Gauge => {}
        }

        Ok(())
    }
}

pub struct DefinitionBuilder {
    definition: MetricDefinition,
}

impl DefinitionBuilder {
    fn new(name: impl Into<String>, kind: MetricKind) -> Self {
        Self {
            definition: MetricDefinition {
                name: name.into(),
                kind,
                help: String::new(),
                unit: String::new(),
                label_names: Vec::new(),
                histogram_buckets: Vec::new(),
                summary_objectives: Vec::new(),
                classification: None,
            },
        }
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.definition.help = help.into();
        self
    }

    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.definition.unit = unit.into();
        self
    }

    pub fn label(mut self, name: impl Into<String>) -> Self {
        self.definition.label_names.push(name.into());
        self
    }

    pub fn buckets(mut self, buckets: impl IntoIterator<Item = f64>) -> Self {
        self.definition.histogram_buckets = buckets.into_iter().collect();
        self
    }

    pub fn objective(mut self, quantile: f64, error: f64) -> Self {
        self.definition
            .summary_objectives
            .push(SummaryObjective { quantile, error });
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        let classification = self.definition.classification.get_or_insert(Classification {
            category: String::new(),
            sensitivity: None,
            compliance_level: None,
        });
        classification.category = category.into();
        self
    }

    pub fn compliance(mut self, level: ComplianceLevel) -> Self {
        if let Some(classification) = self.definition.classification.as_mut() {
            classification.compliance_level = Some(level);
        }
        self
    }

    pub fn build(self) -> MetricDefinition {
        self.definition
    }
}
