pub mod alert;
pub mod definition;
pub mod error;
pub mod event;
pub mod kpi;
pub mod point;
pub mod registry;
pub mod series;
pub mod store;

pub use alert::{AlertCondition, AlertSeverity, AlertSource, MetricAlert};
pub use definition::{Classification, ComplianceLevel, MetricDefinition, MetricKind, SummaryObjective};
pub use error::{Result, VitalsError};
pub use event::MetricEvent;
pub use kpi::{default_kpi_targets, KpiStatus, KpiTarget, Polarity, TrackedKpi, Trend};
pub use point::{now_millis, LabelValue, Labels, MetricPoint};
pub use registry::{MetricRegistry, Registration};
pub use series::{SeriesHandle, TimeSeries};
pub use store::{raw_key, rollup_key, DynStore, InMemoryStore, MetricStore};

// Re-export commonly used types
pub use async_trait::async_trait;
