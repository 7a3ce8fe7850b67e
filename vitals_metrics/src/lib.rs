pub mod aggregator;
pub mod alerts;
pub mod anomaly;
pub mod engine;
pub mod exporters;
pub mod kpi;
pub mod snapshot;
pub mod stats;
pub mod workers;

pub use aggregator::{AggregatedMetric, MetricsAggregator, RollupKind, RollupReport, WindowStats};
pub use alerts::{AlertManager, AlertTransition};
pub use anomaly::AnomalyDetector;
pub use engine::{BucketCounts, CleanupReport, MetricsEngine, TimeRange};
pub use kpi::{KpiBreach, KpiTracker, KpiUpdate};
pub use snapshot::DashboardSnapshot;
pub use stats::{EngineStats, SystemStatus};
pub use exporters::{CloudWatchExporter, JsonExporter, MarkdownExporter, PrometheusExporter};
