pub mod cloudwatch;
pub mod json;
pub mod markdown;
pub mod prometheus;

pub use cloudwatch::CloudWatchExporter;
pub use json::JsonExporter;
pub use markdown::MarkdownExporter;
pub use prometheus::PrometheusExporter;
