use crate::snapshot::DashboardSnapshot;
use anyhow::Result;
use std::fmt::Write;
use std::path::Path;

pub struct MarkdownExporter;

impl MarkdownExporter {
    pub async fn export(snapshot: &DashboardSnapshot, path: impl AsRef<Path>) -> Result<()> {
        let markdown = Self::format(snapshot);
        tokio::fs::write(path, markdown).await?;
        Ok(())
    }

    pub fn format(snapshot: &DashboardSnapshot) -> String {
        let status = &snapshot.system_status;
        let mut out = format!(
            r#"# Vitals Metrics Report

Generated at {}

## System Status

| Field | Value |
|-------|-------|
| Status | {} |
| Store | {} |
| Uptime | {}s |
| Metrics Registered | {} |
| Points Buffered | {} |
| Points Recorded | {} |
| Points Evicted | {} |
| Store Errors | {} |
| Rollup Runs | {} |
| Rollup Failures | {} |
| Active Alerts | {} |
"#,
            snapshot.generated_at.to_rfc3339(),
            status.status,
            status.store,
            status.uptime_seconds,
            status.metrics_registered,
            status.points_buffered,
            status.points_recorded,
            status.points_evicted,
            status.store_errors,
            status.rollup_runs,
            status.rollup_failures,
            status.active_alerts,
        );

        out.push_str("\n## Metrics\n\n| Metric | Kind | Points | Latest |\n|--------|------|--------|--------|\n");
        for definition in &snapshot.definitions {
            let points = snapshot.series(&definition.name);
            let latest = points
                .last()
                .map(|p| format!("{:.2}", p.value))
                .unwrap_or_else(|| "-".to_string());
            let _ = writeln!(
                out,
                "| {} | {} | {} | {} |",
                definition.name,
                definition.kind,
                points.len(),
                latest
            );
        }

        if !snapshot.kpis.is_empty() {
            out.push_str("\n## KPIs\n\n| KPI | Category | Value | Target | Trend | Status |\n|-----|----------|-------|--------|-------|--------|\n");
            for kpi in &snapshot.kpis {
                let _ = writeln!(
                    out,
                    "| {} | {} | {:.2} | {:.2} | {:?} | {:?} |",
                    kpi.metric, kpi.category, kpi.value, kpi.target, kpi.trend, kpi.status
                );
            }
        }

        out.push_str("\n## Active Alerts\n\n");
        if snapshot.active_alerts.is_empty() {
            out.push_str("No active alerts.\n");
        } else {
            for alert in &snapshot.active_alerts {
                let value = alert
                    .last_value
                    .map(|v| format!(" (last value {:.2})", v))
                    .unwrap_or_default();
                let _ = writeln!(out, "- {}{}", alert.description(), value);
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::SystemStatus;
    use std::collections::BTreeMap;
    use vitals_core::{AlertCondition, AlertSeverity, MetricAlert, MetricDefinition, MetricPoint};

    #[test]
    fn test_report_sections() {
        let mut alert = MetricAlert::new("queue_depth", AlertCondition::Above, 25.0, AlertSeverity::Critical);
        alert.is_active = true;
        alert.last_value = Some(30.0);

        let mut time_series = BTreeMap::new();
        time_series.insert("queue_depth".to_string(), vec![MetricPoint::new(2, 30.0)]);
        let snapshot = DashboardSnapshot {
            generated_at: chrono::Utc::now(),
            definitions: vec![
                MetricDefinition::gauge("queue_depth").build(),
                MetricDefinition::counter("logins").build(),
            ],
            time_series,
            kpis: Vec::new(),
            active_alerts: vec![alert],
            system_status: SystemStatus {
                status: "healthy".to_string(),
                ..Default::default()
            },
        };

        let report = MarkdownExporter::format(&snapshot);
        assert!(report.starts_with("# Vitals Metrics Report"));
        assert!(report.contains("| Status | healthy |"));
        assert!(report.contains("| queue_depth | gauge | 1 | 30.00 |"));
        assert!(report.contains("| logins | counter | 0 | - |"));
        assert!(!report.contains("## KPIs"));
        assert!(report.contains("- [critical] queue_depth above 25 (last value 30.00)"));
    }
}
