use colored::Colorize;
use tabled::settings::Style;
use tabled::{Table, Tabled};
use vitals_core::{KpiStatus, TrackedKpi};
use vitals_metrics::DashboardSnapshot;

pub fn print_header(text: &str) {
    println!("\n{}", text.bold().cyan());
    println!("{}", "=".repeat(text.len()).cyan());
}

pub fn print_success(text: &str) {
    println!("{} {}", "✓".green().bold(), text.green());
}

pub fn print_error(text: &str) {
    println!("{} {}", "✗".red().bold(), text.red());
}

pub fn print_warning(text: &str) {
    println!("{} {}", "⚠".yellow().bold(), text.yellow());
}

pub fn print_info(text: &str) {
    println!("{} {}", "ℹ".blue().bold(), text);
}

#[derive(Tabled)]
struct MetricRow {
    #[tabled(rename = "Metric")]
    name: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Points")]
    points: usize,
    #[tabled(rename = "Latest")]
    latest: String,
}

#[derive(Tabled)]
struct KpiRow {
    #[tabled(rename = "KPI")]
    metric: String,
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Target")]
    target: String,
    #[tabled(rename = "Trend")]
    trend: String,
    #[tabled(rename = "Status")]
    status: String,
}

impl From<&TrackedKpi> for KpiRow {
    fn from(kpi: &TrackedKpi) -> Self {
        let status = match kpi.status {
            KpiStatus::Healthy => "healthy".green(),
            KpiStatus::Warning => "warning".yellow(),
            KpiStatus::Critical => "critical".red(),
        };
        Self {
            metric: kpi.metric.clone(),
            category: kpi.category.clone(),
            value: format!("{:.2}", kpi.value),
            target: format!("{:.2}", kpi.target),
            trend: format!("{:?}", kpi.trend).to_lowercase(),
            status: status.to_string(),
        }
    }
}

pub fn print_snapshot(snapshot: &DashboardSnapshot) {
    let status = &snapshot.system_status;
    print_header("System Status");
    let label = match status.status.as_str() {
        "healthy" => status.status.green(),
        "degraded" => status.status.yellow(),
        _ => status.status.red(),
    };
    println!("  Status: {}", label);
    println!("  Store: {}", status.store);
    println!("  Uptime: {}s", status.uptime_seconds);
    println!(
        "  Points: {} recorded, {} buffered, {} evicted",
        status.points_recorded, status.points_buffered, status.points_evicted
    );
    println!(
        "  Rollups: {} runs, {} rows, {} failures",
        status.rollup_runs, status.rollup_rows, status.rollup_failures
    );
    println!("  Store errors: {}", status.store_errors);

    print_header("Metrics");
    let rows: Vec<MetricRow> = snapshot
        .definitions
        .iter()
        .map(|definition| {
            let points = snapshot.series(&definition.name);
            MetricRow {
                name: definition.name.clone(),
                kind: definition.kind.to_string(),
                points: points.len(),
                latest: points
                    .last()
                    .map(|p| format!("{:.2}", p.value))
                    .unwrap_or_else(|| "-".to_string()),
            }
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::rounded()));

    if !snapshot.kpis.is_empty() {
        print_header("KPIs");
        let rows: Vec<KpiRow> = snapshot.kpis.iter().map(KpiRow::from).collect();
        println!("{}", Table::new(rows).with(Style::rounded()));
    }

    print_header("Active Alerts");
    if snapshot.active_alerts.is_empty() {
        print_success("No active alerts");
    } else {
        for alert in &snapshot.active_alerts {
            let value = alert
                .last_value
                .map(|v| format!(" (last value {:.2})", v))
                .unwrap_or_default();
            print_warning(&format!("{}{}", alert.description(), value));
        }
    }
}
