use crate::ui;
use anyhow::Result;
use colored::Colorize;
use tabled::settings::Style;
use tabled::{Table, Tabled};
use vitals_core::{default_kpi_targets, Polarity};
use vitals_metrics::RollupKind;

#[derive(Tabled)]
struct TargetRow {
    #[tabled(rename = "KPI")]
    metric: String,
    #[tabled(rename = "Target")]
    target: f64,
    #[tabled(rename = "Warning")]
    warning: f64,
    #[tabled(rename = "Critical")]
    critical: f64,
    #[tabled(rename = "Direction")]
    direction: &'static str,
}

pub async fn execute() -> Result<()> {
    ui::print_header("Built-in KPI Targets");

    let rows: Vec<TargetRow> = default_kpi_targets()
        .into_iter()
        .map(|t| TargetRow {
            metric: t.metric,
            target: t.target,
            warning: t.warning,
            critical: t.critical,
            direction: match t.polarity {
                Polarity::LowerIsWorse => "lower is worse",
                Polarity::HigherIsWorse => "higher is worse",
            },
        })
        .collect();
    println!("\nTotal targets: {}\n", rows.len());
    println!("{}", Table::new(rows).with(Style::rounded()));

    ui::print_header("Rollup Kinds");
    for kind in RollupKind::ALL {
        println!("  {} {}", "•".green(), kind.as_str());
    }

    println!(
        "\n{}",
        "Override targets with `kpi_targets` in an engine config".yellow()
    );

    Ok(())
}
