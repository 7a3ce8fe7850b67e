use crate::ui;
use anyhow::Result;
use colored::Colorize;
use std::collections::HashSet;
use std::path::PathBuf;
use vitals_config::parse_config_from_file;

pub async fn execute(config_file: PathBuf) -> Result<()> {
    println!("{}", "=== Validating Config ===".bold().cyan());
    println!("File: {}", config_file.display());

    let config = match parse_config_from_file(&config_file).await {
        Ok(config) => config,
        Err(e) => {
            ui::print_error("Config is invalid!");
            println!("\nError: {}", e);
            return Err(e);
        }
    };

    // Rules must point at a metric the config registers.
    let declared: HashSet<&str> = config.metrics.iter().map(|m| m.name.as_str()).collect();
    if let Some(rule) = config
        .alerts
        .iter()
        .find(|rule| !declared.contains(rule.metric.as_str()))
    {
        ui::print_error("Config is invalid!");
        anyhow::bail!("alert on '{}' references an undeclared metric", rule.metric);
    }

    println!();
    ui::print_success("Config is valid!");
    println!("\nEngine Settings:");
    println!("  Retention: {}", humantime::format_duration(config.retention));
    println!(
        "  Windows: {}",
        config
            .windows
            .iter()
            .map(|w| w.label())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("  Points per series: {}", config.max_points_per_series);
    println!(
        "  Aggregation every {}, cleanup every {}",
        humantime::format_duration(config.aggregation_interval),
        humantime::format_duration(config.cleanup_interval)
    );
    println!("  Store: {}", config.store.target);

    if config.metrics.is_empty() {
        ui::print_warning("Config declares no metrics");
    }
    for (i, metric) in config.metrics.iter().enumerate() {
        let kpi = if metric.is_kpi_eligible() { " (KPI)" } else { "" };
        println!("\n  Metric {}: {} [{}]{}", i + 1, metric.name, metric.kind, kpi);
        if !metric.label_names.is_empty() {
            println!("    Labels: {}", metric.label_names.join(", "));
        }
    }

    for rule in &config.alerts {
        ui::print_info(&format!(
            "Alert: [{}] {} {} {}",
            rule.severity, rule.metric, rule.condition, rule.threshold
        ));
    }

    Ok(())
}
