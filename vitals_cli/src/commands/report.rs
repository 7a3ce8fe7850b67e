use crate::ui;
use anyhow::Result;
use colored::Colorize;
use std::path::PathBuf;
use vitals_metrics::{
    CloudWatchExporter, JsonExporter, MarkdownExporter, PrometheusExporter,
};

pub async fn execute(
    snapshot_file: PathBuf,
    format: String,
    output: Option<PathBuf>,
    namespace: String,
) -> Result<()> {
    let snapshot = JsonExporter::load(&snapshot_file).await?;

    let rendered = match format.as_str() {
        "cli" => {
            println!("{}", "=== Metrics Report ===".bold().cyan());
            println!("Snapshot: {}", snapshot_file.display());
            println!("Generated at: {}", snapshot.generated_at.to_rfc3339());
            ui::print_snapshot(&snapshot);
            return Ok(());
        }
        "json" => JsonExporter::to_string(&snapshot)?,
        "markdown" => MarkdownExporter::format(&snapshot),
        "prometheus" => PrometheusExporter::format(&snapshot),
        "cloudwatch" => CloudWatchExporter::to_string(&snapshot, &namespace)?,
        _ => {
            anyhow::bail!("Unknown format: {}", format);
        }
    };

    match output {
        Some(path) => {
            tokio::fs::write(&path, rendered).await?;
            ui::print_success(&format!("Wrote {} report to {}", format, path.display()));
        }
        None => println!("{}", rendered),
    }

    Ok(())
}
