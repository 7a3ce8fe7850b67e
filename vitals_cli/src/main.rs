mod commands;
mod ui;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;

#[derive(Parser)]
#[command(name = "vitals")]
#[command(about = "Metrics collection, KPI tracking and alerting engine", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the engine against a synthetic workload
    Run {
        /// Engine config file (YAML, TOML, or JSON); built-in demo metrics if omitted
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// How long to generate observations
        #[arg(short, long, default_value = "10s")]
        duration: String,

        /// Observations per second
        #[arg(short, long, default_value_t = 50)]
        rate: u32,

        /// Workload seed
        #[arg(long)]
        seed: Option<u64>,

        /// Save the final dashboard snapshot as JSON
        #[arg(short, long)]
        output_json: Option<PathBuf>,

        /// Expose engine self-metrics for Prometheus on port
        #[arg(short, long)]
        prometheus_port: Option<u16>,

        /// Override the retention period (e.g. "2days")
        #[arg(long, env = "VITALS_RETENTION")]
        retention: Option<String>,

        /// Override the per-series buffer capacity
        #[arg(long, env = "VITALS_MAX_POINTS")]
        max_points: Option<usize>,
    },

    /// Render a saved snapshot
    Report {
        /// Path to a snapshot JSON file
        snapshot_file: PathBuf,

        /// Output format (cli, json, markdown, prometheus, cloudwatch)
        #[arg(short, long, default_value = "cli")]
        format: String,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// CloudWatch namespace
        #[arg(long, default_value = "Vitals")]
        namespace: String,
    },

    /// Validate an engine config file
    Validate {
        /// Path to config file
        config_file: PathBuf,
    },

    /// List the built-in KPI targets and rollup kinds
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::ERROR
    } else {
        Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Run {
            config,
            duration,
            rate,
            seed,
            output_json,
            prometheus_port,
            retention,
            max_points,
        } => {
            commands::run::execute(commands::run::RunOptions {
                config,
                duration,
                rate,
                seed,
                output_json,
                prometheus_port,
                retention,
                max_points,
            })
            .await?;
        }

        Commands::Report {
            snapshot_file,
            format,
            output,
            namespace,
        } => {
            commands::report::execute(snapshot_file, format, output, namespace).await?;
        }

        Commands::Validate { config_file } => {
            commands::validate::execute(config_file).await?;
        }

        Commands::List => {
            commands::list::execute().await?;
        }
    }

    Ok(())
}
