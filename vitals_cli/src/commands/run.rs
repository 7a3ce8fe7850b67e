use crate::ui;
use anyhow::{Context, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use metrics_exporter_prometheus::PrometheusBuilder;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use vitals_config::{parse_config_from_file, AlertRuleConfig, EngineConfig};
use vitals_core::{
    AlertCondition, AlertSeverity, InMemoryStore, KpiTarget, Labels, MetricDefinition, MetricKind,
};
use vitals_metrics::{JsonExporter, MetricsEngine};

pub struct RunOptions {
    pub config: Option<PathBuf>,
    pub duration: String,
    pub rate: u32,
    pub seed: Option<u64>,
    pub output_json: Option<PathBuf>,
    pub prometheus_port: Option<u16>,
    pub retention: Option<String>,
    pub max_points: Option<usize>,
}

pub async fn execute(options: RunOptions) -> Result<()> {
    println!("{}", "=== Vitals Engine ===".bold().cyan());

    let config = load_config(&options).await?;
    let duration = humantime::parse_duration(&options.duration)
        .with_context(|| format!("invalid duration '{}'", options.duration))?;
    if options.rate == 0 {
        anyhow::bail!("--rate must be at least 1");
    }
    if config.store.target != "memory://" {
        anyhow::bail!(
            "Unsupported store target '{}'; only memory:// is built in",
            config.store.target
        );
    }

    if let Some(port) = options.prometheus_port {
        PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], port))
            .install()
            .context("failed to start Prometheus exporter")?;
        ui::print_info(&format!(
            "Engine self-metrics available on http://0.0.0.0:{}/metrics",
            port
        ));
    }

    let seed = options.seed.unwrap_or_else(rand::random);
    println!("\n{}", "Run Details:".bold());
    println!("  Duration: {}", humantime::format_duration(duration));
    println!("  Rate: {} observations/s", options.rate);
    println!("  Seed: {} (reproducible)", seed);
    println!("  Retention: {}", humantime::format_duration(config.retention));
    println!("  Points per series: {}", config.max_points_per_series);

    let engine = MetricsEngine::new(config, Arc::new(InMemoryStore::new()))?;
    engine.register_configured().await?;
    engine.start().await;

    let total = (duration.as_secs_f64() * options.rate as f64).ceil() as u64;
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({msg})")?
            .progress_chars("=>-"),
    );
    pb.set_message("recording");

    println!("\n{}", "Generating workload...".bold().yellow());
    let mut workload = Workload::new(&engine, seed).await?;
    let mut ticker = tokio::time::interval(Duration::from_secs_f64(1.0 / options.rate as f64));
    let mut failures = 0u64;

    for _ in 0..total {
        ticker.tick().await;
        if let Err(e) = workload.step(&engine).await {
            warn!("Observation rejected: {}", e);
            failures += 1;
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    let rollup = engine.run_rollup().await;
    info!(
        "Final rollup wrote {} rows across {} metrics",
        rollup.rows_written, rollup.metrics_scanned
    );

    let snapshot = engine.dashboard_snapshot().await;
    engine.close().await?;

    ui::print_snapshot(&snapshot);
    if failures > 0 {
        ui::print_warning(&format!("{} observations were rejected", failures));
    }

    if let Some(json_path) = options.output_json {
        println!("\nSaving snapshot to: {}", json_path.display());
        JsonExporter::export(&snapshot, &json_path).await?;
    }

    println!("\n{}", "✓ Run completed".bold().green());
    Ok(())
}

async fn load_config(options: &RunOptions) -> Result<EngineConfig> {
    let mut config = match &options.config {
        Some(path) => {
            println!("Loading config: {}", path.display());
            parse_config_from_file(path).await?
        }
        None => EngineConfig::default(),
    };

    if config.metrics.is_empty() {
        info!("No metrics configured, using the built-in demo set");
        let (metrics, alerts) = demo_metrics();
        config.metrics = metrics;
        config.alerts.extend(alerts);
    }
    if let Some(retention) = &options.retention {
        config.retention = humantime::parse_duration(retention)
            .with_context(|| format!("invalid retention '{}'", retention))?;
    }
    if let Some(max_points) = options.max_points {
        config.max_points_per_series = max_points;
    }

    config.validate()?;
    Ok(config)
}

/// Clinic operations metrics used when no config is given.
fn demo_metrics() -> (Vec<MetricDefinition>, Vec<AlertRuleConfig>) {
    let metrics = vec![
        MetricDefinition::gauge("patient_satisfaction_score")
            .help("Rolling patient satisfaction score")
            .unit("percent")
            .category("patient_experience")
            .build(),
        MetricDefinition::gauge("appointment_show_rate")
            .help("Share of booked appointments attended")
            .unit("percent")
            .category("scheduling")
            .build(),
        MetricDefinition::gauge("average_wait_time_minutes")
            .help("Average lobby wait time")
            .unit("minutes")
            .category("operations")
            .build(),
        MetricDefinition::counter("api_requests_total")
            .help("API requests served")
            .label("endpoint")
            .build(),
        MetricDefinition::histogram("api_request_duration_ms")
            .help("API request latency")
            .unit("ms")
            .label("endpoint")
            .buckets([5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0])
            .build(),
        MetricDefinition::gauge("queue_depth")
            .help("Pending intake jobs")
            .build(),
    ];
    let alerts = vec![AlertRuleConfig {
        metric: "queue_depth".to_string(),
        condition: AlertCondition::Above,
        threshold: 25.0,
        severity: AlertSeverity::Critical,
    }];
    (metrics, alerts)
}

const ENDPOINTS: [&str; 3] = ["/appointments", "/patients", "/claims"];

struct Generator {
    definition: MetricDefinition,
    noise: Normal<f64>,
}

/// Seeded synthetic observations, round-robin over registered metrics.
struct Workload {
    rng: StdRng,
    generators: Vec<Generator>,
    next: usize,
}

impl Workload {
    async fn new(engine: &MetricsEngine, seed: u64) -> Result<Self> {
        let targets = engine.kpi_defaults();
        let mut generators = Vec::new();

        for definition in engine.list_definitions().await {
            let (mean, spread) = baseline(&definition, &targets);
            let noise = Normal::new(mean, spread)
                .with_context(|| format!("bad workload distribution for '{}'", definition.name))?;
            generators.push(Generator { definition, noise });
        }

        Ok(Self {
            rng: StdRng::seed_from_u64(seed),
            generators,
            next: 0,
        })
    }

    async fn step(&mut self, engine: &MetricsEngine) -> vitals_core::Result<()> {
        if self.generators.is_empty() {
            return Ok(());
        }
        let generator = &self.generators[self.next % self.generators.len()];
        self.next += 1;

        let definition = &generator.definition;
        let mut labels = Labels::new();
        for label in &definition.label_names {
            let value = if label == "endpoint" {
                ENDPOINTS[self.rng.gen_range(0..ENDPOINTS.len())].to_string()
            } else {
                format!("{}-{}", label, self.rng.gen_range(0..3))
            };
            labels.insert(label.clone(), value.into());
        }

        let sample = generator.noise.sample(&mut self.rng).max(0.0);
        match definition.kind {
            MetricKind::Counter => engine.increment(&definition.name, labels).await,
            MetricKind::Gauge => engine.gauge(&definition.name, sample, labels).await,
            MetricKind::Histogram => engine.histogram(&definition.name, sample, labels).await,
            MetricKind::Summary => engine.summary(&definition.name, sample, labels).await,
        }
    }
}

/// Mean and standard deviation for a metric's synthetic values. KPI metrics
/// hover around their target so some observations cross the thresholds.
fn baseline(definition: &MetricDefinition, targets: &[KpiTarget]) -> (f64, f64) {
    if let Some(target) = targets.iter().find(|t| t.metric == definition.name) {
        if target.target > 0.0 {
            let spread = (target.target - target.critical).abs().max(1.0) / 2.0;
            return (target.target, spread);
        }
    }
    match definition.name.as_str() {
        "queue_depth" => (15.0, 6.0),
        _ if definition.kind == MetricKind::Histogram => (60.0, 40.0),
        _ => (50.0, 10.0),
    }
}
