use crate::engine::MetricsEngine;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Which periodic job a worker runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerKind {
    Aggregation,
    Cleanup,
}

impl WorkerKind {
    pub fn name(&self) -> &'static str {
        match self {
            WorkerKind::Aggregation => "aggregation",
            WorkerKind::Cleanup => "cleanup",
        }
    }
}

pub fn spawn_aggregation_worker(
    engine: MetricsEngine,
    period: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    spawn_worker(WorkerKind::Aggregation, engine, period, shutdown)
}

pub fn spawn_cleanup_worker(
    engine: MetricsEngine,
    period: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    spawn_worker(WorkerKind::Cleanup, engine, period, shutdown)
}

/// Ticks every `period` until `shutdown` fires. A tick that has started
/// always runs to completion; cancellation is only observed between ticks.
fn spawn_worker(
    kind: WorkerKind,
    engine: MetricsEngine,
    period: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("Starting {} worker (every {:?})", kind.name(), period);

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => run_tick(kind, &engine).await,
            }
        }

        info!("Stopped {} worker", kind.name());
    })
}

async fn run_tick(kind: WorkerKind, engine: &MetricsEngine) {
    match kind {
        WorkerKind::Aggregation => {
            let report = engine.run_rollup().await;
            if report.is_clean() {
                debug!(
                    "Aggregation tick wrote {} rows for {} metrics",
                    report.rows_written, report.metrics_scanned
                );
            } else {
                warn!(
                    "Aggregation tick finished with {} failed metric/window pairs",
                    report.failures.len()
                );
            }
        }
        WorkerKind::Cleanup => {
            let report = engine.run_cleanup().await;
            if report.store_failures > 0 {
                warn!(
                    "Cleanup tick could not prune {} store keys",
                    report.store_failures
                );
            }
        }
    }
}
