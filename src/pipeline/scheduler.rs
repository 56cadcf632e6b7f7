//! Work distribution across a bounded pool of blocking run tasks.
//!
//! One task per run index. Tasks finish in any order; their records are
//! pooled in run-index order so the seeded shuffle sees a stable input.

use crate::io::Record;
use crate::pipeline::{Metrics, MetricsReporter, RunOutput, RunWorker};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Configuration for the scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Number of runs processed concurrently
    pub workers: usize,

    /// Enable progress reporting
    pub enable_metrics: bool,

    /// Metrics reporting interval in seconds
    pub metrics_interval_secs: u64,

    /// Optional path to save metrics JSON after the pool drains
    pub metrics_output_path: Option<String>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            enable_metrics: true,
            metrics_interval_secs: 10,
            metrics_output_path: None,
        }
    }
}

/// Scheduler for distributing runs across blocking tasks.
pub struct Scheduler {
    worker: Arc<RunWorker>,
    metrics: Arc<Metrics>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(worker: Arc<RunWorker>, metrics: Arc<Metrics>, config: SchedulerConfig) -> Self {
        Self {
            worker,
            metrics,
            config,
        }
    }

    /// Process runs `0..num_runs` and pool their records.
    ///
    /// A failed or panicked run is logged and counted; it never aborts its siblings.
    pub async fn run(&self, num_runs: usize) -> SchedulerOutput {
        let workers = self.config.workers.max(1);
        tracing::info!(
            "Scheduling {} runs for processing ({} concurrent)",
            num_runs,
            workers
        );

        // Start metrics reporter if enabled
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        let reporter_handle = if self.config.enable_metrics {
            let reporter = MetricsReporter::new(
                self.metrics.clone(),
                self.config.metrics_interval_secs,
                num_runs as u64,
            );
            Some(tokio::spawn(reporter.run(shutdown_rx)))
        } else {
            drop(shutdown_rx);
            None
        };

        let mut results: Vec<(usize, anyhow::Result<RunOutput>)> = stream::iter(0..num_runs)
            .map(|index| run_task(self.worker.clone(), self.metrics.clone(), index))
            .buffer_unordered(workers)
            .collect()
            .await;

        // Shutdown metrics reporter
        let _ = shutdown_tx.send(()).await;
        if let Some(handle) = reporter_handle {
            let _ = handle.await;
        }

        results.sort_by_key(|(index, _)| *index);

        let mut output = SchedulerOutput {
            stats: SchedulerStats {
                total_runs: num_runs,
                ..Default::default()
            },
            records: Vec::new(),
        };

        for (index, result) in results {
            match result {
                Ok(run) => {
                    output.stats.runs_succeeded += 1;
                    output.stats.masks_accepted += run.masks_accepted;
                    output.stats.masks_rejected += run.masks_rejected;
                    output.records.extend(run.records);
                }
                Err(e) => {
                    output.stats.runs_failed += 1;
                    tracing::error!("Run index {} failed: {:#}", index, e);
                }
            }
        }

        // Print final summary and optionally save to file
        if self.config.enable_metrics {
            let reporter = MetricsReporter::new(
                self.metrics.clone(),
                self.config.metrics_interval_secs,
                num_runs as u64,
            );
            reporter.print_summary();

            if let Some(ref path) = self.config.metrics_output_path {
                let snapshot = self.metrics.snapshot();
                if let Err(e) = snapshot.save_to_file(path) {
                    tracing::warn!("Failed to save metrics to {}: {}", path, e);
                }
            }
        }

        output
    }
}

/// Process one run on the blocking pool and count it as soon as it finishes.
async fn run_task(
    worker: Arc<RunWorker>,
    metrics: Arc<Metrics>,
    index: usize,
) -> (usize, anyhow::Result<RunOutput>) {
    let result = tokio::task::spawn_blocking(move || worker.process_run(index))
        .await
        .map_err(|e| anyhow::anyhow!("Run task {} panicked: {}", index, e))
        .and_then(|result| result);

    match &result {
        Ok(_) => metrics.add_run_processed(),
        Err(_) => metrics.add_run_failed(),
    }
    (index, result)
}

/// Pooled records plus run statistics.
#[derive(Debug, Default)]
pub struct SchedulerOutput {
    pub stats: SchedulerStats,
    /// Records in run-index order
    pub records: Vec<Record>,
}

/// Statistics from a scheduler run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Runs dispatched
    pub total_runs: usize,

    /// Runs that completed
    pub runs_succeeded: usize,

    /// Runs that failed
    pub runs_failed: usize,

    /// Masks augmented
    pub masks_accepted: usize,

    /// Masks skipped by the size filter
    pub masks_rejected: usize,
}

impl SchedulerStats {
    /// Every dispatched run failed.
    pub fn all_failed(&self) -> bool {
        self.total_runs > 0 && self.runs_failed == self.total_runs
    }
}

impl std::fmt::Display for SchedulerStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Succeeded: {}, Failed: {}, Total: {} | Masks accepted: {}, rejected: {}",
            self.runs_succeeded,
            self.runs_failed,
            self.total_runs,
            self.masks_accepted,
            self.masks_rejected
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::io::fixtures::{ArchiveBuilder, MaskSpec};
    use ndarray::Array2;
    use tempfile::TempDir;

    fn worker_for(
        zarr: &std::path::Path,
        out: &std::path::Path,
        metrics: Arc<Metrics>,
    ) -> Arc<RunWorker> {
        let mut config = Config::default();
        config.input.zarr_path = zarr.to_path_buf();
        config.output.folder = out.to_path_buf();
        Arc::new(RunWorker::new(&config, metrics))
    }

    #[tokio::test]
    async fn test_run_counted_when_task_finishes() {
        let dir = TempDir::new().unwrap();
        let zarr = ArchiveBuilder::create(&dir.path().join("in.zarr"))
            .run_u16("run001", Array2::from_shape_fn((64, 64), |(y, x)| (y * 64 + x) as u16))
            .mask("run001", MaskSpec::new("m1", [10, 10, 50, 50], 1600, "vesicle"))
            .run_without_image("run002")
            .finish();
        let metrics = Metrics::new();
        let worker = worker_for(&zarr, &dir.path().join("out"), metrics.clone());

        let (index, result) = run_task(worker.clone(), metrics.clone(), 0).await;
        assert_eq!(index, 0);
        assert!(result.is_ok());
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.runs_processed, 1);
        assert_eq!(snapshot.records_emitted, 12);

        let (_, result) = run_task(worker, metrics.clone(), 1).await;
        assert!(result.is_err());
        assert_eq!(metrics.snapshot().runs_failed, 1);
    }

    #[tokio::test]
    async fn test_scheduler_counts_each_run_once() {
        let dir = TempDir::new().unwrap();
        let zarr = ArchiveBuilder::create(&dir.path().join("in.zarr"))
            .run_u16("run001", Array2::from_elem((32, 32), 5u16))
            .run_without_image("run002")
            .run_u16("run003", Array2::from_elem((32, 32), 9u16))
            .finish();
        let metrics = Metrics::new();
        let worker = worker_for(&zarr, &dir.path().join("out"), metrics.clone());
        let config = SchedulerConfig {
            workers: 2,
            enable_metrics: false,
            ..Default::default()
        };

        let output = Scheduler::new(worker, metrics.clone(), config).run(3).await;

        assert_eq!(output.stats.runs_succeeded, 2);
        assert_eq!(output.stats.runs_failed, 1);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.runs_processed, 2);
        assert_eq!(snapshot.runs_failed, 1);
    }

    #[test]
    fn test_scheduler_config_default() {
        let config = SchedulerConfig::default();
        assert_eq!(config.workers, 1);
        assert!(config.enable_metrics);
        assert!(config.metrics_output_path.is_none());
    }

    #[test]
    fn test_scheduler_stats_display() {
        let stats = SchedulerStats {
            total_runs: 10,
            runs_succeeded: 8,
            runs_failed: 2,
            masks_accepted: 31,
            masks_rejected: 7,
        };

        let display = format!("{}", stats);
        assert!(display.contains("Succeeded: 8"));
        assert!(display.contains("Failed: 2"));
        assert!(display.contains("accepted: 31"));
    }

    #[test]
    fn test_all_failed() {
        let mut stats = SchedulerStats::default();
        assert!(!stats.all_failed());

        stats.total_runs = 2;
        stats.runs_failed = 1;
        assert!(!stats.all_failed());

        stats.runs_failed = 2;
        assert!(stats.all_failed());
    }
}
