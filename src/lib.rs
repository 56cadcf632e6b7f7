//! SABER Extract
//!
//! Turns a SABER annotation archive (a Zarr hierarchy of tomogram runs with
//! segmentation masks) into a captioned image corpus for vision-language training.
//!
//! # Architecture
//!
//! The pipeline consists of:
//!
//! - **I/O**: Read-only archive access over a filesystem Zarr store, and the JSON label manifests
//! - **Transform**: Percentile normalization, region filtering, and the 12-way rotate/flip augmentation
//! - **Pipeline**: One blocking task per run on a bounded pool, then a seeded shuffle and 80/10/10 split
//!
//! # Usage
//!
//! ```no_run
//! use saber_extract::{Config, run_pipeline};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_file(std::path::Path::new("config.yaml"))?;
//!     let stats = run_pipeline(config).await?;
//!     println!("{}", stats);
//!     Ok(())
//! }
//! ```

pub mod caption;
pub mod config;
pub mod error;
pub mod io;
pub mod pipeline;
pub mod transform;

pub use caption::{clean_captions, Captioner, CleanedCaptioner};
pub use config::Config;
pub use error::ExtractError;
pub use io::{Archive, Mask, Record, Run};
pub use pipeline::{Metrics, RunWorker, Scheduler, SchedulerConfig};

use anyhow::{Context, Result};
use std::sync::Arc;

/// Outcome of a full extraction.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExtractionStats {
    pub runs_total: usize,
    pub runs_succeeded: usize,
    pub runs_failed: usize,
    pub records_total: usize,
    pub train: usize,
    pub val: usize,
    pub test: usize,
}

impl std::fmt::Display for ExtractionStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Runs: {}/{} succeeded ({} failed) | Records: {} (train {}, val {}, test {})",
            self.runs_succeeded,
            self.runs_total,
            self.runs_failed,
            self.records_total,
            self.train,
            self.val,
            self.test
        )
    }
}

/// Run the full extraction pipeline with the given configuration.
pub async fn run_pipeline(config: Config) -> Result<ExtractionStats> {
    config.validate()?;

    tracing::info!("Starting SABER extraction");
    tracing::info!("Reading archive: {}", config.input.zarr_path.display());

    // Discovery failures abort before anything is dispatched
    let archive = Archive::open(&config.input.zarr_path)?;
    let num_runs = archive.num_runs()?;
    drop(archive);

    tracing::info!("Found {} runs", num_runs);

    std::fs::create_dir_all(&config.output.folder).with_context(|| {
        format!(
            "Failed to create output folder {}",
            config.output.folder.display()
        )
    })?;

    let metrics = Metrics::new();
    let worker = Arc::new(RunWorker::new(&config, metrics.clone()));

    let scheduler_config = SchedulerConfig {
        workers: config.processing.resolved_workers(),
        enable_metrics: config.processing.enable_metrics,
        metrics_interval_secs: config.processing.metrics_interval_secs,
        metrics_output_path: config.processing.metrics_output_path.clone(),
    };
    let scheduler = Scheduler::new(worker, metrics, scheduler_config);

    tracing::info!("Starting run processing...");
    let output = scheduler.run(num_runs).await;
    tracing::info!("Run processing complete: {}", output.stats);

    if output.stats.all_failed() {
        anyhow::bail!(
            "All {} runs failed; no manifests written",
            output.stats.total_runs
        );
    }

    let records_total = output.records.len();
    let split = pipeline::shuffle_and_split(output.records);

    let paths = io::ManifestPaths::new(&config.output.folder);
    io::write_manifest(&paths.train, &split.train)?;
    io::write_manifest(&paths.val, &split.val)?;
    io::write_manifest(&paths.test, &split.test)?;

    let stats = ExtractionStats {
        runs_total: output.stats.total_runs,
        runs_succeeded: output.stats.runs_succeeded,
        runs_failed: output.stats.runs_failed,
        records_total,
        train: split.train.len(),
        val: split.val.len(),
        test: split.test.len(),
    };

    tracing::info!("Pipeline complete: {}", stats);
    tracing::info!(
        "Manifests written to {}",
        config.output.folder.display()
    );

    Ok(stats)
}

/// Build a Tokio runtime with the specified configuration.
pub fn build_runtime(worker_threads: Option<usize>) -> Result<tokio::runtime::Runtime> {
    let mut builder = tokio::runtime::Builder::new_multi_thread();

    if let Some(threads) = worker_threads {
        builder.worker_threads(threads);
    }

    builder.enable_all();

    Ok(builder.build()?)
}

/// Initialize the Rayon thread pool.
pub fn init_rayon(threads: Option<usize>) -> Result<()> {
    if let Some(threads) = threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()?;
    }
    Ok(())
}
