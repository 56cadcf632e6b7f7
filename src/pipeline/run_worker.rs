//! Per-run processing: normalize one run's image and augment its masks.
//!
//! Each call re-opens the archive, so workers never share a store handle.

use crate::config::Config;
use crate::error::ExtractError;
use crate::io::{Archive, Record, Run};
use crate::pipeline::Metrics;
use crate::transform::{highlight_region, normalize_to_u8, write_augmentations, RunImage};
use anyhow::{Context, Result};
use ndarray::ArrayD;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Records and counters produced by one run.
#[derive(Debug, Default)]
pub struct RunOutput {
    pub run_name: String,
    pub records: Vec<Record>,
    pub masks_accepted: usize,
    pub masks_rejected: usize,
}

/// Processor for individual runs.
#[derive(Clone)]
pub struct RunWorker {
    zarr_path: PathBuf,
    output_folder: PathBuf,
    p_low: f64,
    p_high: f64,
    padding: i64,
    verbose: bool,
    metrics: Arc<Metrics>,
}

impl RunWorker {
    pub fn new(config: &Config, metrics: Arc<Metrics>) -> Self {
        Self {
            zarr_path: config.input.zarr_path.clone(),
            output_folder: config.output.folder.clone(),
            p_low: config.normalize.p_low,
            p_high: config.normalize.p_high,
            padding: config.augment.padding,
            verbose: config.processing.verbose,
            metrics,
        }
    }

    /// Process the run at `index` of the sorted run listing.
    ///
    /// Blocking; call from a blocking task.
    pub fn process_run(&self, index: usize) -> Result<RunOutput> {
        let archive = Archive::open(&self.zarr_path)
            .with_context(|| format!("Failed to open archive for run index {}", index))?;
        let run = archive.run_at(index)?;
        let run_name = run.name().to_string();

        self.process(&run)
            .with_context(|| format!("Run '{}' (index {}) failed", run_name, index))
    }

    fn process(&self, run: &Run) -> Result<RunOutput> {
        let run_dir = self.output_folder.join(run.name());
        std::fs::create_dir_all(&run_dir)
            .with_context(|| format!("Failed to create {}", run_dir.display()))?;

        let read_start = Instant::now();
        let raw = run.image_array()?;
        self.metrics.add_read_time(read_start.elapsed());
        self.log_image_stats(run.name(), &raw);

        let normalize_start = Instant::now();
        let normalized = normalize_to_u8(&raw, self.p_low, self.p_high);
        let base = RunImage::from_array(&normalized)?;
        self.metrics.add_normalize_time(normalize_start.elapsed());

        let image_path = run_dir.join("image.png");
        base.save_png(&image_path)?;
        self.metrics.add_image_written(file_size(&image_path)?);

        let mut output = RunOutput {
            run_name: run.name().to_string(),
            ..Default::default()
        };

        for mask in run.masks()? {
            let bbox = mask.bbox()?;
            let area = mask.area()?;

            if !bbox.passes_size_filter(area) {
                tracing::debug!(
                    "Skipping {}/{}: {}x{} px, area {}",
                    run.name(),
                    mask.name(),
                    bbox.width(),
                    bbox.height(),
                    area
                );
                self.metrics.add_mask_rejected();
                output.masks_rejected += 1;
                continue;
            }

            let description = mask.description()?;
            let clamped = bbox.padded_and_clamped(self.padding, base.width(), base.height());

            let augment_start = Instant::now();
            let bounded = highlight_region(&base, &clamped);
            let written = write_augmentations(&bounded, mask.name(), &description, &run_dir)?;
            self.metrics.add_augment_time(augment_start.elapsed());

            for image in &written {
                self.metrics.add_image_written(image.bytes);
            }
            self.metrics.add_mask_accepted();
            output.masks_accepted += 1;
            output
                .records
                .extend(written.into_iter().map(|image| image.record));
        }

        self.metrics.add_records(output.records.len() as u64);
        tracing::debug!(
            "Run {}: {} masks accepted, {} rejected, {} records",
            output.run_name,
            output.masks_accepted,
            output.masks_rejected,
            output.records.len()
        );

        Ok(output)
    }

    fn log_image_stats(&self, run_name: &str, image: &ArrayD<f64>) {
        if image.is_empty() {
            tracing::warn!("Run {}: image array is empty", run_name);
            return;
        }
        let min = image.iter().copied().fold(f64::INFINITY, f64::min);
        let max = image.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = image.iter().sum::<f64>() / image.len() as f64;

        if self.verbose {
            tracing::info!(
                "Run {}: shape {:?}, min {:.3}, max {:.3}, mean {:.3}",
                run_name,
                image.shape(),
                min,
                max,
                mean
            );
        } else {
            tracing::debug!(
                "Run {}: shape {:?}, min {:.3}, max {:.3}, mean {:.3}",
                run_name,
                image.shape(),
                min,
                max,
                mean
            );
        }
    }
}

fn file_size(path: &Path) -> Result<u64, ExtractError> {
    std::fs::metadata(path)
        .map(|m| m.len())
        .map_err(|e| ExtractError::filesystem(path, e))
}
