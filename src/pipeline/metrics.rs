//! Progress monitoring and metrics collection.

use serde::{Serialize, Serializer};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::interval;

fn serialize_duration<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_f64(duration.as_secs_f64())
}

/// Metrics for the extraction pipeline.
#[derive(Debug, Default)]
pub struct Metrics {
    /// Runs that completed
    pub runs_processed: AtomicU64,

    /// Runs whose task failed
    pub runs_failed: AtomicU64,

    /// Masks that passed the size filter
    pub masks_accepted: AtomicU64,

    /// Masks skipped by the size filter
    pub masks_rejected: AtomicU64,

    /// PNG files written (base images and augmentations)
    pub images_written: AtomicU64,

    /// Total bytes of PNG output
    pub bytes_written: AtomicU64,

    /// Records emitted by workers
    pub records_emitted: AtomicU64,

    /// Start time
    start_time: Option<Instant>,

    // Per-stage timing (in microseconds for precision)
    /// Time spent reading image arrays (microseconds)
    pub read_us: AtomicU64,

    /// Time spent normalizing (microseconds)
    pub normalize_us: AtomicU64,

    /// Time spent drawing and writing augmentations (microseconds)
    pub augment_us: AtomicU64,
}

impl Metrics {
    /// Create new metrics.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        })
    }

    /// Record a completed run.
    pub fn add_run_processed(&self) {
        self.runs_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed run.
    pub fn add_run_failed(&self) {
        self.runs_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_mask_accepted(&self) {
        self.masks_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_mask_rejected(&self) {
        self.masks_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one written image of `bytes` bytes.
    pub fn add_image_written(&self, bytes: u64) {
        self.images_written.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn add_records(&self, count: u64) {
        self.records_emitted.fetch_add(count, Ordering::Relaxed);
    }

    /// Record time spent reading image arrays.
    pub fn add_read_time(&self, duration: Duration) {
        self.read_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    /// Record time spent normalizing.
    pub fn add_normalize_time(&self, duration: Duration) {
        self.normalize_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    /// Record time spent drawing and writing augmentations.
    pub fn add_augment_time(&self, duration: Duration) {
        self.augment_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    /// Get elapsed time since start.
    pub fn elapsed(&self) -> Duration {
        self.start_time.map_or(Duration::ZERO, |t| t.elapsed())
    }

    /// Get images written per second.
    pub fn images_per_second(&self) -> f64 {
        let images = self.images_written.load(Ordering::Relaxed);
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            images as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Get a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            runs_processed: self.runs_processed.load(Ordering::Relaxed),
            runs_failed: self.runs_failed.load(Ordering::Relaxed),
            masks_accepted: self.masks_accepted.load(Ordering::Relaxed),
            masks_rejected: self.masks_rejected.load(Ordering::Relaxed),
            images_written: self.images_written.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            records_emitted: self.records_emitted.load(Ordering::Relaxed),
            elapsed: self.elapsed(),
            images_per_second: self.images_per_second(),
            read_secs: self.read_us.load(Ordering::Relaxed) as f64 / 1_000_000.0,
            normalize_secs: self.normalize_us.load(Ordering::Relaxed) as f64 / 1_000_000.0,
            augment_secs: self.augment_us.load(Ordering::Relaxed) as f64 / 1_000_000.0,
        }
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub runs_processed: u64,
    pub runs_failed: u64,
    pub masks_accepted: u64,
    pub masks_rejected: u64,
    pub images_written: u64,
    pub bytes_written: u64,
    pub records_emitted: u64,
    #[serde(serialize_with = "serialize_duration")]
    pub elapsed: Duration,
    pub images_per_second: f64,
    /// Total time spent reading arrays (seconds, summed across workers)
    pub read_secs: f64,
    /// Total time spent normalizing (seconds, summed across workers)
    pub normalize_secs: f64,
    /// Total time spent on augmentation output (seconds, summed across workers)
    pub augment_secs: f64,
}

impl MetricsSnapshot {
    /// Save metrics to a JSON file.
    pub fn save_to_file(&self, path: &str) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        tracing::info!("Metrics saved to {}", path);
        Ok(())
    }
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let total_stage_time = self.read_secs + self.normalize_secs + self.augment_secs;
        let (read_pct, norm_pct, aug_pct) = if total_stage_time > 0.0 {
            (
                self.read_secs / total_stage_time * 100.0,
                self.normalize_secs / total_stage_time * 100.0,
                self.augment_secs / total_stage_time * 100.0,
            )
        } else {
            (0.0, 0.0, 0.0)
        };

        write!(
            f,
            "Runs: {} processed, {} failed | Masks: {} accepted, {} rejected | \
             Images: {} ({:.1} MB) @ {:.1}/s | Records: {} | Elapsed: {:.1}s | \
             Time: read {:.0}% | normalize {:.0}% | augment {:.0}%",
            self.runs_processed,
            self.runs_failed,
            self.masks_accepted,
            self.masks_rejected,
            self.images_written,
            self.bytes_written as f64 / (1024.0 * 1024.0),
            self.images_per_second,
            self.records_emitted,
            self.elapsed.as_secs_f64(),
            read_pct,
            norm_pct,
            aug_pct,
        )
    }
}

/// Periodic metrics reporter.
pub struct MetricsReporter {
    metrics: Arc<Metrics>,
    interval_secs: u64,
    total_runs: u64,
}

impl MetricsReporter {
    /// Create a new metrics reporter.
    pub fn new(metrics: Arc<Metrics>, interval_secs: u64, total_runs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
            total_runs,
        }
    }

    /// Start the periodic reporter.
    pub async fn run(self, mut shutdown: mpsc::Receiver<()>) {
        let mut ticker = interval(Duration::from_secs(self.interval_secs.max(1)));

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let snapshot = self.metrics.snapshot();
                    tracing::info!("[{:.1}%] {}", self.progress(&snapshot), snapshot);
                }
                _ = shutdown.recv() => {
                    let snapshot = self.metrics.snapshot();
                    tracing::info!("Final: {}", snapshot);
                    break;
                }
            }
        }
    }

    fn progress(&self, snapshot: &MetricsSnapshot) -> f64 {
        if self.total_runs > 0 {
            (snapshot.runs_processed + snapshot.runs_failed) as f64 / self.total_runs as f64 * 100.0
        } else {
            100.0
        }
    }

    /// Print a final summary.
    pub fn print_summary(&self) {
        let snapshot = self.metrics.snapshot();

        println!("\n=== Extraction Summary ===");
        println!("Total time: {:.1}s", snapshot.elapsed.as_secs_f64());
        println!("Runs processed: {}", snapshot.runs_processed);
        println!("Runs failed: {}", snapshot.runs_failed);
        println!("Masks accepted: {}", snapshot.masks_accepted);
        println!("Masks rejected: {}", snapshot.masks_rejected);
        println!("Images written: {}", snapshot.images_written);
        println!(
            "Data written: {:.2} MB",
            snapshot.bytes_written as f64 / (1024.0 * 1024.0)
        );
        println!("Records emitted: {}", snapshot.records_emitted);

        let total_stage = snapshot.read_secs + snapshot.normalize_secs + snapshot.augment_secs;
        if total_stage > 0.0 {
            println!("\n--- Stage Time Breakdown ---");
            println!("Read:       {:>7.1}s ({:>5.1}%)", snapshot.read_secs, snapshot.read_secs / total_stage * 100.0);
            println!("Normalize:  {:>7.1}s ({:>5.1}%)", snapshot.normalize_secs, snapshot.normalize_secs / total_stage * 100.0);
            println!("Augment:    {:>7.1}s ({:>5.1}%)", snapshot.augment_secs, snapshot.augment_secs / total_stage * 100.0);
        }
        println!("==========================\n");
    }
}
