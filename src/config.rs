//! Configuration for the extraction pipeline.

use crate::error::ExtractError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration for the extraction pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Input archive configuration
    #[serde(default)]
    pub input: InputConfig,

    /// Output corpus configuration
    #[serde(default)]
    pub output: OutputConfig,

    /// Intensity normalization
    #[serde(default)]
    pub normalize: NormalizeConfig,

    /// Region augmentation
    #[serde(default)]
    pub augment: AugmentConfig,

    /// Processing configuration
    #[serde(default)]
    pub processing: ProcessingConfig,
}

/// Input archive configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Path to the SABER Zarr root
    #[serde(default = "default_zarr_path")]
    pub zarr_path: PathBuf,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            zarr_path: default_zarr_path(),
        }
    }
}

/// Output corpus configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Folder receiving per-run image folders and the label manifests
    #[serde(default = "default_output_folder")]
    pub folder: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            folder: default_output_folder(),
        }
    }
}

/// Percentile clipping applied before rescaling to 8 bits.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NormalizeConfig {
    /// Lower percentile for clipping
    #[serde(default = "default_p_low")]
    pub p_low: f64,

    /// Upper percentile for clipping
    #[serde(default = "default_p_high")]
    pub p_high: f64,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            p_low: default_p_low(),
            p_high: default_p_high(),
        }
    }
}

/// Augmentation settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AugmentConfig {
    /// Pixels added on every side of a region's bounding box
    #[serde(default = "default_padding")]
    pub padding: i64,
}

impl Default for AugmentConfig {
    fn default() -> Self {
        Self {
            padding: default_padding(),
        }
    }
}

/// Processing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Number of runs processed concurrently (0 = number of CPUs)
    #[serde(default)]
    pub workers: usize,

    /// Number of Tokio worker threads
    #[serde(default)]
    pub worker_threads: Option<usize>,

    /// Rayon thread pool size for image encoding
    #[serde(default)]
    pub rayon_threads: Option<usize>,

    /// Enable periodic progress reporting
    #[serde(default = "default_true")]
    pub enable_metrics: bool,

    /// Metrics reporting interval in seconds
    #[serde(default = "default_metrics_interval")]
    pub metrics_interval_secs: u64,

    /// Optional path to save metrics JSON after the run completes
    #[serde(default)]
    pub metrics_output_path: Option<String>,

    /// Log per-run image statistics
    #[serde(default)]
    pub verbose: bool,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            worker_threads: None,
            rayon_threads: None,
            enable_metrics: true,
            metrics_interval_secs: default_metrics_interval(),
            metrics_output_path: None,
            verbose: false,
        }
    }
}

impl ProcessingConfig {
    /// Worker pool size: the configured value, or the available parallelism when 0.
    pub fn resolved_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        }
    }
}

impl Config {
    /// Load configuration from a YAML or JSON file.
    /// Format is auto-detected from file extension (.yaml, .yml, or .json).
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let config: Config = match ext {
            "json" => serde_json::from_str(&contents)?,
            // YAML is a superset of JSON
            _ => serde_yaml::from_str(&contents)?,
        };
        Ok(config)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Serialize configuration to YAML.
    pub fn to_yaml(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Validate the configuration before any work is dispatched.
    pub fn validate(&self) -> Result<(), ExtractError> {
        if self.input.zarr_path.as_os_str().is_empty() {
            return Err(ExtractError::Configuration("zarr_path must not be empty".into()));
        }
        if self.output.folder.as_os_str().is_empty() {
            return Err(ExtractError::Configuration("output folder must not be empty".into()));
        }

        let NormalizeConfig { p_low, p_high } = self.normalize;
        if !(0.0..=100.0).contains(&p_low) || !(0.0..=100.0).contains(&p_high) {
            return Err(ExtractError::Configuration(format!(
                "percentiles must be within [0, 100], got p_low={} p_high={}",
                p_low, p_high
            )));
        }
        if p_low >= p_high {
            return Err(ExtractError::Configuration(format!(
                "p_low ({}) must be smaller than p_high ({})",
                p_low, p_high
            )));
        }
        if self.augment.padding < 0 {
            return Err(ExtractError::Configuration(format!(
                "padding must be >= 0, got {}",
                self.augment.padding
            )));
        }
        if self.processing.enable_metrics && self.processing.metrics_interval_secs == 0 {
            return Err(ExtractError::Configuration(
                "metrics_interval_secs must be > 0 when metrics are enabled".into(),
            ));
        }
        Ok(())
    }
}

// Default value functions for serde
fn default_zarr_path() -> PathBuf { PathBuf::from("saber.zarr") }
fn default_output_folder() -> PathBuf { PathBuf::from("output_images") }
fn default_p_low() -> f64 { 20.0 }
fn default_p_high() -> f64 { 80.0 }
fn default_padding() -> i64 { 20 }
fn default_true() -> bool { true }
fn default_metrics_interval() -> u64 { 10 }
