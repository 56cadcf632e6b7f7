//! SABER Extract CLI
//!
//! Builds a captioned image corpus from a SABER Zarr archive.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use saber_extract::{build_runtime, init_rayon, run_pipeline, Archive, Config};

#[derive(Parser)]
#[command(name = "saber-extract")]
#[command(about = "Extract augmented, captioned images from a SABER Zarr archive", long_about = None)]
struct Cli {
    /// Path to configuration file (YAML or JSON); defaults are used when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to the SABER Zarr archive
    #[arg(long, global = true)]
    zarr_path: Option<PathBuf>,

    /// Folder receiving per-run images and the label manifests
    #[arg(long, global = true)]
    output_folder: Option<PathBuf>,

    /// Lower clipping percentile
    #[arg(long, global = true)]
    p_low: Option<f64>,

    /// Upper clipping percentile
    #[arg(long, global = true)]
    p_high: Option<f64>,

    /// Pixels added on each side of a region before drawing its marker
    #[arg(long, global = true)]
    padding: Option<i64>,

    /// Runs processed concurrently (0 = number of cores)
    #[arg(long, global = true)]
    workers: Option<usize>,

    /// Debug logging and per-run image statistics
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the extraction pipeline (default if no command specified)
    Run,

    /// List runs and masks without writing anything
    Inspect,

    /// Validate configuration
    Validate,

    /// Generate a sample configuration file
    GenerateConfig {
        /// Output path for configuration file
        #[arg(short, long, default_value = "config.yaml")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    match &cli.command {
        None | Some(Commands::Run) => {
            let config = load_config(&cli)?;
            run_command(config)?;
        }

        Some(Commands::Inspect) => {
            let config = load_config(&cli)?;
            inspect_command(&config)?;
        }

        Some(Commands::Validate) => {
            let config = load_config(&cli)?;
            config.validate()?;
            println!("Configuration is valid");
        }

        Some(Commands::GenerateConfig { output }) => {
            generate_config_command(output)?;
        }
    }

    Ok(())
}

/// Configuration file (or defaults) with command-line overrides applied.
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    // Apply overrides
    if let Some(path) = &cli.zarr_path {
        config.input.zarr_path = path.clone();
    }
    if let Some(folder) = &cli.output_folder {
        config.output.folder = folder.clone();
    }
    if let Some(p) = cli.p_low {
        config.normalize.p_low = p;
    }
    if let Some(p) = cli.p_high {
        config.normalize.p_high = p;
    }
    if let Some(padding) = cli.padding {
        config.augment.padding = padding;
    }
    if let Some(workers) = cli.workers {
        config.processing.workers = workers;
    }
    if cli.verbose {
        config.processing.verbose = true;
    }

    Ok(config)
}

fn run_command(config: Config) -> Result<()> {
    config.validate()?;

    // Initialize Rayon
    init_rayon(config.processing.rayon_threads)?;

    // Build and run Tokio runtime
    let runtime = build_runtime(config.processing.worker_threads)?;
    let stats = runtime.block_on(async { run_pipeline(config).await })?;

    println!("{}", stats);
    Ok(())
}

fn inspect_command(config: &Config) -> Result<()> {
    let archive = Archive::open(&config.input.zarr_path)?;
    let runs = archive.runs()?;

    println!("\n=== Archive: {} ===", archive.root_path().display());
    println!("Runs: {}", runs.len());

    let mut total_masks = 0;
    let mut total_accepted = 0;
    for run in &runs {
        let masks = run.masks()?;
        let mut accepted = 0;
        for mask in &masks {
            if mask.bbox()?.passes_size_filter(mask.area()?) {
                accepted += 1;
            }
        }
        println!(
            "  {:<24} {:>5} masks, {:>5} pass size filter",
            run.name(),
            masks.len(),
            accepted
        );
        total_masks += masks.len();
        total_accepted += accepted;
    }

    println!(
        "Total: {} masks, {} pass, {} augmented images expected",
        total_masks,
        total_accepted,
        total_accepted * 12
    );
    println!("=====================\n");

    Ok(())
}

fn generate_config_command(output: &Path) -> Result<()> {
    // Generate a commented YAML config
    let yaml = r#"# SABER Extract Configuration

# === INPUT: The SABER annotation archive ===
input:
  # Zarr hierarchy; every top-level group with a `masks` sub-group is a run
  zarr_path: "saber.zarr"

# === OUTPUT: Where images and manifests go ===
output:
  # Receives <run>/image.png, <run>/<mask>_bounded_<rot>[_<flip>].png
  # and labels_{train,val,test}.json
  folder: "output_images"

# === NORMALIZE: Intensity clipping before 8-bit rescale ===
normalize:
  # Percentiles in [0, 100]; p_low must be below p_high
  p_low: 20.0
  p_high: 80.0

# === AUGMENT: Region marker ===
augment:
  # Pixels added on each side of a mask's bounding box
  padding: 20

# === PROCESSING: Performance tuning ===
processing:
  # Runs processed concurrently (0 = number of cores)
  workers: 0

  # Tokio worker threads (null = num CPUs)
  # worker_threads: 8

  # Rayon thread pool size for PNG encoding (null = num CPUs)
  # rayon_threads: 8

  # Print progress metrics during processing
  enable_metrics: true

  # Metrics reporting interval in seconds
  metrics_interval_secs: 10

  # Save a JSON metrics snapshot when done
  # metrics_output_path: "metrics.json"

  # Log per-run image statistics
  verbose: false
"#;

    std::fs::write(output, yaml)?;
    println!("Generated sample configuration at: {}", output.display());

    Ok(())
}
