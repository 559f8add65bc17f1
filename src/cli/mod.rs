//! Command-line interface for the gantry pipeline.

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::PathBuf;
use std::time::Instant;

use crate::core::loaders::load_captures;
use crate::core::merge::{merge, Origin, ScanContext, ScanDirection};
use crate::core::projection::AffineUtm;
use crate::core::writers::{write_las, write_merged_csv};
use crate::processors;
use crate::PipelineConfig;

#[derive(Parser)]
#[command(name = "gantry-pipeline")]
#[command(about = "Gantry scanner point cloud merge pipeline", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge PLY captures into a single LAS file
    Convert {
        /// Input PLY capture files, in merge order
        inputs: Vec<PathBuf>,
        /// Output LAS file
        #[arg(short, long)]
        output: PathBuf,
        /// Scan travel distance in millimeters
        #[arg(long)]
        scan_distance_mm: f64,
        /// Scan direction (0 = forward, 1 = reverse)
        #[arg(long)]
        scan_direction: i64,
        /// Rig anchor x in meters
        #[arg(long, default_value_t = 0.0)]
        origin_x: f64,
        /// Rig anchor y in meters
        #[arg(long, default_value_t = 0.0)]
        origin_y: f64,
        /// Rig anchor z in meters
        #[arg(long, default_value_t = 0.0)]
        origin_z: f64,
        /// Keep rig-relative coordinates instead of UTM
        #[arg(long)]
        gantry: bool,
        /// Also export the merged points as CSV
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Process a job folder using pipeline metadata JSON
    Process {
        /// Working folder containing PLY captures
        working_dir: PathBuf,
        /// JSON metadata file (record or list of records)
        metadata: PathBuf,
        /// Keep rig-relative coordinates instead of UTM
        #[arg(long)]
        gantry: bool,
    },
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Shorten a summary value to fit its box column. Truncation counts
/// characters, not bytes, so non-ASCII paths stay safe.
fn fit_summary_value(value: &str) -> String {
    if value.chars().count() > 39 {
        let truncated: String = value.chars().take(36).collect();
        format!("{}...", truncated)
    } else {
        value.to_string()
    }
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<62} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        println!("║ {:<20}: {:<39} ║", key, fit_summary_value(value));
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    // Load config
    let config = match &cli.config {
        Some(path) => match PipelineConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}, using defaults",
                    path.display(),
                    e
                );
                PipelineConfig::default()
            }
        },
        None => PipelineConfig::default(),
    };

    match cli.command {
        Commands::Convert {
            inputs,
            output,
            scan_distance_mm,
            scan_direction,
            origin_x,
            origin_y,
            origin_z,
            gantry,
            csv,
        } => {
            cmd_convert(
                &inputs,
                &output,
                scan_distance_mm,
                scan_direction,
                Origin {
                    x: origin_x,
                    y: origin_y,
                    z: origin_z,
                },
                gantry,
                csv,
                &config,
            );
        }
        Commands::Process {
            working_dir,
            metadata,
            gantry,
        } => {
            cmd_process(&working_dir, &metadata, gantry, config);
        }
    }
}

fn cmd_convert(
    inputs: &[PathBuf],
    output: &PathBuf,
    scan_distance_mm: f64,
    scan_direction: i64,
    origin: Origin,
    gantry: bool,
    csv: Option<PathBuf>,
    config: &PipelineConfig,
) {
    let start = Instant::now();

    let scan_direction = match ScanDirection::try_from(scan_direction) {
        Ok(d) => d,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let context = ScanContext {
        scan_distance_m: scan_distance_mm / crate::config::MM_PER_METER,
        scan_direction,
        origin,
    };

    let georeferenced = !gantry && config.output.georeferenced;

    println!("Merging {} capture(s)...", inputs.len());
    println!("Output: {}", output.display());
    println!("Frame: {}", if georeferenced { "UTM" } else { "gantry" });

    let spinner = create_spinner("Loading PLY captures...");

    let captures = match load_captures(inputs) {
        Ok(c) => c,
        Err(e) => {
            spinner.finish_and_clear();
            error!("Failed to load captures: {}", e);
            std::process::exit(1);
        }
    };

    spinner.set_message("Correcting and merging points...");

    let projection = AffineUtm::default();
    let merged = match merge(&captures, &context, &config.rig, &projection, georeferenced) {
        Ok(m) => m,
        Err(e) => {
            spinner.finish_and_clear();
            error!("Merge failed: {}", e);
            std::process::exit(1);
        }
    };

    spinner.set_message("Writing LAS output...");

    let params = match write_las(output, &merged, georeferenced) {
        Ok(p) => p,
        Err(e) => {
            spinner.finish_and_clear();
            error!("Write failed: {}", e);
            std::process::exit(1);
        }
    };

    if let Some(csv_path) = csv {
        if let Err(e) = write_merged_csv(&csv_path, &merged) {
            spinner.finish_and_clear();
            error!("CSV export failed: {}", e);
            std::process::exit(1);
        }
    }

    spinner.finish_and_clear();

    let (min_y, max_y, min_x, max_x) = merged.bounds.as_tuple();
    print_summary(
        "Conversion Complete",
        &[
            ("Captures", inputs.len().to_string()),
            ("Output file", output.display().to_string()),
            ("Points merged", merged.len().to_string()),
            ("UTM y extent", format!("{:.3}..{:.3}", min_y, max_y)),
            ("UTM x extent", format!("{:.3}..{:.3}", min_x, max_x)),
            ("Scale", format!("{:?}", params.scale)),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
}

fn cmd_process(working_dir: &PathBuf, metadata: &PathBuf, gantry: bool, mut config: PipelineConfig) {
    let start = Instant::now();

    if gantry {
        config.output.georeferenced = false;
    }

    println!("Processing job folder: {}", working_dir.display());
    println!("Metadata: {}", metadata.display());

    let records = match read_metadata_records(metadata) {
        Ok(r) => r,
        Err(e) => {
            error!("Failed to read metadata: {}", e);
            std::process::exit(1);
        }
    };

    let spinner = create_spinner("Running conversion job...");

    let projection = AffineUtm::default();
    match processors::run_job(working_dir, &records, &config, &projection) {
        Ok(result) => {
            spinner.finish_and_clear();

            let sources: Vec<String> = result
                .sources
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            let (min_y, max_y, min_x, max_x) = result.bounds.as_tuple();

            print_summary(
                "Job Complete",
                &[
                    ("Working folder", working_dir.display().to_string()),
                    ("Sources", sources.join(", ")),
                    ("Output file", result.output.display().to_string()),
                    ("Points merged", result.points.to_string()),
                    ("UTM y extent", format!("{:.3}..{:.3}", min_y, max_y)),
                    ("UTM x extent", format!("{:.3}..{:.3}", min_x, max_x)),
                    ("Finished (UTC)", result.utc_timestamp.to_rfc3339()),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => {
            spinner.finish_and_clear();
            error!("Job failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Read job metadata as a list of records, accepting a single record too.
fn read_metadata_records(path: &PathBuf) -> anyhow::Result<Vec<serde_json::Value>> {
    let content = std::fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&content)?;

    Ok(match value {
        serde_json::Value::Array(records) => records,
        single => vec![single],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_summary_value_short_passthrough() {
        assert_eq!(fit_summary_value("output.las"), "output.las");
    }

    #[test]
    fn test_fit_summary_value_truncates_long() {
        let long = "a".repeat(50);
        let fitted = fit_summary_value(&long);
        assert_eq!(fitted, format!("{}...", "a".repeat(36)));
    }

    #[test]
    fn test_fit_summary_value_multibyte() {
        // A path full of multi-byte characters must not split a char
        let long = "méßcöntainer—".repeat(5);
        assert!(long.chars().count() > 39);
        let fitted = fit_summary_value(&long);
        assert!(fitted.ends_with("..."));
        assert_eq!(fitted.chars().count(), 39);
    }
}
