//! Job-level orchestration: metadata extraction and the full
//! captures-to-LAS conversion.
//!
//! Scan metadata arrives as a list of JSON records from the data pipeline;
//! the one carrying `sensor_variable_metadata` holds the scan parameters.
//! Numeric fields may be encoded as JSON numbers or as strings, so both are
//! accepted.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::info;
use serde_json::Value;
use thiserror::Error;

use crate::config::{PipelineConfig, MM_PER_METER};
use crate::core::loaders::load_captures;
use crate::core::merge::{merge, Origin, ScanContext, ScanDirection, UtmBounds};
use crate::core::projection::GeoProjection;
use crate::core::writers::write_las;

use super::discovery::{find_captures, las_output_path};

/// Errors that can occur during job processing.
#[derive(Error, Debug)]
pub enum JobError {
    #[error("no PLY captures found in {0}")]
    NoCaptures(PathBuf),

    #[error("no metadata record carries sensor_variable_metadata")]
    NoSensorMetadata,

    #[error("metadata is missing '{0}'")]
    MissingField(&'static str),

    #[error("metadata field '{field}' is not a number: {value}")]
    InvalidField { field: &'static str, value: String },
}

/// Read a numeric metadata field that may be a JSON number or a string.
fn numeric_field(record: &Value, field: &'static str) -> Result<f64, JobError> {
    let value = record.get(field).ok_or(JobError::MissingField(field))?;

    match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| JobError::InvalidField {
            field,
            value: n.to_string(),
        }),
        Value::String(s) => s.trim().parse().map_err(|_| JobError::InvalidField {
            field,
            value: s.clone(),
        }),
        other => Err(JobError::InvalidField {
            field,
            value: other.to_string(),
        }),
    }
}

/// Extract the scan context from a list of metadata records.
///
/// Scans for the first record with a `sensor_variable_metadata` object and
/// reads `scan_distance_mm`, `scan_direction`, and
/// `point_cloud_origin_m.east`. The `east` key is the fixed location of the
/// rig anchor in the source metadata, not a per-capture side selector.
pub fn extract_scan_context(records: &[Value]) -> Result<ScanContext> {
    let sensor = records
        .iter()
        .find_map(|record| record.get("sensor_variable_metadata"))
        .ok_or(JobError::NoSensorMetadata)?;

    let scan_distance_mm = numeric_field(sensor, "scan_distance_mm")?;

    // Fractional values must not truncate into a valid direction
    let raw_direction = numeric_field(sensor, "scan_direction")?;
    if !raw_direction.is_finite() || raw_direction.fract() != 0.0 {
        return Err(JobError::InvalidField {
            field: "scan_direction",
            value: raw_direction.to_string(),
        }
        .into());
    }
    let scan_direction = ScanDirection::try_from(raw_direction as i64)?;

    let origin_value = sensor
        .get("point_cloud_origin_m")
        .and_then(|origins| origins.get("east"))
        .ok_or(JobError::MissingField("point_cloud_origin_m.east"))?;

    let origin = Origin {
        x: numeric_field(origin_value, "x")?,
        y: numeric_field(origin_value, "y")?,
        z: numeric_field(origin_value, "z")?,
    };

    Ok(ScanContext {
        scan_distance_m: scan_distance_mm / MM_PER_METER,
        scan_direction,
        origin,
    })
}

/// Outcome of a completed conversion job.
#[derive(Debug, Clone)]
pub struct JobResult {
    /// The written LAS file.
    pub output: PathBuf,
    /// Captures folded into the output, in merge order.
    pub sources: Vec<PathBuf>,
    /// Total merged point count.
    pub points: usize,
    /// UTM extent of the merged set.
    pub bounds: UtmBounds,
    /// Completion time.
    pub utc_timestamp: DateTime<Utc>,
}

/// Run a full conversion job over a working folder.
///
/// Discovers PLY captures, extracts the scan context from the metadata
/// records, merges everything, and writes the LAS output next to the first
/// capture. Fails without output on the first error.
pub fn run_job<P: GeoProjection + Sync>(
    working_dir: &Path,
    records: &[Value],
    config: &PipelineConfig,
    projection: &P,
) -> Result<JobResult> {
    let capture_paths = find_captures(working_dir)
        .with_context(|| format!("Failed to scan working folder: {}", working_dir.display()))?;

    if capture_paths.is_empty() {
        return Err(JobError::NoCaptures(working_dir.to_path_buf()).into());
    }

    let context = extract_scan_context(records)?;

    let captures = load_captures(&capture_paths).context("Failed to load captures")?;
    info!(
        "Loaded {} capture(s), {} points total",
        captures.len(),
        captures.iter().map(|c| c.len()).sum::<usize>()
    );

    let merged = merge(
        &captures,
        &context,
        &config.rig,
        projection,
        config.output.georeferenced,
    )?;

    // The output always sits next to the first capture
    let output = las_output_path(&capture_paths)
        .ok_or_else(|| JobError::NoCaptures(working_dir.to_path_buf()))?;

    write_las(&output, &merged, config.output.georeferenced)
        .with_context(|| format!("Failed to write LAS output: {}", output.display()))?;

    info!("Wrote {} points to {}", merged.len(), output.display());

    Ok(JobResult {
        output,
        sources: capture_paths,
        points: merged.len(),
        bounds: merged.bounds,
        utc_timestamp: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::projection::AffineUtm;
    use serde_json::json;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    fn sample_records() -> Vec<Value> {
        vec![
            json!({"unrelated": true}),
            json!({
                "sensor_variable_metadata": {
                    "scan_distance_mm": "4000",
                    "scan_direction": "0",
                    "point_cloud_origin_m": {
                        "east": {"x": 10.0, "y": "20.0", "z": 5.0}
                    }
                }
            }),
        ]
    }

    fn write_ply(dir: &Path, name: &str, points: &[(f64, f64, f64)]) -> PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        writeln!(file, "ply").unwrap();
        writeln!(file, "format ascii 1.0").unwrap();
        writeln!(file, "element vertex {}", points.len()).unwrap();
        writeln!(file, "property float x").unwrap();
        writeln!(file, "property float y").unwrap();
        writeln!(file, "property float z").unwrap();
        writeln!(file, "end_header").unwrap();
        for (x, y, z) in points {
            writeln!(file, "{} {} {}", x, y, z).unwrap();
        }
        path
    }

    #[test]
    fn test_extract_scan_context_string_fields() {
        let context = extract_scan_context(&sample_records()).unwrap();

        assert_eq!(context.scan_distance_m, 4.0);
        assert_eq!(context.scan_direction, ScanDirection::Forward);
        assert_eq!(context.origin.x, 10.0);
        assert_eq!(context.origin.y, 20.0);
        assert_eq!(context.origin.z, 5.0);
    }

    #[test]
    fn test_extract_scan_context_no_sensor_record() {
        let records = vec![json!({"unrelated": true})];
        let err = extract_scan_context(&records).unwrap_err();
        assert!(err.downcast_ref::<JobError>().is_some());
    }

    #[test]
    fn test_extract_scan_context_missing_origin() {
        let records = vec![json!({
            "sensor_variable_metadata": {
                "scan_distance_mm": 4000,
                "scan_direction": 1
            }
        })];
        let err = extract_scan_context(&records).unwrap_err();
        let job_err = err.downcast_ref::<JobError>().unwrap();
        assert!(matches!(job_err, JobError::MissingField(_)));
    }

    #[test]
    fn test_extract_scan_context_bad_direction() {
        let records = vec![json!({
            "sensor_variable_metadata": {
                "scan_distance_mm": 4000,
                "scan_direction": 3,
                "point_cloud_origin_m": {"east": {"x": 0, "y": 0, "z": 0}}
            }
        })];
        assert!(extract_scan_context(&records).is_err());
    }

    #[test]
    fn test_extract_scan_context_fractional_direction() {
        for raw in [0.9, 1.7] {
            let records = vec![json!({
                "sensor_variable_metadata": {
                    "scan_distance_mm": 4000,
                    "scan_direction": raw,
                    "point_cloud_origin_m": {"east": {"x": 0, "y": 0, "z": 0}}
                }
            })];
            let err = extract_scan_context(&records).unwrap_err();
            let job_err = err.downcast_ref::<JobError>().unwrap();
            assert!(matches!(
                job_err,
                JobError::InvalidField {
                    field: "scan_direction",
                    ..
                }
            ));
        }
    }

    #[test]
    fn test_run_job_end_to_end() {
        let dir = TempDir::new().unwrap();
        write_ply(
            dir.path(),
            "scan_east_0.ply",
            &[(0.0, 0.0, 0.0), (10.0, 10.0, 10.0)],
        );
        write_ply(dir.path(), "scan_west_0.ply", &[(5.0, 5.0, 5.0)]);

        let config = PipelineConfig::default();
        let result = run_job(
            dir.path(),
            &sample_records(),
            &config,
            &AffineUtm::default(),
        )
        .unwrap();

        assert_eq!(result.points, 3);
        assert_eq!(result.sources.len(), 2);
        assert_eq!(result.output, dir.path().join("scan_east_0.las"));
        assert!(result.output.exists());
        // Bounds come out georeferenced
        assert!(result.bounds.min_y > 1_000_000.0);
    }

    #[test]
    fn test_run_job_no_captures() {
        let dir = TempDir::new().unwrap();
        let config = PipelineConfig::default();

        let err = run_job(
            dir.path(),
            &sample_records(),
            &config,
            &AffineUtm::default(),
        )
        .unwrap_err();

        let job_err = err.downcast_ref::<JobError>().unwrap();
        assert!(matches!(job_err, JobError::NoCaptures(_)));
    }
}
