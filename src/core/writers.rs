//! Extent writer: LAS and CSV output for merged point sets.
//!
//! The LAS output is version 1.2, point format 0, with fixed-point encoding
//! parameters derived from the merged extent. The output axes follow the
//! geo/world convention, which swaps x and y relative to the rig frame: the
//! file's x axis carries the merged set's y values and vice versa.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use thiserror::Error;

use super::merge::MergedPointSet;

/// LAS header block size for version 1.2.
const LAS_HEADER_SIZE: u16 = 227;
/// Point record length for point data format 0.
const LAS_POINT_RECORD_LEN: u16 = 20;
/// Sub-millimeter scale used for georeferenced output and for z.
const FINE_SCALE: f64 = 1e-6;

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Failed to create or open file for writing.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Failed to write data to file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: io::Error,
    },

    /// CSV writing error.
    #[error("CSV write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },

    /// No extent is defined for an empty point set.
    #[error("cannot write an empty point set")]
    EmptyPointSet,

    /// A coordinate does not fit the fixed-point encoding.
    #[error("coordinate {value} on output axis {axis} does not fit the fixed-point encoding")]
    ValueOutOfRange { axis: char, value: f64 },

    /// More points than the LAS 1.2 record count can hold.
    #[error("point count {0} exceeds the LAS record limit")]
    TooManyPoints(usize),
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Fixed-point encoding parameters for the LAS header.
///
/// All arrays are in output axis order (x, y, z), after the swap from the
/// rig frame.
#[derive(Debug, Clone, PartialEq)]
pub struct LasHeaderParams {
    /// Per-axis offset: floor of the axis minimum.
    pub offset: [f64; 3],
    /// Per-axis scale.
    pub scale: [f64; 3],
    /// Per-axis minimum.
    pub min: [f64; 3],
    /// Per-axis maximum.
    pub max: [f64; 3],
}

fn min_max(values: &[f64]) -> (f64, f64) {
    let first = values[0];
    values
        .iter()
        .fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v)))
}

/// Compute LAS header parameters from a merged point set.
///
/// The output x axis carries the merged set's y values and vice versa.
/// Georeferenced output uses sub-millimeter scale on all axes; rig-relative
/// output keeps unit scale horizontally and sub-millimeter vertically.
pub fn compute_header_params(
    merged: &MergedPointSet,
    georeferenced: bool,
) -> Result<LasHeaderParams> {
    if merged.is_empty() {
        return Err(WriteError::EmptyPointSet);
    }

    // Axis swap: output x <- merged y, output y <- merged x
    let (min_x, max_x) = min_max(&merged.y);
    let (min_y, max_y) = min_max(&merged.x);
    let (min_z, max_z) = min_max(&merged.z);

    let scale = if georeferenced {
        [FINE_SCALE, FINE_SCALE, FINE_SCALE]
    } else {
        [1.0, 1.0, FINE_SCALE]
    };

    Ok(LasHeaderParams {
        offset: [min_x.floor(), min_y.floor(), min_z.floor()],
        scale,
        min: [min_x, min_y, min_z],
        max: [max_x, max_y, max_z],
    })
}

/// Creates parent directories for a file path if they don't exist.
fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// Encode one coordinate as a fixed-point i32.
fn encode_fixed(value: f64, offset: f64, scale: f64, axis: char) -> Result<i32> {
    let scaled = ((value - offset) / scale).round();
    if scaled < i32::MIN as f64 || scaled > i32::MAX as f64 || !scaled.is_finite() {
        return Err(WriteError::ValueOutOfRange { axis, value });
    }
    Ok(scaled as i32)
}

/// Serialize the 227-byte LAS 1.2 header.
fn write_las_header<W: Write>(
    writer: &mut W,
    params: &LasHeaderParams,
    num_points: u32,
) -> io::Result<()> {
    let mut sys_id = [0u8; 32];
    let mut software = [0u8; 32];
    let name = env!("CARGO_PKG_NAME").as_bytes();
    sys_id[..name.len().min(32)].copy_from_slice(&name[..name.len().min(32)]);
    software[..name.len().min(32)].copy_from_slice(&name[..name.len().min(32)]);

    writer.write_all(b"LASF")?;
    writer.write_all(&0u16.to_le_bytes())?; // file source id
    writer.write_all(&0u16.to_le_bytes())?; // global encoding
    writer.write_all(&[0u8; 16])?; // project GUID
    writer.write_all(&[1u8, 2u8])?; // version 1.2
    writer.write_all(&sys_id)?;
    writer.write_all(&software)?;
    writer.write_all(&0u16.to_le_bytes())?; // creation day of year
    writer.write_all(&0u16.to_le_bytes())?; // creation year
    writer.write_all(&LAS_HEADER_SIZE.to_le_bytes())?;
    writer.write_all(&(LAS_HEADER_SIZE as u32).to_le_bytes())?; // offset to point data
    writer.write_all(&0u32.to_le_bytes())?; // number of VLRs
    writer.write_all(&[0u8])?; // point data format 0
    writer.write_all(&LAS_POINT_RECORD_LEN.to_le_bytes())?;
    writer.write_all(&num_points.to_le_bytes())?;
    writer.write_all(&num_points.to_le_bytes())?; // points by return, first return
    for _ in 0..4 {
        writer.write_all(&0u32.to_le_bytes())?;
    }
    for scale in params.scale {
        writer.write_all(&scale.to_le_bytes())?;
    }
    for offset in params.offset {
        writer.write_all(&offset.to_le_bytes())?;
    }
    // LAS interleaves max before min per axis
    for axis in 0..3 {
        writer.write_all(&params.max[axis].to_le_bytes())?;
        writer.write_all(&params.min[axis].to_le_bytes())?;
    }

    Ok(())
}

/// Serialize one point record in format 0.
fn write_las_point<W: Write>(writer: &mut W, x: i32, y: i32, z: i32) -> io::Result<()> {
    writer.write_all(&x.to_le_bytes())?;
    writer.write_all(&y.to_le_bytes())?;
    writer.write_all(&z.to_le_bytes())?;
    writer.write_all(&0u16.to_le_bytes())?; // intensity
    writer.write_all(&[1u8])?; // return number 1, single return
    writer.write_all(&[0u8])?; // classification
    writer.write_all(&[0u8])?; // scan angle
    writer.write_all(&[0u8])?; // user data
    writer.write_all(&0u16.to_le_bytes())?; // point source id
    Ok(())
}

/// Write a merged point set to an LAS 1.2 file.
///
/// Applies the rig-to-world axis swap and the scale selection from
/// [`compute_header_params`], then encodes every point as fixed-point
/// integers. Returns the header parameters actually written.
///
/// # Errors
///
/// Returns an error if the point set is empty, a coordinate does not fit
/// the fixed-point encoding, or any I/O operation fails. A file that errors
/// mid-write must not be treated as valid output.
pub fn write_las(
    path: &Path,
    merged: &MergedPointSet,
    georeferenced: bool,
) -> Result<LasHeaderParams> {
    let params = compute_header_params(merged, georeferenced)?;

    let num_points =
        u32::try_from(merged.len()).map_err(|_| WriteError::TooManyPoints(merged.len()))?;

    // Encode before touching the filesystem so an out-of-range coordinate
    // never leaves a truncated file behind.
    let mut records = Vec::with_capacity(merged.len());
    for i in 0..merged.len() {
        // Axis swap: the file's x axis carries merged y values
        let x = encode_fixed(merged.y[i], params.offset[0], params.scale[0], 'x')?;
        let y = encode_fixed(merged.x[i], params.offset[1], params.scale[1], 'y')?;
        let z = encode_fixed(merged.z[i], params.offset[2], params.scale[2], 'z')?;
        records.push((x, y, z));
    }

    ensure_parent_dirs(path)?;
    let path_str = path.display().to_string();

    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path_str.clone(),
        source: e,
    })?;
    let mut writer = BufWriter::new(file);

    let io_result = (|| -> io::Result<()> {
        write_las_header(&mut writer, &params, num_points)?;
        for (x, y, z) in records {
            write_las_point(&mut writer, x, y, z)?;
        }
        writer.flush()
    })();

    io_result.map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })?;

    Ok(params)
}

/// Write a merged point set to CSV with x, y, z columns.
///
/// Rows are in merged (rig-frame) axis order, without the LAS axis swap;
/// this output exists for inspecting the merge itself.
pub fn write_merged_csv(path: &Path, merged: &MergedPointSet) -> Result<()> {
    ensure_parent_dirs(path)?;

    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })?;
    let buf_writer = BufWriter::new(file);
    let mut csv_writer = csv::Writer::from_writer(buf_writer);

    let path_str = path.display().to_string();

    csv_writer
        .write_record(["x", "y", "z"])
        .map_err(|e| WriteError::CsvError {
            path: path_str.clone(),
            source: e,
        })?;

    for i in 0..merged.len() {
        csv_writer
            .write_record(&[
                format!("{:.6}", merged.x[i]),
                format!("{:.6}", merged.y[i]),
                format!("{:.6}", merged.z[i]),
            ])
            .map_err(|e| WriteError::CsvError {
                path: path_str.clone(),
                source: e,
            })?;
    }

    csv_writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::merge::UtmBounds;
    use std::fs;
    use tempfile::tempdir;

    fn test_merged() -> MergedPointSet {
        MergedPointSet {
            x: vec![12.152, 13.0, 12.5],
            y: vec![8.158, 9.5, 7.25],
            z: vec![6.135, 6.2, 6.0],
            bounds: UtmBounds {
                min_y: 3_659_970.0,
                max_y: 3_659_980.0,
                min_x: 409_000.0,
                max_x: 409_010.0,
            },
        }
    }

    fn read_u32(bytes: &[u8], at: usize) -> u32 {
        u32::from_le_bytes(bytes[at..at + 4].try_into().unwrap())
    }

    fn read_i32(bytes: &[u8], at: usize) -> i32 {
        i32::from_le_bytes(bytes[at..at + 4].try_into().unwrap())
    }

    fn read_f64(bytes: &[u8], at: usize) -> f64 {
        f64::from_le_bytes(bytes[at..at + 8].try_into().unwrap())
    }

    #[test]
    fn test_header_params_axis_swap() {
        let merged = test_merged();
        let params = compute_header_params(&merged, true).unwrap();

        // Output x carries merged y, output y carries merged x
        assert_eq!(params.min[0], 7.25);
        assert_eq!(params.max[0], 9.5);
        assert_eq!(params.min[1], 12.152);
        assert_eq!(params.max[1], 13.0);
        assert_eq!(params.min[2], 6.0);
        assert_eq!(params.max[2], 6.2);

        assert_eq!(params.offset, [7.0, 12.0, 6.0]);
    }

    #[test]
    fn test_header_params_scale_selection() {
        let merged = test_merged();

        let geo = compute_header_params(&merged, true).unwrap();
        assert_eq!(geo.scale, [1e-6, 1e-6, 1e-6]);

        let rig = compute_header_params(&merged, false).unwrap();
        assert_eq!(rig.scale, [1.0, 1.0, 1e-6]);
    }

    #[test]
    fn test_header_params_empty_set() {
        let merged = MergedPointSet {
            x: vec![],
            y: vec![],
            z: vec![],
            bounds: test_merged().bounds,
        };
        assert!(matches!(
            compute_header_params(&merged, true),
            Err(WriteError::EmptyPointSet)
        ));
    }

    #[test]
    fn test_write_las_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.las");
        let merged = test_merged();

        let params = write_las(&path, &merged, true).unwrap();

        let bytes = fs::read(&path).unwrap();
        assert_eq!(&bytes[..4], b"LASF");
        // Version 1.2 at offsets 24..26
        assert_eq!(bytes[24], 1);
        assert_eq!(bytes[25], 2);
        // Header size and point data offset
        assert_eq!(
            u16::from_le_bytes(bytes[94..96].try_into().unwrap()),
            LAS_HEADER_SIZE
        );
        assert_eq!(read_u32(&bytes, 96), LAS_HEADER_SIZE as u32);
        // Point format 0, record length 20
        assert_eq!(bytes[104], 0);
        assert_eq!(
            u16::from_le_bytes(bytes[105..107].try_into().unwrap()),
            LAS_POINT_RECORD_LEN
        );
        // Point count and file size
        assert_eq!(read_u32(&bytes, 107), 3);
        assert_eq!(bytes.len(), 227 + 3 * 20);
        // Scales at 131, offsets at 155
        assert_eq!(read_f64(&bytes, 131), 1e-6);
        assert_eq!(read_f64(&bytes, 155), params.offset[0]);
        // Max x / min x at 179 / 187: merged y extrema
        assert_eq!(read_f64(&bytes, 179), 9.5);
        assert_eq!(read_f64(&bytes, 187), 7.25);

        // First point record: x integer encodes merged.y[0]
        let expected = ((merged.y[0] - params.offset[0]) / params.scale[0]).round() as i32;
        assert_eq!(read_i32(&bytes, 227), expected);
    }

    #[test]
    fn test_write_las_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("deep").join("out.las");

        write_las(&path, &test_merged(), false).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_write_las_value_out_of_range() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.las");

        let mut merged = test_merged();
        // 10 km above the offset at 1e-6 scale overflows i32
        merged.z[1] = merged.z[0] + 10_000.0;

        let result = write_las(&path, &merged, true);
        assert!(matches!(result, Err(WriteError::ValueOutOfRange { axis: 'z', .. })));
        // Nothing was persisted
        assert!(!path.exists());
    }

    #[test]
    fn test_write_merged_csv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("merged.csv");

        write_merged_csv(&path, &test_merged()).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();

        assert_eq!(lines[0], "x,y,z");
        assert_eq!(lines.len(), 4);
        assert!(lines[1].starts_with("12.152000,8.158000,"));
    }
}
