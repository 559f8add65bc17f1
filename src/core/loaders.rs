//! Capture loaders for gantry scanner PLY files.
//!
//! Each scan produces one ASCII PLY file per camera. The loader parses the
//! vertex element into raw coordinate vectors (millimeters, sensor frame)
//! and classifies which physical camera produced the file from its name.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors that can occur during capture loading.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid PLY file: {0}")]
    InvalidPly(String),

    #[error("Missing required property: {0}")]
    MissingProperty(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Which physical camera on the rig produced a capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraSide {
    East,
    West,
}

impl CameraSide {
    /// Classify a capture path by filename.
    ///
    /// A path containing the substring "west" (case-sensitive) is a west
    /// camera capture; anything else is east.
    pub fn from_path(path: &Path) -> Self {
        if path.to_string_lossy().contains("west") {
            CameraSide::West
        } else {
            CameraSide::East
        }
    }
}

/// One input file's raw point data, immutable once loaded.
///
/// Coordinates are in the rig's raw sensor units (millimeters). The three
/// vectors always have equal length.
#[derive(Debug, Clone)]
pub struct Capture {
    /// Source file path.
    pub path: PathBuf,
    /// Which camera produced this capture.
    pub side: CameraSide,
    /// Raw x coordinates in millimeters.
    pub x: Vec<f64>,
    /// Raw y coordinates in millimeters.
    pub y: Vec<f64>,
    /// Raw z coordinates in millimeters.
    pub z: Vec<f64>,
}

impl Capture {
    /// Build a capture from coordinate vectors, classifying the side from the path.
    pub fn from_xyz<P: Into<PathBuf>>(path: P, x: Vec<f64>, y: Vec<f64>, z: Vec<f64>) -> Self {
        let path = path.into();
        let side = CameraSide::from_path(&path);
        Self { path, side, x, y, z }
    }

    /// Returns the number of points in this capture.
    #[inline]
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// Returns true if the capture holds no points.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// Load a capture from an ASCII PLY file.
///
/// Supports PLY files with vertex elements containing x, y, z properties;
/// any additional properties are ignored. The camera side is classified
/// from the filename.
///
/// # Errors
///
/// Returns an error if the file is not a valid PLY, lacks a required
/// property, or contains unparseable vertex data.
pub fn load_capture<P: AsRef<Path>>(path: P) -> Result<Capture> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut lines = reader.lines();

    // Check PLY magic number
    let first_line = lines
        .next()
        .ok_or_else(|| LoaderError::InvalidPly("Empty file".to_string()))??;

    if !first_line.trim().starts_with("ply") {
        return Err(LoaderError::InvalidPly(format!(
            "{} is not a PLY file",
            path.display()
        )));
    }

    // Parse header
    let mut num_vertices: Option<usize> = None;
    let mut prop_names: Vec<String> = Vec::new();
    let mut header_done = false;

    for line in &mut lines {
        let line = line?;
        let stripped = line.trim();

        if stripped.starts_with("element vertex") {
            let parts: Vec<&str> = stripped.split_whitespace().collect();
            if let Some(count_str) = parts.last() {
                num_vertices = count_str.parse().ok();
            }
        } else if stripped.starts_with("property") {
            let parts: Vec<&str> = stripped.split_whitespace().collect();
            if let Some(name) = parts.last() {
                prop_names.push(name.to_string());
            }
        } else if stripped == "end_header" {
            header_done = true;
            break;
        }
    }

    let num_vertices = num_vertices
        .ok_or_else(|| LoaderError::InvalidPly("No vertex count in header".to_string()))?;

    if !header_done {
        return Err(LoaderError::InvalidPly("Missing end_header".to_string()));
    }

    // Build property index map
    let prop_idx: HashMap<&str, usize> = prop_names
        .iter()
        .enumerate()
        .map(|(i, name)| (name.as_str(), i))
        .collect();

    let x_idx = prop_idx
        .get("x")
        .copied()
        .ok_or_else(|| LoaderError::MissingProperty("x".to_string()))?;
    let y_idx = prop_idx
        .get("y")
        .copied()
        .ok_or_else(|| LoaderError::MissingProperty("y".to_string()))?;
    let z_idx = prop_idx
        .get("z")
        .copied()
        .ok_or_else(|| LoaderError::MissingProperty("z".to_string()))?;

    let mut x_vec = Vec::with_capacity(num_vertices);
    let mut y_vec = Vec::with_capacity(num_vertices);
    let mut z_vec = Vec::with_capacity(num_vertices);

    // Parse vertex data
    let mut vertex_count = 0;
    for line in lines {
        if vertex_count >= num_vertices {
            break;
        }

        let line = line?;
        let values: Vec<&str> = line.split_whitespace().collect();

        if values.len() < prop_names.len() {
            continue;
        }

        let x: f64 = values[x_idx]
            .parse()
            .map_err(|_| LoaderError::ParseError(format!("Invalid x value: {}", values[x_idx])))?;
        let y: f64 = values[y_idx]
            .parse()
            .map_err(|_| LoaderError::ParseError(format!("Invalid y value: {}", values[y_idx])))?;
        let z: f64 = values[z_idx]
            .parse()
            .map_err(|_| LoaderError::ParseError(format!("Invalid z value: {}", values[z_idx])))?;

        x_vec.push(x);
        y_vec.push(y);
        z_vec.push(z);

        vertex_count += 1;
    }

    if vertex_count < num_vertices {
        return Err(LoaderError::InvalidPly(format!(
            "Expected {} vertices, found {}",
            num_vertices, vertex_count
        )));
    }

    Ok(Capture {
        path: path.to_path_buf(),
        side: CameraSide::from_path(path),
        x: x_vec,
        y: y_vec,
        z: z_vec,
    })
}

/// Load every capture in a path list, in the order given.
pub fn load_captures<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<Capture>> {
    paths.iter().map(load_capture).collect()
}
