//! Point merger: per-camera geometric correction and concatenation.
//!
//! Each capture is corrected from raw sensor millimeters into the rig's
//! anchor frame, projected into UTM, and appended onto one merged point set
//! in input order. UTM bounds are tracked across captures regardless of
//! which frame the output points use, since downstream georeferencing
//! always works from the UTM extent.
//!
//! Per-capture correction is independent, so captures are corrected as a
//! parallel map; the concatenation and bounds combine stay deterministic
//! and order-preserving.

use std::path::PathBuf;

use rayon::prelude::*;
use thiserror::Error;

use crate::config::{RigConfig, MM_PER_METER};

use super::loaders::{CameraSide, Capture};
use super::projection::{GeoProjection, ProjectionError};

/// Errors that can occur while merging captures.
#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("no captures supplied")]
    NoCaptures,

    #[error("no points in any capture")]
    NoPoints,

    #[error("coordinate length mismatch in '{path}': x={x_len}, y={y_len}, z={z_len}")]
    LengthMismatch {
        path: PathBuf,
        x_len: usize,
        y_len: usize,
        z_len: usize,
    },

    #[error("scan_direction must be 0 or 1, got {0}")]
    InvalidScanDirection(i64),

    #[error("projection failed for '{path}': {source}")]
    Projection {
        path: PathBuf,
        #[source]
        source: ProjectionError,
    },
}

/// Result type for merge operations.
pub type Result<T> = std::result::Result<T, ConversionError>;

/// Travel direction of the gantry during a scan.
///
/// The two directions carry different fitted calibration trims; raw
/// metadata values other than 0 and 1 are rejected outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanDirection {
    /// Raw metadata value 0.
    Forward,
    /// Raw metadata value 1.
    Reverse,
}

impl TryFrom<i64> for ScanDirection {
    type Error = ConversionError;

    fn try_from(raw: i64) -> Result<Self> {
        match raw {
            0 => Ok(ScanDirection::Forward),
            1 => Ok(ScanDirection::Reverse),
            other => Err(ConversionError::InvalidScanDirection(other)),
        }
    }
}

/// Georeferenced anchor point for the whole rig, meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Origin {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Per-job scan parameters, read-only during merging.
#[derive(Debug, Clone, Copy)]
pub struct ScanContext {
    /// Distance traveled during the scan, meters.
    pub scan_distance_m: f64,
    /// Gantry travel direction.
    pub scan_direction: ScanDirection,
    /// Georeferenced anchor point of the rig.
    pub origin: Origin,
}

/// UTM-frame extent of a merged point set.
///
/// Fields are ordered y before x to match the output axis swap; callers
/// that serialize the extent must preserve that ordering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UtmBounds {
    pub min_y: f64,
    pub max_y: f64,
    pub min_x: f64,
    pub max_x: f64,
}

impl UtmBounds {
    /// Compute the extent of one capture's UTM coordinates.
    ///
    /// Returns `None` for an empty capture, which contributes nothing to
    /// the merged extent.
    pub fn from_points(utm_x: &[f64], utm_y: &[f64]) -> Option<Self> {
        let first_x = *utm_x.first()?;
        let first_y = *utm_y.first()?;

        let (min_x, max_x) = utm_x
            .iter()
            .fold((first_x, first_x), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        let (min_y, max_y) = utm_y
            .iter()
            .fold((first_y, first_y), |(lo, hi), &v| (lo.min(v), hi.max(v)));

        Some(Self {
            min_y,
            max_y,
            min_x,
            max_x,
        })
    }

    /// Widen this extent to cover another. Commutative and associative;
    /// never narrows.
    pub fn widen(&self, other: &Self) -> Self {
        Self {
            min_y: self.min_y.min(other.min_y),
            max_y: self.max_y.max(other.max_y),
            min_x: self.min_x.min(other.min_x),
            max_x: self.max_x.max(other.max_x),
        }
    }

    /// The extent as a (min_y, max_y, min_x, max_x) tuple.
    pub fn as_tuple(&self) -> (f64, f64, f64, f64) {
        (self.min_y, self.max_y, self.min_x, self.max_x)
    }

    /// True if the point lies inside this extent.
    pub fn contains(&self, utm_x: f64, utm_y: f64) -> bool {
        utm_x >= self.min_x && utm_x <= self.max_x && utm_y >= self.min_y && utm_y <= self.max_y
    }
}

/// Corrected points across all captures plus their UTM extent.
///
/// The three coordinate vectors always have equal length; point order is
/// capture order, then original point order within each capture. The set is
/// never mutated after `merge` returns it.
#[derive(Debug, Clone)]
pub struct MergedPointSet {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
    pub bounds: UtmBounds,
}

impl MergedPointSet {
    /// Returns the number of merged points.
    #[inline]
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// Returns true if no points were merged.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// Camera mounting offset for a side, meters.
fn camera_offset_m(rig: &RigConfig, side: CameraSide) -> [f64; 3] {
    match side {
        CameraSide::East => rig.east_offset_m,
        CameraSide::West => rig.west_offset_m,
    }
}

/// Fitted y trim for a (side, direction) pair, millimeters.
fn y_trim_mm(rig: &RigConfig, side: CameraSide, direction: ScanDirection) -> f64 {
    match (direction, side) {
        (ScanDirection::Forward, CameraSide::East) => rig.forward_east_trim_mm,
        (ScanDirection::Forward, CameraSide::West) => rig.forward_west_trim_mm,
        (ScanDirection::Reverse, CameraSide::East) => rig.reverse_east_trim_mm,
        (ScanDirection::Reverse, CameraSide::West) => rig.reverse_west_trim_mm,
    }
}

/// Anchor-frame y shift for a direction, meters.
fn anchor_shift_m(rig: &RigConfig, direction: ScanDirection) -> f64 {
    match direction {
        ScanDirection::Forward => rig.forward_anchor_shift_m,
        ScanDirection::Reverse => rig.reverse_anchor_shift_m,
    }
}

/// One capture's corrected output: the points selected for the merged set
/// plus the capture's UTM extent.
struct CorrectedCapture {
    x: Vec<f64>,
    y: Vec<f64>,
    z: Vec<f64>,
    bounds: Option<UtmBounds>,
}

/// Correct a single capture into the anchor frame and project it.
fn correct_capture<P: GeoProjection>(
    capture: &Capture,
    context: &ScanContext,
    rig: &RigConfig,
    projection: &P,
    georeferenced: bool,
) -> Result<CorrectedCapture> {
    let n = capture.x.len();
    if capture.y.len() != n || capture.z.len() != n {
        return Err(ConversionError::LengthMismatch {
            path: capture.path.clone(),
            x_len: capture.x.len(),
            y_len: capture.y.len(),
            z_len: capture.z.len(),
        });
    }

    let offset = camera_offset_m(rig, capture.side);
    let y_trim = y_trim_mm(rig, capture.side, context.scan_direction);
    let anchor_shift = anchor_shift_m(rig, context.scan_direction);
    let scan_distance_mm = context.scan_distance_m * MM_PER_METER;
    let origin = context.origin;

    let mut out_x = Vec::with_capacity(n);
    let mut out_y = Vec::with_capacity(n);
    let mut out_z = Vec::with_capacity(n);
    let mut utm_xs = Vec::with_capacity(n);
    let mut utm_ys = Vec::with_capacity(n);

    for i in 0..n {
        // Corrections in the millimeter domain
        let fixed_x = capture.x[i] + offset[0] * MM_PER_METER + rig.x_trim_mm;
        let fixed_y =
            capture.y[i] + 2.0 * offset[1] * MM_PER_METER - scan_distance_mm / 2.0 + y_trim;
        let fixed_z = capture.z[i] + offset[2] * MM_PER_METER;

        // Meter conversion into the anchor frame
        let anchor_x = fixed_x / MM_PER_METER + origin.x;
        let anchor_y = fixed_y / MM_PER_METER + origin.y / 2.0 + anchor_shift;
        let anchor_z = fixed_z / MM_PER_METER + origin.z;

        let (utm_x, utm_y) =
            projection
                .project(anchor_x, anchor_y)
                .map_err(|source| ConversionError::Projection {
                    path: capture.path.clone(),
                    source,
                })?;

        if georeferenced {
            out_x.push(utm_x);
            out_y.push(utm_y);
        } else {
            out_x.push(anchor_x);
            out_y.push(anchor_y);
        }
        out_z.push(anchor_z);

        utm_xs.push(utm_x);
        utm_ys.push(utm_y);
    }

    let bounds = UtmBounds::from_points(&utm_xs, &utm_ys);

    Ok(CorrectedCapture {
        x: out_x,
        y: out_y,
        z: out_z,
        bounds,
    })
}

/// Merge captures into one corrected point set.
///
/// Captures are corrected independently (in parallel), then concatenated in
/// input order while the UTM extents are folded with a widening combine.
/// When `georeferenced` is false, the merged points stay in the rig-relative
/// anchor frame; the extent is computed in the UTM frame either way.
///
/// # Errors
///
/// Fails without partial output if the capture list is empty, any capture's
/// coordinate vectors have mismatched lengths, or the projection rejects a
/// point. The offending capture's path is carried in the error.
pub fn merge<P: GeoProjection + Sync>(
    captures: &[Capture],
    context: &ScanContext,
    rig: &RigConfig,
    projection: &P,
    georeferenced: bool,
) -> Result<MergedPointSet> {
    if captures.is_empty() {
        return Err(ConversionError::NoCaptures);
    }

    let corrected: Vec<CorrectedCapture> = captures
        .par_iter()
        .map(|capture| correct_capture(capture, context, rig, projection, georeferenced))
        .collect::<Result<_>>()?;

    // Widening fold over per-capture extents
    let bounds = corrected
        .iter()
        .filter_map(|c| c.bounds)
        .reduce(|acc, b| acc.widen(&b))
        .ok_or(ConversionError::NoPoints)?;

    // Order-preserving concatenation: capture order, then point order
    let total: usize = corrected.iter().map(|c| c.x.len()).sum();
    let mut x = Vec::with_capacity(total);
    let mut y = Vec::with_capacity(total);
    let mut z = Vec::with_capacity(total);

    for part in corrected {
        x.extend(part.x);
        y.extend(part.y);
        z.extend(part.z);
    }

    Ok(MergedPointSet { x, y, z, bounds })
}
