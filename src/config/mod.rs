//! Configuration types for the gantry pipeline.
//!
//! All rig calibration constants live in [`RigConfig`] so the correction
//! formulas never reach for scattered literals. The defaults reproduce the
//! fitted values for the production gantry; any rig-hardware change requires
//! re-deriving them, not adjusting the algorithm.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Millimeters per meter, the unit conversion between raw sensor
/// coordinates and the rig/georeferenced frames.
pub const MM_PER_METER: f64 = 1000.0;

/// Per-camera and per-direction calibration table for the scanning rig.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RigConfig {
    /// East camera mounting offset (x, y, z) in meters.
    #[serde(default = "default_east_offset_m")]
    pub east_offset_m: [f64; 3],

    /// West camera mounting offset (x, y, z) in meters.
    #[serde(default = "default_west_offset_m")]
    pub west_offset_m: [f64; 3],

    /// Fixed x-axis rig calibration shift in millimeters.
    #[serde(default = "default_x_trim_mm")]
    pub x_trim_mm: f64,

    /// Y trim for the east camera during a forward (direction 0) scan, mm.
    #[serde(default = "default_forward_east_trim_mm")]
    pub forward_east_trim_mm: f64,

    /// Y trim for the west camera during a forward (direction 0) scan, mm.
    #[serde(default = "default_forward_west_trim_mm")]
    pub forward_west_trim_mm: f64,

    /// Y trim for the east camera during a reverse (direction 1) scan, mm.
    #[serde(default = "default_reverse_east_trim_mm")]
    pub reverse_east_trim_mm: f64,

    /// Y trim for the west camera during a reverse (direction 1) scan, mm.
    #[serde(default = "default_reverse_west_trim_mm")]
    pub reverse_west_trim_mm: f64,

    /// Anchor-frame y shift for forward scans, meters.
    #[serde(default = "default_forward_anchor_shift_m")]
    pub forward_anchor_shift_m: f64,

    /// Anchor-frame y shift for reverse scans, meters.
    #[serde(default = "default_reverse_anchor_shift_m")]
    pub reverse_anchor_shift_m: f64,
}

fn default_east_offset_m() -> [f64; 3] {
    [2.070, 0.306, 1.135]
}

fn default_west_offset_m() -> [f64; 3] {
    [2.070, 2.726, 1.135]
}

fn default_x_trim_mm() -> f64 {
    82.0
}

fn default_forward_east_trim_mm() -> f64 {
    -354.0
}

fn default_forward_west_trim_mm() -> f64 {
    -4363.0
}

fn default_reverse_east_trim_mm() -> f64 {
    4200.0
}

fn default_reverse_west_trim_mm() -> f64 {
    -3430.0
}

fn default_forward_anchor_shift_m() -> f64 {
    -0.1
}

fn default_reverse_anchor_shift_m() -> f64 {
    0.4
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            east_offset_m: default_east_offset_m(),
            west_offset_m: default_west_offset_m(),
            x_trim_mm: default_x_trim_mm(),
            forward_east_trim_mm: default_forward_east_trim_mm(),
            forward_west_trim_mm: default_forward_west_trim_mm(),
            reverse_east_trim_mm: default_reverse_east_trim_mm(),
            reverse_west_trim_mm: default_reverse_west_trim_mm(),
            forward_anchor_shift_m: default_forward_anchor_shift_m(),
            reverse_anchor_shift_m: default_reverse_anchor_shift_m(),
        }
    }
}

/// Configuration for output generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Emit georeferenced (UTM) coordinates rather than rig-relative ones.
    #[serde(default = "default_georeferenced")]
    pub georeferenced: bool,
}

fn default_georeferenced() -> bool {
    true
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            georeferenced: default_georeferenced(),
        }
    }
}

/// Main pipeline configuration combining all sub-configs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub rig: RigConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

impl PipelineConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rig_config() {
        let config = RigConfig::default();
        assert_eq!(config.east_offset_m, [2.070, 0.306, 1.135]);
        assert_eq!(config.west_offset_m, [2.070, 2.726, 1.135]);
        assert_eq!(config.x_trim_mm, 82.0);
        assert_eq!(config.forward_east_trim_mm, -354.0);
        assert_eq!(config.reverse_west_trim_mm, -3430.0);
    }

    #[test]
    fn test_default_pipeline_config() {
        let config = PipelineConfig::default();
        assert!(config.output.georeferenced);
        assert_eq!(config.rig.forward_anchor_shift_m, -0.1);
        assert_eq!(config.rig.reverse_anchor_shift_m, 0.4);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let config: PipelineConfig =
            serde_yaml::from_str("rig:\n  x_trim_mm: 100.0\n").unwrap();
        assert_eq!(config.rig.x_trim_mm, 100.0);
        assert_eq!(config.rig.east_offset_m, [2.070, 0.306, 1.135]);
    }
}
