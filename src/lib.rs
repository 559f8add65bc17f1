//! Gantry scanner point cloud processing pipeline.
//!
//! This crate provides tools for:
//! - Loading per-camera PLY captures from a gantry-mounted scanning rig
//! - Applying per-camera geometric corrections (offset, scan direction,
//!   scan distance) to align all captures into one coordinate frame
//! - Projecting the aligned frame into UTM and merging everything into a
//!   single point set with running bounds
//! - Writing the merged set as a fixed-point LAS file
//!
//! # Example
//!
//! ```no_run
//! use gantry_pipeline::config::RigConfig;
//! use gantry_pipeline::core::loaders::load_capture;
//! use gantry_pipeline::core::merge::{merge, Origin, ScanContext, ScanDirection};
//! use gantry_pipeline::core::projection::AffineUtm;
//! use gantry_pipeline::core::writers::write_las;
//! use std::path::Path;
//!
//! let capture = load_capture(Path::new("scan_east.ply")).unwrap();
//! let context = ScanContext {
//!     scan_distance_m: 4.0,
//!     scan_direction: ScanDirection::Forward,
//!     origin: Origin { x: 10.0, y: 20.0, z: 5.0 },
//! };
//! let merged = merge(&[capture], &context, &RigConfig::default(), &AffineUtm::default(), true).unwrap();
//! write_las(Path::new("scan_east.las"), &merged, true).unwrap();
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;

pub use config::{OutputConfig, PipelineConfig, RigConfig};
pub use core::loaders::{CameraSide, Capture};
pub use core::merge::{MergedPointSet, Origin, ScanContext, ScanDirection, UtmBounds};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
