//! Core data types, corrections, and I/O operations.

pub mod loaders;
pub mod merge;
pub mod projection;
pub mod writers;

pub use loaders::{load_capture, load_captures, CameraSide, Capture, LoaderError};
pub use merge::{merge, ConversionError, MergedPointSet, ScanContext, UtmBounds};
pub use projection::{AffineUtm, GeoProjection, ProjectionError};
pub use writers::{compute_header_params, write_las, write_merged_csv, LasHeaderParams, WriteError};
