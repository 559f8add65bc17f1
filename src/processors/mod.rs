//! Job processing modules.

pub mod discovery;
pub mod job;

// Re-export key types for convenience
pub use discovery::{find_captures, las_output_path};
pub use job::{extract_scan_context, run_job, JobError, JobResult};
