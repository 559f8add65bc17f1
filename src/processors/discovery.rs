//! Capture discovery in a job's working folder.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Find PLY capture files in a directory, sorted by path.
///
/// Sorting keeps the merge order (and therefore the merged point order)
/// stable across runs.
pub fn find_captures(directory: &Path) -> io::Result<Vec<PathBuf>> {
    let mut captures: Vec<PathBuf> = fs::read_dir(directory)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .map(|ext| ext.eq_ignore_ascii_case("ply"))
                .unwrap_or(false)
        })
        .collect();

    captures.sort();
    Ok(captures)
}

/// Derive the merged LAS output path from the capture list.
///
/// The output sits next to the first capture, with the extension swapped.
pub fn las_output_path(captures: &[PathBuf]) -> Option<PathBuf> {
    captures.first().map(|first| first.with_extension("las"))
}
