//! Output file naming for recordings.
//!
//! A recording is written as `{name}_{timestamp}.partial.{ext}` and renamed to
//! `{name}_{timestamp}.{ext}` once the capture process has exited. Watchers
//! rely on the marker to never pick up a file that is still being written.

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

/// Marker inserted before the extension while a file is being written.
pub const PARTIAL_MARKER: &str = "partial";

/// Every marker that flags an in-progress file, including the `.temp` naming
/// produced by older recorder setups and post-processing scripts.
pub const IN_PROGRESS_MARKERS: &[&str] = &[PARTIAL_MARKER, "temp"];

/// Timestamp tag format used in file names.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Working and final locations of one recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturePaths {
    /// Path the capture process writes to.
    pub working: PathBuf,
    /// Path the recording is renamed to after the process exits.
    pub finished: PathBuf,
}

impl CapturePaths {
    pub fn new(output_dir: &Path, name: &str, started_at: NaiveDateTime, extension: &str) -> Self {
        let stem = format!("{}_{}", name, started_at.format(TIMESTAMP_FORMAT));
        Self {
            working: output_dir.join(format!("{stem}.{PARTIAL_MARKER}.{extension}")),
            finished: output_dir.join(format!("{stem}.{extension}")),
        }
    }
}

/// Whether `path` carries an in-progress marker right before its extension.
pub fn has_in_progress_marker(path: &Path) -> bool {
    let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
        return false;
    };
    Path::new(stem)
        .extension()
        .and_then(|m| m.to_str())
        .is_some_and(|marker| {
            IN_PROGRESS_MARKERS
                .iter()
                .any(|known| marker.eq_ignore_ascii_case(known))
        })
}
