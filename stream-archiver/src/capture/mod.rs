//! Recording of scheduled streams by an external capture program.

mod naming;
mod supervisor;

pub use naming::{
    CapturePaths, IN_PROGRESS_MARKERS, PARTIAL_MARKER, TIMESTAMP_FORMAT, has_in_progress_marker,
};
pub use supervisor::{CaptureJob, CaptureRequest, ProcessSupervisor, SupervisorConfig};
