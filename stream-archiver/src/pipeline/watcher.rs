//! Directory watcher feeding a stage's work queue.
//!
//! Only completed files are accepted: a file whose name still carries an
//! in-progress marker is ignored, and the capture supervisor renames a
//! recording to its final name only after the capture process has exited.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, error, info, trace};

use super::work_queue::{WorkItem, WorkQueue};
use crate::Result;
use crate::capture::has_in_progress_marker;
use crate::utils::fs::{ensure_dir_all_sync_with_op, list_files_sorted};

/// Why a path was not enqueued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    Directory,
    Extension,
    InProgress,
}

/// Outcome of classifying an observed path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Ready,
    Ignore(IgnoreReason),
}

/// Decides whether an observed path is ready for a stage.
#[derive(Debug, Clone)]
pub struct Classifier {
    extension: String,
}

impl Classifier {
    /// `extension` is matched without the leading dot, ignoring case.
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
        }
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Classify by name only; the filesystem is not consulted.
    pub fn classify(&self, path: &Path) -> Classification {
        let extension_matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(&self.extension));
        if !extension_matches {
            return Classification::Ignore(IgnoreReason::Extension);
        }
        if has_in_progress_marker(path) {
            return Classification::Ignore(IgnoreReason::InProgress);
        }
        Classification::Ready
    }
}

/// Extract the paths of an event worth classifying.
///
/// Creations yield their path, renames only their destination. A rename
/// reported with both halves is skipped since the destination is also
/// reported on its own.
fn candidate_paths(event: &Event) -> Vec<&Path> {
    match event.kind {
        EventKind::Create(CreateKind::Folder) => Vec::new(),
        EventKind::Create(_) => event.paths.iter().map(PathBuf::as_path).collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            event.paths.iter().map(PathBuf::as_path).collect()
        }
        // Backends that cannot tell the two halves apart report both; the
        // source half no longer exists.
        EventKind::Modify(ModifyKind::Name(RenameMode::Any)) => event
            .paths
            .iter()
            .map(PathBuf::as_path)
            .filter(|p| p.is_file())
            .collect(),
        _ => Vec::new(),
    }
}

/// Classify an event path by name, checking the disk only for ready names.
fn classify_event(classifier: &Classifier, path: &Path) -> Classification {
    match classifier.classify(path) {
        Classification::Ready if path.is_dir() => Classification::Ignore(IgnoreReason::Directory),
        classification => classification,
    }
}

/// Classify `path` and enqueue it when ready. Returns whether it was enqueued.
fn route(stage: &str, classifier: &Classifier, queue: &WorkQueue, path: &Path) -> bool {
    match classify_event(classifier, path) {
        Classification::Ready => {
            info!(stage, path = %path.display(), "File accepted");
            queue.put(WorkItem::new(path));
            true
        }
        Classification::Ignore(IgnoreReason::InProgress) => {
            debug!(stage, path = %path.display(), "Ignoring in-progress file");
            false
        }
        Classification::Ignore(reason) => {
            trace!(stage, path = %path.display(), ?reason, "Ignoring path");
            false
        }
    }
}

/// Watches one directory (non-recursively) for the lifetime of the value.
///
/// Dropping the watcher stops event delivery.
pub struct DirectoryWatcher {
    stage: &'static str,
    dir: PathBuf,
    classifier: Classifier,
    queue: Arc<WorkQueue>,
    _watcher: RecommendedWatcher,
}

impl DirectoryWatcher {
    /// Start watching `dir`, creating it if needed.
    pub fn start(
        stage: &'static str,
        dir: impl Into<PathBuf>,
        classifier: Classifier,
        queue: Arc<WorkQueue>,
    ) -> Result<Self> {
        let dir = dir.into();
        ensure_dir_all_sync_with_op("creating watch directory", &dir)?;

        let handler_classifier = classifier.clone();
        let handler_queue = queue.clone();
        let mut watcher =
            notify::recommended_watcher(move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    for path in candidate_paths(&event) {
                        route(stage, &handler_classifier, &handler_queue, path);
                    }
                }
                Err(e) => error!(stage, error = %e, "Watch error"),
            })?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        info!(
            stage,
            dir = %dir.display(),
            extension = %classifier.extension(),
            "Watching directory"
        );

        Ok(Self {
            stage,
            dir,
            classifier,
            queue,
            _watcher: watcher,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Enqueue ready files already present in the directory, in name order.
    ///
    /// Returns the number of files enqueued.
    pub async fn scan_existing(&self) -> Result<usize> {
        let mut enqueued = 0;
        for path in list_files_sorted(&self.dir).await? {
            if route(self.stage, &self.classifier, &self.queue, &path) {
                enqueued += 1;
            }
        }
        info!(stage = self.stage, count = enqueued, "Enqueued existing files");
        Ok(enqueued)
    }
}

impl Drop for DirectoryWatcher {
    fn drop(&mut self) {
        debug!(stage = self.stage, dir = %self.dir.display(), "Watcher stopped");
    }
}
