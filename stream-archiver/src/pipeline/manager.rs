//! Stage wiring: one watcher, one queue and one worker pool per stage.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use super::processors::Processor;
use super::watcher::{Classifier, DirectoryWatcher};
use super::work_queue::WorkQueue;
use super::worker_pool::WorkerPool;
use crate::Result;
use crate::config::{PostprocessConfig, UploadConfig};

/// Settings shared by every stage.
#[derive(Debug, Clone)]
pub struct StageConfig {
    /// Stage name used in logs.
    pub name: &'static str,
    pub watch_dir: PathBuf,
    pub extension: String,
    pub workers: usize,
    pub scan_existing: bool,
}

impl StageConfig {
    pub fn postprocess(config: &PostprocessConfig) -> Self {
        Self {
            name: "postprocess",
            watch_dir: config.watch_dir.clone(),
            extension: config.extension.clone(),
            workers: config.workers,
            scan_existing: config.scan_existing,
        }
    }

    pub fn upload(config: &UploadConfig) -> Self {
        Self {
            name: "upload",
            watch_dir: config.watch_dir.clone(),
            extension: config.extension.clone(),
            workers: config.workers,
            scan_existing: config.scan_existing,
        }
    }
}

/// Counters reported when a stage shuts down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageReport {
    pub processed: usize,
    pub failed: usize,
    /// Items still queued and never started.
    pub pending: usize,
}

/// A running stage.
pub struct PipelineStage {
    name: &'static str,
    queue: Arc<WorkQueue>,
    watcher: Option<DirectoryWatcher>,
    pool: WorkerPool,
}

impl PipelineStage {
    /// Start the workers, then the watcher, then the optional startup scan.
    pub async fn start(config: StageConfig, processor: Arc<dyn Processor>) -> Result<Self> {
        let queue = Arc::new(WorkQueue::new());

        let pool = WorkerPool::new(config.name, config.workers);
        pool.start(queue.clone(), processor);

        let watcher = match DirectoryWatcher::start(
            config.name,
            &config.watch_dir,
            Classifier::new(config.extension.clone()),
            queue.clone(),
        ) {
            Ok(watcher) => watcher,
            Err(e) => {
                pool.stop().await;
                return Err(e);
            }
        };

        if config.scan_existing
            && let Err(e) = watcher.scan_existing().await
        {
            drop(watcher);
            pool.stop().await;
            return Err(e);
        }

        info!(
            stage = config.name,
            dir = %config.watch_dir.display(),
            workers = config.workers,
            "Stage started"
        );

        Ok(Self {
            name: config.name,
            queue,
            watcher: Some(watcher),
            pool,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn queue(&self) -> &Arc<WorkQueue> {
        &self.queue
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Stop observing the directory. Already queued items are unaffected.
    pub fn stop_watching(&mut self) {
        if self.watcher.take().is_some() {
            info!(stage = self.name, "Stopped watching");
        }
    }

    /// Stop watching, then wait for in-flight items to finish.
    pub async fn shutdown(mut self) -> StageReport {
        self.stop_watching();
        self.pool.stop().await;

        let report = StageReport {
            processed: self.pool.processed(),
            failed: self.pool.failed(),
            pending: self.queue.len(),
        };
        info!(
            stage = self.name,
            processed = report.processed,
            failed = report.failed,
            pending = report.pending,
            "Stage stopped"
        );
        report
    }
}
