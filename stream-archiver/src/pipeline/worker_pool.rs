//! Worker pool implementation for pipeline stages.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::FutureExt;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::processors::Processor;
use super::work_queue::WorkQueue;

/// Configuration for a worker pool.
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Number of workers pulling from the queue.
    pub workers: usize,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self { workers: 1 }
    }
}

#[derive(Debug, Default)]
struct PoolStats {
    processed: AtomicUsize,
    failed: AtomicUsize,
    active: AtomicUsize,
}

/// A fixed set of workers draining one [`WorkQueue`].
///
/// A failed item is logged and dropped; it never stops the worker that
/// handled it.
pub struct WorkerPool {
    /// Stage name used in logs.
    stage: &'static str,
    /// Configuration.
    config: WorkerPoolConfig,
    /// Counters shared with the workers.
    stats: Arc<PoolStats>,
    /// Cancellation token.
    cancellation_token: CancellationToken,
    /// Task set for workers.
    tasks: parking_lot::Mutex<Option<JoinSet<()>>>,
}

impl WorkerPool {
    /// Create a new worker pool.
    pub fn new(stage: &'static str, workers: usize) -> Self {
        Self::with_config(stage, WorkerPoolConfig { workers })
    }

    /// Create a new worker pool with custom configuration.
    pub fn with_config(stage: &'static str, config: WorkerPoolConfig) -> Self {
        Self {
            stage,
            config,
            stats: Arc::new(PoolStats::default()),
            cancellation_token: CancellationToken::new(),
            tasks: parking_lot::Mutex::new(Some(JoinSet::new())),
        }
    }

    /// Start the workers.
    pub fn start(&self, queue: Arc<WorkQueue>, processor: Arc<dyn Processor>) {
        let stage = self.stage;

        info!(
            "Starting {} worker pool with {} workers ({})",
            stage,
            self.config.workers,
            processor.name()
        );

        let mut tasks = self.tasks.lock();
        let Some(join_set) = tasks.as_mut() else {
            error!("{} worker pool already stopped, not starting workers", stage);
            return;
        };

        for i in 0..self.config.workers {
            let cancellation_token = self.cancellation_token.clone();
            let queue = queue.clone();
            let processor = processor.clone();
            let stats = self.stats.clone();

            join_set.spawn(async move {
                debug!("{} worker {} started", stage, i);

                loop {
                    // Cancellation is only observed between items; an item
                    // already dequeued always runs to completion.
                    let item = tokio::select! {
                        biased;
                        _ = cancellation_token.cancelled() => break,
                        item = queue.get() => item,
                    };

                    debug!("{} worker {} processing {}", stage, i, item);
                    stats.active.fetch_add(1, Ordering::SeqCst);

                    let result = AssertUnwindSafe(processor.process(&item))
                        .catch_unwind()
                        .await;

                    stats.active.fetch_sub(1, Ordering::SeqCst);
                    match result {
                        Ok(Ok(output)) => {
                            stats.processed.fetch_add(1, Ordering::SeqCst);
                            info!(
                                stage,
                                worker = i,
                                item = %item,
                                duration_secs = output.duration_secs,
                                "Item processed"
                            );
                        }
                        Ok(Err(e)) => {
                            stats.failed.fetch_add(1, Ordering::SeqCst);
                            error!(stage, worker = i, item = %item, error = %e, "Item failed");
                        }
                        Err(_) => {
                            stats.failed.fetch_add(1, Ordering::SeqCst);
                            error!(stage, worker = i, item = %item, "Processor panicked");
                        }
                    }
                    queue.mark_done();
                }

                debug!("{} worker {} shutting down", stage, i);
            });
        }
    }

    /// Stop the pool, waiting for items already being processed.
    pub async fn stop(&self) {
        info!("Stopping {} worker pool", self.stage);
        self.cancellation_token.cancel();

        // Take the join set out of the mutex before awaiting
        let join_set = {
            let mut tasks = self.tasks.lock();
            tasks.take()
        };

        if let Some(mut join_set) = join_set {
            while let Some(result) = join_set.join_next().await {
                if let Err(e) = result {
                    error!("{} worker task failed: {}", self.stage, e);
                }
            }
        }

        info!(
            processed = self.processed(),
            failed = self.failed(),
            "{} worker pool stopped",
            self.stage
        );
    }

    pub fn stage(&self) -> &'static str {
        self.stage
    }

    pub fn workers(&self) -> usize {
        self.config.workers
    }

    /// Items processed successfully.
    pub fn processed(&self) -> usize {
        self.stats.processed.load(Ordering::SeqCst)
    }

    /// Items whose processing failed.
    pub fn failed(&self) -> usize {
        self.stats.failed.load(Ordering::SeqCst)
    }

    /// Items currently being processed.
    pub fn active_count(&self) -> usize {
        self.stats.active.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        !self.cancellation_token.is_cancelled()
    }
}
