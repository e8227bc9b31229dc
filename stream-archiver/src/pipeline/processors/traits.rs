//! Processor trait and related types.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::Result;
use crate::pipeline::work_queue::WorkItem;

/// Outcome of a successful processor invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessorOutput {
    /// Processing duration in seconds.
    pub duration_secs: f64,
    /// Files produced by the processor, if it knows them.
    pub outputs: Vec<PathBuf>,
    /// Platform identifier of a published item.
    pub remote_id: Option<String>,
}

/// Stage-specific action run by a worker on one file at a time.
///
/// Failures are returned, never panicked; the worker pool logs them and moves
/// on to the next item.
#[async_trait]
pub trait Processor: Send + Sync {
    /// Process one item.
    async fn process(&self, item: &WorkItem) -> Result<ProcessorOutput>;

    /// Get the processor name.
    fn name(&self) -> &'static str;
}
