//! File pipelines: a watched directory feeding a queue drained by workers.
//!
//! Two stages are built from this machinery. Post-processing watches the
//! capture output directory and runs a command on each recording; publishing
//! watches the post-processed directory and uploads each file.

pub mod manager;
pub mod processors;
pub mod watcher;
pub mod work_queue;
pub mod worker_pool;

pub use manager::{PipelineStage, StageConfig, StageReport};
pub use processors::{ExecuteCommandProcessor, Processor, ProcessorOutput, PublishProcessor};
pub use watcher::{Classification, Classifier, DirectoryWatcher, IgnoreReason};
pub use work_queue::{WorkItem, WorkQueue};
pub use worker_pool::{WorkerPool, WorkerPoolConfig};
