//! Stage behavior through the public API: watcher, queue and worker pool.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use stream_archiver::pipeline::{
    Classifier, DirectoryWatcher, PipelineStage, Processor, ProcessorOutput, StageConfig,
    WorkItem, WorkQueue, WorkerPool,
};
use stream_archiver::{Error, Result};
use tempfile::TempDir;

/// Records every item it sees; fails items whose name contains "broken".
#[derive(Default)]
struct RecordingProcessor {
    seen: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl Processor for RecordingProcessor {
    fn name(&self) -> &'static str {
        "RecordingProcessor"
    }

    async fn process(&self, item: &WorkItem) -> Result<ProcessorOutput> {
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.seen.lock().push(item.path().to_path_buf());
        if item.to_string().contains("broken") {
            return Err(Error::Other("corrupt recording".to_string()));
        }
        Ok(ProcessorOutput::default())
    }
}

async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_each_item_processed_exactly_once() {
    let queue = Arc::new(WorkQueue::new());
    let processor = Arc::new(RecordingProcessor::default());
    let pool = WorkerPool::new("test", 4);
    pool.start(queue.clone(), processor.clone());

    for i in 0..40 {
        queue.put(WorkItem::new(format!("lecture_{i:02}.mp4")));
    }
    tokio::time::timeout(Duration::from_secs(10), queue.join())
        .await
        .unwrap();
    pool.stop().await;

    let mut seen = processor.seen.lock().clone();
    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), 40);
    assert_eq!(processor.seen.lock().len(), 40);
    assert_eq!(pool.processed(), 40);
}

#[tokio::test]
async fn test_failed_item_does_not_block_later_items() {
    let queue = Arc::new(WorkQueue::new());
    let processor = Arc::new(RecordingProcessor::default());
    let pool = WorkerPool::new("test", 1);
    pool.start(queue.clone(), processor.clone());

    queue.put(WorkItem::new("broken.mp4"));
    queue.put(WorkItem::new("fine.mp4"));
    tokio::time::timeout(Duration::from_secs(5), queue.join())
        .await
        .unwrap();
    pool.stop().await;

    assert_eq!(
        *processor.seen.lock(),
        vec![PathBuf::from("broken.mp4"), PathBuf::from("fine.mp4")]
    );
    assert_eq!(pool.failed(), 1);
    assert_eq!(pool.processed(), 1);
}

#[tokio::test]
async fn test_watcher_enqueues_only_finished_files() {
    let temp_dir = TempDir::new().unwrap();
    let queue = Arc::new(WorkQueue::new());
    let _watcher = DirectoryWatcher::start(
        "test",
        temp_dir.path(),
        Classifier::new("mp4"),
        queue.clone(),
    )
    .unwrap();

    let partial = temp_dir.path().join("pv179_2024-01-02_14-00-00.partial.mp4");
    let finished = temp_dir.path().join("pv179_2024-01-02_14-00-00.mp4");
    std::fs::write(&partial, b"frames").unwrap();
    std::fs::write(temp_dir.path().join("notes.txt"), b"text").unwrap();
    std::fs::create_dir(temp_dir.path().join("folder.mp4")).unwrap();
    std::fs::rename(&partial, &finished).unwrap();

    assert!(wait_until(Duration::from_secs(5), || queue.unfinished() >= 1).await);
    // Give any duplicate or late events a chance to arrive.
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(queue.unfinished(), 1);
    let item = queue.try_get().unwrap();
    assert_eq!(item.path().file_name(), finished.file_name());
}

#[tokio::test]
async fn test_stage_processes_files_dropped_into_directory() {
    let temp_dir = TempDir::new().unwrap();
    let watch_dir = temp_dir.path().join("postprocessing");
    let processor = Arc::new(RecordingProcessor::default());

    let stage = PipelineStage::start(
        StageConfig {
            name: "upload",
            watch_dir: watch_dir.clone(),
            extension: "mp4".to_string(),
            workers: 2,
            scan_existing: false,
        },
        processor.clone(),
    )
    .await
    .unwrap();

    for name in ["lecture_a.mp4", "lecture_b.mp4", "misc.mp4"] {
        let working = watch_dir.join(format!("{name}.temp"));
        std::fs::write(&working, b"x").unwrap();
        std::fs::rename(&working, watch_dir.join(name)).unwrap();
    }

    assert!(wait_until(Duration::from_secs(5), || processor.seen.lock().len() >= 3).await);
    let report = stage.shutdown().await;
    assert_eq!(report.processed, 3);
    assert_eq!(report.failed, 0);
    assert_eq!(report.pending, 0);

    let names: Vec<_> = processor
        .seen
        .lock()
        .iter()
        .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect();
    assert!(names.iter().all(|n| !n.ends_with(".temp")));
}

#[tokio::test]
async fn test_stage_scans_existing_files() {
    let temp_dir = TempDir::new().unwrap();
    let watch_dir = temp_dir.path();
    for name in ["a.mp4", "b.partial.mp4", "c.mp4"] {
        std::fs::write(watch_dir.join(name), b"x").unwrap();
    }
    let processor = Arc::new(RecordingProcessor::default());

    let stage = PipelineStage::start(
        StageConfig {
            name: "postprocess",
            watch_dir: watch_dir.to_path_buf(),
            extension: "mp4".to_string(),
            workers: 1,
            scan_existing: true,
        },
        processor.clone(),
    )
    .await
    .unwrap();

    tokio::time::timeout(Duration::from_secs(5), stage.queue().join())
        .await
        .unwrap();
    stage.shutdown().await;

    let seen = processor.seen.lock();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0], watch_dir.join("a.mp4"));
    assert_eq!(seen[1], Path::new(watch_dir).join("c.mp4"));
}
