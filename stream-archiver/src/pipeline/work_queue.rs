//! Unbounded FIFO of files waiting for a pipeline stage.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tokio::sync::Notify;

/// A file queued for a stage. The queue does not own the file itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkItem {
    path: PathBuf,
}

impl WorkItem {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Display for WorkItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// Concurrency-safe FIFO shared by one watcher and many workers.
///
/// `put` never blocks, `get` waits until an item is available, and every
/// item is handed to exactly one caller of `get`.
#[derive(Debug, Default)]
pub struct WorkQueue {
    items: Mutex<VecDeque<WorkItem>>,
    /// Signalled whenever an item is pushed.
    available: Notify,
    /// Items put but not yet marked done.
    unfinished: AtomicUsize,
    /// Signalled when `unfinished` drops to zero.
    drained: Notify,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue an item. Safe to call from non-async contexts.
    pub fn put(&self, item: WorkItem) {
        self.unfinished.fetch_add(1, Ordering::SeqCst);
        self.items.lock().push_back(item);
        self.available.notify_one();
    }

    /// Remove an item without waiting.
    pub fn try_get(&self) -> Option<WorkItem> {
        self.items.lock().pop_front()
    }

    /// Wait for the next item.
    ///
    /// Cancel-safe: dropping the future never loses an item.
    pub async fn get(&self) -> WorkItem {
        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(item) = self.try_get() {
                return item;
            }
            notified.await;
        }
    }

    /// Record that a previously dequeued item has been handled.
    pub fn mark_done(&self) {
        let previous = self
            .unfinished
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if previous == Ok(1) {
            self.drained.notify_waiters();
        }
    }

    /// Wait until every item put so far has been marked done.
    pub async fn join(&self) {
        loop {
            let notified = self.drained.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.unfinished.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Items waiting to be dequeued.
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Items put but not yet marked done, including those being processed.
    pub fn unfinished(&self) -> usize {
        self.unfinished.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_fifo_order() {
        let queue = WorkQueue::new();
        queue.put(WorkItem::new("a.mp4"));
        queue.put(WorkItem::new("b.mp4"));
        queue.put(WorkItem::new("c.mp4"));

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.try_get().unwrap().path(), Path::new("a.mp4"));
        assert_eq!(queue.try_get().unwrap().path(), Path::new("b.mp4"));
        assert_eq!(queue.try_get().unwrap().path(), Path::new("c.mp4"));
        assert!(queue.try_get().is_none());
        assert!(queue.is_empty());
        assert_eq!(queue.unfinished(), 3);
    }

    #[tokio::test]
    async fn test_get_waits_for_put() {
        let queue = Arc::new(WorkQueue::new());
        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.get().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!consumer.is_finished());

        queue.put(WorkItem::new("late.mp4"));
        let item = consumer.await.unwrap();
        assert_eq!(item.path(), Path::new("late.mp4"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_each_item_delivered_once() {
        let queue = Arc::new(WorkQueue::new());
        let mut consumers = Vec::new();
        for _ in 0..4 {
            let queue = queue.clone();
            consumers.push(tokio::spawn(async move {
                let mut seen = Vec::new();
                for _ in 0..25 {
                    let item = queue.get().await;
                    seen.push(item);
                    queue.mark_done();
                }
                seen
            }));
        }

        for i in 0..100 {
            queue.put(WorkItem::new(format!("{i}.mp4")));
        }

        let mut all = Vec::new();
        for consumer in consumers {
            all.extend(consumer.await.unwrap());
        }
        let unique: HashSet<_> = all.iter().cloned().collect();
        assert_eq!(all.len(), 100);
        assert_eq!(unique.len(), 100);

        tokio::time::timeout(Duration::from_secs(1), queue.join())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_join_waits_for_mark_done() {
        let queue = Arc::new(WorkQueue::new());
        queue.put(WorkItem::new("a.mp4"));
        let _ = queue.try_get();

        let joiner = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.join().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!joiner.is_finished());

        queue.mark_done();
        tokio::time::timeout(Duration::from_secs(1), joiner)
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_mark_done_saturates() {
        let queue = WorkQueue::new();
        queue.mark_done();
        assert_eq!(queue.unfinished(), 0);
    }
}
