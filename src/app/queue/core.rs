//! Core work item queue implementation
//!
//! The queue is shared by every crawler and by the partition manager's refill
//! schedule. Draining (`poll`) and single inserts (`offer`) never touch the
//! refill lock; only bulk refills go through [`WorkItemQueue::lock`].

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::app::models::WorkItem;

use super::types::{QueueStats, WorkItemQueueConfig};

/// Thread-safe multi-producer multi-consumer queue of crawl targets
#[derive(Debug)]
pub struct WorkItemQueue {
    /// Configuration for queue behavior
    config: WorkItemQueueConfig,
    /// Queued items, FIFO
    items: Mutex<VecDeque<WorkItem>>,
    /// Wakes pollers when items arrive
    available: Notify,
    /// Serialises bulk refills
    refill_lock: tokio::sync::Mutex<()>,
    closed: AtomicBool,
    accepted: AtomicU64,
    rejected: AtomicU64,
    taken: AtomicU64,
    refills: AtomicU64,
}

impl WorkItemQueue {
    /// Create a queue with default configuration
    pub fn new() -> Self {
        Self::with_config(WorkItemQueueConfig::default())
    }

    /// Create a queue with custom configuration
    pub fn with_config(config: WorkItemQueueConfig) -> Self {
        Self {
            config,
            items: Mutex::new(VecDeque::new()),
            available: Notify::new(),
            refill_lock: tokio::sync::Mutex::new(()),
            closed: AtomicBool::new(false),
            accepted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            taken: AtomicU64::new(0),
            refills: AtomicU64::new(0),
        }
    }

    /// Wait up to `timeout` for an item
    ///
    /// Returns `None` when nothing arrived in time, or immediately when the
    /// queue is closed and empty. Callers simply poll again; `None` is never
    /// an error.
    pub async fn poll(&self, timeout: Duration) -> Option<WorkItem> {
        let deadline = Instant::now() + timeout;

        loop {
            // Register before checking: `close` wakes only registered waiters,
            // so a close that lands between the checks and the await would
            // otherwise go unseen until the timeout.
            let notified = self.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(item) = self.try_take() {
                return Some(item);
            }

            if self.is_closed() {
                return None;
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.try_take();
            }
        }
    }

    /// Non-blocking insert; `false` when the queue is full or closed
    pub fn offer(&self, item: WorkItem) -> bool {
        if self.is_closed() {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            debug!("Rejected work item {}: queue closed", item);
            return false;
        }

        {
            let mut items = self.items();
            if let Some(capacity) = self.config.limit() {
                if items.len() >= capacity {
                    drop(items);
                    self.rejected.fetch_add(1, Ordering::Relaxed);
                    debug!("Rejected work item {}: queue at capacity {}", item, capacity);
                    return false;
                }
            }
            items.push_back(item);
        }

        self.accepted.fetch_add(1, Ordering::Relaxed);
        self.available.notify_one();
        true
    }

    /// Acquire the refill lock
    ///
    /// The returned guard is the only way to bulk-insert. The lock is held
    /// until the guard is unlocked or dropped, so it is released on every exit
    /// path. Crawlers draining the queue are not blocked by it.
    pub async fn lock(&self) -> RefillGuard<'_> {
        let lock_start = std::time::Instant::now();
        let guard = self.refill_lock.lock().await;

        let waited = lock_start.elapsed();
        if waited > Duration::from_millis(10) {
            debug!("Refill lock contention detected: {:?} wait time", waited);
        }

        RefillGuard {
            queue: self,
            _guard: guard,
        }
    }

    /// Stop accepting items and wake every waiting poller
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            info!("Work item queue closed with {} item(s) queued", self.len());
            self.available.notify_waiters();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Number of queued items
    pub fn len(&self) -> usize {
        self.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Capacity limit, `None` when unbounded
    pub fn capacity(&self) -> Option<usize> {
        self.config.limit()
    }

    /// Get queue configuration
    pub fn config(&self) -> &WorkItemQueueConfig {
        &self.config
    }

    /// Get current queue statistics
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            queued: self.len(),
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            taken: self.taken.load(Ordering::Relaxed),
            refills: self.refills.load(Ordering::Relaxed),
        }
    }

    fn try_take(&self) -> Option<WorkItem> {
        let (item, more) = {
            let mut items = self.items();
            let item = items.pop_front();
            (item, !items.is_empty())
        };

        if item.is_some() {
            self.taken.fetch_add(1, Ordering::Relaxed);
            if more {
                // Pass the wakeup on so another waiting poller drains the rest.
                self.available.notify_one();
            }
        }
        item
    }

    fn items(&self) -> MutexGuard<'_, VecDeque<WorkItem>> {
        // Critical sections only push/pop, so a poisoned deque is still consistent.
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for WorkItemQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive refill scope over a [`WorkItemQueue`]
#[derive(Debug)]
pub struct RefillGuard<'a> {
    queue: &'a WorkItemQueue,
    _guard: tokio::sync::MutexGuard<'a, ()>,
}

impl RefillGuard<'_> {
    /// Bulk-insert items, returning how many were accepted
    ///
    /// Items beyond the queue's capacity are dropped. All accepted items are
    /// inserted in one critical section.
    pub fn add_all<I>(&mut self, items: I) -> usize
    where
        I: IntoIterator<Item = WorkItem>,
    {
        let queue = self.queue;
        if queue.is_closed() {
            debug!("Skipping refill: queue closed");
            return 0;
        }

        let limit = queue.config.limit();
        let (added, dropped) = {
            let mut queued = queue.items();
            let mut added = 0usize;
            let mut dropped = 0usize;
            for item in items {
                if limit.is_some_and(|capacity| queued.len() >= capacity) {
                    dropped += 1;
                    continue;
                }
                queued.push_back(item);
                added += 1;
            }
            (added, dropped)
        };

        queue.accepted.fetch_add(added as u64, Ordering::Relaxed);
        queue.rejected.fetch_add(dropped as u64, Ordering::Relaxed);
        queue.refills.fetch_add(1, Ordering::Relaxed);

        for _ in 0..added {
            queue.available.notify_one();
        }

        if dropped > 0 {
            debug!(
                "Refill added {} work item(s), dropped {} at capacity",
                added, dropped
            );
        } else {
            debug!("Refill added {} work item(s)", added);
        }
        added
    }

    /// Release the refill lock
    pub fn unlock(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use url::Url;

    fn item(n: usize) -> WorkItem {
        WorkItem::new(
            Url::parse(&format!("https://provider-{}.example/catalog", n)).unwrap(),
            "dsp",
        )
    }

    #[tokio::test]
    async fn test_offer_and_poll_fifo() {
        let queue = WorkItemQueue::with_config(WorkItemQueueConfig::unbounded());
        assert!(queue.offer(item(1)));
        assert!(queue.offer(item(2)));
        assert_eq!(queue.len(), 2);

        let first = queue.poll(Duration::from_millis(10)).await.unwrap();
        let second = queue.poll(Duration::from_millis(10)).await.unwrap();
        assert_eq!(first, item(1));
        assert_eq!(second, item(2));
        assert!(queue.is_empty());

        let stats = queue.stats();
        assert_eq!(stats.accepted, 2);
        assert_eq!(stats.taken, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_times_out_on_empty_queue() {
        let queue = WorkItemQueue::new();
        let start = Instant::now();
        assert!(queue.poll(Duration::from_millis(250)).await.is_none());
        assert!(start.elapsed() >= Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_pending_poll_is_woken_by_offer() {
        let queue = WorkItemQueue::new();
        let mut poll = tokio_test::task::spawn(queue.poll(Duration::from_secs(60)));
        tokio_test::assert_pending!(poll.poll());

        assert!(queue.offer(item(7)));
        assert!(poll.is_woken());
        assert_eq!(tokio_test::assert_ready!(poll.poll()), Some(item(7)));
    }

    #[tokio::test]
    async fn test_pending_poll_is_woken_by_close() {
        let queue = WorkItemQueue::new();
        let mut poll = tokio_test::task::spawn(queue.poll(Duration::from_secs(3600)));
        tokio_test::assert_pending!(poll.poll());

        queue.close();
        assert!(poll.is_woken());
        assert_eq!(tokio_test::assert_ready!(poll.poll()), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_close_racing_pollers_never_waits_out_timeout() {
        for _ in 0..200 {
            let queue = Arc::new(WorkItemQueue::new());
            let pollers: Vec<_> = (0..4)
                .map(|_| {
                    let queue = Arc::clone(&queue);
                    tokio::spawn(async move { queue.poll(Duration::from_secs(3600)).await })
                })
                .collect();

            tokio::task::yield_now().await;
            queue.close();

            for poller in pollers {
                let polled = tokio::time::timeout(Duration::from_secs(5), poller)
                    .await
                    .expect("close must wake every poller")
                    .unwrap();
                assert!(polled.is_none());
            }
        }
    }

    #[tokio::test]
    async fn test_offer_rejected_at_capacity() {
        let queue = WorkItemQueue::with_config(WorkItemQueueConfig::bounded(2));
        assert!(queue.offer(item(1)));
        assert!(queue.offer(item(2)));
        assert!(!queue.offer(item(3)));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.stats().rejected, 1);
    }

    #[tokio::test]
    async fn test_closed_queue_rejects_and_drains() {
        let queue = WorkItemQueue::new();
        assert!(queue.offer(item(1)));
        queue.close();

        assert!(!queue.offer(item(2)));
        assert_eq!(queue.poll(Duration::from_secs(5)).await, Some(item(1)));
        // Closed and empty returns immediately rather than waiting out the timeout.
        assert!(queue.poll(Duration::from_secs(3600)).await.is_none());
    }

    #[tokio::test]
    async fn test_poll_wakes_on_offer() {
        let queue = Arc::new(WorkItemQueue::new());
        let poller = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.poll(Duration::from_secs(5)).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(queue.offer(item(7)));

        let polled = poller.await.unwrap();
        assert_eq!(polled, Some(item(7)));
    }

    #[tokio::test]
    async fn test_refill_respects_capacity() {
        let queue = WorkItemQueue::with_config(WorkItemQueueConfig::bounded(3));
        assert!(queue.offer(item(0)));

        let mut guard = queue.lock().await;
        let added = guard.add_all((1..=5).map(item));
        guard.unlock();

        assert_eq!(added, 2);
        assert_eq!(queue.len(), 3);
        let stats = queue.stats();
        assert_eq!(stats.refills, 1);
        assert_eq!(stats.rejected, 3);
    }

    #[tokio::test]
    async fn test_refill_lock_is_exclusive() {
        let queue = Arc::new(WorkItemQueue::new());
        let guard = queue.lock().await;

        let contender = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move {
                tokio::time::timeout(Duration::from_millis(50), queue.lock())
                    .await
                    .is_ok()
            })
        };
        assert!(!contender.await.unwrap(), "second refill must wait");

        // Draining does not need the refill lock.
        assert!(queue.offer(item(1)));
        assert!(queue.poll(Duration::from_millis(10)).await.is_some());

        drop(guard);
        let mut again = queue.lock().await;
        assert_eq!(again.add_all(vec![item(2)]), 1);
    }

    #[tokio::test]
    async fn test_refill_lock_released_on_early_exit() {
        async fn failing_refill(queue: &WorkItemQueue) -> Result<(), &'static str> {
            let mut guard = queue.lock().await;
            guard.add_all(vec![item(1)]);
            Err("refill aborted")
        }

        let queue = WorkItemQueue::new();
        assert!(failing_refill(&queue).await.is_err());
        let reacquired = tokio::time::timeout(Duration::from_millis(50), queue.lock()).await;
        assert!(reacquired.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_producers_and_consumers() {
        let queue = Arc::new(WorkItemQueue::with_config(WorkItemQueueConfig::unbounded()));
        let producers: Vec<_> = (0..4)
            .map(|p| {
                let queue = Arc::clone(&queue);
                tokio::spawn(async move {
                    for n in 0..25 {
                        assert!(queue.offer(item(p * 100 + n)));
                    }
                })
            })
            .collect();

        let consumers: Vec<_> = (0..3)
            .map(|_| {
                let queue = Arc::clone(&queue);
                tokio::spawn(async move {
                    let mut taken = 0usize;
                    while queue.poll(Duration::from_millis(100)).await.is_some() {
                        taken += 1;
                    }
                    taken
                })
            })
            .collect();

        for producer in producers {
            producer.await.unwrap();
        }
        let mut total = 0;
        for consumer in consumers {
            total += consumer.await.unwrap();
        }

        assert_eq!(total, 100);
        assert_eq!(queue.stats().taken, 100);
    }
}
