//! Partition manager: owns the crawler pool and the refill schedule

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::config::PartitionConfig;
use super::plan::{collate_updates, ExecutionPlan};
use super::pool::CrawlerPool;
use crate::app::crawler::{CrawlStats, CrawlSummary, Crawler};
use crate::app::models::WorkItem;
use crate::app::monitor::{Monitor, TracingMonitor};
use crate::app::queue::WorkItemQueue;
use crate::constants::partition;
use crate::errors::{PartitionError, PartitionResult};

/// Builds a fresh crawler bound to the given queue
pub type CrawlerGenerator = Arc<dyn Fn(Arc<WorkItemQueue>) -> Crawler + Send + Sync>;

/// The currently scheduled plan and its running task
struct ScheduledPlan {
    plan: ExecutionPlan,
    handle: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

impl ScheduledPlan {
    /// Ask the schedule task to exit after any refill in progress
    fn cancel(&self) {
        self.shutdown.send_replace(true);
    }
}

/// Runs a pool of crawlers over a shared queue and keeps that queue refilled
/// with a static workload
pub struct PartitionManager {
    queue: Arc<WorkItemQueue>,
    generator: CrawlerGenerator,
    crawler_count: usize,
    /// Items added to the queue on every tick, never modified
    workload: Arc<[WorkItem]>,
    join_timeout: Duration,
    shutdown_timeout: Duration,
    /// Submitted plan updates, collapsed to the latest after each collation
    pending: Mutex<Vec<ExecutionPlan>>,
    schedule: Mutex<Option<ScheduledPlan>>,
    pool: tokio::sync::Mutex<Option<CrawlerPool>>,
    stats: Arc<CrawlStats>,
    monitor: Arc<dyn Monitor>,
}

impl PartitionManager {
    /// Create a manager
    ///
    /// `crawler_count` is advisory: it is clamped to between one and
    /// [`partition::MAX_CRAWLER_COUNT`] crawlers.
    pub fn new<G>(
        queue: Arc<WorkItemQueue>,
        generator: G,
        crawler_count: usize,
        workload: Vec<WorkItem>,
    ) -> Self
    where
        G: Fn(Arc<WorkItemQueue>) -> Crawler + Send + Sync + 'static,
    {
        let clamped = crawler_count.clamp(1, partition::MAX_CRAWLER_COUNT);
        if clamped != crawler_count {
            warn!(
                "Requested {} crawlers, using {} (allowed range 1..={})",
                crawler_count,
                clamped,
                partition::MAX_CRAWLER_COUNT
            );
        }

        Self {
            queue,
            generator: Arc::new(generator),
            crawler_count: clamped,
            workload: workload.into(),
            join_timeout: partition::JOIN_TIMEOUT,
            shutdown_timeout: partition::SHUTDOWN_TIMEOUT,
            pending: Mutex::new(Vec::new()),
            schedule: Mutex::new(None),
            pool: tokio::sync::Mutex::new(None),
            stats: Arc::new(CrawlStats::new()),
            monitor: Arc::new(TracingMonitor),
        }
    }

    /// Create a manager using the crawler count and timeouts of `config`
    pub fn from_config<G>(
        queue: Arc<WorkItemQueue>,
        generator: G,
        config: &PartitionConfig,
        workload: Vec<WorkItem>,
    ) -> Self
    where
        G: Fn(Arc<WorkItemQueue>) -> Crawler + Send + Sync + 'static,
    {
        Self::new(queue, generator, config.crawler_count, workload)
            .with_join_timeout(config.join_timeout)
            .with_shutdown_timeout(config.shutdown_timeout)
    }

    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = timeout;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn with_monitor(mut self, monitor: Arc<dyn Monitor>) -> Self {
        self.monitor = monitor;
        self
    }

    /// Build the crawlers and start running them
    pub async fn start(&self) -> PartitionResult<()> {
        let mut slot = self.pool.lock().await;
        if let Some(pool) = slot.as_ref() {
            return Err(PartitionError::InvalidState {
                operation: "start".to_string(),
                state: pool.state().to_string(),
            });
        }

        *slot = Some(self.spawn_pool()?);
        Ok(())
    }

    /// Replace the crawler pool
    ///
    /// The old pool stops taking new cycles and gets `shutdown_timeout` to
    /// finish the ones in flight; stragglers are aborted and reported. A fresh
    /// pool is then started from the generator.
    pub async fn restart(&self) -> PartitionResult<()> {
        let mut slot = self.pool.lock().await;

        if let Some(mut old) = slot.take() {
            info!("Restarting crawler pool");
            if let Err(e) = old.shutdown(self.shutdown_timeout).await {
                self.monitor
                    .severe("Crawlers did not stop in time during restart", Some(&e));
            }
        }

        *slot = Some(self.spawn_pool()?);
        Ok(())
    }

    /// Refill the queue with the static workload on every tick of `plan`
    ///
    /// Replaces any previously scheduled plan. Must be called from within a
    /// Tokio runtime.
    pub fn schedule(&self, plan: ExecutionPlan) {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let queue = Arc::clone(&self.queue);
        let workload = Arc::clone(&self.workload);
        let monitor = Arc::clone(&self.monitor);

        let handle = plan.run(shutdown_rx, move || {
            let queue = Arc::clone(&queue);
            let workload = Arc::clone(&workload);
            let monitor = Arc::clone(&monitor);
            async move {
                monitor.debug("partition manager: execute plan - waiting for queue lock");
                let mut guard = queue.lock().await;
                monitor.debug(&format!(
                    "partition manager: execute plan - adding workload {}",
                    workload.len()
                ));
                guard.add_all(workload.iter().cloned());
                monitor.debug("partition manager: execute plan - releasing queue lock");
                guard.unlock();
            }
        });

        info!(
            "Scheduled workload refill every {:?} ({} items)",
            plan.period(),
            self.workload.len()
        );

        let previous = self.scheduled_slot().replace(ScheduledPlan {
            plan,
            handle,
            shutdown,
        });
        if let Some(previous) = previous {
            debug!("Replacing execution plan {}", previous.plan.sequence());
            previous.cancel();
        }
    }

    /// Plan currently driving refills
    pub fn scheduled_plan(&self) -> Option<ExecutionPlan> {
        self.scheduled_slot().as_ref().map(|scheduled| scheduled.plan.clone())
    }

    /// Submit a plan update and return the collated plan
    ///
    /// Waits up to the join timeout for every crawler to finish its current
    /// cycle before collating; a timeout is reported but does not fail.
    /// Callers that overlap in the wait all return the same collated plan.
    pub async fn update(&self, plan: ExecutionPlan) -> ExecutionPlan {
        self.pending().push(plan.clone());

        if !self.wait_for_crawlers(self.join_timeout).await {
            self.monitor
                .severe("Warning: not all crawlers finished in time!", None);
        }

        let mut pending = self.pending();
        let collated = collate_updates(pending.drain(..)).unwrap_or(plan);
        pending.push(collated.clone());
        collated
    }

    /// Collation of every submitted update, `None` if none was submitted
    pub fn pending_plan(&self) -> Option<ExecutionPlan> {
        collate_updates(self.pending().iter().cloned())
    }

    /// Stop the schedule and the crawlers
    ///
    /// Crawlers get `shutdown_timeout` to finish the cycle they are in.
    pub async fn stop(&self) -> PartitionResult<()> {
        let scheduled = self.scheduled_slot().take();
        if let Some(scheduled) = scheduled {
            scheduled.cancel();
            let mut handle = scheduled.handle;
            if tokio::time::timeout(self.shutdown_timeout, &mut handle)
                .await
                .is_err()
            {
                handle.abort();
                warn!("Refill schedule did not stop in time, aborted");
            }
        }

        let pool = self.pool.lock().await.take();
        let Some(mut pool) = pool else {
            return Ok(());
        };

        let result = pool.shutdown(self.shutdown_timeout).await;
        if let Err(e) = &result {
            self.monitor.severe("Not all crawlers stopped in time", Some(e));
        }
        result
    }

    /// Whether a crawler pool is running
    pub async fn is_running(&self) -> bool {
        self.pool.lock().await.is_some()
    }

    pub fn crawler_count(&self) -> usize {
        self.crawler_count
    }

    pub fn workload(&self) -> &[WorkItem] {
        &self.workload
    }

    pub fn queue(&self) -> &Arc<WorkItemQueue> {
        &self.queue
    }

    /// Outcome counters across every pool this manager has run
    pub fn stats(&self) -> CrawlSummary {
        self.stats.snapshot()
    }

    /// Live counters, still updated by adapter calls after the manager is gone
    pub fn stats_handle(&self) -> Arc<CrawlStats> {
        Arc::clone(&self.stats)
    }

    fn spawn_pool(&self) -> PartitionResult<CrawlerPool> {
        let crawlers: Vec<Crawler> = (0..self.crawler_count)
            .map(|_| (self.generator)(Arc::clone(&self.queue)))
            .collect();

        if crawlers.iter().any(|c| c.config().requeue.is_unbounded()) {
            warn!(
                "Requeue policy is unbounded: work items for protocols without an adapter \
                 will be requeued forever"
            );
        }

        let mut pool = CrawlerPool::new(Arc::clone(&self.stats));
        pool.start(crawlers)?;
        Ok(pool)
    }

    async fn wait_for_crawlers(&self, timeout: Duration) -> bool {
        let activity = match self.pool.lock().await.as_ref() {
            Some(pool) => pool.activity().clone(),
            None => return true,
        };
        activity.wait_idle(timeout).await
    }

    fn pending(&self) -> MutexGuard<'_, Vec<ExecutionPlan>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn scheduled_slot(&self) -> MutexGuard<'_, Option<ScheduledPlan>> {
        self.schedule.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for PartitionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartitionManager")
            .field("crawler_count", &self.crawler_count)
            .field("workload", &self.workload.len())
            .field("join_timeout", &self.join_timeout)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .finish_non_exhaustive()
    }
}

impl Drop for PartitionManager {
    fn drop(&mut self) {
        if let Some(scheduled) = self.scheduled_slot().take() {
            scheduled.handle.abort();
        }
    }
}
