//! Crawler pool management and coordination
//!
//! The pool runs every crawler on its own task. Each task keeps starting
//! cycles until the pool's shutdown signal is raised, and the pool tracks how
//! many crawlers are mid-cycle so that callers can wait for a quiet moment.
//! Adapter calls started by a cycle are not part of it: they keep running
//! after the cycle ends and after the pool shuts down.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::app::crawler::{CrawlStats, Crawler};
use crate::errors::{PartitionError, PartitionResult};

/// Current state of the crawler pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    /// Pool has been created but not started
    Created,
    /// Pool is running with active crawlers
    Running,
    /// Pool is shutting down
    ShuttingDown,
    /// Pool has been shut down
    Shutdown,
}

impl std::fmt::Display for PoolState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PoolState::Created => "created",
            PoolState::Running => "running",
            PoolState::ShuttingDown => "shutting down",
            PoolState::Shutdown => "shut down",
        };
        f.write_str(name)
    }
}

/// Count of crawlers currently inside a cycle
#[derive(Debug, Clone)]
pub struct CrawlActivity {
    busy: Arc<watch::Sender<usize>>,
}

impl CrawlActivity {
    pub fn new() -> Self {
        let (busy, _) = watch::channel(0);
        Self {
            busy: Arc::new(busy),
        }
    }

    /// Mark one crawler busy until the returned guard is dropped
    pub fn begin(&self) -> ActivityGuard {
        self.busy.send_modify(|busy| *busy += 1);
        ActivityGuard {
            busy: Arc::clone(&self.busy),
        }
    }

    /// Crawlers currently mid-cycle
    pub fn busy(&self) -> usize {
        *self.busy.borrow()
    }

    /// Wait until no crawler is mid-cycle; `false` if `timeout` elapsed first
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let mut busy = self.busy.subscribe();
        let idle = match tokio::time::timeout(timeout, busy.wait_for(|count| *count == 0)).await {
            Ok(result) => result.is_ok(),
            Err(_) => false,
        };
        idle
    }
}

impl Default for CrawlActivity {
    fn default() -> Self {
        Self::new()
    }
}

/// Marks a crawler busy for its lifetime
#[derive(Debug)]
pub struct ActivityGuard {
    busy: Arc<watch::Sender<usize>>,
}

impl Drop for ActivityGuard {
    fn drop(&mut self) {
        self.busy.send_modify(|busy| *busy = busy.saturating_sub(1));
    }
}

/// Pool of crawler tasks
#[derive(Debug)]
pub struct CrawlerPool {
    /// Crawler task handles
    handles: Vec<JoinHandle<()>>,
    /// Shared shutdown signal
    shutdown: watch::Sender<bool>,
    activity: CrawlActivity,
    stats: Arc<CrawlStats>,
    state: PoolState,
}

impl CrawlerPool {
    /// Create an idle pool recording outcomes into `stats`
    pub fn new(stats: Arc<CrawlStats>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            handles: Vec::new(),
            shutdown,
            activity: CrawlActivity::new(),
            stats,
            state: PoolState::Created,
        }
    }

    /// Spawn one task per crawler
    ///
    /// Every crawler counts its adapter call results into the pool's stats.
    pub fn start(&mut self, crawlers: Vec<Crawler>) -> PartitionResult<()> {
        if self.state != PoolState::Created {
            return Err(PartitionError::InvalidState {
                operation: "start".to_string(),
                state: self.state.to_string(),
            });
        }

        info!("Starting {} crawlers", crawlers.len());

        for crawler in crawlers {
            let shutdown = self.shutdown.subscribe();
            let activity = self.activity.clone();
            let stats = Arc::clone(&self.stats);
            let crawler = crawler.with_stats(Arc::clone(&stats));
            self.handles
                .push(tokio::spawn(run_crawler(crawler, shutdown, activity, stats)));
        }

        self.state = PoolState::Running;
        info!("Crawler pool started with {} crawlers", self.handles.len());
        Ok(())
    }

    /// Signal shutdown and wait up to `timeout` for crawlers to finish their cycle
    ///
    /// Crawlers still running at the deadline are aborted and reported in the
    /// returned error.
    pub async fn shutdown(&mut self, timeout: Duration) -> PartitionResult<()> {
        if self.state == PoolState::Shutdown {
            return Ok(());
        }

        if self.state != PoolState::Running {
            warn!("Shutting down crawler pool in state: {}", self.state);
        }

        self.state = PoolState::ShuttingDown;
        info!("Shutting down crawler pool");
        self.shutdown.send_replace(true);

        let deadline = Instant::now() + timeout;
        let mut remaining = 0;
        let mut error_count = 0;
        for mut handle in self.handles.drain(..) {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    debug!("Crawler task failed: {}", e);
                    error_count += 1;
                }
                Err(_) => {
                    handle.abort();
                    remaining += 1;
                }
            }
        }

        if error_count > 0 {
            warn!("{} crawlers panicked before shutdown", error_count);
        }

        self.state = PoolState::Shutdown;

        if remaining > 0 {
            warn!("Aborted {} crawlers still running at shutdown deadline", remaining);
            return Err(PartitionError::ShutdownTimeout {
                remaining,
                millis: timeout.as_millis() as u64,
            });
        }

        info!("Crawler pool shutdown complete");
        Ok(())
    }

    /// Get the current pool state
    pub fn state(&self) -> PoolState {
        self.state
    }

    /// Number of crawler tasks
    pub fn crawler_count(&self) -> usize {
        self.handles.len()
    }

    pub fn activity(&self) -> &CrawlActivity {
        &self.activity
    }
}

impl Drop for CrawlerPool {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

async fn run_crawler(
    crawler: Crawler,
    mut shutdown: watch::Receiver<bool>,
    activity: CrawlActivity,
    stats: Arc<CrawlStats>,
) {
    debug!("Crawler {} starting", crawler.id());

    while let Some(item) = crawler.next_item(&mut shutdown).await {
        let _busy = activity.begin();
        stats.record(crawler.process(item));
    }

    debug!("Crawler {} stopped", crawler.id());
}
