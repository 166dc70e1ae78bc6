//! Core crawler implementation
//!
//! A crawler takes one work item per cycle and fans it out to every adapter
//! whose protocol matches. Each adapter call runs on its own task: the cycle
//! ends once the calls are started, and a call is never cancelled. Successful
//! responses are pushed onto the shared result queue by the call's task.
//! Nothing that goes wrong is returned to the caller: failures are reported
//! through the monitor.

use std::sync::Arc;
use std::time::Duration;

use backoff::future::retry;
use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use super::adapter::{AdapterRegistry, ProtocolAdapter};
use super::config::{CrawlerConfig, RetryPolicy};
use super::types::{CrawlStats, CycleOutcome, DispatchOutcome};
use crate::app::models::{UpdateRequest, UpdateResponse, WorkItem};
use crate::app::monitor::{Monitor, TracingMonitor};
use crate::app::queue::WorkItemQueue;
use crate::errors::{AdapterError, PartitionError, PartitionResult};

/// Reasons a response could not be placed on the result queue
#[derive(Debug, Error)]
enum DeliveryError {
    #[error("result queue is full")]
    Full,
    #[error("result queue is closed")]
    Closed,
}

/// Individual crawler
#[derive(Debug)]
pub struct Crawler {
    /// Crawler identifier, unique within a pool
    id: usize,
    config: CrawlerConfig,
    /// Shared work queue
    queue: Arc<WorkItemQueue>,
    /// Adapters this crawler dispatches to
    adapters: Arc<AdapterRegistry>,
    /// Shared result queue
    results: mpsc::Sender<UpdateResponse>,
    monitor: Arc<dyn Monitor>,
    /// Where adapter call results are counted
    stats: Arc<CrawlStats>,
}

impl Crawler {
    pub fn new(
        id: usize,
        config: CrawlerConfig,
        queue: Arc<WorkItemQueue>,
        adapters: Arc<AdapterRegistry>,
        results: mpsc::Sender<UpdateResponse>,
        monitor: Arc<dyn Monitor>,
    ) -> Self {
        Self {
            id,
            config,
            queue,
            adapters,
            results,
            monitor,
            stats: Arc::new(CrawlStats::new()),
        }
    }

    /// Count adapter call results into `stats` instead of private counters
    pub fn with_stats(mut self, stats: Arc<CrawlStats>) -> Self {
        self.stats = stats;
        self
    }

    /// Start building a crawler
    pub fn builder() -> CrawlerBuilder {
        CrawlerBuilder::new()
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn config(&self) -> &CrawlerConfig {
        &self.config
    }

    /// The queue this crawler drains
    pub fn queue(&self) -> &Arc<WorkItemQueue> {
        &self.queue
    }

    /// The registry this crawler dispatches through
    pub fn adapters(&self) -> &Arc<AdapterRegistry> {
        &self.adapters
    }

    pub fn stats(&self) -> &Arc<CrawlStats> {
        &self.stats
    }

    /// Register another adapter
    ///
    /// Crawlers built from the same registry see the new adapter too.
    pub fn add_adapter(&self, adapter: Arc<dyn ProtocolAdapter>) {
        self.adapters.register(adapter);
    }

    /// Run one full cycle: obtain an item, then process it
    pub async fn run_cycle(&self, shutdown: &mut watch::Receiver<bool>) -> CycleOutcome {
        match self.next_item(shutdown).await {
            Some(item) => self.process(item),
            None => CycleOutcome::Stopped,
        }
    }

    /// Poll the queue until an item arrives
    ///
    /// Returns `None` only when shutdown is signalled (or its sender is gone),
    /// or when the queue is closed and drained.
    pub async fn next_item(&self, shutdown: &mut watch::Receiver<bool>) -> Option<WorkItem> {
        loop {
            if *shutdown.borrow_and_update() {
                return None;
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        debug!("Crawler {} lost its shutdown channel", self.id);
                        return None;
                    }
                }
                polled = self.queue.poll(self.config.wait_for_work_item) => {
                    match polled {
                        Some(item) => {
                            debug!("Crawler {} got work: {}", self.id, item);
                            return Some(item);
                        }
                        None if self.queue.is_closed() => {
                            debug!("Crawler {} found queue closed and drained", self.id);
                            return None;
                        }
                        None => {}
                    }
                }
            }
        }
    }

    /// Process one work item
    ///
    /// Must be called from within a tokio runtime: every matching adapter
    /// call is spawned as its own task and outlives this call.
    pub fn process(&self, item: WorkItem) -> CycleOutcome {
        let adapters = self.adapters.matching(item.protocol());

        if adapters.is_empty() {
            return self.handle_unmatched(item);
        }

        let request = UpdateRequest::from(&item);
        for adapter in &adapters {
            let dispatch = self.dispatch_context();
            let adapter = Arc::clone(adapter);
            let request = request.clone();
            tokio::spawn(async move {
                let outcome = dispatch.run(adapter.as_ref(), request).await;
                dispatch.stats.record_dispatch(outcome);
            });
        }

        debug!(
            "Crawler {} dispatched {} to {} adapters",
            self.id,
            item,
            adapters.len()
        );
        CycleOutcome::Dispatched {
            adapters: adapters.len(),
        }
    }

    fn handle_unmatched(&self, item: WorkItem) -> CycleOutcome {
        let message = format!("No Adapter found for protocol {}", item.protocol());
        self.monitor.severe(&message, None);

        let failed = item.with_error(message);
        if !self.config.requeue.allows(failed.attempts()) {
            self.monitor.severe(
                &format!(
                    "Dropping work item {} after {} attempts",
                    failed,
                    failed.attempts()
                ),
                None,
            );
            return CycleOutcome::Dropped {
                attempts: failed.attempts(),
            };
        }

        let description = failed.to_string();
        if self.queue.offer(failed) {
            CycleOutcome::Requeued
        } else {
            self.monitor.severe(
                &format!("Requeueing work item {} failed: queue is full or closed", description),
                None,
            );
            CycleOutcome::RequeueRejected
        }
    }

    fn dispatch_context(&self) -> Dispatch {
        Dispatch {
            crawler_id: self.id,
            request_timeout: self.config.request_timeout,
            retry: self.config.retry.clone(),
            results: self.results.clone(),
            monitor: Arc::clone(&self.monitor),
            stats: Arc::clone(&self.stats),
        }
    }
}

/// One adapter call, detached from the cycle that started it
///
/// Holds its own result queue sender, so the queue stays open until every
/// call still in flight has finished.
struct Dispatch {
    crawler_id: usize,
    request_timeout: Duration,
    retry: RetryPolicy,
    results: mpsc::Sender<UpdateResponse>,
    monitor: Arc<dyn Monitor>,
    stats: Arc<CrawlStats>,
}

impl Dispatch {
    async fn run(&self, adapter: &dyn ProtocolAdapter, request: UpdateRequest) -> DispatchOutcome {
        let url = request.url.to_string();
        let mut call = adapter.send_request(request);

        // Slow calls are reported, then awaited to completion.
        let result = match tokio::time::timeout(self.request_timeout, &mut call).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    "Crawler {}: adapter {} has not answered {} within {:?}, still waiting",
                    self.crawler_id,
                    adapter.name(),
                    url,
                    self.request_timeout
                );
                call.await
            }
        };

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                self.report_adapter_failure(adapter, &e);
                return DispatchOutcome::Failed;
            }
        };

        self.monitor
            .info(&format!("update-response received: {}", response.source));

        match self.deliver(response).await {
            Ok(()) => DispatchOutcome::Delivered,
            Err(e @ DeliveryError::Full) => {
                self.monitor.severe(
                    "Inserting update-response into queue failed due to timeout!",
                    Some(&e),
                );
                DispatchOutcome::Undelivered
            }
            Err(e @ DeliveryError::Closed) => {
                self.monitor.severe(
                    "Inserting update-response into queue failed: result queue closed",
                    Some(&e),
                );
                DispatchOutcome::Undelivered
            }
        }
    }

    fn report_adapter_failure(&self, adapter: &dyn ProtocolAdapter, error: &AdapterError) {
        self.monitor.severe(
            &format!(
                "Crawler {}: adapter {} failed to send update request",
                self.crawler_id,
                adapter.name()
            ),
            Some(error),
        );
    }

    /// Offer a response to the result queue, backing off while it is full
    async fn deliver(&self, response: UpdateResponse) -> Result<(), DeliveryError> {
        retry(self.retry.backoff(), || {
            let response = response.clone();
            async move {
                match self.results.try_send(response) {
                    Ok(()) => Ok(()),
                    Err(TrySendError::Full(_)) => {
                        debug!("Crawler {}: result queue full, backing off", self.crawler_id);
                        Err(backoff::Error::transient(DeliveryError::Full))
                    }
                    Err(TrySendError::Closed(_)) => {
                        Err(backoff::Error::permanent(DeliveryError::Closed))
                    }
                }
            }
        })
        .await
    }
}

/// Builder for creating crawlers with validation
#[derive(Debug, Default)]
pub struct CrawlerBuilder {
    id: Option<usize>,
    config: Option<CrawlerConfig>,
    queue: Option<Arc<WorkItemQueue>>,
    adapters: Option<Arc<AdapterRegistry>>,
    /// Adapters added one by one, registered when the crawler is built
    extra_adapters: Vec<Arc<dyn ProtocolAdapter>>,
    results: Option<mpsc::Sender<UpdateResponse>>,
    monitor: Option<Arc<dyn Monitor>>,
    stats: Option<Arc<CrawlStats>>,
}

impl CrawlerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: usize) -> Self {
        self.id = Some(id);
        self
    }

    pub fn config(mut self, config: CrawlerConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn queue(mut self, queue: Arc<WorkItemQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Share an adapter registry
    pub fn adapters(mut self, adapters: Arc<AdapterRegistry>) -> Self {
        self.adapters = Some(adapters);
        self
    }

    /// Add a single adapter
    ///
    /// The adapter joins the shared registry when one was set, otherwise a
    /// private registry created at build time.
    pub fn adapter(mut self, adapter: Arc<dyn ProtocolAdapter>) -> Self {
        self.extra_adapters.push(adapter);
        self
    }

    /// Set the sending half of the result queue
    pub fn results(mut self, results: mpsc::Sender<UpdateResponse>) -> Self {
        self.results = Some(results);
        self
    }

    pub fn monitor(mut self, monitor: Arc<dyn Monitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn stats(mut self, stats: Arc<CrawlStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Build the crawler (validates all required fields are set)
    pub fn build(self) -> PartitionResult<Crawler> {
        let queue = self.queue.ok_or_else(|| PartitionError::MissingComponent {
            component: "work item queue".to_string(),
        })?;
        let results = self.results.ok_or_else(|| PartitionError::MissingComponent {
            component: "result queue".to_string(),
        })?;

        let adapters = self.adapters.unwrap_or_default();
        adapters.extend(self.extra_adapters);

        let crawler = Crawler::new(
            self.id.unwrap_or_default(),
            self.config.unwrap_or_default(),
            queue,
            adapters,
            results,
            self.monitor
                .unwrap_or_else(|| Arc::new(TracingMonitor) as Arc<dyn Monitor>),
        );
        Ok(match self.stats {
            Some(stats) => crawler.with_stats(stats),
            None => crawler,
        })
    }
}
