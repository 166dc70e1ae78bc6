//! Background tasks feeding and trimming the cache
//!
//! [`CatalogLoader`] drains the crawlers' result queue into the cache store,
//! [`EvictionTask`] periodically removes offers past their TTL, and
//! [`BackgroundTasks`] owns both tasks and their shared shutdown signal.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::app::cache::FederatedCacheStore;
use crate::app::models::UpdateResponse;

/// Counters kept by a [`CatalogLoader`]
#[derive(Debug, Default)]
pub struct LoaderStats {
    responses: AtomicU64,
    offers_saved: AtomicU64,
}

impl LoaderStats {
    pub fn snapshot(&self) -> LoaderSummary {
        LoaderSummary {
            responses: self.responses.load(Ordering::Relaxed),
            offers_saved: self.offers_saved.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`LoaderStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderSummary {
    pub responses: u64,
    pub offers_saved: u64,
}

/// Saves every offer of every crawled catalog into the store
pub struct CatalogLoader {
    store: Arc<dyn FederatedCacheStore>,
    stats: Arc<LoaderStats>,
}

impl CatalogLoader {
    pub fn new(store: Arc<dyn FederatedCacheStore>) -> Self {
        Self {
            store,
            stats: Arc::new(LoaderStats::default()),
        }
    }

    /// Shared handle to the loader's counters
    pub fn stats(&self) -> Arc<LoaderStats> {
        Arc::clone(&self.stats)
    }

    /// Save the offers of one response
    pub async fn load(&self, response: UpdateResponse) {
        let offers = response.catalog.contract_offers.len();
        debug!(
            "Loading catalog {} from {} ({} offers)",
            response.catalog.id, response.source, offers
        );

        for offer in response.catalog.contract_offers {
            self.store.save(offer).await;
        }

        self.stats.responses.fetch_add(1, Ordering::Relaxed);
        self.stats
            .offers_saved
            .fetch_add(offers as u64, Ordering::Relaxed);
    }

    /// Drain `results` until shutdown or until every sender is gone
    ///
    /// Responses already queued are loaded before a shutdown signal is honoured.
    pub async fn run(
        self,
        mut results: mpsc::Receiver<UpdateResponse>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                biased;
                response = results.recv() => match response {
                    Some(response) => self.load(response).await,
                    None => {
                        debug!("Result queue closed, catalog loader exiting");
                        break;
                    }
                },
                _ = shutdown_rx.recv() => {
                    debug!("Catalog loader received shutdown signal");
                    break;
                }
            }
        }

        let summary = self.stats.snapshot();
        info!(
            "Catalog loader stopped: {} responses, {} offers saved",
            summary.responses, summary.offers_saved
        );
    }
}

/// Periodically evicts expired offers
pub struct EvictionTask {
    store: Arc<dyn FederatedCacheStore>,
    ttl: Duration,
    period: Duration,
}

impl EvictionTask {
    pub fn new(store: Arc<dyn FederatedCacheStore>, ttl: Duration, period: Duration) -> Self {
        Self { store, ttl, period }
    }

    /// Run one eviction pass
    pub async fn evict(&self) -> usize {
        let evicted = self.store.delete_expired(self.ttl).await;
        if evicted > 0 {
            info!("Evicted {} expired contract offers", evicted);
        }
        evicted
    }

    /// Evict every period until shutdown
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; nothing can be expired yet.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.evict().await;
                }
                _ = shutdown_rx.recv() => {
                    debug!("Eviction task received shutdown signal");
                    break;
                }
            }
        }
    }
}

/// Owner of the loader and eviction tasks
#[derive(Debug)]
pub struct BackgroundTasks {
    loader: Option<JoinHandle<()>>,
    tasks: Vec<JoinHandle<()>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            loader: None,
            tasks: Vec::new(),
            shutdown_tx,
        }
    }

    /// Spawn the loader draining `results`
    pub fn spawn_loader(&mut self, loader: CatalogLoader, results: mpsc::Receiver<UpdateResponse>) {
        let shutdown_rx = self.shutdown_tx.subscribe();
        let handle = tokio::spawn(loader.run(results, shutdown_rx));
        if let Some(previous) = self.loader.replace(handle) {
            self.tasks.push(previous);
        }
    }

    /// Spawn the periodic eviction task
    pub fn spawn_eviction(&mut self, task: EvictionTask) {
        let shutdown_rx = self.shutdown_tx.subscribe();
        self.tasks.push(tokio::spawn(task.run(shutdown_rx)));
    }

    /// Let the loader drain, then signal every task and wait up to `timeout` for each
    ///
    /// The loader first gets `timeout` to see its result queue close. That
    /// happens once every sender is gone, including the ones held by adapter
    /// calls still in flight.
    pub async fn shutdown(self, timeout: Duration) {
        debug!("Initiating background task shutdown");

        let mut loader = self.loader;
        let drained = match loader.as_mut() {
            Some(handle) => tokio::time::timeout(timeout, handle).await.is_ok(),
            None => true,
        };
        if drained {
            debug!("Result queue drained");
            loader = None;
        } else {
            warn!(
                "Result queue still open after {:?}, stopping catalog loader",
                timeout
            );
        }

        // No receivers left means every task already exited.
        let _ = self.shutdown_tx.send(());

        for task in loader.into_iter().chain(self.tasks) {
            if tokio::time::timeout(timeout, task).await.is_err() {
                warn!("Background task shutdown timed out after {:?}", timeout);
            }
        }

        debug!("All background tasks shutdown complete");
    }

    /// Get the number of background tasks
    pub fn task_count(&self) -> usize {
        self.tasks.len() + usize::from(self.loader.is_some())
    }
}

impl Default for BackgroundTasks {
    fn default() -> Self {
        Self::new()
    }
}
