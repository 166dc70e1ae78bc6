//! Crawl session orchestration
//!
//! The coordinator wires every component from one [`AppConfig`]: the work item
//! queue, a partition manager whose crawlers share one adapter registry and one
//! result queue, the cache store with its query adapters, and the background
//! loader and eviction tasks. It owns their lifecycle and produces a
//! [`SessionSummary`] when stopped.
//!
//! # Examples
//!
//! ```rust,no_run
//! use federated_catalog::app::adapters::FileCatalogAdapter;
//! use federated_catalog::app::crawler::ProtocolAdapter;
//! use federated_catalog::app::Coordinator;
//! use federated_catalog::config::AppConfig;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::load(None).await?;
//! let adapters: Vec<Arc<dyn ProtocolAdapter>> = vec![Arc::new(FileCatalogAdapter::new())];
//!
//! let coordinator = Coordinator::start(&config, adapters).await?;
//! tokio::time::sleep(std::time::Duration::from_secs(10)).await;
//!
//! let summary = coordinator.shutdown().await;
//! println!("{} offers cached", summary.cached_offers);
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::app::cache::{
    CacheQuery, CacheQueryAdapter, FederatedCacheStore, InMemoryFederatedCacheStore, QueryAdapter,
    QueryAdapterRegistry, QueryResponse,
};
use crate::app::crawler::{AdapterRegistry, CrawlSummary, Crawler, ProtocolAdapter};
use crate::app::directory::{work_items_for, NodeDirectory, StaticNodeDirectory};
use crate::app::loader::{BackgroundTasks, CatalogLoader, EvictionTask, LoaderStats, LoaderSummary};
use crate::app::monitor::{Monitor, TracingMonitor};
use crate::app::partition::PartitionManager;
use crate::app::queue::{QueueStats, WorkItemQueue};
use crate::config::AppConfig;
use crate::errors::Result;

/// Final statistics of a crawl session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Crawler cycle and adapter call outcomes
    pub crawl: CrawlSummary,
    /// Responses and offers the loader stored
    pub loader: LoaderSummary,
    /// Work item queue counters at shutdown
    pub queue: QueueStats,
    /// Offers left in the cache at shutdown
    pub cached_offers: usize,
    /// Wall-clock duration of the session
    pub duration: Duration,
    /// Whether every crawler stopped within the shutdown timeout
    pub clean_shutdown: bool,
}

/// Running crawl session
pub struct Coordinator {
    queue: Arc<WorkItemQueue>,
    manager: PartitionManager,
    store: Arc<InMemoryFederatedCacheStore>,
    queries: QueryAdapterRegistry,
    adapters: Arc<AdapterRegistry>,
    tasks: BackgroundTasks,
    loader_stats: Arc<LoaderStats>,
    shutdown_timeout: Duration,
    started_at: Instant,
}

impl Coordinator {
    /// Build every component from `config` and start crawling
    pub async fn start(
        config: &AppConfig,
        adapters: Vec<Arc<dyn ProtocolAdapter>>,
    ) -> Result<Self> {
        config.validate()?;

        let queue = Arc::new(WorkItemQueue::with_config(config.queue.clone()));
        let (results_tx, results_rx) = mpsc::channel(config.crawler.result_queue_capacity);
        let adapters = Arc::new(AdapterRegistry::with_adapters(adapters));
        let monitor: Arc<dyn Monitor> = Arc::new(TracingMonitor);

        let directory = StaticNodeDirectory::new(config.nodes.clone());
        let workload = work_items_for(&directory.get_all());
        if workload.is_empty() {
            warn!("No nodes configured: crawlers will idle until the session stops");
        }

        let generator = {
            let next_id = AtomicUsize::new(0);
            let crawler_config = config.crawler.clone();
            let adapters = Arc::clone(&adapters);
            let monitor = Arc::clone(&monitor);
            move |queue: Arc<WorkItemQueue>| {
                Crawler::new(
                    next_id.fetch_add(1, Ordering::Relaxed),
                    crawler_config.clone(),
                    queue,
                    Arc::clone(&adapters),
                    results_tx.clone(),
                    Arc::clone(&monitor),
                )
            }
        };

        let manager =
            PartitionManager::from_config(Arc::clone(&queue), generator, &config.partition, workload)
                .with_monitor(monitor);

        let store = Arc::new(InMemoryFederatedCacheStore::default());
        let shared_store: Arc<dyn FederatedCacheStore> = store.clone();
        let queries = QueryAdapterRegistry::new();
        queries.register(Arc::new(CacheQueryAdapter::new(Arc::clone(&shared_store))));

        let loader = CatalogLoader::new(Arc::clone(&shared_store));
        let loader_stats = loader.stats();
        let mut tasks = BackgroundTasks::new();
        tasks.spawn_loader(loader, results_rx);
        tasks.spawn_eviction(EvictionTask::new(
            shared_store,
            config.cache.ttl,
            config.cache.eviction_period,
        ));

        manager.start().await?;
        manager.schedule(config.partition.plan()?);

        info!(
            "Crawl session started: {} crawlers, {} work items per refill",
            manager.crawler_count(),
            manager.workload().len()
        );

        Ok(Self {
            queue,
            manager,
            store,
            queries,
            adapters,
            tasks,
            loader_stats,
            shutdown_timeout: config.partition.shutdown_timeout,
            started_at: Instant::now(),
        })
    }

    /// The cache the loader fills
    pub fn store(&self) -> &Arc<InMemoryFederatedCacheStore> {
        &self.store
    }

    pub fn manager(&self) -> &PartitionManager {
        &self.manager
    }

    pub fn queue(&self) -> &Arc<WorkItemQueue> {
        &self.queue
    }

    /// Answer `query` from the cache and every other registered query adapter
    pub async fn query(&self, query: &CacheQuery) -> QueryResponse {
        self.queries.execute_query(query).await
    }

    /// Register another source for [`Coordinator::query`]
    pub fn add_query_adapter(&self, adapter: Arc<dyn QueryAdapter>) {
        self.queries.register(adapter);
    }

    /// Register an adapter with every running crawler
    pub fn add_adapter(&self, adapter: Arc<dyn ProtocolAdapter>) {
        self.adapters.register(adapter);
    }

    /// Stop crawling, drain the result queue and report
    ///
    /// Crawlers are stopped first. Adapter calls they started are not
    /// cancelled: the loader keeps draining until the last of them has
    /// finished, or until the shutdown timeout.
    pub async fn shutdown(self) -> SessionSummary {
        info!("Stopping crawl session");

        let clean_shutdown = match self.manager.stop().await {
            Ok(()) => true,
            Err(e) => {
                warn!("Crawl session did not stop cleanly: {}", e);
                false
            }
        };
        self.queue.close();

        // The generator holds a result sender; once it is dropped only the
        // adapter calls still in flight keep the channel open.
        let Coordinator {
            queue,
            manager,
            store,
            tasks,
            loader_stats,
            shutdown_timeout,
            started_at,
            ..
        } = self;
        let crawl_stats = manager.stats_handle();
        drop(manager);
        tasks.shutdown(shutdown_timeout).await;

        let summary = SessionSummary {
            crawl: crawl_stats.snapshot(),
            loader: loader_stats.snapshot(),
            queue: queue.stats(),
            cached_offers: store.len().await,
            duration: started_at.elapsed(),
            clean_shutdown,
        };

        info!(
            "Crawl session finished in {:.1}s: {} cycles, {} responses, {} offers cached",
            summary.duration.as_secs_f64(),
            summary.crawl.cycles,
            summary.loader.responses,
            summary.cached_offers
        );
        summary
    }
}

/// Wait for Ctrl+C or, on Unix, SIGTERM
pub async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating shutdown"),
        _ = terminate => info!("Received terminate signal, initiating shutdown"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::cache::{Criterion, QueryStatus, ASSET_ID};
    use crate::app::directory::FederatedCacheNode;
    use crate::app::models::{Asset, Catalog, ContractOffer, UpdateRequest, UpdateResponse};
    use crate::errors::{AdapterResult, AppError, ConfigError};
    use async_trait::async_trait;
    use url::Url;

    /// Adapter answering every request with one offer per node
    #[derive(Debug)]
    struct EchoAdapter;

    #[async_trait]
    impl ProtocolAdapter for EchoAdapter {
        fn name(&self) -> &str {
            "echo"
        }

        fn matches(&self, protocol: &str) -> bool {
            protocol == "echo"
        }

        async fn send_request(&self, request: UpdateRequest) -> AdapterResult<UpdateResponse> {
            let host = request.url.host_str().unwrap_or("unknown").to_string();
            Ok(UpdateResponse::new(
                request.url.clone(),
                Catalog {
                    id: host.clone(),
                    contract_offers: vec![ContractOffer::new(
                        format!("offer-{host}"),
                        Asset::new(host),
                    )],
                },
            ))
        }
    }

    fn config(nodes: &[&str]) -> AppConfig {
        let mut config = AppConfig::default();
        config.partition.crawler_count = 2;
        config.partition.execution_period = Duration::from_millis(50);
        config.partition.shutdown_timeout = Duration::from_secs(5);
        config.crawler.wait_for_work_item = Duration::from_millis(10);
        config.nodes = nodes
            .iter()
            .map(|name| {
                FederatedCacheNode::new(
                    *name,
                    Url::parse(&format!("https://{name}/catalog")).unwrap(),
                    vec!["echo".to_string()],
                )
            })
            .collect();
        config
    }

    #[tokio::test]
    async fn test_session_caches_offers_from_every_node() {
        let config = config(&["alpha.example", "beta.example"]);
        let coordinator = Coordinator::start(&config, vec![Arc::new(EchoAdapter)])
            .await
            .unwrap();
        assert!(coordinator.manager().is_running().await);

        let deadline = Instant::now() + Duration::from_secs(5);
        while coordinator.store().len().await < 2 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let beta = coordinator
            .store()
            .query(&[Criterion::equals(ASSET_ID, "beta.example")])
            .await
            .unwrap();
        assert_eq!(beta.len(), 1);

        let all = coordinator.query(&CacheQuery::default()).await;
        assert_eq!(all.status, QueryStatus::Accepted);
        assert_eq!(all.offers.len(), 2);
        assert!(all.errors.is_empty());

        let summary = coordinator.shutdown().await;
        assert!(summary.clean_shutdown);
        assert_eq!(summary.cached_offers, 2);
        assert!(summary.loader.responses >= 2);
        assert!(summary.crawl.delivered >= 2);
        assert!(summary.queue.refills >= 1);
    }

    #[tokio::test]
    async fn test_adapter_added_while_running() {
        let mut config = config(&["late.example"]);
        config.crawler.requeue.max_attempts = Some(1);
        let coordinator = Coordinator::start(&config, Vec::new()).await.unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(coordinator.store().is_empty().await);

        coordinator.add_adapter(Arc::new(EchoAdapter));
        let deadline = Instant::now() + Duration::from_secs(5);
        while coordinator.store().is_empty().await && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let summary = coordinator.shutdown().await;
        assert_eq!(summary.cached_offers, 1);
    }

    #[derive(Debug)]
    struct UnreachableIndex;

    #[async_trait]
    impl QueryAdapter for UnreachableIndex {
        fn name(&self) -> &str {
            "remote-index"
        }

        fn can_execute(&self, _query: &CacheQuery) -> bool {
            true
        }

        async fn execute_query(
            &self,
            _query: &CacheQuery,
        ) -> crate::errors::QueryResult<Vec<ContractOffer>> {
            Err(crate::errors::QueryError::AdapterFailed {
                adapter: self.name().to_string(),
                reason: "connection refused".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_query_reports_failing_adapter_next_to_cache() {
        let coordinator = Coordinator::start(&config(&[]), Vec::new()).await.unwrap();
        coordinator
            .store()
            .save(ContractOffer::new("offer-local", Asset::new("local")))
            .await;
        coordinator.add_query_adapter(Arc::new(UnreachableIndex));

        let response = coordinator.query(&CacheQuery::default()).await;
        assert_eq!(response.status, QueryStatus::Accepted);
        assert_eq!(response.offers.len(), 1);
        assert_eq!(
            response.errors,
            ["Query adapter remote-index failed: connection refused"]
        );

        coordinator.shutdown().await;
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let mut config = config(&[]);
        config.cache.ttl = Duration::ZERO;

        let result = Coordinator::start(&config, Vec::new()).await;
        assert!(matches!(
            result,
            Err(AppError::Config(ConfigError::ValidationFailed { .. }))
        ));
    }
}
