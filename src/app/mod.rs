//! Core application logic for the federated catalog crawler
//!
//! Crawlers take work items from a shared [`queue`], dispatch them to the
//! protocol adapters registered in [`crawler`] and push the responses onto a
//! result queue. The [`partition`] manager owns the crawler pool and refills
//! the queue on a schedule, the [`loader`] moves responses into the [`cache`],
//! and the [`coordinator`] wires a whole session together.
//!
//! # Examples
//!
//! ```rust,no_run
//! use federated_catalog::app::{FileCatalogAdapter, WorkItem, WorkItemQueue};
//! use std::time::Duration;
//! use url::Url;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let queue = WorkItemQueue::new();
//! queue.offer(WorkItem::new(Url::parse("file:///tmp/catalog.json")?, "file"));
//!
//! let item = queue.poll(Duration::from_millis(100)).await;
//! assert!(item.is_some());
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod cache;
pub mod clock;
pub mod coordinator;
pub mod crawler;
pub mod directory;
pub mod loader;
pub mod models;
pub mod monitor;
pub mod partition;
pub mod queue;

// Re-export main public API
pub use adapters::FileCatalogAdapter;
pub use cache::{
    CacheConfig, CacheQuery, Criterion, FederatedCacheStore, InMemoryFederatedCacheStore,
    QueryAdapter, QueryAdapterRegistry, QueryResponse, QueryStatus,
};
pub use clock::{Clock, SystemClock};
pub use coordinator::{wait_for_shutdown_signal, Coordinator, SessionSummary};
pub use crawler::{AdapterRegistry, Crawler, CrawlerConfig, CycleOutcome, ProtocolAdapter};
pub use directory::{FederatedCacheNode, NodeDirectory, StaticNodeDirectory};
pub use loader::{BackgroundTasks, CatalogLoader, EvictionTask};
pub use models::{Asset, Catalog, ContractOffer, UpdateRequest, UpdateResponse, WorkItem};
pub use monitor::{MemoryMonitor, Monitor, TracingMonitor};
pub use partition::{ExecutionPlan, PartitionConfig, PartitionManager};
pub use queue::{QueueStats, WorkItemQueue, WorkItemQueueConfig};
