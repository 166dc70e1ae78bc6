//! Prelude module for the federated catalog crawler
//!
//! Re-exports the items most integrations need, so that a single
//! `use federated_catalog::prelude::*;` is enough for typical usage.
//!
//! # Usage
//!
//! ```rust,no_run
//! use federated_catalog::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = AppConfig::load(None).await?;
//!     let adapters: Vec<Arc<dyn ProtocolAdapter>> = vec![Arc::new(FileCatalogAdapter::new())];
//!     let coordinator = Coordinator::start(&config, adapters).await?;
//!
//!     wait_for_shutdown_signal().await;
//!     coordinator.shutdown().await;
//!     Ok(())
//! }
//! ```

// Core result types
pub use crate::errors::{AppError, Result};

// Configuration
pub use crate::config::AppConfig;

// Orchestration
pub use crate::app::{wait_for_shutdown_signal, Coordinator, SessionSummary};

// Crawling
pub use crate::app::{
    Crawler, CrawlerConfig, ExecutionPlan, FileCatalogAdapter, PartitionManager, ProtocolAdapter,
    WorkItem, WorkItemQueue,
};

// Cache and data types
pub use crate::app::{
    Asset, CacheQuery, Catalog, ContractOffer, Criterion, FederatedCacheStore,
    InMemoryFederatedCacheStore, QueryResponse, QueryStatus, UpdateRequest, UpdateResponse,
};
