//! Crawlers and the protocol adapters they dispatch to
//!
//! Each crawler repeatedly takes a [`WorkItem`](crate::app::models::WorkItem)
//! from the shared queue and sends an update request to every adapter registered
//! for the item's protocol. Each request runs on its own task, is never
//! cancelled, and hands a successful response to the result queue with a
//! bounded exponential retry while that queue is full.
//!
//! # Basic Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use federated_catalog::app::crawler::{Crawler, CrawlerConfig};
//! use federated_catalog::app::queue::WorkItemQueue;
//! use tokio::sync::{mpsc, watch};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let queue = Arc::new(WorkItemQueue::new());
//! let (results_tx, _results_rx) = mpsc::channel(100);
//! let crawler = Crawler::builder()
//!     .id(0)
//!     .config(CrawlerConfig::default())
//!     .queue(queue)
//!     .results(results_tx)
//!     .build()?;
//!
//! let (_shutdown_tx, mut shutdown_rx) = watch::channel(false);
//! let outcome = crawler.run_cycle(&mut shutdown_rx).await;
//! println!("cycle finished: {:?}", outcome);
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod config;
pub mod core;
pub mod types;

pub use adapter::{AdapterRegistry, ProtocolAdapter};
pub use config::{BoundedBackoff, CrawlerConfig, RequeuePolicy, RetryPolicy};
pub use core::{Crawler, CrawlerBuilder};
pub use types::{CrawlStats, CrawlSummary, CycleOutcome, DispatchOutcome};
