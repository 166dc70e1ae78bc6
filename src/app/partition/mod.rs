//! Partition management: crawler pool lifecycle and workload scheduling
//!
//! A [`PartitionManager`] owns a fixed pool of crawlers draining a shared
//! [`WorkItemQueue`](crate::app::queue::WorkItemQueue), and refills that queue
//! with a static workload on every tick of an [`ExecutionPlan`].

pub mod config;
pub mod manager;
pub mod plan;
pub mod pool;

pub use config::PartitionConfig;
pub use manager::{CrawlerGenerator, PartitionManager};
pub use plan::{collate_updates, ExecutionPlan};
pub use pool::{ActivityGuard, CrawlActivity, CrawlerPool, PoolState};
