//! Work item queue shared by the crawler pool
//!
//! The queue hands crawl targets to crawlers and is periodically refilled by
//! the partition manager's schedule.
//!
//! # Features
//!
//! - **Timed polling**: `poll` waits up to a timeout and returns `None` when
//!   nothing arrived, so crawlers just poll again
//! - **Backpressure**: an optional capacity makes `offer` and refills drop
//!   excess items instead of growing without bound
//! - **Atomic refills**: bulk inserts are only possible through the guard
//!   returned by `lock`, and the lock is released when the guard goes away
//!
//! # Basic Usage
//!
//! ```rust,no_run
//! use federated_catalog::app::models::WorkItem;
//! use federated_catalog::app::queue::{WorkItemQueue, WorkItemQueueConfig};
//! use std::time::Duration;
//! use url::Url;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let queue = WorkItemQueue::with_config(WorkItemQueueConfig::bounded(100));
//!
//! let item = WorkItem::new(Url::parse("https://provider.example/catalog")?, "dsp");
//! let mut guard = queue.lock().await;
//! guard.add_all(vec![item]);
//! guard.unlock();
//!
//! while let Some(item) = queue.poll(Duration::from_millis(500)).await {
//!     println!("crawling {}", item);
//! }
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod types;

pub use core::{RefillGuard, WorkItemQueue};
pub use types::{QueueStats, WorkItemQueueConfig};
