//! Application constants for the federated catalog crawler
//!
//! Defaults for every configurable value live here, grouped by the component
//! that consumes them.

use std::time::Duration;

/// Work item queue defaults
pub mod queue {
    /// Default queue capacity (0 = unbounded)
    pub const DEFAULT_CAPACITY: usize = 10_000;
}

/// Crawler defaults
pub mod crawler {
    use super::Duration;

    /// How long a crawler waits on the work queue before polling again
    pub const WAIT_FOR_WORK_ITEM: Duration = Duration::from_millis(500);

    /// Time after which a running adapter request is reported as slow
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    /// Capacity of the shared result queue
    pub const RESULT_QUEUE_CAPACITY: usize = 1_000;

    /// Retries for offering a response to a full result queue
    pub const OFFER_MAX_RETRIES: u32 = 5;

    /// First delay between result queue offers
    pub const OFFER_INITIAL_INTERVAL: Duration = Duration::from_millis(10);

    /// Cap on the delay between result queue offers
    pub const OFFER_MAX_INTERVAL: Duration = Duration::from_millis(500);

    /// Growth factor between result queue offers
    pub const OFFER_MULTIPLIER: f64 = 2.0;

    /// Protocol tag handled by the built-in file adapter
    pub const FILE_PROTOCOL: &str = "file";
}

/// Partition manager defaults
pub mod partition {
    use super::Duration;

    /// Default number of crawlers
    pub const DEFAULT_CRAWLER_COUNT: usize = 4;

    /// Hard upper bound on crawlers
    pub const MAX_CRAWLER_COUNT: usize = 64;

    /// Period between workload refills
    pub const EXECUTION_PERIOD: Duration = Duration::from_secs(60);

    /// Delay before the first refill
    pub const INITIAL_DELAY: Duration = Duration::ZERO;

    /// How long `update` waits for crawlers to become quiescent
    pub const JOIN_TIMEOUT: Duration = Duration::from_secs(10);

    /// How long `stop` waits for crawlers to finish their cycle
    pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);
}

/// Cache defaults
pub mod cache {
    use super::Duration;

    /// Lifetime of a cached contract offer
    pub const DEFAULT_TTL: Duration = Duration::from_secs(3_600);

    /// Period between eviction runs
    pub const EVICTION_PERIOD: Duration = Duration::from_secs(60);
}

/// Configuration file locations
pub mod config {
    /// Project-local configuration file name
    pub const LOCAL_FILE_NAME: &str = "federated-catalog.toml";

    /// Directory under the user config dir
    pub const APP_DIR_NAME: &str = "federated-catalog";

    /// File name under the app config dir
    pub const FILE_NAME: &str = "config.toml";
}

/// Log target used by the tracing monitor
pub const LOG_TARGET: &str = "federated_catalog";

/// Default log level
pub const DEFAULT_LOG_LEVEL: &str = "info";
