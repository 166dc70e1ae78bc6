//! Partition manager configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::plan::ExecutionPlan;
use crate::constants::partition;
use crate::errors::PartitionResult;

/// Configuration for the partition manager and its crawler pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionConfig {
    /// Number of crawlers to run
    pub crawler_count: usize,
    /// Period between workload refills
    #[serde(with = "humantime_serde")]
    pub execution_period: Duration,
    /// Delay before the first refill
    #[serde(with = "humantime_serde")]
    pub initial_delay: Duration,
    /// How long `update` waits for crawlers to go quiet
    #[serde(with = "humantime_serde")]
    pub join_timeout: Duration,
    /// How long `stop` waits for crawlers to finish their cycle
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            crawler_count: partition::DEFAULT_CRAWLER_COUNT,
            execution_period: partition::EXECUTION_PERIOD,
            initial_delay: partition::INITIAL_DELAY,
            join_timeout: partition::JOIN_TIMEOUT,
            shutdown_timeout: partition::SHUTDOWN_TIMEOUT,
        }
    }
}

impl PartitionConfig {
    /// Execution plan described by this configuration
    pub fn plan(&self) -> PartitionResult<ExecutionPlan> {
        Ok(ExecutionPlan::new(self.execution_period)?.with_initial_delay(self.initial_delay))
    }

    pub fn validation_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.crawler_count == 0 {
            errors.push("partition.crawler_count must be greater than zero".to_string());
        }
        if self.crawler_count > partition::MAX_CRAWLER_COUNT {
            errors.push(format!(
                "partition.crawler_count ({}) exceeds maximum ({})",
                self.crawler_count,
                partition::MAX_CRAWLER_COUNT
            ));
        }
        if self.execution_period.is_zero() {
            errors.push("partition.execution_period must be greater than zero".to_string());
        }

        errors
    }
}
