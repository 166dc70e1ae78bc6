//! Configuration and statistics types for the work item queue

use serde::{Deserialize, Serialize};

use crate::constants::queue;

/// Configuration for the work item queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkItemQueueConfig {
    /// Maximum number of queued items (0 = unbounded)
    pub capacity: usize,
}

impl Default for WorkItemQueueConfig {
    fn default() -> Self {
        Self {
            capacity: queue::DEFAULT_CAPACITY,
        }
    }
}

impl WorkItemQueueConfig {
    /// Unbounded queue configuration
    pub fn unbounded() -> Self {
        Self { capacity: 0 }
    }

    /// Bounded queue configuration
    pub fn bounded(capacity: usize) -> Self {
        Self { capacity }
    }

    /// Capacity limit, `None` when unbounded
    pub fn limit(&self) -> Option<usize> {
        (self.capacity > 0).then_some(self.capacity)
    }
}

/// Point-in-time queue statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Items currently queued
    pub queued: usize,
    /// Items accepted through `offer` or a refill
    pub accepted: u64,
    /// Items rejected because the queue was full or closed
    pub rejected: u64,
    /// Items handed out by `poll`
    pub taken: u64,
    /// Completed refills
    pub refills: u64,
}

impl QueueStats {
    /// Fraction of inserts that were rejected, as a percentage
    pub fn rejection_rate(&self) -> f64 {
        let total = self.accepted + self.rejected;
        if total == 0 {
            0.0
        } else {
            (self.rejected as f64 / total as f64) * 100.0
        }
    }
}
