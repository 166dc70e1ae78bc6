//! Outcome and statistics types for crawler cycles

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// What a single crawler cycle did with its work item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// No adapter matched; a derived item went back on the queue
    Requeued,
    /// No adapter matched and the queue refused the derived item
    RequeueRejected,
    /// No adapter matched and the requeue limit was reached
    Dropped { attempts: u32 },
    /// The item was handed to every matching adapter
    ///
    /// Each adapter call runs on its own task and finishes after the cycle;
    /// its result is recorded as a [`DispatchOutcome`].
    Dispatched { adapters: usize },
    /// Shutdown was signalled before an item was obtained
    Stopped,
}

/// How one adapter call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The response was accepted by the result queue
    Delivered,
    /// The adapter returned an error
    Failed,
    /// The response never made it onto the result queue
    Undelivered,
}

/// Cumulative counters across all crawlers of a pool
#[derive(Debug, Default)]
pub struct CrawlStats {
    cycles: AtomicU64,
    dispatched: AtomicU64,
    delivered: AtomicU64,
    adapter_failures: AtomicU64,
    undelivered: AtomicU64,
    requeued: AtomicU64,
    dropped: AtomicU64,
}

impl CrawlStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one cycle outcome into the counters
    pub fn record(&self, outcome: CycleOutcome) {
        match outcome {
            CycleOutcome::Stopped => return,
            CycleOutcome::Requeued => {
                self.requeued.fetch_add(1, Ordering::Relaxed);
            }
            CycleOutcome::RequeueRejected | CycleOutcome::Dropped { .. } => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            CycleOutcome::Dispatched { adapters } => {
                self.dispatched.fetch_add(adapters as u64, Ordering::Relaxed);
            }
        }
        self.cycles.fetch_add(1, Ordering::Relaxed);
    }

    /// Fold the result of one adapter call into the counters
    pub fn record_dispatch(&self, outcome: DispatchOutcome) {
        let counter = match outcome {
            DispatchOutcome::Delivered => &self.delivered,
            DispatchOutcome::Failed => &self.adapter_failures,
            DispatchOutcome::Undelivered => &self.undelivered,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CrawlSummary {
        CrawlSummary {
            cycles: self.cycles.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            adapter_failures: self.adapter_failures.load(Ordering::Relaxed),
            undelivered: self.undelivered.load(Ordering::Relaxed),
            requeued: self.requeued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`CrawlStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlSummary {
    /// Completed cycles
    pub cycles: u64,
    /// Adapter calls started
    pub dispatched: u64,
    /// Responses placed on the result queue
    pub delivered: u64,
    pub adapter_failures: u64,
    pub undelivered: u64,
    /// Items without adapter that went back on the queue
    pub requeued: u64,
    /// Items without adapter that were discarded
    pub dropped: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_outcomes() {
        let stats = CrawlStats::new();
        stats.record(CycleOutcome::Dispatched { adapters: 3 });
        stats.record_dispatch(DispatchOutcome::Delivered);
        stats.record_dispatch(DispatchOutcome::Delivered);
        stats.record_dispatch(DispatchOutcome::Failed);
        stats.record(CycleOutcome::Requeued);
        stats.record(CycleOutcome::Dropped { attempts: 3 });
        stats.record(CycleOutcome::Stopped);

        let summary = stats.snapshot();
        assert_eq!(summary.cycles, 3);
        assert_eq!(summary.dispatched, 3);
        assert_eq!(summary.delivered, 2);
        assert_eq!(summary.adapter_failures, 1);
        assert_eq!(summary.requeued, 1);
        assert_eq!(summary.dropped, 1);
    }
}
