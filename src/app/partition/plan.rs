//! Execution plans: recurring schedules for workload refills

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

use crate::errors::{PartitionError, PartitionResult};

static NEXT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// A recurring schedule
///
/// Every plan gets a process-wide sequence number at creation. Merging two
/// plans keeps the one created last, which makes `merge` commutative and
/// associative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    period: Duration,
    initial_delay: Duration,
    sequence: u64,
}

impl ExecutionPlan {
    /// Create a plan that ticks every `period`
    pub fn new(period: Duration) -> PartitionResult<Self> {
        if period.is_zero() {
            return Err(PartitionError::InvalidPlan {
                reason: "period must be greater than zero".to_string(),
            });
        }

        Ok(Self {
            period,
            initial_delay: Duration::ZERO,
            sequence: NEXT_SEQUENCE.fetch_add(1, Ordering::Relaxed),
        })
    }

    /// Delay the first tick
    pub fn with_initial_delay(mut self, initial_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    /// Recency marker; higher is newer
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Combine two plans into the more recent one
    pub fn merge(self, other: ExecutionPlan) -> ExecutionPlan {
        if other.sequence > self.sequence {
            other
        } else {
            self
        }
    }

    /// Spawn a task running `action` on every tick until `shutdown` turns true
    ///
    /// Ticks that fall behind a slow action are delayed rather than bunched.
    pub fn run<F, Fut>(&self, mut shutdown: watch::Receiver<bool>, mut action: F) -> JoinHandle<()>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let period = self.period;
        let start = Instant::now() + self.initial_delay;
        let sequence = self.sequence;

        tokio::spawn(async move {
            let mut interval = interval_at(start, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            debug!("Execution plan {} started, period {:?}", sequence, period);

            loop {
                if *shutdown.borrow_and_update() {
                    break;
                }

                tokio::select! {
                    _ = interval.tick() => {
                        action().await;
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }

            debug!("Execution plan {} stopped", sequence);
        })
    }
}

/// Reduce plans to the most recent one; `None` when there are none
pub fn collate_updates<I>(plans: I) -> Option<ExecutionPlan>
where
    I: IntoIterator<Item = ExecutionPlan>,
{
    plans.into_iter().reduce(ExecutionPlan::merge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn plan(secs: u64) -> ExecutionPlan {
        ExecutionPlan::new(Duration::from_secs(secs)).unwrap()
    }

    #[test]
    fn test_zero_period_rejected() {
        let err = ExecutionPlan::new(Duration::ZERO).unwrap_err();
        assert!(matches!(err, PartitionError::InvalidPlan { .. }));
    }

    #[test]
    fn test_merge_keeps_most_recent() {
        let a = plan(10);
        let b = plan(20);
        let c = plan(30);

        assert_eq!(a.clone().merge(b.clone()), b);
        assert_eq!(b.clone().merge(a.clone()), b);
        assert_eq!(
            a.clone().merge(b.clone()).merge(c.clone()),
            a.clone().merge(b.clone().merge(c.clone()))
        );
        assert_eq!(collate_updates(vec![c.clone(), a, b]), Some(c));
    }

    #[test]
    fn test_collate_empty_is_none() {
        assert_eq!(collate_updates(Vec::new()), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_ticks_until_shutdown() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = watch::channel(false);

        let handle = {
            let ticks = Arc::clone(&ticks);
            plan(10)
                .with_initial_delay(Duration::from_secs(5))
                .run(rx, move || {
                    let ticks = Arc::clone(&ticks);
                    async move {
                        ticks.fetch_add(1, Ordering::SeqCst);
                    }
                })
        };

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);

        // Ticks at 5s, 15s and 25s.
        tokio::time::sleep(Duration::from_secs(22)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);

        tx.send(true).unwrap();
        handle.await.unwrap();

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_run_stops_when_sender_dropped() {
        let (tx, rx) = watch::channel(false);
        let handle = plan(3600).run(rx, || async {});
        drop(tx);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
