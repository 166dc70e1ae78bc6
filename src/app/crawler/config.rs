//! Crawler configuration management
//!
//! Timing, retry and requeue settings for crawlers. Every value has a default
//! in `constants::crawler`, and the whole structure deserialises from the
//! `[crawler]` section of the configuration file.

use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use serde::{Deserialize, Serialize};

use crate::constants::crawler;

/// Configuration for crawlers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// How long a single queue poll waits before polling again
    #[serde(with = "humantime_serde")]
    pub wait_for_work_item: Duration,
    /// How long an adapter request may run before it is reported as slow
    ///
    /// The request is never cancelled; it keeps running after the warning.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Capacity of the shared result queue
    pub result_queue_capacity: usize,
    /// Retry policy for offering responses to a full result queue
    pub retry: RetryPolicy,
    /// What happens to items no adapter could serve
    pub requeue: RequeuePolicy,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            wait_for_work_item: crawler::WAIT_FOR_WORK_ITEM,
            request_timeout: crawler::REQUEST_TIMEOUT,
            result_queue_capacity: crawler::RESULT_QUEUE_CAPACITY,
            retry: RetryPolicy::default(),
            requeue: RequeuePolicy::default(),
        }
    }
}

impl CrawlerConfig {
    /// Collect every invalid setting, prefixed with its config key
    pub fn validation_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.wait_for_work_item.is_zero() {
            errors.push("crawler.wait_for_work_item must be greater than zero".to_string());
        }
        if self.request_timeout.is_zero() {
            errors.push("crawler.request_timeout must be greater than zero".to_string());
        }
        if self.result_queue_capacity == 0 {
            errors.push("crawler.result_queue_capacity must be greater than zero".to_string());
        }
        errors.extend(self.retry.validation_errors());
        if self.requeue.max_attempts == Some(0) {
            errors.push("crawler.requeue.max_attempts must be greater than zero".to_string());
        }

        errors
    }
}

/// Bounded exponential retry for result queue offers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    #[serde(with = "humantime_serde")]
    pub initial_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub max_interval: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: crawler::OFFER_MAX_RETRIES,
            initial_interval: crawler::OFFER_INITIAL_INTERVAL,
            max_interval: crawler::OFFER_MAX_INTERVAL,
            multiplier: crawler::OFFER_MULTIPLIER,
        }
    }
}

impl RetryPolicy {
    /// Policy with `max_retries` retries and the default intervals
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Backoff driving one delivery attempt
    pub fn backoff(&self) -> BoundedBackoff {
        let inner = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_interval)
            .with_max_interval(self.max_interval)
            .with_multiplier(self.multiplier)
            .with_randomization_factor(0.0)
            .with_max_elapsed_time(None)
            .build();

        BoundedBackoff {
            inner,
            max_retries: self.max_retries,
            retries: 0,
        }
    }

    fn validation_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.initial_interval > self.max_interval {
            errors.push(
                "crawler.retry.initial_interval must not exceed crawler.retry.max_interval"
                    .to_string(),
            );
        }
        if self.multiplier < 1.0 {
            errors.push("crawler.retry.multiplier must be at least 1.0".to_string());
        }
        errors
    }
}

/// Exponential backoff that gives up after a fixed number of retries
#[derive(Debug)]
pub struct BoundedBackoff {
    inner: ExponentialBackoff,
    max_retries: u32,
    retries: u32,
}

impl BoundedBackoff {
    /// Retries handed out so far
    pub fn retries(&self) -> u32 {
        self.retries
    }
}

impl Backoff for BoundedBackoff {
    fn next_backoff(&mut self) -> Option<Duration> {
        if self.retries >= self.max_retries {
            return None;
        }
        self.retries += 1;
        self.inner.next_backoff()
    }

    fn reset(&mut self) {
        self.retries = 0;
        self.inner.reset();
    }
}

/// Requeue limit for work items nobody can serve
///
/// `None` requeues forever. An item whose protocol never gets an adapter then
/// cycles through the queue indefinitely, which is logged as a warning when the
/// partition manager starts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequeuePolicy {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
}

impl RequeuePolicy {
    pub fn unbounded() -> Self {
        Self { max_attempts: None }
    }

    pub fn bounded(max_attempts: u32) -> Self {
        Self {
            max_attempts: Some(max_attempts),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.max_attempts.is_none()
    }

    /// Whether an item that has failed `attempts` times may go back on the queue
    pub fn allows(&self, attempts: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempts < max)
    }
}
