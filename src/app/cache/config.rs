//! Cache configuration types and defaults

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::cache;

/// Configuration for the contract offer cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Age after which a cached offer is evicted
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
    /// Period between eviction runs
    #[serde(with = "humantime_serde")]
    pub eviction_period: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: cache::DEFAULT_TTL,
            eviction_period: cache::EVICTION_PERIOD,
        }
    }
}

impl CacheConfig {
    /// Set the offer lifetime
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn validation_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.ttl.is_zero() {
            errors.push("cache.ttl must be greater than zero".to_string());
        }
        if self.eviction_period.is_zero() {
            errors.push("cache.eviction_period must be greater than zero".to_string());
        }
        errors
    }
}
