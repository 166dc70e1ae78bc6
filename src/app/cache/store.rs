//! Federated cache store implementations

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use super::criterion::{Criterion, CriterionConverter, OfferPredicate, PropertyCriterionConverter};
use crate::app::clock::{Clock, SystemClock};
use crate::app::models::ContractOffer;
use crate::errors::CacheResult;

/// Storage for contract offers discovered by the crawlers
#[async_trait]
pub trait FederatedCacheStore: Send + Sync {
    /// Insert or replace the offer for its asset id
    async fn save(&self, offer: ContractOffer);

    /// Offers matching every criterion; all offers when `criteria` is empty
    async fn query(&self, criteria: &[Criterion]) -> CacheResult<Vec<ContractOffer>>;

    /// Remove offers older than `ttl`, returning how many were removed
    async fn delete_expired(&self, ttl: Duration) -> usize;
}

#[derive(Debug, Clone)]
struct CachedContractOffer {
    created_at: DateTime<Utc>,
    offer: ContractOffer,
}

/// In-memory store keyed by asset id
///
/// Reads share the lock; `save` and `delete_expired` take it exclusively.
#[derive(Debug)]
pub struct InMemoryFederatedCacheStore {
    entries: RwLock<HashMap<String, CachedContractOffer>>,
    converter: Arc<dyn CriterionConverter>,
    clock: Arc<dyn Clock>,
}

impl InMemoryFederatedCacheStore {
    pub fn new(converter: Arc<dyn CriterionConverter>, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            converter,
            clock,
        }
    }

    /// Number of cached offers
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for InMemoryFederatedCacheStore {
    fn default() -> Self {
        Self::new(Arc::new(PropertyCriterionConverter), Arc::new(SystemClock))
    }
}

#[async_trait]
impl FederatedCacheStore for InMemoryFederatedCacheStore {
    async fn save(&self, offer: ContractOffer) {
        let created_at = self.clock.now();
        let key = offer.asset_id().to_string();
        let mut entries = self.entries.write().await;
        if let Some(previous) = entries.insert(key, CachedContractOffer { created_at, offer }) {
            debug!("Replaced cached offer {}", previous.offer.id);
        }
    }

    async fn query(&self, criteria: &[Criterion]) -> CacheResult<Vec<ContractOffer>> {
        let predicates = criteria
            .iter()
            .map(|criterion| self.converter.convert(criterion))
            .collect::<CacheResult<Vec<OfferPredicate>>>()?;

        let entries = self.entries.read().await;
        Ok(entries
            .values()
            .map(|cached| &cached.offer)
            .filter(|offer| predicates.iter().all(|predicate| predicate(*offer)))
            .cloned()
            .collect())
    }

    async fn delete_expired(&self, ttl: Duration) -> usize {
        let now = self.clock.now();
        // A ttl reaching before the representable range expires nothing.
        let Some(cutoff) = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| now.checked_sub_signed(ttl))
        else {
            return 0;
        };

        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, cached| cached.created_at >= cutoff);
        let evicted = before - entries.len();

        if evicted > 0 {
            debug!("Evicted {} cached offers older than {}", evicted, cutoff);
        }
        evicted
    }
}
