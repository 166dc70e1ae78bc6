//! Query fan-out over registered query adapters
//!
//! A [`QueryAdapterRegistry`] hands a [`CacheQuery`] to every adapter that can
//! execute it and merges their offers. One failing adapter does not fail the
//! query: its error is collected next to the offers of the others.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::criterion::Criterion;
use super::store::FederatedCacheStore;
use crate::app::models::ContractOffer;
use crate::errors::QueryResult;

/// Conjunction of criteria; an empty query matches every offer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheQuery {
    pub criteria: Vec<Criterion>,
}

impl CacheQuery {
    pub fn new(criteria: Vec<Criterion>) -> Self {
        Self { criteria }
    }

    /// Add one more criterion
    pub fn and(mut self, criterion: Criterion) -> Self {
        self.criteria.push(criterion);
        self
    }
}

/// Answers cache queries from one source
#[async_trait]
pub trait QueryAdapter: Send + Sync + fmt::Debug {
    /// Name used in log messages and error reports
    fn name(&self) -> &str;

    /// Whether this adapter understands `query`
    fn can_execute(&self, query: &CacheQuery) -> bool;

    /// Offers matching `query`
    async fn execute_query(&self, query: &CacheQuery) -> QueryResult<Vec<ContractOffer>>;
}

/// Whether any adapter took the query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStatus {
    /// At least one adapter executed the query, successfully or not
    Accepted,
    /// No registered adapter can execute the query
    NoAdapterFound,
}

/// Merged result of a query across adapters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub status: QueryStatus,
    /// Offers from every adapter that succeeded, in registration order
    pub offers: Vec<ContractOffer>,
    /// One message per adapter that failed
    pub errors: Vec<String>,
}

impl QueryResponse {
    fn no_adapter() -> Self {
        Self {
            status: QueryStatus::NoAdapterFound,
            offers: Vec::new(),
            errors: Vec::new(),
        }
    }
}

/// In-memory set of query adapters
#[derive(Debug, Default)]
pub struct QueryAdapterRegistry {
    adapters: RwLock<Vec<Arc<dyn QueryAdapter>>>,
}

impl QueryAdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, adapter: Arc<dyn QueryAdapter>) {
        debug!("Registering query adapter {}", adapter.name());
        self.adapters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(adapter);
    }

    /// Every registered adapter, in registration order
    pub fn adapters(&self) -> Vec<Arc<dyn QueryAdapter>> {
        self.adapters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Run `query` on every adapter that can execute it
    pub async fn execute_query(&self, query: &CacheQuery) -> QueryResponse {
        let capable: Vec<_> = self
            .adapters()
            .into_iter()
            .filter(|adapter| adapter.can_execute(query))
            .collect();

        if capable.is_empty() {
            debug!("No query adapter can execute {} criteria", query.criteria.len());
            return QueryResponse::no_adapter();
        }

        let results = join_all(capable.iter().map(|adapter| adapter.execute_query(query))).await;

        let mut offers = Vec::new();
        let mut errors = Vec::new();
        for (adapter, result) in capable.iter().zip(results) {
            match result {
                Ok(found) => offers.extend(found),
                Err(e) => {
                    warn!("Query adapter {} failed: {}", adapter.name(), e);
                    errors.push(e.to_string());
                }
            }
        }

        QueryResponse {
            status: QueryStatus::Accepted,
            offers,
            errors,
        }
    }
}

/// Query adapter answering from a federated cache store
#[derive(Clone)]
pub struct CacheQueryAdapter {
    store: Arc<dyn FederatedCacheStore>,
}

impl CacheQueryAdapter {
    pub fn new(store: Arc<dyn FederatedCacheStore>) -> Self {
        Self { store }
    }
}

impl fmt::Debug for CacheQueryAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheQueryAdapter").finish_non_exhaustive()
    }
}

#[async_trait]
impl QueryAdapter for CacheQueryAdapter {
    fn name(&self) -> &str {
        "federated-cache"
    }

    fn can_execute(&self, _query: &CacheQuery) -> bool {
        true
    }

    async fn execute_query(&self, query: &CacheQuery) -> QueryResult<Vec<ContractOffer>> {
        Ok(self.store.query(&query.criteria).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::cache::{InMemoryFederatedCacheStore, ASSET_ID};
    use crate::app::models::Asset;
    use crate::errors::QueryError;

    #[derive(Debug)]
    enum Answer {
        Offers(&'static [&'static str]),
        Fail,
        Decline,
    }

    #[derive(Debug)]
    struct FixedAdapter(Answer);

    #[async_trait]
    impl QueryAdapter for FixedAdapter {
        fn name(&self) -> &str {
            "fixed"
        }

        fn can_execute(&self, _query: &CacheQuery) -> bool {
            !matches!(self.0, Answer::Decline)
        }

        async fn execute_query(&self, _query: &CacheQuery) -> QueryResult<Vec<ContractOffer>> {
            match &self.0 {
                Answer::Offers(assets) => Ok(assets
                    .iter()
                    .map(|asset| ContractOffer::new(format!("offer-{asset}"), Asset::new(*asset)))
                    .collect()),
                Answer::Fail => Err(QueryError::AdapterFailed {
                    adapter: "fixed".to_string(),
                    reason: "timeout".to_string(),
                }),
                Answer::Decline => unreachable!("declining adapters are never executed"),
            }
        }
    }

    fn registry(answers: Vec<Answer>) -> QueryAdapterRegistry {
        let registry = QueryAdapterRegistry::new();
        for answer in answers {
            registry.register(Arc::new(FixedAdapter(answer)));
        }
        registry
    }

    fn asset_ids(response: &QueryResponse) -> Vec<&str> {
        response.offers.iter().map(|offer| offer.asset_id()).collect()
    }

    #[tokio::test]
    async fn test_no_adapter_registered() {
        let response = registry(Vec::new()).execute_query(&CacheQuery::default()).await;

        assert_eq!(response.status, QueryStatus::NoAdapterFound);
        assert!(response.offers.is_empty());
        assert!(response.errors.is_empty());
    }

    #[tokio::test]
    async fn test_no_adapter_can_execute() {
        let registry = registry(vec![Answer::Decline, Answer::Decline]);
        let response = registry.execute_query(&CacheQuery::default()).await;

        assert_eq!(response.status, QueryStatus::NoAdapterFound);
        assert_eq!(registry.adapters().len(), 2);
    }

    #[tokio::test]
    async fn test_results_merged_in_registration_order() {
        let registry = registry(vec![
            Answer::Offers(&["a1", "a2"]),
            Answer::Decline,
            Answer::Offers(&["b1"]),
        ]);
        let response = registry.execute_query(&CacheQuery::default()).await;

        assert_eq!(response.status, QueryStatus::Accepted);
        assert_eq!(asset_ids(&response), ["a1", "a2", "b1"]);
        assert!(response.errors.is_empty());
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_other_results() {
        let registry = registry(vec![
            Answer::Offers(&["a1", "a2", "a3"]),
            Answer::Fail,
            Answer::Offers(&["b1", "b2", "b3"]),
        ]);
        let response = registry.execute_query(&CacheQuery::default()).await;

        assert_eq!(response.status, QueryStatus::Accepted);
        assert_eq!(response.offers.len(), 6);
        assert_eq!(response.errors, ["Query adapter fixed failed: timeout"]);
    }

    #[tokio::test]
    async fn test_total_failure_is_still_accepted() {
        let registry = registry(vec![Answer::Fail, Answer::Fail, Answer::Fail]);
        let response = registry.execute_query(&CacheQuery::default()).await;

        assert_eq!(response.status, QueryStatus::Accepted);
        assert!(response.offers.is_empty());
        assert_eq!(response.errors.len(), 3);
    }

    #[tokio::test]
    async fn test_cache_adapter_applies_criteria() {
        let store = Arc::new(InMemoryFederatedCacheStore::default());
        store.save(ContractOffer::new("o1", Asset::new("a1"))).await;
        store.save(ContractOffer::new("o2", Asset::new("a2"))).await;

        let registry = QueryAdapterRegistry::new();
        registry.register(Arc::new(CacheQueryAdapter::new(store)));

        let query = CacheQuery::default().and(Criterion::equals(ASSET_ID, "a2"));
        let response = registry.execute_query(&query).await;
        assert_eq!(asset_ids(&response), ["a2"]);

        let query = CacheQuery::new(vec![Criterion::new(ASSET_ID, "like", "a%")]);
        let response = registry.execute_query(&query).await;
        assert_eq!(response.status, QueryStatus::Accepted);
        assert_eq!(response.errors.len(), 1);
        assert!(response.errors[0].contains("like"));
    }
}
