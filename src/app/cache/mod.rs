//! Contract offer cache with time-based eviction
//!
//! Crawled offers are stored by asset id, so a newer offer for the same asset
//! replaces the older one and resets its age. Queries are conjunctions of
//! [`Criterion`]s converted to predicates by a [`CriterionConverter`].
//!
//! # Module Organization
//!
//! - [`config`] - TTL and eviction settings
//! - [`criterion`] - Query criteria and the property-based converter
//! - [`query`] - Query adapters and the registry fanning queries out to them
//! - [`store`] - The store trait and its in-memory implementation
//!
//! # Examples
//!
//! ```rust,no_run
//! use federated_catalog::app::cache::{
//!     Criterion, FederatedCacheStore, InMemoryFederatedCacheStore, ASSET_ID,
//! };
//! use federated_catalog::app::models::{Asset, ContractOffer};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = InMemoryFederatedCacheStore::default();
//! store.save(ContractOffer::new("offer-1", Asset::new("asset-1"))).await;
//!
//! let offers = store.query(&[Criterion::equals(ASSET_ID, "asset-1")]).await?;
//! assert_eq!(offers.len(), 1);
//!
//! let evicted = store.delete_expired(Duration::from_secs(3600)).await;
//! println!("evicted {} offers", evicted);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod criterion;
pub mod query;
pub mod store;

pub use config::CacheConfig;
pub use criterion::{
    Criterion, CriterionConverter, OfferPredicate, PropertyCriterionConverter, ASSET_ID, OFFER_ID,
};
pub use query::{
    CacheQuery, CacheQueryAdapter, QueryAdapter, QueryAdapterRegistry, QueryResponse, QueryStatus,
};
pub use store::{FederatedCacheStore, InMemoryFederatedCacheStore};
