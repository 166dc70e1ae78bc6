//! Protocol adapters and the registry crawlers dispatch through

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use tracing::debug;

use crate::app::models::{UpdateRequest, UpdateResponse};
use crate::errors::AdapterResult;

/// Sends catalog update requests for one protocol
#[async_trait]
pub trait ProtocolAdapter: Send + Sync + fmt::Debug {
    /// Name used in log messages
    fn name(&self) -> &str;

    /// Whether this adapter serves work items tagged with `protocol`
    fn matches(&self, protocol: &str) -> bool;

    /// Fetch the remote catalog described by `request`
    async fn send_request(&self, request: UpdateRequest) -> AdapterResult<UpdateResponse>;
}

/// Set of adapters available to a crawler
///
/// Registration takes the write lock; dispatch only clones the matching
/// `Arc`s under the read lock so that adapter calls never hold it. The lock
/// is never held across an await point.
#[derive(Debug, Default)]
pub struct AdapterRegistry {
    adapters: RwLock<Vec<Arc<dyn ProtocolAdapter>>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry pre-populated with `adapters`
    pub fn with_adapters(adapters: Vec<Arc<dyn ProtocolAdapter>>) -> Self {
        Self {
            adapters: RwLock::new(adapters),
        }
    }

    /// Add an adapter
    pub fn register(&self, adapter: Arc<dyn ProtocolAdapter>) {
        debug!("Registering protocol adapter {}", adapter.name());
        self.adapters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(adapter);
    }

    /// Add several adapters under one write lock
    pub fn extend(&self, adapters: impl IntoIterator<Item = Arc<dyn ProtocolAdapter>>) {
        let mut registered = self.adapters.write().unwrap_or_else(PoisonError::into_inner);
        for adapter in adapters {
            debug!("Registering protocol adapter {}", adapter.name());
            registered.push(adapter);
        }
    }

    /// Adapters whose `matches` accepts `protocol`, in registration order
    pub fn matching(&self, protocol: &str) -> Vec<Arc<dyn ProtocolAdapter>> {
        self.adapters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|adapter| adapter.matches(protocol))
            .cloned()
            .collect()
    }

    /// Consume the registry, returning its adapters
    pub fn into_inner(self) -> Vec<Arc<dyn ProtocolAdapter>> {
        self.adapters
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.adapters.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
