//! Data models for the crawling pipeline
//!
//! Work items describe what to crawl, update requests/responses carry a single
//! crawl attempt, and contract offers are what ends up in the cache.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

/// One remote catalog endpoint to poll
///
/// Work items are immutable values. When a crawl attempt fails the crawler
/// derives a new item with [`WorkItem::with_error`] and requeues that one, so a
/// worker never observes another worker's in-place mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    url: Url,
    protocol: String,
    error: Option<String>,
    attempts: u32,
}

impl WorkItem {
    /// Create a fresh work item for a catalog URL and protocol tag
    pub fn new(url: Url, protocol: impl Into<String>) -> Self {
        Self {
            url,
            protocol: protocol.into(),
            error: None,
            attempts: 0,
        }
    }

    /// Target catalog URL
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Protocol tag used for adapter matching
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// Last error recorded against this item
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Number of failed attempts recorded so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Derive the item to requeue after a failure
    pub fn with_error(&self, message: impl Into<String>) -> Self {
        Self {
            url: self.url.clone(),
            protocol: self.protocol.clone(),
            error: Some(message.into()),
            attempts: self.attempts.saturating_add(1),
        }
    }
}

impl fmt::Display for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.url, self.protocol)
    }
}

/// Request sent to a protocol adapter for one crawl attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRequest {
    /// Catalog URL to query
    pub url: Url,
    /// Protocol tag of the originating work item
    pub protocol: String,
}

impl From<&WorkItem> for UpdateRequest {
    fn from(item: &WorkItem) -> Self {
        Self {
            url: item.url().clone(),
            protocol: item.protocol().to_string(),
        }
    }
}

/// Response produced by a protocol adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateResponse {
    /// Catalog URL the response came from
    pub source: Url,
    /// The catalog returned by the remote participant
    pub catalog: Catalog,
}

impl UpdateResponse {
    pub fn new(source: Url, catalog: Catalog) -> Self {
        Self { source, catalog }
    }
}

/// A remote participant's catalog
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Catalog {
    /// Catalog identifier as published by the participant
    pub id: String,
    /// Offers contained in the catalog
    #[serde(default)]
    pub contract_offers: Vec<ContractOffer>,
}

/// An asset referenced by a contract offer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    /// Asset identifier, the cache key
    pub id: String,
    /// Free-form asset properties
    #[serde(default)]
    pub properties: HashMap<String, serde_json::Value>,
}

impl Asset {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            properties: HashMap::new(),
        }
    }

    /// Add a property, builder style
    pub fn with_property(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }
}

/// A contract offer discovered in a remote catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractOffer {
    /// Offer identifier
    pub id: String,
    /// Offered asset
    pub asset: Asset,
    /// Usage policy, kept opaque
    #[serde(default)]
    pub policy: serde_json::Value,
    /// Participant publishing the offer
    #[serde(default)]
    pub provider: Option<Url>,
}

impl ContractOffer {
    pub fn new(id: impl Into<String>, asset: Asset) -> Self {
        Self {
            id: id.into(),
            asset,
            policy: serde_json::Value::Null,
            provider: None,
        }
    }

    /// Identifier of the offered asset
    pub fn asset_id(&self) -> &str {
        &self.asset.id
    }
}
