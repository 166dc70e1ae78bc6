//! Directory of federated catalog nodes to crawl

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::app::models::WorkItem;

/// A remote participant publishing a catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FederatedCacheNode {
    /// Unique node name
    pub name: String,
    /// Catalog endpoint
    pub target_url: Url,
    /// Protocol tags the node can be crawled with
    #[serde(default)]
    pub supported_protocols: Vec<String>,
}

impl FederatedCacheNode {
    pub fn new(name: impl Into<String>, target_url: Url, supported_protocols: Vec<String>) -> Self {
        Self {
            name: name.into(),
            target_url,
            supported_protocols,
        }
    }
}

/// Source of the nodes making up the federation
pub trait NodeDirectory: Send + Sync + fmt::Debug {
    fn get_all(&self) -> Vec<FederatedCacheNode>;
}

/// Fixed node list, typically from configuration
#[derive(Debug, Clone, Default)]
pub struct StaticNodeDirectory {
    nodes: Vec<FederatedCacheNode>,
}

impl StaticNodeDirectory {
    pub fn new(nodes: Vec<FederatedCacheNode>) -> Self {
        Self { nodes }
    }
}

impl NodeDirectory for StaticNodeDirectory {
    fn get_all(&self) -> Vec<FederatedCacheNode> {
        self.nodes.clone()
    }
}

/// One work item per (node, protocol) pair
pub fn work_items_for(nodes: &[FederatedCacheNode]) -> Vec<WorkItem> {
    nodes
        .iter()
        .flat_map(|node| {
            node.supported_protocols
                .iter()
                .map(|protocol| WorkItem::new(node.target_url.clone(), protocol.clone()))
        })
        .collect()
}
