//! Protocol adapter reading catalogs from local JSON files

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;
use url::Url;

use crate::app::crawler::ProtocolAdapter;
use crate::app::models::{Catalog, UpdateRequest, UpdateResponse};
use crate::constants::crawler::FILE_PROTOCOL;
use crate::errors::{AdapterError, AdapterResult};

/// Serves work items tagged `file` whose URL is a `file://` path to a JSON catalog
#[derive(Debug, Default, Clone, Copy)]
pub struct FileCatalogAdapter;

impl FileCatalogAdapter {
    pub fn new() -> Self {
        Self
    }

    fn path_for(url: &Url) -> AdapterResult<PathBuf> {
        if url.scheme() != "file" {
            return Err(AdapterError::UnsupportedUrl {
                url: url.to_string(),
            });
        }
        url.to_file_path()
            .map_err(|_| AdapterError::UnsupportedUrl {
                url: url.to_string(),
            })
    }
}

#[async_trait]
impl ProtocolAdapter for FileCatalogAdapter {
    fn name(&self) -> &str {
        "file-catalog"
    }

    fn matches(&self, protocol: &str) -> bool {
        protocol == FILE_PROTOCOL
    }

    async fn send_request(&self, request: UpdateRequest) -> AdapterResult<UpdateResponse> {
        let path = Self::path_for(&request.url)?;
        debug!("Reading catalog from {}", path.display());

        let content = tokio::fs::read(&path).await?;
        let catalog: Catalog = serde_json::from_slice(&content)?;
        Ok(UpdateResponse::new(request.url, catalog))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn request(url: Url) -> UpdateRequest {
        UpdateRequest {
            url,
            protocol: FILE_PROTOCOL.to_string(),
        }
    }

    #[tokio::test]
    async fn test_reads_catalog_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("catalog.json");
        let catalog = json!({
            "id": "provider-catalog",
            "contract_offers": [
                { "id": "offer-1", "asset": { "id": "asset-1", "properties": { "kind": "dataset" } } }
            ]
        });
        std::fs::write(&path, catalog.to_string()).unwrap();

        let url = Url::from_file_path(&path).unwrap();
        let response = FileCatalogAdapter::new()
            .send_request(request(url.clone()))
            .await
            .unwrap();

        assert_eq!(response.source, url);
        assert_eq!(response.catalog.id, "provider-catalog");
        assert_eq!(response.catalog.contract_offers[0].asset_id(), "asset-1");
    }

    #[tokio::test]
    async fn test_rejects_non_file_urls() {
        let url = Url::parse("https://provider.example/catalog").unwrap();
        let err = FileCatalogAdapter::new()
            .send_request(request(url))
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::UnsupportedUrl { .. }));
    }

    #[tokio::test]
    async fn test_missing_and_malformed_files() {
        let dir = TempDir::new().unwrap();
        let missing = Url::from_file_path(dir.path().join("absent.json")).unwrap();
        let err = FileCatalogAdapter::new()
            .send_request(request(missing))
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::Io(_)));

        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = FileCatalogAdapter::new()
            .send_request(request(Url::from_file_path(&path).unwrap()))
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::Decode(_)));
    }

    #[test]
    fn test_matches_file_protocol_only() {
        let adapter = FileCatalogAdapter::new();
        assert!(adapter.matches("file"));
        assert!(!adapter.matches("dsp"));
    }
}
