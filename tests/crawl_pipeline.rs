//! End-to-end crawl tests
//!
//! These tests run whole sessions against catalogs stored as JSON files and
//! verify what ends up in the cache.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use federated_catalog::app::cache::{Criterion, FederatedCacheStore, ASSET_ID};
use federated_catalog::app::directory::FederatedCacheNode;
use federated_catalog::app::{Coordinator, FileCatalogAdapter, ProtocolAdapter};
use federated_catalog::config::AppConfig;
use serde_json::json;
use tempfile::TempDir;
use url::Url;

fn write_catalog(dir: &Path, name: &str, assets: &[(&str, &str)]) -> Url {
    let offers: Vec<_> = assets
        .iter()
        .map(|(asset, kind)| {
            json!({
                "id": format!("{name}-{asset}"),
                "asset": { "id": asset, "properties": { "kind": kind } }
            })
        })
        .collect();
    let path = dir.join(format!("{name}.json"));
    std::fs::write(&path, json!({ "id": name, "contract_offers": offers }).to_string()).unwrap();
    Url::from_file_path(&path).unwrap()
}

fn session_config(nodes: Vec<FederatedCacheNode>) -> AppConfig {
    let mut config = AppConfig::default();
    config.nodes = nodes;
    config.partition.crawler_count = 3;
    config.partition.execution_period = Duration::from_millis(100);
    config.partition.shutdown_timeout = Duration::from_secs(5);
    config.crawler.wait_for_work_item = Duration::from_millis(10);
    config
}

fn file_adapters() -> Vec<Arc<dyn ProtocolAdapter>> {
    vec![Arc::new(FileCatalogAdapter::new())]
}

async fn wait_for_offers(coordinator: &Coordinator, expected: usize) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while coordinator.store().len().await < expected && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn test_offers_from_file_catalogs_are_cached() {
    let dir = TempDir::new().unwrap();
    let alpha = write_catalog(dir.path(), "alpha", &[("a1", "dataset"), ("a2", "service")]);
    let beta = write_catalog(dir.path(), "beta", &[("b1", "dataset")]);

    let config = session_config(vec![
        FederatedCacheNode::new("alpha", alpha, vec!["file".to_string()]),
        FederatedCacheNode::new("beta", beta, vec!["file".to_string()]),
    ]);

    let coordinator = Coordinator::start(&config, file_adapters()).await.unwrap();
    wait_for_offers(&coordinator, 3).await;

    let datasets = coordinator
        .store()
        .query(&[Criterion::equals("kind", "dataset")])
        .await
        .unwrap();
    let mut ids: Vec<_> = datasets.iter().map(|o| o.asset_id().to_string()).collect();
    ids.sort();
    assert_eq!(ids, vec!["a1".to_string(), "b1".to_string()]);

    let summary = coordinator.shutdown().await;
    assert!(summary.clean_shutdown);
    assert_eq!(summary.cached_offers, 3);
    assert_eq!(summary.crawl.adapter_failures, 0);
}

#[tokio::test]
async fn test_recrawl_picks_up_changed_catalog() {
    let dir = TempDir::new().unwrap();
    let url = write_catalog(dir.path(), "gamma", &[("g1", "dataset")]);
    let config = session_config(vec![FederatedCacheNode::new(
        "gamma",
        url,
        vec!["file".to_string()],
    )]);

    let coordinator = Coordinator::start(&config, file_adapters()).await.unwrap();
    wait_for_offers(&coordinator, 1).await;

    write_catalog(dir.path(), "gamma", &[("g1", "service"), ("g2", "dataset")]);
    wait_for_offers(&coordinator, 2).await;

    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        let services = coordinator
            .store()
            .query(&[
                Criterion::equals(ASSET_ID, "g1"),
                Criterion::equals("kind", "service"),
            ])
            .await
            .unwrap();
        if services.len() == 1 || Instant::now() >= deadline {
            assert_eq!(services.len(), 1, "g1 was not replaced by the newer offer");
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let summary = coordinator.shutdown().await;
    assert!(summary.queue.refills >= 2);
}

#[tokio::test]
async fn test_failing_and_unmatched_nodes_do_not_stop_the_session() {
    let dir = TempDir::new().unwrap();
    let good = write_catalog(dir.path(), "good", &[("ok", "dataset")]);
    let missing = Url::from_file_path(dir.path().join("missing.json")).unwrap();

    let mut config = session_config(vec![
        FederatedCacheNode::new("good", good, vec!["file".to_string()]),
        FederatedCacheNode::new("missing", missing, vec!["file".to_string()]),
        FederatedCacheNode::new(
            "remote",
            Url::parse("https://remote.example/catalog").unwrap(),
            vec!["dsp".to_string()],
        ),
    ]);
    config.crawler.requeue.max_attempts = Some(2);

    let coordinator = Coordinator::start(&config, file_adapters()).await.unwrap();
    wait_for_offers(&coordinator, 1).await;

    let deadline = Instant::now() + Duration::from_secs(10);
    while coordinator.manager().stats().dropped == 0 && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let summary = coordinator.shutdown().await;
    assert_eq!(summary.cached_offers, 1);
    assert!(summary.crawl.adapter_failures >= 1);
    assert!(summary.crawl.requeued >= 1);
    assert!(summary.crawl.dropped >= 1);
}

#[tokio::test]
async fn test_config_file_drives_session() {
    let dir = TempDir::new().unwrap();
    let url = write_catalog(dir.path(), "delta", &[("d1", "dataset")]);
    let config_path = dir.path().join("catalog.toml");
    let content = format!(
        r#"
[partition]
crawler_count = 2
execution_period = "100ms"
shutdown_timeout = "5s"

[crawler]
wait_for_work_item = "10ms"

[[nodes]]
name = "delta"
target_url = "{url}"
supported_protocols = ["file"]
"#
    );
    std::fs::write(&config_path, content).unwrap();

    let config = AppConfig::load(Some(config_path)).await.unwrap();
    let coordinator = Coordinator::start(&config, file_adapters()).await.unwrap();
    wait_for_offers(&coordinator, 1).await;

    let summary = coordinator.shutdown().await;
    assert_eq!(summary.cached_offers, 1);
    assert_eq!(summary.loader.offers_saved, summary.loader.responses);
}
