//! Command handlers for the catalog crawler CLI
//!
//! Handlers receive an already loaded configuration and connect it to the
//! coordinator, printing results for the user.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use crate::app::{
    wait_for_shutdown_signal, Coordinator, FileCatalogAdapter, ProtocolAdapter, SessionSummary,
};
use crate::cli::{ConfigAction, ConfigArgs, RunArgs};
use crate::config::AppConfig;
use crate::errors::{AppError, Result};

/// Handle the run command
///
/// Crawls until Ctrl+C (or SIGTERM) or until the requested deadline, then
/// stops every component and prints the session summary.
pub async fn handle_run(config: AppConfig, args: RunArgs) -> Result<()> {
    let adapters: Vec<Arc<dyn ProtocolAdapter>> = vec![Arc::new(FileCatalogAdapter::new())];

    info!(
        "Crawling {} nodes with {} crawlers",
        config.nodes.len(),
        config.partition.crawler_count
    );
    let coordinator = Coordinator::start(&config, adapters).await?;

    match args.run_for() {
        Some(deadline) => {
            tokio::select! {
                _ = tokio::time::sleep(deadline) => {
                    info!("Run deadline of {:?} reached", deadline);
                }
                _ = wait_for_shutdown_signal() => {}
            }
        }
        None => wait_for_shutdown_signal().await,
    }

    let summary = coordinator.shutdown().await;
    if !summary.clean_shutdown {
        warn!("Some crawlers had to be aborted during shutdown");
    }

    if args.json {
        let json = serde_json::to_string_pretty(&summary)
            .map_err(|e| AppError::generic(format!("Failed to render summary: {}", e)))?;
        println!("{}", json);
    } else {
        print_summary(&summary);
    }

    Ok(())
}

/// Handle configuration management commands
pub async fn handle_config(loaded: Result<AppConfig>, args: ConfigArgs) -> Result<()> {
    match args.action {
        ConfigAction::Show => {
            let config = loaded?;
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
        ConfigAction::Init { path, force } => init_config(path, force).await,
    }
}

async fn init_config(path: Option<PathBuf>, force: bool) -> Result<()> {
    let path = match path {
        Some(path) => path,
        None => AppConfig::default_config_path()?,
    };

    if path.exists() && !force {
        return Err(AppError::generic(format!(
            "Configuration file {} already exists (use --force to overwrite)",
            path.display()
        )));
    }

    AppConfig::write_default(&path).await?;

    println!("📁 Created default configuration file:");
    println!("   {}", path.display());
    println!("   Add [[nodes]] entries to start crawling.");
    Ok(())
}

fn print_summary(summary: &SessionSummary) {
    println!();
    println!("Crawl session finished in {:.1}s", summary.duration.as_secs_f64());
    println!("  Cycles:             {}", summary.crawl.cycles);
    println!("  Adapter calls:      {}", summary.crawl.dispatched);
    println!("  Responses delivered: {}", summary.crawl.delivered);
    println!("  Adapter failures:   {}", summary.crawl.adapter_failures);
    println!("  Undelivered:        {}", summary.crawl.undelivered);
    println!("  Requeued:           {}", summary.crawl.requeued);
    println!("  Dropped:            {}", summary.crawl.dropped);
    println!("  Offers saved:       {}", summary.loader.offers_saved);
    println!("  Offers cached:      {}", summary.cached_offers);
    println!(
        "  Queue:              {} refills, {} taken, {:.1}% rejected",
        summary.queue.refills,
        summary.queue.taken,
        summary.queue.rejection_rate()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ConfigError;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_config_init_refuses_to_overwrite() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");

        init_config(Some(path.clone()), false).await.unwrap();
        assert!(path.exists());

        assert!(init_config(Some(path.clone()), false).await.is_err());
        init_config(Some(path.clone()), true).await.unwrap();

        let config = AppConfig::load(Some(path)).await.unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[tokio::test]
    async fn test_config_show_reports_load_errors() {
        let loaded = Err(AppError::from(ConfigError::NotFound {
            path: PathBuf::from("missing.toml"),
        }));
        let args = ConfigArgs {
            action: ConfigAction::Show,
        };
        assert!(handle_config(loaded, args).await.is_err());
    }

    #[tokio::test]
    async fn test_run_with_deadline_and_no_nodes() {
        let mut config = AppConfig::default();
        config.partition.shutdown_timeout = std::time::Duration::from_secs(2);
        let args = RunArgs {
            run_for_secs: Some(0),
            json: true,
        };
        handle_run(config, args).await.unwrap();
    }
}
