//! Catalog crawler CLI application
//!
//! Crawls the catalogs of every configured federation node into a local
//! offer cache until interrupted.

use std::process;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use federated_catalog::cli::{handle_config, handle_run, Cli, Commands};
use federated_catalog::config::AppConfig;
use federated_catalog::constants::DEFAULT_LOG_LEVEL;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse_args();

    let loaded = AppConfig::load(cli.global.config.clone())
        .await
        .map_err(federated_catalog::AppError::from);

    let configured_level = loaded
        .as_ref()
        .map(|config| config.logging.level.as_str())
        .unwrap_or(DEFAULT_LOG_LEVEL);
    init_logging(&cli, configured_level);

    info!("Catalog crawler v{} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Run(args) => {
            let config = loaded.context("Failed to load configuration")?;
            handle_run(config, args).await.context("Crawl session failed")
        }
        Commands::Config(args) => handle_config(loaded, args)
            .await
            .context("Configuration command failed"),
    }
}

/// Initialize logging from CLI flags, falling back to the configured level
///
/// `RUST_LOG` directives still apply on top of the crate-level directive.
fn init_logging(cli: &Cli, configured_level: &str) {
    let level = cli
        .log_level()
        .map(|level| level.to_string().to_lowercase())
        .unwrap_or_else(|| configured_level.to_string());

    let mut filter = EnvFilter::from_default_env();
    match format!("federated_catalog={}", level).parse() {
        Ok(directive) => filter = filter.add_directive(directive),
        Err(e) => eprintln!("Ignoring invalid log level '{}': {}", level, e),
    }

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(cli.global.very_verbose)
        .init();

    if cli.global.very_verbose {
        info!("Very verbose logging enabled");
    } else if cli.global.verbose {
        info!("Verbose logging enabled");
    }
}
