use std::sync::Arc;

use tracing::{error, info, warn};

use readkey::{Config, Enricher, FeedRegistry, HttpFeedFetcher, MemoryStore};

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    // Load configuration
    let config = match Config::load_with_env(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {config_path}: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    // Initialize logging
    if let Err(e) = readkey::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        readkey::logging::init_console_only(&config.logging.level);
    }

    info!("ReadKey - feed ingestion with keyword enrichment");

    if let Err(e) = run(config).await {
        error!("ReadKey stopped with error: {}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> readkey::Result<()> {
    config.validate()?;

    let store = Arc::new(match &config.storage.snapshot_path {
        Some(path) => MemoryStore::open(path).await?,
        None => MemoryStore::new(),
    });

    let enricher = Enricher::from_config(&config.keyword)?;
    info!(mode = ?config.keyword.mode, endpoint = %config.keyword.endpoint, "Keyword enrichment configured");

    let fetcher = Arc::new(HttpFeedFetcher::new(&config.feeder)?);
    let registry = FeedRegistry::new(fetcher, store.clone(), enricher, config.feeder.clone());

    let resumed = registry.recover().await?;
    info!(resumed, "Resumed listening sources");

    for url in &config.feeder.seed_urls {
        match registry.get_feed_source(url).await {
            Ok(source) => info!(url = %url, source_id = %source.source_id, "Seed feed ready"),
            Err(e) => warn!(url = %url, "Failed to establish seed feed: {}", e),
        }
    }

    info!(
        active = registry.active_sources().await.len(),
        "Feed registry running, press Ctrl-C to stop"
    );
    tokio::signal::ctrl_c().await?;

    registry.shutdown().await;
    store.flush().await?;
    info!("ReadKey stopped");
    Ok(())
}
