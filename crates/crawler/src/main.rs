use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use torrenti_core::{
    load_config, validate_config, ContentIndexer, CrawlError, CrawlSession, ForumScraper, Frontier,
    ReqwestFetcher, ScraperRegistry, SqliteContentIndexer, SqliteFrontier, SqliteSubtitleIndexer,
    SqliteVisitStore, SubtitleIndexer, VisitStore,
};

use torrenti_crawler::api::create_router;
use torrenti_crawler::state::AppState;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("TORRENTI_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Database path: {:?}", config.database.path);
    info!("Crawl store path: {:?}", config.database.store_path);

    // Crawl state lives apart from the indexed content
    let frontier: Arc<dyn Frontier> = Arc::new(
        SqliteFrontier::new(&config.database.store_path).context("Failed to open frontier")?,
    );
    let visits: Arc<dyn VisitStore> = Arc::new(
        SqliteVisitStore::new(&config.database.store_path)
            .context("Failed to open visit store")?,
    );
    let indexer: Arc<dyn ContentIndexer> = Arc::new(
        SqliteContentIndexer::new(&config.database.path)
            .context("Failed to open content indexer")?,
    );
    let subtitles: Option<Arc<dyn SubtitleIndexer>> = if config.extract.subtitles {
        Some(Arc::new(
            SqliteSubtitleIndexer::new(&config.database.path)
                .context("Failed to open subtitle indexer")?,
        ))
    } else {
        info!("Subtitle indexing disabled");
        None
    };
    info!("Stores initialized");

    // Site adapters
    let mut registry = ScraperRegistry::new();
    for site in &config.sites {
        let scraper = ForumScraper::from_config(site.clone())
            .with_context(|| format!("Failed to build site adapter {}", site.name))?;
        registry.register(Arc::new(scraper));
    }
    if registry.is_empty() {
        warn!("No sites configured; pages will be fetched but no links followed");
    }

    let fetcher = Arc::new(
        ReqwestFetcher::new(&config.crawl.user_agent).context("Failed to create HTTP client")?,
    );

    let mut builder = CrawlSession::builder(config.crawl.clone())
        .frontier(Arc::clone(&frontier))
        .visits(visits)
        .indexer(indexer)
        .fetcher(fetcher)
        .extract(config.extract.clone());
    if let Some(subtitles) = &subtitles {
        builder = builder.subtitles(Arc::clone(subtitles));
    }
    let session = builder
        .build(&registry)
        .context("Failed to create crawl session")?;

    session.seed().context("Failed to queue seed")?;
    info!(
        "Seed queued, {} request(s) pending",
        frontier.queue_size().unwrap_or_default()
    );

    // Optional status server
    let server = if config.server.enabled {
        let state = Arc::new(AppState::new(Arc::clone(&session), subtitles.clone()));
        let app = create_router(state);

        let addr = SocketAddr::new(config.server.host, config.server.port);
        info!("Starting status server on {}", addr);
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind to {}", addr))?;

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });
        Some((shutdown_tx, handle))
    } else {
        None
    };

    // Stop the session cooperatively on Ctrl+C / SIGTERM
    let stopper = Arc::clone(&session);
    let signal_task = tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received");
        stopper.stop();
    });

    let outcome = session.run().await;
    signal_task.abort();

    if let Some((shutdown_tx, handle)) = server {
        let _ = shutdown_tx.send(());
        match handle.await {
            Ok(Ok(())) => info!("Status server stopped"),
            Ok(Err(e)) => error!("Status server error: {}", e),
            Err(e) => error!("Status server task failed: {}", e),
        }
    }

    match outcome {
        Ok(snapshot) => {
            info!(
                "Crawl finished: {} request(s), {} scraped, {} file(s), {} error(s)",
                snapshot.request, snapshot.scraped, snapshot.file, snapshot.err
            );
            Ok(())
        }
        Err(e @ CrawlError::Fatal(_)) => Err(e).context("Crawl stopped in fatal mode"),
        Err(e) => Err(e).context("Crawl failed"),
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
