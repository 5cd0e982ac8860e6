use book_catalog::{
    activity::{ActivityBuffer, ActivityStore, InMemoryActivityStore, RedisActivityStore},
    api::{build_router, AppState},
    catalog::BookCatalog,
    config::Config,
    pipeline::WritePool,
    search::{index_mappings, DocumentIndex, ElasticsearchClient, SearchGateway},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let (config, config_error) = match Config::load() {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };

    init_tracing(&config);
    if let Some(e) = config_error {
        tracing::warn!("Failed to load configuration: {}", e);
        tracing::warn!("Using default configuration");
    }

    tracing::info!("Starting Book Catalog v{}", env!("CARGO_PKG_VERSION"));

    // Initialize Prometheus metrics
    if config.observability.prometheus_enabled {
        if let Err(e) = book_catalog::metrics::init_metrics() {
            tracing::warn!("Failed to initialize metrics: {}", e);
            tracing::warn!("Continuing without metrics");
        } else {
            tracing::info!("Prometheus metrics initialized");
        }
    } else {
        tracing::info!("Prometheus metrics disabled in configuration");
    }

    // Search backend
    let client = ElasticsearchClient::new(config.search.clone())?;
    let index: Arc<dyn DocumentIndex> = Arc::new(client);
    let gateway = SearchGateway::new(index.clone(), config.search.books_index.clone());

    match index.ping().await {
        Ok(()) => tracing::info!(url = %config.search.url, "Search backend reachable"),
        Err(e) => tracing::warn!(url = %config.search.url, error = %e, "Search backend ping failed"),
    }
    if let Err(e) = gateway
        .ensure_indices(&index_mappings(&config.search.books_index))
        .await
    {
        tracing::warn!(error = %e, "Index initialization incomplete");
    }

    // Activity log
    let store: Arc<dyn ActivityStore> =
        match RedisActivityStore::new(&config.activity.redis_url, &config.activity.key_prefix).await
        {
            Ok(store) => Arc::new(store),
            Err(e) => {
                tracing::warn!(error = %e, "Redis unavailable, keeping activity in memory");
                Arc::new(InMemoryActivityStore::new())
            }
        };
    let activity = Arc::new(ActivityBuffer::start(store, &config.activity));

    // Write pipeline
    let pool = Arc::new(WritePool::new(index, config.pipeline.clone()));
    pool.start(config.pipeline.worker_count);

    let catalog = Arc::new(BookCatalog::new(pool, gateway, activity));
    let state = AppState::new(catalog.clone()).with_request_timeout(config.server.request_timeout());
    let app = build_router(state);

    // Start HTTP server
    let http_addr = format!("{}:{}", config.server.host, config.server.http_port);
    let http_listener = tokio::net::TcpListener::bind(&http_addr).await?;

    tracing::info!("HTTP API server listening on http://{}", http_addr);
    tracing::info!("Press Ctrl+C to shutdown");

    axum::serve(
        http_listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Shutting down gracefully...");
    catalog.shutdown().await;
    tracing::info!("Shutdown complete");

    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "book_catalog={},tower_http=info",
            config.observability.log_level
        )
        .into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.observability.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
