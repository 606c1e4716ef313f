use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use yachtsync_importer::config::ImporterConfig;
use yachtsync_importer::media::HttpMediaFetcher;
use yachtsync_importer::routes::build_router;
use yachtsync_importer::state::ImporterState;
use yachtsync_importer::store::{ImportStore, MemoryImportStore, PgImportStore};
use yachtsync_importer::translation::backend_for;
use yachtsync_importer::Importer;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "yachtsync_importer=debug,tower_http=debug".into());
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);
    if json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    // --- Configuration ---
    let config = ImporterConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = config.port,
        backend = config.translation_backend.as_str(),
        configured = config.api_key.is_some(),
        "Loaded importer configuration",
    );
    if config.api_key.is_none() {
        tracing::warn!("IMPORTER_API_KEY is not set, every import will be rejected");
    }

    // --- Storage ---
    let (store, pool) = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(url)
                .await
                .expect("Failed to connect to database");
            let store = PgImportStore::new(pool.clone());
            store
                .run_migrations()
                .await
                .expect("Failed to run importer migrations");
            tracing::info!("PostgreSQL import store ready");
            let store: Arc<dyn ImportStore> = Arc::new(store);
            (store, Some(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL is not set, using the in-memory import store");
            let store: Arc<dyn ImportStore> = Arc::new(MemoryImportStore::new());
            (store, None)
        }
    };

    // --- Importer ---
    let fetcher = HttpMediaFetcher::new(
        config.media_dir.clone(),
        Duration::from_secs(config.media_timeout_secs),
    )
    .expect("Failed to build media HTTP client");
    let importer = Importer::new(store, Arc::new(fetcher))
        .with_translation_backend(backend_for(config.translation_backend))
        .with_custom_fields(config.custom_fields_enabled);

    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    let state = ImporterState {
        importer,
        config: Arc::new(config),
        pool,
    };
    let app = build_router(state);

    // --- Start server ---
    tracing::info!(%addr, "Starting importer");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Importer stopped");
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT, shutting down"),
        () = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
