use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use mediagen_cloud::{S3Config, S3ObjectStorage};
use mediagen_core::model_config::ModelRegistry;
use mediagen_core::storage::ObjectStorage;
use mediagen_pipeline::postgres::PgStore;
use mediagen_pipeline::{AssetArchiver, GenerationService};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mediagen_api::background;
use mediagen_api::config::ServerConfig;
use mediagen_api::router::build_app_router;
use mediagen_api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mediagen_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env()?;
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    let models = ModelRegistry::from_path(&config.models_config_path)
        .with_context(|| format!("Failed to load {}", config.models_config_path))?;
    tracing::info!(
        path = %config.models_config_path,
        models = models.models().len(),
        "Model catalog loaded"
    );

    // --- Database ---
    let pool = mediagen_db::create_pool(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connection pool created");

    mediagen_db::health_check(&pool)
        .await
        .context("Database health check failed")?;
    mediagen_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    // --- Providers and storage ---
    let adapters = mediagen_providers::adapters_from_env();
    if adapters.is_empty() {
        tracing::warn!("No provider is configured; every generate request will be rejected");
    }

    let s3_config = S3Config::from_env().context("S3_BUCKET must be set")?;
    let storage: Arc<dyn ObjectStorage> = Arc::new(S3ObjectStorage::from_config(&s3_config).await);

    // --- Generation service ---
    let store = Arc::new(PgStore::new(pool.clone()));
    let archiver = AssetArchiver::new(store.clone(), storage);
    let service = GenerationService::new(
        Arc::new(models),
        adapters,
        store.clone(),
        store,
        archiver.clone(),
    );

    // --- Background archive retry ---
    let archive_cancel = CancellationToken::new();
    let archive_handle = tokio::spawn(background::asset_archive::run(
        archiver,
        Duration::from_secs(config.archive_retry_interval_secs),
        config.archive_batch_size,
        archive_cancel.clone(),
    ));

    // --- App ---
    let state = AppState {
        service,
        config: Arc::new(config.clone()),
        pool: Some(pool),
    };
    let app = build_app_router(state, &config)?;

    let addr = SocketAddr::new(
        config.host.parse().context("Invalid HOST address")?,
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    archive_cancel.cancel();
    let drain = Duration::from_secs(config.shutdown_timeout_secs);
    if tokio::time::timeout(drain, archive_handle).await.is_err() {
        tracing::warn!("Asset archive job did not stop in time");
    }

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
