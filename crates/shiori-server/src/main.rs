// Shiori workflow server
// Starts analysis sessions over HTTP and serves their progress from the checkpoint store.

mod config;
mod error;
mod pipeline;
mod routes;

use anyhow::{Context, Result};
use config::ServerConfig;
use shiori::{FileCheckpointStore, WorkflowService};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shiori=info,shiori_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("shiori-server starting...");

    let config = ServerConfig::from_env()?;
    tracing::info!(
        data_dir = %config.data_dir.display(),
        prefix = %config.api_prefix,
        max_concurrent_runs = ?config.max_concurrent_runs,
        reject_unknown_sessions = config.reject_unknown_sessions,
        "Configuration loaded"
    );

    tokio::fs::create_dir_all(&config.data_dir)
        .await
        .with_context(|| format!("Failed to create {}", config.data_dir.display()))?;

    let store = Arc::new(FileCheckpointStore::new(&config.data_dir));
    let pipeline = pipeline::analysis_pipeline(config.step_delay)
        .context("Failed to build analysis pipeline")?;
    let service_config = config.service_config(pipeline.len());
    let service = WorkflowService::new(store, pipeline, service_config);

    if config.cors_origins.is_empty() {
        tracing::info!("CORS allows any origin");
    } else {
        tracing::info!(origins = ?config.cors_origins, "CORS origins configured");
    }

    let app = routes::router(service, &config);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .context("Failed to bind to address")?;
    tracing::info!("Listening on {}", config.bind_addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
