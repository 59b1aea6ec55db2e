mod api_doc;
mod chunker;
mod chunks;
mod config;
mod embedding;
mod error;
mod handlers;
mod loader;
mod logging;
mod models;
mod routes;
mod state;
mod storage;
mod vector_store;
mod views;

use std::sync::Arc;

use anyhow::Context;
use config::Config;
use embedding::EmbedderRegistry;
use state::AppState;
use storage::FileStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    let _log_guards = logging::init(&config)?;

    tracing::info!("rag-pipeline starting");
    config.log_startup();

    views::validate(views::ROUTES).context("Invalid view route table")?;

    let store = FileStore::from_config(&config).await?;
    let registry = Arc::new(EmbedderRegistry::from_config(&config)?);
    tracing::info!("Embedding models available: {:?}", registry);

    let addr = format!("{}:{}", config.service_host, config.service_port);
    let app = routes::app(AppState::new(config, store, registry));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Listening on http://{}", addr);
    tracing::info!("API docs at http://{}{}", addr, routes::SWAGGER_UI);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("rag-pipeline stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
