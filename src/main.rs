use anyhow::Context;
use churn_server::api::setup::{load_model, setup_logging, setup_metrics};
use churn_server::config::ServerConfig;
use churn_server::{create_router, AppState};
use std::sync::Arc;
use tracing::info;

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {:?}", e);
    }
    info!("Shutting down");
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    setup_logging()?;

    let config = ServerConfig::from_env().with_context(|| "Failed to load server config")?;

    // refuse to start without a usable model
    let model = load_model(&config)?;
    info!(
        "Serving {} model over features {:?}",
        model.model_type(),
        model.feature_names()
    );
    let metrics = setup_metrics()?;

    let app = create_router(Arc::new(AppState {
        model,
        metrics: Some(metrics),
    }));

    let addr = config.addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("🚀 Server started successfully on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .with_context(|| "Server error")?;

    Ok(())
}
