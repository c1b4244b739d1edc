use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::api::handler::{health_check, metrics_handler, predict, predict_batch};
use crate::model::ChurnModelService;

/// Shared, read-only state handed to every handler
pub struct AppState {
    pub model: ChurnModelService,
    pub metrics: Option<PrometheusHandle>,
}

pub fn create_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/predict", post(predict))
        .route("/predict_batch", post(predict_batch))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}
