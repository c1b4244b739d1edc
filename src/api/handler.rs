use crate::api::error::ApiError;
use crate::api::route::AppState;
use crate::api::schema::{
    PredictBatchRequest, PredictBatchResponse, PredictRequest, PredictResponse,
};
use crate::model::{FeatureRecord, ModelError};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Liveness only, does not look at the model
pub async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub async fn predict(
    State(data): State<Arc<AppState>>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    let Json(body) = body?;
    let request = PredictRequest::parse(&body).map_err(ApiError::Validation)?;

    let start = Instant::now();
    let proba = data
        .model
        .predict_proba(&request.features.to_record())
        .map_err(|source| ApiError::Inference {
            customer_id: request.customer_id,
            source,
        })?;

    metrics::counter!("churn_predictions_total", "endpoint" => "predict").increment(1);
    metrics::histogram!("churn_prediction_duration_seconds", "endpoint" => "predict")
        .record(start.elapsed().as_secs_f64());

    Ok(Json(PredictResponse::new(request.customer_id, proba)))
}

pub async fn predict_batch(
    State(data): State<Arc<AppState>>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Json<PredictBatchResponse>, ApiError> {
    // all-or-nothing: the batch is validated and scored as a unit
    let Json(body) = body?;
    let request = PredictBatchRequest::parse(&body).map_err(ApiError::Validation)?;

    let records: Vec<FeatureRecord> = request
        .items
        .iter()
        .map(|item| item.features.to_record())
        .collect();

    let start = Instant::now();
    let probas = data
        .model
        .predict_proba_batch(&records)
        .map_err(|source| match source {
            ModelError::NonFiniteOutput(index) => ApiError::BatchItem {
                index,
                customer_id: request.items[index].customer_id,
                source: ModelError::NonFiniteOutput(index),
            },
            source => ApiError::Batch {
                size: records.len(),
                source,
            },
        })?;

    let results: Vec<PredictResponse> = request
        .items
        .iter()
        .zip(probas)
        .map(|(item, proba)| PredictResponse::new(item.customer_id, proba))
        .collect();

    metrics::counter!("churn_predictions_total", "endpoint" => "predict_batch")
        .increment(results.len() as u64);
    metrics::histogram!("churn_prediction_duration_seconds", "endpoint" => "predict_batch")
        .record(start.elapsed().as_secs_f64());

    info!("Scored batch of {} customers", results.len());

    Ok(Json(PredictBatchResponse { results }))
}

pub async fn metrics_handler(
    State(data): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    match &data.metrics {
        Some(handle) => Ok(handle.render()),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(json!({
                "status": "error",
                "message": "Metrics recorder is not installed"
            })),
        )),
    }
}
