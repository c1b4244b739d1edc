use axum::body::Body;
use axum::http::{self, Request};
use axum::Router;
use churn_server::config::ServerConfig;
use churn_server::model::ChurnModelService;
use churn_server::{create_router, AppState};
use http_body_util::BodyExt;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

#[allow(dead_code)]
pub fn test_config() -> ServerConfig {
    let root = env!("CARGO_MANIFEST_DIR").to_string();
    ServerConfig::from_lookup(|key| match key {
        "CHURN_APP_ROOT" => Some(root.clone()),
        _ => None,
    })
    .unwrap()
}

#[allow(dead_code)]
pub fn models_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("models")
}

#[allow(dead_code)]
pub fn setup_api() -> Router {
    let config = test_config();
    let model = churn_server::api::setup::load_model(&config).unwrap();

    setup_api_with_model(model)
}

#[allow(dead_code)]
pub fn setup_api_with_model(model: ChurnModelService) -> Router {
    create_router(Arc::new(AppState {
        model,
        metrics: None,
    }))
}

#[allow(dead_code)]
pub fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .method("POST")
        .body(Body::from(serde_json::to_string(body).unwrap()))
        .unwrap()
}

#[allow(dead_code)]
pub async fn body_json(response: axum::response::Response) -> Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

#[allow(dead_code)]
pub fn customer(customer_id: i64) -> Value {
    serde_json::json!({
        "customer_id": customer_id,
        "features": {
            "spend_90d": 120.5,
            "avg_basket_value": 30.1,
            "txn_count_90d": 6,
            "recency_days": 12,
            "unique_products_90d": 18,
            "country_count": 1
        }
    })
}
