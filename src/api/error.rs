use crate::model::ModelError;
use axum::{
    extract::rejection::JsonRejection, http::StatusCode, response::IntoResponse,
    response::Response, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: String, message: &str) -> Self {
        Self {
            field,
            message: message.to_string(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Malformed request body: {}", .0.body_text())]
    MalformedBody(#[from] JsonRejection),

    #[error("Request validation failed for {} field(s)", .0.len())]
    Validation(Vec<FieldViolation>),

    #[error("Failed to score customer {customer_id}")]
    Inference {
        customer_id: i64,
        #[source]
        source: ModelError,
    },

    #[error("Failed to score batch item {index} (customer {customer_id})")]
    BatchItem {
        index: usize,
        customer_id: i64,
        #[source]
        source: ModelError,
    },

    #[error("Failed to score batch of {size} items")]
    Batch {
        size: usize,
        #[source]
        source: ModelError,
    },
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MalformedBody(rejection) => rejection.status(),
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // model errors stay in the logs, clients only see the sanitized message
        let body = match &self {
            ApiError::MalformedBody(_) => {
                warn!("{}", self);
                json!({
                    "status": "error",
                    "message": self.to_string(),
                })
            }
            ApiError::Validation(violations) => {
                warn!("Rejected request: {:?}", violations);
                json!({
                    "status": "error",
                    "message": self.to_string(),
                    "errors": violations,
                })
            }
            ApiError::Inference { source, .. }
            | ApiError::BatchItem { source, .. }
            | ApiError::Batch { source, .. } => {
                error!("{}: {}", self, source);
                metrics::counter!("churn_prediction_errors_total").increment(1);
                json!({
                    "status": "error",
                    "message": self.to_string(),
                })
            }
        };

        (status, Json(body)).into_response()
    }
}
