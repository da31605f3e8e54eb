//! HTTP transport for the labeling service.
//!
//! - `POST /label` takes an `InferenceRequest` and returns a `ResponseEnvelope`
//! - `GET /health` reports liveness and the configured model name
//!
//! Every failure is rendered as `{"detail": "..."}` with a matching status.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use lumen_core::{ErrorBody, InferenceRequest, LabelError, LabelService, ResponseEnvelope};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

/// Detail returned for internal errors; the real cause is only logged.
const INTERNAL_DETAIL: &str = "Internal server error";

/// Build the service router.
pub fn router(service: Arc<LabelService>, body_limit_bytes: usize) -> Router {
    Router::new()
        .route("/label", post(label_handler))
        .route("/health", get(health_handler))
        .layer(DefaultBodyLimit::max(body_limit_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

/// A `LabelError`, or a body that never made it to the service, as an HTTP response.
#[derive(Debug)]
pub enum ApiError {
    Label(LabelError),
    InvalidBody(JsonRejection),
}

impl From<LabelError> for ApiError {
    fn from(err: LabelError) -> Self {
        ApiError::Label(err)
    }
}

impl ApiError {
    fn status_and_detail(&self) -> (StatusCode, String) {
        match self {
            ApiError::Label(LabelError::Unauthorized) => {
                (StatusCode::UNAUTHORIZED, "Invalid token".to_string())
            }
            ApiError::Label(LabelError::BadRequest(message)) => {
                (StatusCode::BAD_REQUEST, message.clone())
            }
            ApiError::Label(LabelError::EngineUnavailable(message)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, message.clone())
            }
            ApiError::Label(LabelError::Internal(_)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                INTERNAL_DETAIL.to_string(),
            ),
            ApiError::InvalidBody(rejection) => (rejection.status(), rejection.body_text()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = self.status_and_detail();
        (status, Json(ErrorBody { detail })).into_response()
    }
}

async fn label_handler(
    State(service): State<Arc<LabelService>>,
    body: Result<Json<InferenceRequest>, JsonRejection>,
) -> Result<Json<ResponseEnvelope>, ApiError> {
    let Json(request) = body.map_err(ApiError::InvalidBody)?;
    let envelope = service.label(request).await?;
    Ok(Json(envelope))
}

async fn health_handler(State(service): State<Arc<LabelService>>) -> Json<Value> {
    Json(json!({ "status": "ok", "model": service.model_name() }))
}
