use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use tracing::debug;

use super::error::ApiError;
use super::types::{HealthResponse, PredictRequest, PredictResponse, PredictionPayload};
use super::AppState;
use crate::config::ResponseEncoding;

pub async fn read_root() -> Json<Value> {
    Json(json!({ "Hello": "World" }))
}

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let model_dir = state.model_dir.display().to_string();
    match state.classifier.get() {
        Some(classifier) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ready",
                model_dir,
                device: Some(classifier.device()),
                labels: classifier.labels().to_vec(),
            }),
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "loading",
                model_dir,
                device: None,
                labels: Vec::new(),
            }),
        ),
    }
}

pub async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let classifier = state.classifier.get().ok_or(ApiError::Uninitialized)?;

    let single = request.is_single();
    let texts = request.into_texts();
    debug!(inputs = texts.len(), single, "predict request");

    // Forward passes are CPU/GPU bound; keep them off the async workers.
    let mut predictions = tokio::task::spawn_blocking(move || classifier.classify_all(&texts))
        .await
        .map_err(|e| ApiError::Inference(format!("inference task aborted: {e}")))??;

    // Legacy clients index `prediction[0]` even for a single string.
    let prediction = if single && state.encoding == ResponseEncoding::Json {
        let first = predictions
            .pop()
            .ok_or_else(|| ApiError::Inference("classifier returned no prediction".into()))?;
        PredictionPayload::Single(first)
    } else {
        PredictionPayload::Batch(predictions)
    };
    let response = PredictResponse { prediction };

    match state.encoding {
        ResponseEncoding::Json => Ok(Json(response).into_response()),
        ResponseEncoding::Double => {
            let encoded = serde_json::to_string(&response)
                .map_err(|e| ApiError::Inference(format!("failed to encode prediction: {e}")))?;
            Ok(Json(encoded).into_response())
        }
    }
}
