use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Error, Debug)]
pub enum ApiError {
    /// Startup has not installed a classifier yet.
    #[error("classifier is not initialized")]
    Uninitialized,

    /// Body is not a string or a list of strings.
    #[error("{0}")]
    InvalidInput(String),

    #[error("inference failed: {0}")]
    Inference(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Uninitialized => StatusCode::SERVICE_UNAVAILABLE,
            Self::InvalidInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Inference(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidInput(format!(
            "expected a JSON string or a list of strings: {}",
            rejection.body_text()
        ))
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Inference(format!("{err:#}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(%status, "predict failed: {}", self);
        } else {
            warn!(%status, "predict rejected: {}", self);
        }
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}
