use axum::{
    routing::{get, post},
    Router,
};
use std::{path::PathBuf, sync::Arc};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::ResponseEncoding;
use crate::inference::ClassifierSlot;

pub mod error;
pub mod handlers;
pub mod types;

use handlers::{health, predict, read_root};

#[derive(Clone)]
pub struct AppState {
    pub classifier: ClassifierSlot,
    pub encoding: ResponseEncoding,
    pub model_dir: Arc<PathBuf>,
}

impl AppState {
    pub fn new(classifier: ClassifierSlot, encoding: ResponseEncoding, model_dir: PathBuf) -> Self {
        Self {
            classifier,
            encoding,
            model_dir: Arc::new(model_dir),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        // Liveness, independent of classifier state
        .route("/", get(read_root))
        .route("/health", get(health))
        .route("/predict", post(predict))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .with_state(state)
}
