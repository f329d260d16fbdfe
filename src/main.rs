use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod api;
mod config;
mod inference;

use api::AppState;
use config::ServerConfig;
use inference::{device::build_device, ClassifierSlot, SequenceClassifier};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env first so RUST_LOG and CLAIRE_* from it are honored
    let _ = dotenvy::dotenv();

    // -----------------------------
    // Logging
    // -----------------------------
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env().context("invalid configuration")?;
    let addr = config.bind_addr()?;

    // -----------------------------
    // Model loading (fatal on failure, before the listener exists)
    // -----------------------------
    info!(model_dir = %config.model_dir.display(), "loading text classifier");
    let device = build_device(config.device).context("failed to select execution device")?;
    let model_dir = config.model_dir.clone();
    let classifier =
        tokio::task::spawn_blocking(move || SequenceClassifier::load(&model_dir, device))
            .await
            .context("classifier loader aborted")?
            .with_context(|| format!("failed to load model from {}", config.model_dir.display()))?;

    let slot = ClassifierSlot::new();
    slot.install(Arc::new(classifier))?;

    let state = AppState::new(slot, config.encoding, config.model_dir.clone());
    let app = api::router(state);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!("🌐 HTTP listening on http://{addr}");
    info!("🧠 Predict at http://{addr}/predict");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
