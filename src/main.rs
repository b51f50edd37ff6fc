use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use dotenvy::dotenv;
use tower_http::cors::CorsLayer;
use tracing::info;

mod config;
mod handlers;
mod llm;
mod persona;
mod state;
mod submissions;
mod utils;

use config::CONFIG;
use state::AppState;
use utils::logging::init_logging;

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::generate::health))
        .route("/api/test", get(handlers::generate::test_route))
        .route("/api/diagnose", get(handlers::generate::diagnose))
        .route("/api/generate-card", post(handlers::generate::generate_card))
        // Leave headroom above the photo cap for the other form fields.
        .layer(DefaultBodyLimit::max(CONFIG.max_upload_bytes + 64 * 1024))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {err}");
        return;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let _logging_guards = init_logging();

    info!(
        "Starting persona card server v{} with persona_model={} image_model={}",
        env!("CARGO_PKG_VERSION"),
        CONFIG.persona_model,
        CONFIG.image_model
    );

    let state = Arc::new(AppState::new());
    let router = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], CONFIG.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server running on port {}", CONFIG.port);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}
