// API Server Binary Entry Point
//
// Purpose: Serve the JSON API and dashboard pages
// Usage: cargo run --bin api_server

use agro_advisor::{create_router, AppState, Settings};
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Optional .env next to the working directory
    dotenv::dotenv().ok();

    // Initialize tracing (structured logging)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    // Default log level: info for our crate, warn for others
                    "agro_advisor=info,tower_http=debug,axum=debug,warn".into()
                }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting API server...");

    let settings = Settings::from_env();
    let port = settings.port;

    tracing::info!("Configuration:");
    tracing::info!("  DATA_DIR: {}", settings.data_dir.display());
    tracing::info!("  ARTIFACTS_DIR: {}", settings.artifacts_dir.display());
    tracing::info!("  PORT: {}", port);
    tracing::info!("  TOP_K: {}", settings.top_k);

    // Initialize application state (model, crop guide, services)
    tracing::info!("Initializing application state...");
    let state = AppState::new(settings).await?;
    if !state.model_ready() {
        tracing::warn!("No trained model found; /api/recommend will answer 503 until train_model runs");
    }
    tracing::info!("Application state initialized successfully");

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
