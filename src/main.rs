use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use translator_server::config::Config;
use translator_server::worker::{self, SimulatedProcessor};
use translator_server::{build_router, AppState};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting translator-server...");

    let config = Config::from_env();
    let port = config.port;
    let state = AppState::new(config);

    // Start worker in background
    let engine = state.engine.clone();
    tokio::spawn(async move {
        worker::run_worker(engine, Arc::new(SimulatedProcessor::default())).await;
    });

    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", port);
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind server address");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Server error");
}
