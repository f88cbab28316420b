pub mod config;
pub mod engine;
pub mod envelope;
pub mod error;
pub mod events;
pub mod files;
pub mod ratelimit;
pub mod store;
pub mod system;
pub mod task;
pub mod tasks;
pub mod worker;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::engine::TaskEngine;
use crate::error::ApiError;
use crate::ratelimit::RateLimiter;
use crate::store::{MemoryStore, TaskStore};

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<TaskEngine>,
    pub config: Arc<Config>,
    pub limiter: Arc<RateLimiter>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let (tx, _rx) = broadcast::channel(100);
        let store: Arc<dyn TaskStore> = Arc::new(MemoryStore::new());
        let engine = Arc::new(TaskEngine::new(store, tx));
        let limiter = Arc::new(RateLimiter::new(
            config.rate_limit_max,
            config.rate_limit_window,
        ));
        Self {
            engine,
            config: Arc::new(config),
            limiter,
            started_at: Utc::now(),
        }
    }
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ORIGIN, header::ACCEPT])
}

async fn fallback() -> ApiError {
    ApiError::NotFound("Resource not found".to_string())
}

/// Assembles the full application router. Split out from main so tests can
/// drive the API without binding a socket.
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);
    let limiter = state.limiter.clone();
    let upload_dir = state.config.upload_dir.clone();

    Router::new()
        .route("/api/health", get(system::health))
        .route("/api/v1/tasks", post(tasks::create_task).get(tasks::list_tasks))
        .route("/api/v1/tasks/stats", get(tasks::task_stats))
        .route("/api/v1/tasks/:id", get(tasks::get_task))
        .route("/api/v1/tasks/:id/process", post(tasks::process_task))
        .route("/api/v1/files/upload", post(files::upload_file))
        .nest_service("/api/v1/files/download", ServeDir::new(upload_dir))
        .route("/api/v1/events", get(events::sse_handler))
        .route("/api/v1/system/info", get(system::system_info))
        .fallback(fallback)
        .layer(axum::middleware::from_fn_with_state(
            limiter,
            ratelimit::rate_limit,
        ))
        .layer(DefaultBodyLimit::max(files::MAX_UPLOAD_BYTES))
        .layer(axum::middleware::map_response(error::ensure_error_envelope))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
