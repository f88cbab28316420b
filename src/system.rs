use axum::extract::State;
use chrono::Utc;
use serde_json::json;

use crate::envelope::Envelope;
use crate::AppState;

/// GET /api/health
pub async fn health() -> Envelope<serde_json::Value> {
    Envelope::new(
        "Service is healthy",
        json!({
            "status": "ok",
            "service": "translator-server",
            "version": env!("CARGO_PKG_VERSION"),
        }),
    )
}

/// GET /api/v1/system/info
pub async fn system_info(State(state): State<AppState>) -> Envelope<serde_json::Value> {
    let uptime_secs = (Utc::now() - state.started_at).num_seconds().max(0);
    Envelope::new(
        "System information retrieved",
        json!({
            "name": "translator-server",
            "version": env!("CARGO_PKG_VERSION"),
            "startedAt": state.started_at.to_rfc3339(),
            "uptimeSecs": uptime_secs,
            "limits": {
                "maxUploadBytes": crate::files::MAX_UPLOAD_BYTES,
                "rateLimitMax": state.config.rate_limit_max,
                "rateLimitWindowSecs": state.config.rate_limit_window.as_secs(),
            },
        }),
    )
}
