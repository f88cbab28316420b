use axum::body::{to_bytes, Body};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use thiserror::Error;

use crate::files::ALLOWED_EXTENSIONS;

/// Error taxonomy of the API. Every variant maps to one HTTP status and
/// renders as the standard error envelope.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    UnsupportedMedia(String),
    #[error("Too many requests from this IP, please try again later.")]
    RateLimited,
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::UnsupportedMedia(_) => StatusCode::BAD_REQUEST,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            ApiError::UnsupportedMedia(_) => Some(serde_json::json!({
                "allowedExtensions": ALLOWED_EXTENSIONS,
            })),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut body = serde_json::json!({
            "error": self.to_string(),
            "code": status.as_u16(),
            "timestamp": Utc::now().to_rfc3339(),
        });
        if let Some(details) = self.details() {
            body["details"] = details;
        }
        (status, Json(body)).into_response()
    }
}

/// Response mapper applied over the whole router. Errors produced outside
/// the handlers (method mismatches, rejected bodies on the framework side)
/// are plain text or empty; rewrite them into the standard error envelope.
/// Enveloped errors and success responses pass through untouched.
pub async fn ensure_error_envelope(response: Response) -> Response {
    let status = response.status();
    if !status.is_client_error() && !status.is_server_error() {
        return response;
    }
    let enveloped = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map_or(false, |value| value.starts_with("application/json"));
    if enveloped {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let message = match to_bytes(body, 64 * 1024).await {
        Ok(bytes) if !bytes.is_empty() => String::from_utf8_lossy(&bytes).into_owned(),
        _ => status
            .canonical_reason()
            .unwrap_or("Request failed")
            .to_string(),
    };
    let payload = serde_json::json!({
        "error": message,
        "code": status.as_u16(),
        "timestamp": Utc::now().to_rfc3339(),
    })
    .to_string();

    parts.headers.remove(header::CONTENT_LENGTH);
    parts.headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    Response::from_parts(parts, Body::from(payload))
}
