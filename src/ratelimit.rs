use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

use crate::error::ApiError;

struct Bucket {
    window_start: Instant,
    count: u32,
}

/// Fixed-window request counter keyed by client IP. A window starts on the
/// first request from an IP and resets after the configured duration.
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Counts one request for `key` and reports whether it is still within
    /// the limit.
    pub async fn check(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().await;

        // Keep the map from growing without bound across many clients.
        if buckets.len() > 1024 {
            let window = self.window;
            buckets.retain(|_, bucket| now.duration_since(bucket.window_start) < window);
        }

        let bucket = buckets.entry(key.to_string()).or_insert(Bucket {
            window_start: now,
            count: 0,
        });
        if now.duration_since(bucket.window_start) >= self.window {
            bucket.window_start = now;
            bucket.count = 0;
        }
        bucket.count += 1;
        bucket.count <= self.max_requests
    }
}

fn client_key(request: &Request) -> String {
    // Honour the proxy header first, otherwise fall back to the socket
    // address recorded by ConnectInfo.
    if let Some(forwarded) = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Middleware rejecting clients that exceed the request budget for the
/// current window. Applies to every /api/ path.
pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if request.uri().path().starts_with("/api/") {
        let key = client_key(&request);
        if !limiter.check(&key).await {
            tracing::warn!("Rate limit exceeded for {}", key);
            return Err(ApiError::RateLimited);
        }
    }
    Ok(next.run(request).await)
}
