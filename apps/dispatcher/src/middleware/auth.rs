//! Admin API-key gate.
//!
//! When an admin key is configured, every admin endpoint requires a matching
//! `X-API-Key` header. The qBittorrent-compatible endpoints and the
//! health/metrics probes are never gated.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::error::{AppError, Result};
use crate::AppState;

const API_KEY_HEADER: &str = "X-API-Key";

/// Extracts the API key from the request headers.
fn extract_api_key(request: &Request<Body>) -> Option<&str> {
    request.headers().get(API_KEY_HEADER)?.to_str().ok()
}

/// Middleware that enforces the configured admin key, if any.
///
/// The key is read from the active config snapshot, so hot reload applies to
/// subsequent requests without restart.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response> {
    let config = state.dispatcher.config().await;

    if let Some(expected) = config.dispatcher.admin_key.as_deref() {
        let provided = extract_api_key(&request);
        if provided != Some(expected) {
            return Err(AppError::Unauthorized);
        }
    }

    Ok(next.run(request).await)
}
