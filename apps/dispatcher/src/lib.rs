//! Space-aware dispatcher for a fleet of qBittorrent nodes.
//!
//! Routes incoming torrent submissions to the backend best able to accept
//! them, based on live telemetry probed from every node. Exposes a routing
//! API plus a qBittorrent-compatible ingress so media managers can submit
//! transparently. This library exposes modules for use in integration tests.

use axum::{
    middleware as axum_mw,
    routing::{get, post},
    Router,
};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod config;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod services;

use metrics::Metrics;
use services::Dispatcher;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Path of the persisted YAML configuration document.
    pub config_path: Arc<PathBuf>,
    pub dispatcher: Arc<Dispatcher>,
    pub metrics: Metrics,
}

/// Build the application router.
///
/// Used by both `main` and the integration tests so tests run against the
/// production routes.
pub fn router(state: AppState) -> Router {
    // Admin-gated routing and config surface
    let admin_routes = Router::new()
        .route("/submit", post(api::dispatch::submit))
        .route("/nodes", get(api::dispatch::list_nodes))
        .route("/debug/decision", post(api::dispatch::debug_decision))
        .route("/decisions", get(api::dispatch::list_decisions))
        .route("/requests", get(api::dispatch::list_requests))
        .route("/arr", get(api::dispatch::arr_status))
        .route(
            "/config/json",
            get(api::config::get_config_json).post(api::config::update_config_json),
        )
        .route(
            "/config/raw",
            get(api::config::get_config_raw).post(api::config::update_config_raw),
        )
        .route("/config/test/node", post(api::config::test_node))
        .route("/config/test/arr", post(api::config::test_arr))
        .layer(axum_mw::from_fn_with_state(
            state.clone(),
            middleware::require_api_key,
        ));

    // qBittorrent-compatible ingress for Sonarr/Radarr (accept-all)
    let compat_routes = Router::new()
        .route("/api/v2/auth/login", post(api::compat::login))
        .route("/api/v2/torrents/add", post(api::compat::torrents_add))
        .route("/api/v2/app/version", get(api::compat::app_version))
        .route("/api/v2/app/webapiVersion", get(api::compat::webapi_version));

    Router::new()
        .route("/health", get(api::system::health))
        .route("/metrics", get(api::system::metrics))
        .merge(admin_routes)
        .merge(compat_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
