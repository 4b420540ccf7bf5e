//! qBittorrent-compatible ingress for Sonarr/Radarr.
//!
//! These endpoints mimic just enough of the qBittorrent Web API for media
//! managers to submit through the dispatcher unmodified. They accept any
//! credentials and are never admin-gated.

use axum::{
    extract::State,
    http::{header::SET_COOKIE, StatusCode},
    response::{AppendHeaders, IntoResponse, Response},
    Form, Json,
};
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::models::{DecisionStatus, SubmitRequest};
use crate::AppState;

const APP_VERSION: &str = "dispatcher-1.0.0";
const WEBAPI_VERSION: &str = "2.8.18";

/// Login form; credentials are accepted but ignored.
#[derive(Debug, Deserialize)]
pub struct QbLoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// POST /api/v2/auth/login
///
/// Fake qBittorrent login: returns "Ok." with a dummy session cookie so
/// clients treat authentication as successful.
pub async fn login(_form: Option<Form<QbLoginForm>>) -> impl IntoResponse {
    (
        AppendHeaders([(SET_COOKIE, "SID=dispatcher; HttpOnly; Path=/")]),
        "Ok.",
    )
}

/// Add form as sent by Sonarr/Radarr.
#[derive(Debug, Deserialize)]
pub struct QbAddForm {
    #[serde(default)]
    pub urls: String,
    #[serde(default)]
    pub category: String,
}

/// POST /api/v2/torrents/add
///
/// Accept a magnet via the `urls` form field and route it through the
/// dispatcher. Only magnet URLs are supported.
pub async fn torrents_add(
    State(state): State<AppState>,
    Form(form): Form<QbAddForm>,
) -> Result<Response> {
    let magnet = form.urls.lines().next().map(str::trim).unwrap_or("");
    if magnet.is_empty() {
        return Err(AppError::BadRequest("no urls provided".to_string()));
    }
    if !magnet.starts_with("magnet:") {
        return Err(AppError::BadRequest(
            "only magnet URLs are supported".to_string(),
        ));
    }

    let category = if form.category.is_empty() {
        "default".to_string()
    } else {
        form.category
    };

    let req = SubmitRequest {
        name: magnet.to_string(),
        category,
        size_estimate_gb: 0.0,
        magnet: magnet.to_string(),
    };

    let decision = state.dispatcher.submit(&req).await;
    if decision.status != DecisionStatus::Accepted {
        return Ok((StatusCode::SERVICE_UNAVAILABLE, Json(decision)).into_response());
    }
    Ok("Ok.".into_response())
}

/// GET /api/v2/app/version
///
/// Minimal version endpoint so *arr clients detect qBittorrent.
pub async fn app_version() -> &'static str {
    APP_VERSION
}

/// GET /api/v2/app/webapiVersion
///
/// A qBittorrent-compatible Web API version string.
pub async fn webapi_version() -> &'static str {
    WEBAPI_VERSION
}
