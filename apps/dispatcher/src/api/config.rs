//! Configuration endpoints: get/replace with hot reload, plus transient
//! connectivity tests.

use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::config::{self, AppConfig, ArrInstanceConfig, NodeConfig};
use crate::error::{AppError, Result};
use crate::models::{ArrStatus, ConfigRaw, NodeTestReport};
use crate::services::arr::check_arr_instance;
use crate::services::qbittorrent::{NodeBackend, QbittorrentClient};
use crate::AppState;

/// GET /config/json
///
/// The active configuration as structured JSON.
pub async fn get_config_json(State(state): State<AppState>) -> Json<AppConfig> {
    Json((*state.dispatcher.config().await).clone())
}

/// POST /config/json
///
/// Validate and persist a structured config, then hot-swap the routing plane.
pub async fn update_config_json(
    State(state): State<AppState>,
    Json(candidate): Json<AppConfig>,
) -> Result<Json<AppConfig>> {
    candidate.validate()?;
    let yaml = candidate.to_yaml()?;
    install(&state, candidate, &yaml).await?;
    Ok(Json((*state.dispatcher.config().await).clone()))
}

/// GET /config/raw
///
/// The current YAML configuration document.
pub async fn get_config_raw(State(state): State<AppState>) -> Result<String> {
    match tokio::fs::read_to_string(state.config_path.as_ref()).await {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(AppError::NotFound("configuration file not found".to_string()))
        }
        Err(e) => Err(AppError::Internal(format!("failed to read config: {e}"))),
    }
}

/// POST /config/raw
///
/// Validate and persist a new YAML document, then hot-swap the routing plane.
pub async fn update_config_raw(
    State(state): State<AppState>,
    Json(payload): Json<ConfigRaw>,
) -> Result<Json<Value>> {
    let candidate = config::parse_str(&payload.yaml)?;
    install(&state, candidate, &payload.yaml).await?;
    Ok(Json(json!({ "status": "ok" })))
}

/// Persist the document, then swap the active plane. A write failure leaves
/// the in-memory configuration unchanged.
async fn install(state: &AppState, candidate: AppConfig, yaml: &str) -> Result<()> {
    tokio::fs::write(state.config_path.as_ref(), yaml)
        .await
        .map_err(|e| AppError::Internal(format!("failed to write config: {e}")))?;

    state.dispatcher.install(Arc::new(candidate)).await?;
    tracing::info!(path = %state.config_path.display(), "configuration reloaded");
    Ok(())
}

/// POST /config/test/node
///
/// Probe a candidate node without persisting anything.
pub async fn test_node(Json(candidate): Json<NodeConfig>) -> Result<Json<NodeTestReport>> {
    let client = QbittorrentClient::new(&candidate)
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let report = match client.probe().await {
        Ok(telemetry) => NodeTestReport {
            reachable: true,
            telemetry: Some(telemetry),
            error: None,
        },
        Err(e) => NodeTestReport {
            reachable: false,
            telemetry: None,
            error: Some(e.to_string()),
        },
    };
    Ok(Json(report))
}

/// POST /config/test/arr
///
/// Check connectivity to a candidate *arr instance without persisting anything.
pub async fn test_arr(Json(candidate): Json<ArrInstanceConfig>) -> Json<ArrStatus> {
    Json(check_arr_instance(&candidate).await)
}
