//! Routing API endpoints: submission, node status, and decision history.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::models::{
    ArrStatus, DecisionDebug, DecisionRecord, DecisionStatus, NodeStatus, SubmitDecision,
    SubmitRequest, TrackedRequest,
};
use crate::services::arr;
use crate::AppState;

/// POST /submit
///
/// Route a submission to the best node. Non-accepted decisions surface as
/// 503 with the decision payload so callers can inspect why.
pub async fn submit(
    State(state): State<AppState>,
    Json(req): Json<SubmitRequest>,
) -> Result<Response> {
    req.validate().map_err(AppError::BadRequest)?;

    let decision: SubmitDecision = state.dispatcher.submit(&req).await;
    match decision.status {
        DecisionStatus::Accepted => Ok(Json(decision).into_response()),
        DecisionStatus::Rejected | DecisionStatus::Failed => {
            Ok((StatusCode::SERVICE_UNAVAILABLE, Json(decision)).into_response())
        }
    }
}

/// GET /nodes
///
/// Current node metrics, scores, and exclusion flags.
pub async fn list_nodes(State(state): State<AppState>) -> Json<Vec<NodeStatus>> {
    Json(state.dispatcher.node_statuses().await)
}

/// POST /debug/decision
///
/// Dry-run a decision: score nodes but do not submit the torrent.
pub async fn debug_decision(
    State(state): State<AppState>,
    Json(req): Json<SubmitRequest>,
) -> Result<Json<DecisionDebug>> {
    req.validate().map_err(AppError::BadRequest)?;
    Ok(Json(state.dispatcher.debug_decision(&req).await))
}

/// Query parameters for GET /decisions.
#[derive(Debug, Deserialize)]
pub struct DecisionsQuery {
    pub limit: Option<usize>,
}

/// GET /decisions?limit=N
///
/// The most recent routing decisions, oldest-first within the returned slice.
pub async fn list_decisions(
    State(state): State<AppState>,
    Query(query): Query<DecisionsQuery>,
) -> Json<Vec<DecisionRecord>> {
    Json(state.dispatcher.decisions(query.limit.unwrap_or(50)).await)
}

/// Query parameters for GET /requests.
#[derive(Debug, Deserialize)]
pub struct RequestsQuery {
    pub category: Option<String>,
}

/// GET /requests?category=X
///
/// Requests currently tracked for duplicate suppression.
pub async fn list_requests(
    State(state): State<AppState>,
    Query(query): Query<RequestsQuery>,
) -> Json<Vec<TrackedRequest>> {
    let tracker = state.dispatcher.tracker();
    let requests = match query.category.as_deref() {
        Some(category) => tracker.by_category(category).await,
        None => tracker.all().await,
    };
    Json(requests)
}

/// GET /arr
///
/// Connectivity status for configured Sonarr/Radarr instances.
pub async fn arr_status(State(state): State<AppState>) -> Json<Vec<ArrStatus>> {
    let config = state.dispatcher.config().await;
    let statuses = arr::check_all(&config.arr_instances).await;
    for status in &statuses {
        state
            .metrics
            .set_arr(&status.name, &status.kind, status.reachable);
    }
    Json(statuses)
}
