//! The routing core: evaluation rounds, admission, and decision history.

use chrono::Utc;
use futures::future::join_all;
use std::cmp::Ordering;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::timeout;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::metrics::Metrics;
use crate::models::{
    DecisionDebug, DecisionRecord, DecisionStatus, NodeMetrics, NodeStatus, SubmitDecision,
    SubmitRequest, TrackedStatus,
};

use super::notify::{Event, MessagingService, N8nClient, Notifier};
use super::qbittorrent::{NodeBackend, QbittorrentClient};
use super::quality::QualityAdvisor;
use super::scorer::score_node;
use super::tracker::RequestTracker;

/// Per-node probe deadline within an evaluation round.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Capacity of the bounded decision history.
pub const HISTORY_CAPACITY: usize = 200;

/// The active routing configuration and the ports built from it.
///
/// A plane is immutable once built; hot reload installs a new plane behind
/// the dispatcher's atomic reference while in-flight admissions keep the one
/// they captured.
pub struct RoutingPlane {
    pub config: Arc<AppConfig>,
    pub backends: Vec<Arc<dyn NodeBackend>>,
    pub notifiers: Vec<Arc<dyn Notifier>>,
}

impl RoutingPlane {
    pub fn new(
        config: Arc<AppConfig>,
        backends: Vec<Arc<dyn NodeBackend>>,
        notifiers: Vec<Arc<dyn Notifier>>,
    ) -> Self {
        Self {
            config,
            backends,
            notifiers,
        }
    }

    /// Build node clients and notification ports from a validated config.
    pub fn from_config(config: Arc<AppConfig>) -> Result<Self, AppError> {
        let mut backends: Vec<Arc<dyn NodeBackend>> = Vec::with_capacity(config.nodes.len());
        for node in &config.nodes {
            let client = QbittorrentClient::new(node).map_err(|e| {
                AppError::Internal(format!("failed to build client for node '{}': {e}", node.name))
            })?;
            backends.push(Arc::new(client));
        }

        let mut notifiers: Vec<Arc<dyn Notifier>> = Vec::new();
        let messaging = &config.integrations.messaging_services;
        if messaging.iter().any(|s| s.enabled) {
            let service = MessagingService::new(messaging.clone())
                .map_err(|e| AppError::Internal(format!("failed to build messaging port: {e}")))?;
            notifiers.push(Arc::new(service));
        }
        if config.integrations.n8n.enabled {
            let client = N8nClient::new(config.integrations.n8n.clone())
                .map_err(|e| AppError::Internal(format!("failed to build n8n port: {e}")))?;
            notifiers.push(Arc::new(client));
        }

        Ok(Self::new(config, backends, notifiers))
    }
}

struct ScoredNode {
    backend: Arc<dyn NodeBackend>,
    metrics: NodeMetrics,
    score: Option<f64>,
    excluded: bool,
}

/// Orchestrates admissions against the active routing plane.
pub struct Dispatcher {
    plane: RwLock<Arc<RoutingPlane>>,
    tracker: RequestTracker,
    history: Mutex<VecDeque<DecisionRecord>>,
    advisor: Option<Arc<dyn QualityAdvisor>>,
    metrics: Metrics,
}

impl Dispatcher {
    pub fn new(config: Arc<AppConfig>, metrics: Metrics) -> Result<Self, AppError> {
        Ok(Self::with_plane(RoutingPlane::from_config(config)?, metrics))
    }

    /// Build a dispatcher around an already-assembled plane. Used by tests to
    /// inject mock backends and notifiers.
    pub fn with_plane(plane: RoutingPlane, metrics: Metrics) -> Self {
        Self {
            plane: RwLock::new(Arc::new(plane)),
            tracker: RequestTracker::new(),
            history: Mutex::new(VecDeque::with_capacity(HISTORY_CAPACITY)),
            advisor: None,
            metrics,
        }
    }

    /// Attach a quality advisory port.
    pub fn with_advisor(mut self, advisor: Arc<dyn QualityAdvisor>) -> Self {
        self.advisor = Some(advisor);
        self
    }

    /// Validate-and-swap the active plane from a new configuration.
    pub async fn install(&self, config: Arc<AppConfig>) -> Result<(), AppError> {
        let plane = RoutingPlane::from_config(config)?;
        self.install_plane(plane).await;
        Ok(())
    }

    /// Swap the active plane. New admissions observe the new value;
    /// in-flight admissions continue against their captured snapshot.
    pub async fn install_plane(&self, plane: RoutingPlane) {
        *self.plane.write().await = Arc::new(plane);
    }

    /// Snapshot the active plane.
    pub async fn plane(&self) -> Arc<RoutingPlane> {
        self.plane.read().await.clone()
    }

    /// Snapshot the active configuration.
    pub async fn config(&self) -> Arc<AppConfig> {
        self.plane.read().await.config.clone()
    }

    pub fn tracker(&self) -> &RequestTracker {
        &self.tracker
    }

    /// Run one evaluation round: probe every node in parallel and score the
    /// reachable ones. Output order matches configuration order, one entry
    /// per node regardless of probe failures.
    async fn evaluate(&self, plane: &RoutingPlane, size_estimate_gb: f64) -> Vec<ScoredNode> {
        let handles: Vec<_> = plane
            .backends
            .iter()
            .map(|backend| {
                let backend = Arc::clone(backend);
                tokio::spawn(async move {
                    match timeout(PROBE_TIMEOUT, backend.probe()).await {
                        Ok(result) => result.map_err(|e| e.to_string()),
                        Err(_) => Err(format!(
                            "probe timed out after {}s",
                            PROBE_TIMEOUT.as_secs()
                        )),
                    }
                })
            })
            .collect();
        let outcomes = join_all(handles).await;

        let cfg = &plane.config;
        debug_assert_eq!(cfg.nodes.len(), plane.backends.len());

        let mut scored = Vec::with_capacity(plane.backends.len());
        for ((node, backend), joined) in cfg.nodes.iter().zip(&plane.backends).zip(outcomes) {
            let probe = joined.unwrap_or_else(|e| Err(format!("probe task failed: {e}")));
            let entry = match probe {
                Ok(telemetry) => {
                    let outcome = score_node(&cfg.dispatcher, node, &telemetry, size_estimate_gb);
                    tracing::info!(
                        node = %node.name,
                        score = ?outcome.score,
                        excluded = outcome.excluded,
                        reason = ?outcome.reason,
                        "node scored"
                    );
                    ScoredNode {
                        backend: Arc::clone(backend),
                        metrics: NodeMetrics {
                            name: node.name.clone(),
                            free_disk_gb: telemetry.free_disk_gb,
                            active_downloads: telemetry.active_downloads,
                            paused_downloads: telemetry.paused_downloads,
                            global_download_rate_mbps: telemetry.global_download_rate_mbps,
                            reachable: true,
                            excluded_reason: outcome.reason,
                            score: outcome.score,
                        },
                        score: outcome.score,
                        excluded: outcome.excluded,
                    }
                }
                Err(detail) => {
                    tracing::warn!(node = %node.name, error = %detail, "node unreachable");
                    ScoredNode {
                        backend: Arc::clone(backend),
                        metrics: NodeMetrics::unreachable(&node.name),
                        score: None,
                        excluded: true,
                    }
                }
            };
            self.metrics
                .set_node(&node.name, entry.metrics.reachable, entry.score);
            scored.push(entry);
        }
        scored
    }

    /// Eligible candidates sorted by score descending; the sort is stable, so
    /// ties keep configuration order.
    fn rank<'a>(scored: &'a [ScoredNode]) -> Vec<&'a ScoredNode> {
        let mut eligible: Vec<&ScoredNode> = scored
            .iter()
            .filter(|s| !s.excluded && s.score.is_some())
            .collect();
        eligible.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        eligible
    }

    /// Current metrics and exclusion flags for all nodes.
    pub async fn node_statuses(&self) -> Vec<NodeStatus> {
        let plane = self.plane().await;
        self.evaluate(&plane, 0.0)
            .await
            .into_iter()
            .map(|s| NodeStatus {
                excluded: s.excluded,
                metrics: s.metrics,
            })
            .collect()
    }

    /// Evaluate nodes and show which would be selected, without submitting.
    pub async fn debug_decision(&self, req: &SubmitRequest) -> DecisionDebug {
        let plane = self.plane().await;
        let scored = self.evaluate(&plane, req.size_estimate_gb).await;
        let eligible = Self::rank(&scored);

        let selected_node = eligible.first().map(|s| s.metrics.name.clone());
        let reason = if selected_node.is_some() {
            "highest_score"
        } else {
            "no_eligible_nodes"
        };

        DecisionDebug {
            selected_node,
            reason: reason.to_string(),
            nodes: scored
                .into_iter()
                .map(|s| NodeStatus {
                    excluded: s.excluded,
                    metrics: s.metrics,
                })
                .collect(),
        }
    }

    /// Admit a submission: dedup, evaluate, rank, then submit with
    /// forward-on-failure retry across the best candidates.
    pub async fn submit(&self, req: &SubmitRequest) -> SubmitDecision {
        let plane = self.plane().await;
        let cfg = Arc::clone(&plane.config);
        let tracking = &cfg.request_tracking;

        if tracking.enabled && tracking.check_duplicates {
            if let Some(existing) = self.tracker.is_duplicate(req).await {
                self.publish(
                    &plane,
                    Event::DuplicateDetected {
                        name: req.name.clone(),
                        category: req.category.clone(),
                        existing: existing.name.clone(),
                    },
                );
                let decision = SubmitDecision {
                    selected_node: existing.selected_node.clone(),
                    reason: format!("duplicate_of_existing_request: {}", existing.name),
                    status: DecisionStatus::Rejected,
                    attempted_nodes: Vec::new(),
                };
                return self.conclude(req, decision).await;
            }
        }

        if tracking.check_quality_profiles {
            if let Some(advisor) = &self.advisor {
                if let Some(suggestion) = advisor
                    .review(&req.name, &req.category, req.size_estimate_gb)
                    .await
                {
                    tracing::info!(
                        name = %req.name,
                        current = %suggestion.current_quality,
                        suggested = %suggestion.suggested_quality,
                        "quality suggestion available"
                    );
                    if tracking.send_suggestions {
                        self.publish(
                            &plane,
                            Event::QualitySuggestion {
                                name: req.name.clone(),
                                current_quality: suggestion.current_quality,
                                suggested_quality: suggestion.suggested_quality,
                                reason: suggestion.reason,
                            },
                        );
                    }
                }
            }
        }

        let scored = self.evaluate(&plane, req.size_estimate_gb).await;
        let attempted: Vec<NodeMetrics> = scored.iter().map(|s| s.metrics.clone()).collect();
        let eligible = Self::rank(&scored);

        if eligible.is_empty() {
            tracing::warn!(name = %req.name, category = %req.category, "no eligible nodes for submission");
            self.publish(
                &plane,
                Event::DownloadRejected {
                    name: req.name.clone(),
                },
            );
            let decision = SubmitDecision {
                selected_node: None,
                reason: "no_eligible_nodes".to_string(),
                status: DecisionStatus::Rejected,
                attempted_nodes: attempted,
            };
            return self.conclude(req, decision).await;
        }

        let max_retries = cfg.dispatcher.submission.max_retries.max(1);
        let mut last_error = String::new();

        for (attempt, candidate) in eligible.iter().take(max_retries).enumerate() {
            let node_name = candidate.metrics.name.clone();
            tracing::info!(
                attempt = attempt + 1,
                node = %node_name,
                name = %req.name,
                "submission attempt"
            );

            // Run the attempt on its own task so a cancelled admission lets
            // the in-flight submission finish instead of aborting it half-way;
            // no further candidates start after cancellation.
            let backend = Arc::clone(&candidate.backend);
            let magnet = req.magnet.clone();
            let category = req.category.clone();
            let save_path = cfg.dispatcher.submission.save_path.clone();
            let attempt_task = tokio::spawn(async move {
                backend.submit(&magnet, &category, save_path.as_deref()).await
            });

            let outcome = match attempt_task.await {
                Ok(result) => result.map_err(|e| e.to_string()),
                Err(e) => Err(format!("submit task failed: {e}")),
            };

            match outcome {
                Ok(hash) => {
                    tracing::info!(
                        node = %node_name,
                        torrent_hash = %hash,
                        name = %req.name,
                        "submission succeeded"
                    );
                    if tracking.enabled {
                        let key = self.tracker.add(req, Some(&req.category)).await;
                        self.tracker
                            .update_status(&key, TrackedStatus::Downloading, Some(&node_name))
                            .await;
                    }
                    self.publish(
                        &plane,
                        Event::DownloadStarted {
                            name: req.name.clone(),
                            category: req.category.clone(),
                            size_estimate_gb: req.size_estimate_gb,
                            node: node_name.clone(),
                        },
                    );
                    let decision = SubmitDecision {
                        selected_node: Some(node_name),
                        reason: "highest_score".to_string(),
                        status: DecisionStatus::Accepted,
                        attempted_nodes: attempted,
                    };
                    return self.conclude(req, decision).await;
                }
                Err(detail) => {
                    tracing::error!(
                        node = %node_name,
                        attempt = attempt + 1,
                        error = %detail,
                        "submission failed"
                    );
                    last_error = detail;
                }
            }
        }

        let decision = SubmitDecision {
            selected_node: None,
            reason: format!("submission_failed_all_nodes: {last_error}"),
            status: DecisionStatus::Failed,
            attempted_nodes: attempted,
        };
        self.conclude(req, decision).await
    }

    /// Return up to `limit` newest decisions, oldest-first.
    pub async fn decisions(&self, limit: usize) -> Vec<DecisionRecord> {
        if limit == 0 {
            return Vec::new();
        }
        let history = self.history.lock().await;
        let limit = limit.min(HISTORY_CAPACITY);
        let skip = history.len().saturating_sub(limit);
        history.iter().skip(skip).cloned().collect()
    }

    async fn conclude(&self, req: &SubmitRequest, decision: SubmitDecision) -> SubmitDecision {
        self.metrics.inc_submission(decision.status.as_str());
        self.record(req, &decision).await;
        decision
    }

    async fn record(&self, req: &SubmitRequest, decision: &SubmitDecision) {
        let record = DecisionRecord {
            timestamp: Utc::now().timestamp_millis() as f64 / 1000.0,
            request_name: req.name.clone(),
            request_category: req.category.clone(),
            size_estimate_gb: req.size_estimate_gb,
            selected_node: decision.selected_node.clone(),
            reason: decision.reason.clone(),
            status: decision.status,
            attempted_nodes: decision.attempted_nodes.clone(),
        };

        let mut history = self.history.lock().await;
        if history.len() == HISTORY_CAPACITY {
            history.pop_front();
        }
        history.push_back(record);
    }

    /// Publish an event to every notifier port without blocking admission.
    fn publish(&self, plane: &RoutingPlane, event: Event) {
        for notifier in &plane.notifiers {
            let notifier = Arc::clone(notifier);
            let event = event.clone();
            tokio::spawn(async move {
                if let Err(e) = notifier.notify(&event).await {
                    tracing::warn!(
                        notifier = notifier.name(),
                        error = %e,
                        "notification delivery failed"
                    );
                }
            });
        }
    }
}
