//! Wire and domain models shared between the routing core and the HTTP API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A download submission routed through the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    /// Human-readable title of the download.
    pub name: String,
    /// qBittorrent category to assign.
    pub category: String,
    /// Approximate size in GiB.
    #[serde(default)]
    pub size_estimate_gb: f64,
    /// Magnet URI for the torrent.
    pub magnet: String,
}

impl SubmitRequest {
    /// Validate request fields before admission.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name must not be empty".to_string());
        }
        if self.magnet.trim().is_empty() {
            return Err("magnet must not be empty".to_string());
        }
        if !self.size_estimate_gb.is_finite() || self.size_estimate_gb < 0.0 {
            return Err("size_estimate_gb must be a non-negative number".to_string());
        }
        Ok(())
    }
}

/// Telemetry sampled from one backend during a probe.
///
/// A missing `free_disk_gb` means the backend did not report free space,
/// which is distinct from reporting zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeTelemetry {
    pub free_disk_gb: Option<f64>,
    pub active_downloads: usize,
    pub paused_downloads: usize,
    pub global_download_rate_mbps: f64,
}

/// Why a node was excluded from routing in a given round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    ApiUnreachable,
    MissingFreeSpace,
    BelowMinFreeSpace,
    TooManyDownloads,
    ScoreBelowMinimum,
}

impl ExclusionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApiUnreachable => "api_unreachable",
            Self::MissingFreeSpace => "missing_free_space",
            Self::BelowMinFreeSpace => "below_min_free_space",
            Self::TooManyDownloads => "too_many_downloads",
            Self::ScoreBelowMinimum => "score_below_minimum",
        }
    }
}

impl std::fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-node snapshot produced by an evaluation round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeMetrics {
    pub name: String,
    pub free_disk_gb: Option<f64>,
    pub active_downloads: usize,
    pub paused_downloads: usize,
    pub global_download_rate_mbps: f64,
    pub reachable: bool,
    pub excluded_reason: Option<ExclusionReason>,
    pub score: Option<f64>,
}

impl NodeMetrics {
    /// Snapshot for a node whose probe failed or timed out.
    pub fn unreachable(name: &str) -> Self {
        Self {
            name: name.to_string(),
            free_disk_gb: None,
            active_downloads: 0,
            paused_downloads: 0,
            global_download_rate_mbps: 0.0,
            reachable: false,
            excluded_reason: Some(ExclusionReason::ApiUnreachable),
            score: None,
        }
    }
}

/// Node snapshot together with its exclusion flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeStatus {
    pub metrics: NodeMetrics,
    pub excluded: bool,
}

/// Terminal state of an admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionStatus {
    Accepted,
    Rejected,
    Failed,
}

impl DecisionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for DecisionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of routing one submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitDecision {
    pub selected_node: Option<String>,
    pub reason: String,
    pub status: DecisionStatus,
    #[serde(default)]
    pub attempted_nodes: Vec<NodeMetrics>,
}

/// Dry-run view of a routing decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionDebug {
    pub selected_node: Option<String>,
    pub reason: String,
    pub nodes: Vec<NodeStatus>,
}

/// One entry in the bounded decision history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    /// Unix timestamp in seconds.
    pub timestamp: f64,
    pub request_name: String,
    pub request_category: String,
    pub size_estimate_gb: f64,
    pub selected_node: Option<String>,
    pub reason: String,
    pub status: DecisionStatus,
    pub attempted_nodes: Vec<NodeMetrics>,
}

/// Lifecycle of a tracked download request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackedStatus {
    Pending,
    Downloading,
    Completed,
    Failed,
}

impl TrackedStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Downloading => "downloading",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// A download request retained for duplicate suppression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedRequest {
    pub infohash: String,
    pub name: String,
    pub category: String,
    pub size_estimate_gb: f64,
    pub magnet: String,
    pub timestamp: DateTime<Utc>,
    pub source: Option<String>,
    pub selected_node: Option<String>,
    pub status: TrackedStatus,
}

/// Connectivity report for a Sonarr/Radarr instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArrStatus {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    pub reachable: bool,
    pub version: Option<String>,
    pub error: Option<String>,
}

/// Result of a transient node connectivity test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeTestReport {
    pub reachable: bool,
    pub telemetry: Option<NodeTelemetry>,
    pub error: Option<String>,
}

/// Raw YAML configuration payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigRaw {
    pub yaml: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_negative_size() {
        let req = SubmitRequest {
            name: "x".to_string(),
            category: "tv".to_string(),
            size_estimate_gb: -1.0,
            magnet: "magnet:?xt=urn:btih:aa".to_string(),
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_magnet() {
        let req = SubmitRequest {
            name: "x".to_string(),
            category: "tv".to_string(),
            size_estimate_gb: 0.0,
            magnet: "  ".to_string(),
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn exclusion_reason_serializes_snake_case() {
        let json = serde_json::to_string(&ExclusionReason::BelowMinFreeSpace).unwrap();
        assert_eq!(json, "\"below_min_free_space\"");
    }

    #[test]
    fn decision_status_serializes_lowercase() {
        let json = serde_json::to_string(&DecisionStatus::Rejected).unwrap();
        assert_eq!(json, "\"rejected\"");
    }
}
