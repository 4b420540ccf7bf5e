//! Pure scoring of node telemetry against the routing policy.

use crate::config::{DispatcherSettings, NodeConfig};
use crate::models::{ExclusionReason, NodeTelemetry};

/// Result of scoring one node for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreOutcome {
    pub score: Option<f64>,
    pub excluded: bool,
    pub reason: Option<ExclusionReason>,
}

/// Score a node's telemetry for a request of the given estimated size.
///
/// The estimated size is treated as already allocated: it is subtracted from
/// known free space before the minimum-free and scoring checks. When several
/// exclusion reasons apply, the first one set wins (disk before downloads
/// before score). A node excluded only for scoring below the minimum keeps
/// its computed score for debugging.
pub fn score_node(
    settings: &DispatcherSettings,
    node: &NodeConfig,
    telemetry: &NodeTelemetry,
    size_estimate_gb: f64,
) -> ScoreOutcome {
    let mut excluded = false;
    let mut reason: Option<ExclusionReason> = None;

    let mut free_disk_gb = telemetry.free_disk_gb;
    if size_estimate_gb > 0.0 {
        if let Some(free) = free_disk_gb {
            free_disk_gb = Some((free - size_estimate_gb).max(0.0));
        }
    }

    match free_disk_gb {
        None => {
            excluded = true;
            reason = Some(ExclusionReason::MissingFreeSpace);
        }
        Some(free) if free < node.min_free_gb => {
            excluded = true;
            reason = Some(ExclusionReason::BelowMinFreeSpace);
        }
        Some(_) => {}
    }

    if telemetry.active_downloads > settings.max_downloads {
        excluded = true;
        reason.get_or_insert(ExclusionReason::TooManyDownloads);
    }

    let mut score = None;
    if !excluded {
        let base = free_disk_gb.unwrap_or(0.0) * settings.disk_weight
            - telemetry.active_downloads as f64 * settings.download_weight
            - telemetry.global_download_rate_mbps * settings.bandwidth_weight;
        let weighted = base * node.weight;
        score = Some(weighted);

        if weighted < settings.min_score {
            excluded = true;
            reason = Some(ExclusionReason::ScoreBelowMinimum);
        }
    }

    ScoreOutcome {
        score,
        excluded,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(min_free_gb: f64, weight: f64) -> NodeConfig {
        NodeConfig {
            name: "alpha".to_string(),
            url: "http://alpha:8080".to_string(),
            username: "admin".to_string(),
            password: "secret".to_string(),
            min_free_gb,
            weight,
        }
    }

    fn telemetry(free: Option<f64>, active: usize, rate: f64) -> NodeTelemetry {
        NodeTelemetry {
            free_disk_gb: free,
            active_downloads: active,
            paused_downloads: 0,
            global_download_rate_mbps: rate,
        }
    }

    #[test]
    fn scores_linear_combination() {
        let settings = DispatcherSettings::default();
        let outcome = score_node(&settings, &node(0.0, 1.0), &telemetry(Some(100.0), 3, 50.0), 0.0);
        // 100*1.0 - 3*2.0 - 50*0.1
        assert!(!outcome.excluded);
        assert_eq!(outcome.score, Some(89.0));
        assert_eq!(outcome.reason, None);
    }

    #[test]
    fn per_node_weight_multiplies_base_score() {
        let settings = DispatcherSettings {
            disk_weight: 1.0,
            download_weight: 0.0,
            bandwidth_weight: 0.0,
            ..DispatcherSettings::default()
        };
        let outcome = score_node(&settings, &node(0.0, 2.0), &telemetry(Some(500.0), 0, 0.0), 0.0);
        assert_eq!(outcome.score, Some(1000.0));
    }

    #[test]
    fn unknown_free_space_excludes() {
        let settings = DispatcherSettings::default();
        let outcome = score_node(&settings, &node(0.0, 1.0), &telemetry(None, 0, 0.0), 0.0);
        assert!(outcome.excluded);
        assert_eq!(outcome.reason, Some(ExclusionReason::MissingFreeSpace));
        assert_eq!(outcome.score, None);
    }

    #[test]
    fn size_estimate_pushes_node_below_min_free() {
        let settings = DispatcherSettings::default();
        // 150 free - 60 requested = 90 effective, below the 100 threshold
        let outcome = score_node(&settings, &node(100.0, 1.0), &telemetry(Some(150.0), 0, 0.0), 60.0);
        assert!(outcome.excluded);
        assert_eq!(outcome.reason, Some(ExclusionReason::BelowMinFreeSpace));
    }

    #[test]
    fn effective_free_clamps_at_zero() {
        let settings = DispatcherSettings::default();
        let outcome = score_node(&settings, &node(0.0, 1.0), &telemetry(Some(10.0), 0, 0.0), 50.0);
        assert!(!outcome.excluded);
        assert_eq!(outcome.score, Some(0.0));
    }

    #[test]
    fn too_many_downloads_excludes() {
        let settings = DispatcherSettings {
            max_downloads: 5,
            ..DispatcherSettings::default()
        };
        let outcome = score_node(&settings, &node(0.0, 1.0), &telemetry(Some(100.0), 6, 0.0), 0.0);
        assert!(outcome.excluded);
        assert_eq!(outcome.reason, Some(ExclusionReason::TooManyDownloads));
        assert_eq!(outcome.score, None);
    }

    #[test]
    fn disk_reason_wins_over_download_reason() {
        let settings = DispatcherSettings {
            max_downloads: 5,
            ..DispatcherSettings::default()
        };
        let outcome = score_node(&settings, &node(50.0, 1.0), &telemetry(Some(10.0), 6, 0.0), 0.0);
        assert!(outcome.excluded);
        assert_eq!(outcome.reason, Some(ExclusionReason::BelowMinFreeSpace));
    }

    #[test]
    fn score_below_minimum_keeps_computed_score() {
        let settings = DispatcherSettings {
            min_score: 500.0,
            ..DispatcherSettings::default()
        };
        let outcome = score_node(&settings, &node(0.0, 1.0), &telemetry(Some(100.0), 0, 0.0), 0.0);
        assert!(outcome.excluded);
        assert_eq!(outcome.reason, Some(ExclusionReason::ScoreBelowMinimum));
        assert_eq!(outcome.score, Some(100.0));
    }

    #[test]
    fn identical_inputs_produce_identical_outputs() {
        let settings = DispatcherSettings::default();
        let node = node(10.0, 1.5);
        let telemetry = telemetry(Some(321.5), 7, 12.5);
        let first = score_node(&settings, &node, &telemetry, 4.2);
        let second = score_node(&settings, &node, &telemetry, 4.2);
        assert_eq!(first, second);
    }
}
