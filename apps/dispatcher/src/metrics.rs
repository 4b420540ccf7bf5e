//! Prometheus-backed metrics registry for the dispatcher.

use prometheus::{Encoder, GaugeVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Metrics registry shared across the routing core and the HTTP surface.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    node_reachable: GaugeVec,
    node_score: GaugeVec,
    arr_reachable: GaugeVec,
    submission_total: IntCounterVec,
}

impl Metrics {
    /// Construct a registry with the dispatcher collectors registered.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let node_reachable = GaugeVec::new(
            Opts::new(
                "dispatcher_node_reachable",
                "Whether a qBittorrent node is reachable (1) or not (0)",
            ),
            &["node"],
        )?;
        let node_score = GaugeVec::new(
            Opts::new(
                "dispatcher_node_score",
                "Last computed score for a qBittorrent node",
            ),
            &["node"],
        )?;
        let arr_reachable = GaugeVec::new(
            Opts::new(
                "dispatcher_arr_reachable",
                "Whether a Sonarr/Radarr instance is reachable (1) or not (0)",
            ),
            &["name", "type"],
        )?;
        let submission_total = IntCounterVec::new(
            Opts::new(
                "dispatcher_submission_total",
                "Total number of submissions processed by the dispatcher",
            ),
            &["status"],
        )?;

        registry.register(Box::new(node_reachable.clone()))?;
        registry.register(Box::new(node_score.clone()))?;
        registry.register(Box::new(arr_reachable.clone()))?;
        registry.register(Box::new(submission_total.clone()))?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                node_reachable,
                node_score,
                arr_reachable,
                submission_total,
            }),
        })
    }

    /// Record the latest probe outcome for a node.
    pub fn set_node(&self, node: &str, reachable: bool, score: Option<f64>) {
        self.inner
            .node_reachable
            .with_label_values(&[node])
            .set(if reachable { 1.0 } else { 0.0 });
        if let Some(score) = score {
            self.inner.node_score.with_label_values(&[node]).set(score);
        }
    }

    /// Record the latest connectivity check for a Sonarr/Radarr instance.
    pub fn set_arr(&self, name: &str, kind: &str, reachable: bool) {
        self.inner
            .arr_reachable
            .with_label_values(&[name, kind])
            .set(if reachable { 1.0 } else { 0.0 });
    }

    /// Count a terminal admission decision by status.
    pub fn inc_submission(&self, status: &str) {
        self.inner
            .submission_total
            .with_label_values(&[status])
            .inc();
    }

    /// Render the registry in the Prometheus text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| prometheus::Error::Msg(format!("metrics output was not valid UTF-8: {e}")))
    }
}
