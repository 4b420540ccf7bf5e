//! Test infrastructure for dispatcher integration tests.
//!
//! Provides a `TestApp` wrapper around `axum_test::TestServer` with mock node
//! backends, so the full production router can be exercised without real
//! qBittorrent instances.

#![allow(dead_code)]

use async_trait::async_trait;
use axum_test::TestServer;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::Mutex;

use dispatcher::config::{AppConfig, NodeConfig};
use dispatcher::metrics::Metrics;
use dispatcher::models::NodeTelemetry;
use dispatcher::services::{Dispatcher, NodeBackend, NodeError, Notifier, RoutingPlane};
use dispatcher::{router, AppState};

/// What a mock node reports when probed.
#[derive(Clone)]
pub enum ProbeBehavior {
    Telemetry(NodeTelemetry),
    Unreachable(String),
}

/// How a mock node responds to a submission.
#[derive(Clone)]
pub enum SubmitBehavior {
    Accept(String),
    Fail(String),
}

/// In-memory stand-in for a qBittorrent node.
pub struct MockBackend {
    name: String,
    probe: ProbeBehavior,
    submit: SubmitBehavior,
    /// Magnets this node accepted or attempted, in call order.
    pub submitted: Mutex<Vec<String>>,
}

impl MockBackend {
    pub fn new(name: &str, probe: ProbeBehavior, submit: SubmitBehavior) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            probe,
            submit,
            submitted: Mutex::new(Vec::new()),
        })
    }

    /// A healthy node with the given free disk and otherwise idle telemetry.
    pub fn reachable(name: &str, free_disk_gb: f64) -> Arc<Self> {
        Self::new(
            name,
            ProbeBehavior::Telemetry(telemetry(Some(free_disk_gb), 0, 0.0)),
            SubmitBehavior::Accept("cafebabe".to_string()),
        )
    }

    /// A node whose probe always fails.
    pub fn unreachable(name: &str) -> Arc<Self> {
        Self::new(
            name,
            ProbeBehavior::Unreachable("connection refused".to_string()),
            SubmitBehavior::Accept(String::new()),
        )
    }

    /// A healthy node whose submissions always fail.
    pub fn failing_submit(name: &str, free_disk_gb: f64) -> Arc<Self> {
        Self::new(
            name,
            ProbeBehavior::Telemetry(telemetry(Some(free_disk_gb), 0, 0.0)),
            SubmitBehavior::Fail("disk I/O error".to_string()),
        )
    }
}

#[async_trait]
impl NodeBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn probe(&self) -> Result<NodeTelemetry, NodeError> {
        match &self.probe {
            ProbeBehavior::Telemetry(telemetry) => Ok(telemetry.clone()),
            ProbeBehavior::Unreachable(detail) => Err(NodeError::Unreachable {
                detail: detail.clone(),
            }),
        }
    }

    async fn submit(
        &self,
        magnet: &str,
        _category: &str,
        _save_path: Option<&str>,
    ) -> Result<String, NodeError> {
        self.submitted.lock().await.push(magnet.to_string());
        match &self.submit {
            SubmitBehavior::Accept(hash) => Ok(hash.clone()),
            SubmitBehavior::Fail(detail) => Err(NodeError::SubmitFailed {
                detail: detail.clone(),
            }),
        }
    }
}

/// Build telemetry with the given free disk, active downloads, and rate.
pub fn telemetry(free_disk_gb: Option<f64>, active: usize, rate_mbps: f64) -> NodeTelemetry {
    NodeTelemetry {
        free_disk_gb,
        active_downloads: active,
        paused_downloads: 0,
        global_download_rate_mbps: rate_mbps,
    }
}

/// A node config entry matching a mock backend by name.
pub fn node_config(name: &str) -> NodeConfig {
    NodeConfig {
        name: name.to_string(),
        url: format!("http://{name}:8080"),
        username: "admin".to_string(),
        password: "secret".to_string(),
        min_free_gb: 0.0,
        weight: 1.0,
    }
}

/// Configuration whose node list matches the given mock backends.
pub fn config_for(mocks: &[Arc<MockBackend>]) -> AppConfig {
    AppConfig {
        nodes: mocks.iter().map(|m| node_config(m.name())).collect(),
        ..AppConfig::default()
    }
}

/// A magnet URI with the given infohash.
pub fn magnet(infohash: &str) -> String {
    format!("magnet:?xt=urn:btih:{infohash}&dn=test")
}

/// A JSON submit body for the given magnet.
pub fn submit_body(name: &str, magnet: &str, size_estimate_gb: f64) -> serde_json::Value {
    serde_json::json!({
        "name": name,
        "category": "tv",
        "size_estimate_gb": size_estimate_gb,
        "magnet": magnet,
    })
}

/// Test application wrapper around `axum_test::TestServer`.
pub struct TestApp {
    server: TestServer,
    pub dispatcher: Arc<Dispatcher>,
    tmp: TempDir,
}

impl TestApp {
    /// Build an app whose node list mirrors the given mock backends.
    pub async fn new(mocks: Vec<Arc<MockBackend>>) -> Self {
        let config = config_for(&mocks);
        Self::with_config(config, mocks, Vec::new()).await
    }

    /// Build an app with an explicit configuration, mock backends, and
    /// notifier ports. The config document is persisted to a temp file so the
    /// `/config/raw` endpoints operate on a real file.
    pub async fn with_config(
        config: AppConfig,
        mocks: Vec<Arc<MockBackend>>,
        notifiers: Vec<Arc<dyn Notifier>>,
    ) -> Self {
        let tmp = TempDir::new().expect("failed to create temp dir");
        let config_path = tmp.path().join("config.yaml");
        std::fs::write(&config_path, config.to_yaml().expect("config should serialize"))
            .expect("failed to write config file");

        let backends: Vec<Arc<dyn NodeBackend>> = mocks
            .into_iter()
            .map(|m| m as Arc<dyn NodeBackend>)
            .collect();

        let metrics = Metrics::new().expect("failed to create metrics registry");
        let plane = RoutingPlane::new(Arc::new(config), backends, notifiers);
        let dispatcher = Arc::new(Dispatcher::with_plane(plane, metrics.clone()));

        let state = AppState {
            config_path: Arc::new(config_path),
            dispatcher: Arc::clone(&dispatcher),
            metrics,
        };

        let server = TestServer::new(router(state)).expect("failed to create test server");

        Self {
            server,
            dispatcher,
            tmp,
        }
    }

    pub fn server(&self) -> &TestServer {
        &self.server
    }

    /// Path of the persisted config document.
    pub fn config_path(&self) -> std::path::PathBuf {
        self.tmp.path().join("config.yaml")
    }
}
