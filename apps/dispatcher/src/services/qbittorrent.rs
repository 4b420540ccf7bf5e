//! qBittorrent Web API client for one backend node.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::config::NodeConfig;
use crate::models::NodeTelemetry;

const REQUEST_TIMEOUT_SECS: u64 = 15;

/// Errors surfaced by a backend node.
#[derive(Debug, Error)]
pub enum NodeError {
    /// Any I/O, auth, or parse failure while talking to the node.
    #[error("node unreachable: {detail}")]
    Unreachable { detail: String },

    /// The node rejected or failed a torrent submission.
    #[error("submission failed: {detail}")]
    SubmitFailed { detail: String },
}

/// Port over one backend node: probe telemetry and submit magnets.
#[async_trait]
pub trait NodeBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Sample current telemetry from the node.
    async fn probe(&self) -> Result<NodeTelemetry, NodeError>;

    /// Submit a magnet and return the infohash if the backend discloses one
    /// (best effort; empty string otherwise).
    async fn submit(
        &self,
        magnet: &str,
        category: &str,
        save_path: Option<&str>,
    ) -> Result<String, NodeError>;
}

#[derive(Debug, Default, Deserialize)]
struct MainData {
    #[serde(default)]
    server_state: ServerState,
}

#[derive(Debug, Default, Deserialize)]
struct ServerState {
    // Absent when the backend does not report disk space; distinct from zero.
    free_space_on_disk: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct TransferInfo {
    #[serde(default)]
    dl_info_speed: u64,
}

#[derive(Debug, Deserialize)]
struct TorrentEntry {
    #[serde(default)]
    hash: String,
}

/// Client for a single qBittorrent node.
///
/// The session cookie lives in the reqwest cookie store; the `logged_in`
/// flag serializes logins so concurrent probes and submits share one session.
pub struct QbittorrentClient {
    name: String,
    base_url: String,
    username: String,
    password: String,
    client: Client,
    logged_in: Mutex<bool>,
}

impl QbittorrentClient {
    pub fn new(config: &NodeConfig) -> Result<Self, NodeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .cookie_store(true)
            .build()
            .map_err(|e| NodeError::Unreachable {
                detail: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            name: config.name.clone(),
            base_url: config.url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
            client,
            logged_in: Mutex::new(false),
        })
    }

    fn api_url(&self, endpoint: &str) -> String {
        format!("{}/api/v2/{}", self.base_url, endpoint)
    }

    async fn login(&self) -> Result<(), NodeError> {
        let params = [
            ("username", self.username.as_str()),
            ("password", self.password.as_str()),
        ];
        let response = self
            .client
            .post(self.api_url("auth/login"))
            .form(&params)
            .send()
            .await
            .map_err(|e| NodeError::Unreachable {
                detail: format!("login request failed: {e}"),
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() || !(body.is_empty() || body.contains("Ok.")) {
            return Err(NodeError::Unreachable {
                detail: format!("login rejected: HTTP {status} {body}"),
            });
        }

        tracing::debug!(node = %self.name, "authenticated with qBittorrent");
        Ok(())
    }

    async fn ensure_session(&self) -> Result<(), NodeError> {
        let mut logged_in = self.logged_in.lock().await;
        if !*logged_in {
            self.login().await?;
            *logged_in = true;
        }
        Ok(())
    }

    async fn refresh_session(&self) -> Result<(), NodeError> {
        let mut logged_in = self.logged_in.lock().await;
        self.login().await?;
        *logged_in = true;
        Ok(())
    }

    fn session_expired(response: &Response) -> bool {
        matches!(
            response.status(),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        )
    }

    /// GET an endpoint, re-authenticating and replaying once on 401/403.
    async fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, NodeError> {
        let url = self.api_url(endpoint);
        let send = || self.client.get(&url).send();

        let mut response = send().await.map_err(|e| NodeError::Unreachable {
            detail: format!("{endpoint}: {e}"),
        })?;
        if Self::session_expired(&response) {
            self.refresh_session().await?;
            response = send().await.map_err(|e| NodeError::Unreachable {
                detail: format!("{endpoint}: {e}"),
            })?;
        }

        let status = response.status();
        if !status.is_success() {
            return Err(NodeError::Unreachable {
                detail: format!("{endpoint}: HTTP {status}"),
            });
        }
        response.json::<T>().await.map_err(|e| NodeError::Unreachable {
            detail: format!("{endpoint}: invalid response: {e}"),
        })
    }

    async fn latest_torrent_hash(&self) -> Result<String, NodeError> {
        let torrents: Vec<TorrentEntry> = self
            .get_json("torrents/info?sort=added_on&reverse=true")
            .await?;
        Ok(torrents.first().map(|t| t.hash.clone()).unwrap_or_default())
    }
}

#[async_trait]
impl NodeBackend for QbittorrentClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn probe(&self) -> Result<NodeTelemetry, NodeError> {
        self.ensure_session().await?;

        let maindata: MainData = self.get_json("sync/maindata").await?;
        let transfer: TransferInfo = self.get_json("transfer/info").await?;
        let downloading: Vec<TorrentEntry> =
            self.get_json("torrents/info?filter=downloading").await?;
        let paused: Vec<TorrentEntry> = self.get_json("torrents/info?filter=paused").await?;

        let free_disk_gb = maindata
            .server_state
            .free_space_on_disk
            .map(|bytes| bytes as f64 / 1_073_741_824.0);
        let global_download_rate_mbps = transfer.dl_info_speed as f64 * 8.0 / 1_000_000.0;

        Ok(NodeTelemetry {
            free_disk_gb,
            active_downloads: downloading.len(),
            paused_downloads: paused.len(),
            global_download_rate_mbps,
        })
    }

    async fn submit(
        &self,
        magnet: &str,
        category: &str,
        save_path: Option<&str>,
    ) -> Result<String, NodeError> {
        self.ensure_session().await?;

        let mut params = vec![
            ("urls", magnet.to_string()),
            ("category", category.to_string()),
            ("paused", "false".to_string()),
        ];
        if let Some(path) = save_path {
            params.push(("savepath", path.to_string()));
        }

        let url = self.api_url("torrents/add");
        let send = || self.client.post(&url).form(&params).send();

        let mut response = send().await.map_err(|e| NodeError::SubmitFailed {
            detail: format!("torrents/add: {e}"),
        })?;
        if Self::session_expired(&response) {
            self.refresh_session().await?;
            response = send().await.map_err(|e| NodeError::SubmitFailed {
                detail: format!("torrents/add: {e}"),
            })?;
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() || !(body.is_empty() || body.contains("Ok.")) {
            return Err(NodeError::SubmitFailed {
                detail: format!("torrents/add: HTTP {status} {body}"),
            });
        }

        // qBittorrent does not echo the hash; report the newest torrent as a
        // hint. Routing correctness does not depend on this value.
        match self.latest_torrent_hash().await {
            Ok(hash) => Ok(hash),
            Err(e) => {
                tracing::warn!(node = %self.name, error = %e, "failed to read back torrent hash");
                Ok(String::new())
            }
        }
    }
}
