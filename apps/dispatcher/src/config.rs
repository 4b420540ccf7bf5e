//! Configuration model for the dispatcher.
//!
//! The whole configuration lives in a single YAML document. It is parsed and
//! validated as one unit, and hot reload swaps the active value atomically so
//! in-flight submissions keep the snapshot they captured.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors produced while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no nodes configured")]
    NoNodes,

    #[error("node '{node}': {message}")]
    InvalidNode { node: String, message: String },

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub dispatcher: DispatcherSettings,
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,
    #[serde(default)]
    pub arr_instances: Vec<ArrInstanceConfig>,
    #[serde(default)]
    pub request_tracking: RequestTrackingSettings,
    #[serde(default)]
    pub integrations: IntegrationsConfig,
}

/// Listener configuration. Binding happens once at startup; changing these
/// values via hot reload does not rebind the listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Scoring policy and submission settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherSettings {
    #[serde(default = "default_disk_weight")]
    pub disk_weight: f64,
    #[serde(default = "default_download_weight")]
    pub download_weight: f64,
    #[serde(default = "default_bandwidth_weight")]
    pub bandwidth_weight: f64,
    #[serde(default = "default_max_downloads")]
    pub max_downloads: usize,
    #[serde(default = "default_min_score")]
    pub min_score: f64,
    #[serde(default)]
    pub submission: SubmissionSettings,
    /// Required in `X-API-Key` for admin endpoints when set.
    #[serde(default)]
    pub admin_key: Option<String>,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            disk_weight: default_disk_weight(),
            download_weight: default_download_weight(),
            bandwidth_weight: default_bandwidth_weight(),
            max_downloads: default_max_downloads(),
            min_score: default_min_score(),
            submission: SubmissionSettings::default(),
            admin_key: None,
        }
    }
}

fn default_disk_weight() -> f64 {
    1.0
}

fn default_download_weight() -> f64 {
    2.0
}

fn default_bandwidth_weight() -> f64 {
    0.1
}

fn default_max_downloads() -> usize {
    50
}

fn default_min_score() -> f64 {
    -1.0
}

/// Submission retry budget and optional save-path override.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionSettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    #[serde(default)]
    pub save_path: Option<String>,
}

impl Default for SubmissionSettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            save_path: None,
        }
    }
}

fn default_max_retries() -> usize {
    2
}

/// One qBittorrent backend node.
#[derive(Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub name: String,
    pub url: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub min_free_gb: f64,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

// Custom Debug implementation to avoid exposing the password
impl std::fmt::Debug for NodeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeConfig")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("min_free_gb", &self.min_free_gb)
            .field("weight", &self.weight)
            .finish()
    }
}

fn default_weight() -> f64 {
    1.0
}

/// A Sonarr/Radarr instance checked for connectivity.
#[derive(Clone, Serialize, Deserialize)]
pub struct ArrInstanceConfig {
    pub name: String,
    #[serde(rename = "type", default = "default_arr_kind")]
    pub kind: String,
    /// Base URL pointing at the *arr API root, e.g. `http://host:8989/api/v3`.
    pub url: String,
    pub api_key: String,
}

impl std::fmt::Debug for ArrInstanceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArrInstanceConfig")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("url", &self.url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

fn default_arr_kind() -> String {
    "sonarr".to_string()
}

/// Duplicate suppression and quality advisory toggles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestTrackingSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub check_duplicates: bool,
    #[serde(default)]
    pub check_quality_profiles: bool,
    #[serde(default)]
    pub send_suggestions: bool,
}

impl Default for RequestTrackingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            check_duplicates: true,
            check_quality_profiles: false,
            send_suggestions: false,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Outbound notification ports.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntegrationsConfig {
    #[serde(default)]
    pub messaging_services: Vec<MessagingServiceConfig>,
    #[serde(default)]
    pub n8n: N8nConfig,
}

/// Supported chat webhook flavours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessagingKind {
    Discord,
    Slack,
    Telegram,
}

/// A single chat notification target.
#[derive(Clone, Serialize, Deserialize)]
pub struct MessagingServiceConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: MessagingKind,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub bot_token: Option<String>,
    #[serde(default)]
    pub chat_id: Option<String>,
}

impl std::fmt::Debug for MessagingServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessagingServiceConfig")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("enabled", &self.enabled)
            .field("webhook_url", &self.webhook_url)
            .field("bot_token", &self.bot_token.as_ref().map(|_| "[REDACTED]"))
            .field("chat_id", &self.chat_id)
            .finish()
    }
}

/// n8n automation webhook.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct N8nConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl AppConfig {
    /// Validate the configuration after deserialization.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nodes.is_empty() {
            return Err(ConfigError::NoNodes);
        }

        let mut seen = std::collections::HashSet::new();
        for node in &self.nodes {
            let invalid = |message: &str| ConfigError::InvalidNode {
                node: node.name.clone(),
                message: message.to_string(),
            };
            if node.name.trim().is_empty() {
                return Err(invalid("name must not be empty"));
            }
            if node.url.trim().is_empty() {
                return Err(invalid("url must not be empty"));
            }
            if node.username.trim().is_empty() {
                return Err(invalid("username must not be empty"));
            }
            if node.password.is_empty() {
                return Err(invalid("password must not be empty"));
            }
            if node.min_free_gb < 0.0 {
                return Err(invalid("min_free_gb must be non-negative"));
            }
            if !node.weight.is_finite() || node.weight <= 0.0 {
                return Err(invalid("weight must be a positive number"));
            }
            if !seen.insert(node.name.clone()) {
                return Err(invalid("duplicate node name"));
            }
        }
        Ok(())
    }

    /// Serialize the configuration back to its YAML document form.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// Parse and validate a YAML configuration document.
pub fn parse_str(raw: &str) -> Result<AppConfig, ConfigError> {
    let config: AppConfig = serde_yaml::from_str(raw)?;
    config.validate()?;
    Ok(config)
}

/// Load and validate the configuration file at `path`.
pub fn load(path: &Path) -> Result<AppConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_str(&raw)
}
