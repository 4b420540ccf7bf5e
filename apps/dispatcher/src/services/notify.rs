//! Outbound notification ports.
//!
//! Notifiers are fire-and-forget: the dispatcher publishes events on detached
//! tasks and delivery failures are logged, never surfaced to admissions.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

use crate::config::{MessagingKind, MessagingServiceConfig, N8nConfig};

const WEBHOOK_TIMEOUT_SECS: u64 = 10;

/// Routing events published to external ports.
#[derive(Debug, Clone)]
pub enum Event {
    DownloadStarted {
        name: String,
        category: String,
        size_estimate_gb: f64,
        node: String,
    },
    DownloadRejected {
        name: String,
    },
    DuplicateDetected {
        name: String,
        category: String,
        existing: String,
    },
    QualitySuggestion {
        name: String,
        current_quality: String,
        suggested_quality: String,
        reason: String,
    },
}

impl Event {
    fn kind(&self) -> &'static str {
        match self {
            Self::DownloadStarted { .. } => "download_started",
            Self::DownloadRejected { .. } => "download_rejected",
            Self::DuplicateDetected { .. } => "duplicate_detected",
            Self::QualitySuggestion { .. } => "quality_suggestion",
        }
    }
}

/// Errors raised while delivering a notification.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Delivery(String),
}

/// Port for publishing routing events to an external system.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    async fn notify(&self, event: &Event) -> Result<(), NotifyError>;
}

enum Level {
    Info,
    Success,
    Warning,
    Error,
}

impl Level {
    fn discord_color(&self) -> u32 {
        match self {
            Self::Info => 0x3B82F6,
            Self::Success => 0x10B981,
            Self::Warning => 0xF59E0B,
            Self::Error => 0xEF4444,
        }
    }

    fn slack_color(&self) -> &'static str {
        match self {
            Self::Info => "#3B82F6",
            Self::Success => "#10B981",
            Self::Warning => "#F59E0B",
            Self::Error => "#EF4444",
        }
    }

    fn telegram_emoji(&self) -> &'static str {
        match self {
            Self::Info => "\u{2139}\u{fe0f}",
            Self::Success => "\u{2705}",
            Self::Warning => "\u{26a0}\u{fe0f}",
            Self::Error => "\u{274c}",
        }
    }
}

fn render(event: &Event) -> (String, String, Level) {
    match event {
        Event::DownloadStarted {
            name,
            category,
            size_estimate_gb,
            node,
        } => (
            "Download Started".to_string(),
            format!(
                "Download started on {node}: {name}\nCategory: {category}\nSize: {size_estimate_gb:.2} GB"
            ),
            Level::Success,
        ),
        Event::DownloadRejected { name } => (
            "Download Rejected".to_string(),
            format!("Download rejected - no eligible nodes: {name}"),
            Level::Error,
        ),
        Event::DuplicateDetected { name, existing, .. } => (
            "Duplicate Download".to_string(),
            format!("Duplicate download detected: {name}\nAlready downloading: {existing}"),
            Level::Warning,
        ),
        Event::QualitySuggestion {
            name,
            current_quality,
            suggested_quality,
            reason,
        } => (
            "Quality Upgrade Suggestion".to_string(),
            format!(
                "Better quality available for: {name}\nCurrent: {current_quality}\nSuggested: {suggested_quality}\nReason: {reason}"
            ),
            Level::Info,
        ),
    }
}

/// Fan-out to configured chat webhooks (Discord, Slack, Telegram).
pub struct MessagingService {
    services: Vec<MessagingServiceConfig>,
    client: Client,
}

impl MessagingService {
    pub fn new(services: Vec<MessagingServiceConfig>) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(WEBHOOK_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            services: services.into_iter().filter(|s| s.enabled).collect(),
            client,
        })
    }

    async fn send_to_service(
        &self,
        service: &MessagingServiceConfig,
        title: &str,
        message: &str,
        level: &Level,
    ) -> Result<(), NotifyError> {
        match service.kind {
            MessagingKind::Discord => self.send_discord(service, title, message, level).await,
            MessagingKind::Slack => self.send_slack(service, title, message, level).await,
            MessagingKind::Telegram => self.send_telegram(service, title, message, level).await,
        }
    }

    async fn send_discord(
        &self,
        service: &MessagingServiceConfig,
        title: &str,
        message: &str,
        level: &Level,
    ) -> Result<(), NotifyError> {
        let Some(webhook_url) = service.webhook_url.as_deref() else {
            tracing::warn!(service = %service.name, "discord service missing webhook_url");
            return Ok(());
        };

        let payload = json!({
            "embeds": [{
                "title": title,
                "description": message,
                "color": level.discord_color(),
            }]
        });
        self.client
            .post(webhook_url)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn send_slack(
        &self,
        service: &MessagingServiceConfig,
        title: &str,
        message: &str,
        level: &Level,
    ) -> Result<(), NotifyError> {
        let Some(webhook_url) = service.webhook_url.as_deref() else {
            tracing::warn!(service = %service.name, "slack service missing webhook_url");
            return Ok(());
        };

        let payload = json!({
            "attachments": [{
                "color": level.slack_color(),
                "title": title,
                "text": message,
            }]
        });
        self.client
            .post(webhook_url)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn send_telegram(
        &self,
        service: &MessagingServiceConfig,
        title: &str,
        message: &str,
        level: &Level,
    ) -> Result<(), NotifyError> {
        let (Some(bot_token), Some(chat_id)) =
            (service.bot_token.as_deref(), service.chat_id.as_deref())
        else {
            tracing::warn!(service = %service.name, "telegram service missing bot_token or chat_id");
            return Ok(());
        };

        let text = format!("{} *{title}*\n\n{message}", level.telegram_emoji());
        let url = format!("https://api.telegram.org/bot{bot_token}/sendMessage");
        let payload = json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "Markdown",
        });
        self.client
            .post(&url)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for MessagingService {
    fn name(&self) -> &str {
        "messaging"
    }

    async fn notify(&self, event: &Event) -> Result<(), NotifyError> {
        let (title, message, level) = render(event);
        for service in &self.services {
            if let Err(e) = self.send_to_service(service, &title, &message, &level).await {
                tracing::warn!(service = %service.name, error = %e, "failed to send notification");
            }
        }
        Ok(())
    }
}

/// Structured event webhook for n8n automations.
pub struct N8nClient {
    config: N8nConfig,
    client: Client,
}

impl N8nClient {
    pub fn new(config: N8nConfig) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(WEBHOOK_TIMEOUT_SECS))
            .build()?;
        Ok(Self { config, client })
    }

    fn event_data(event: &Event) -> serde_json::Value {
        match event {
            Event::DownloadStarted {
                name,
                category,
                size_estimate_gb,
                node,
            } => json!({
                "name": name,
                "category": category,
                "size_gb": size_estimate_gb,
                "node": node,
                "status": "started",
            }),
            Event::DownloadRejected { name } => json!({
                "name": name,
                "status": "rejected",
            }),
            Event::DuplicateDetected {
                name,
                category,
                existing,
            } => json!({
                "name": name,
                "category": category,
                "existing_name": existing,
                "status": "duplicate",
            }),
            Event::QualitySuggestion {
                name,
                current_quality,
                suggested_quality,
                reason,
            } => json!({
                "name": name,
                "current_quality": current_quality,
                "suggested_quality": suggested_quality,
                "reason": reason,
                "status": "suggestion",
            }),
        }
    }
}

#[async_trait]
impl Notifier for N8nClient {
    fn name(&self) -> &str {
        "n8n"
    }

    async fn notify(&self, event: &Event) -> Result<(), NotifyError> {
        let Some(webhook_url) = self.config.webhook_url.as_deref() else {
            tracing::debug!("n8n webhook URL not configured");
            return Ok(());
        };

        let payload = json!({
            "event": event.kind(),
            "timestamp": Utc::now().to_rfc3339(),
            "data": Self::event_data(event),
        });

        let mut request = self.client.post(webhook_url).json(&payload);
        if let Some(api_key) = self.config.api_key.as_deref() {
            request = request.bearer_auth(api_key);
        }
        request.send().await?.error_for_status()?;

        tracing::info!(event = event.kind(), "triggered n8n webhook");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn started_event_renders_size_and_node() {
        let event = Event::DownloadStarted {
            name: "Show.S01E01".to_string(),
            category: "tv".to_string(),
            size_estimate_gb: 2.5,
            node: "alpha".to_string(),
        };
        let (title, message, _) = render(&event);
        assert_eq!(title, "Download Started");
        assert!(message.contains("alpha"));
        assert!(message.contains("2.50 GB"));
    }

    #[test]
    fn event_kinds_are_stable() {
        let event = Event::DuplicateDetected {
            name: "a".to_string(),
            category: "tv".to_string(),
            existing: "b".to_string(),
        };
        assert_eq!(event.kind(), "duplicate_detected");
    }
}
