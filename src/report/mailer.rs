//! Notification transports
//!
//! `HttpMailer` hands the message to a mail relay over HTTP; `LogNotifier`
//! writes it to the log when no relay is configured.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

use super::Notification;
use crate::types::{DormancyError, Result};

/// Delivers a finished notification
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<()>;
}

/// Mail relay settings
#[derive(Debug, Clone)]
pub struct MailerConfig {
    /// Relay endpoint accepting a JSON message
    pub endpoint: String,
    /// Optional bearer token for the relay
    pub token: Option<String>,
    pub timeout: Duration,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireAttachment<'a> {
    filename: &'a str,
    /// Base64 encoded file content
    content: String,
    content_type: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireMessage<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    body: &'a str,
    attachments: Vec<WireAttachment<'a>>,
}

impl<'a> From<&'a Notification> for WireMessage<'a> {
    fn from(n: &'a Notification) -> Self {
        Self {
            from: &n.from,
            to: &n.to,
            subject: &n.subject,
            body: &n.body,
            attachments: vec![WireAttachment {
                filename: &n.attachment.filename,
                content: STANDARD.encode(n.attachment.content.as_bytes()),
                content_type: &n.attachment.content_type,
            }],
        }
    }
}

/// Sends notifications through an HTTP mail relay
pub struct HttpMailer {
    http_client: reqwest::Client,
    config: MailerConfig,
}

impl HttpMailer {
    pub fn new(config: MailerConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| DormancyError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            config,
        })
    }
}

#[async_trait::async_trait]
impl Notifier for HttpMailer {
    async fn send(&self, notification: &Notification) -> Result<()> {
        let message = WireMessage::from(notification);

        let mut request = self.http_client.post(&self.config.endpoint).json(&message);
        if let Some(ref token) = self.config.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| DormancyError::Reporting(format!("Mail relay unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(DormancyError::Reporting(format!(
                "Mail relay returned HTTP {}: {}",
                status, detail
            )));
        }

        debug!(recipients = notification.to.len(), "Mail relay accepted notification");
        Ok(())
    }
}

/// Writes notifications to the log instead of sending them
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> Result<()> {
        info!(
            subject = %notification.subject,
            to = ?notification.to,
            attachment = %notification.attachment.filename,
            "No mail relay configured, logging report"
        );
        info!("{}", notification.body);
        Ok(())
    }
}
