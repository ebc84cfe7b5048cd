use crate::error::AlertError;
use async_trait::async_trait;
use configuration::{AlertsConfig, TelegramConfig};
use core_types::AlertKind;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
pub mod error;
pub mod thresholds;

pub use thresholds::{MetricReadings, Severity, ThresholdRule, TriggeredAlert};

/// A best-effort notification channel.
///
/// Callers treat every error as non-fatal: a failed alert is logged and never
/// changes the outcome of the work it reports on.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn send_alert(&self, kind: AlertKind, subject: &str, message: &str) -> Result<(), AlertError>;
}

/// Writes alerts to the log stream only.
#[derive(Debug, Clone)]
pub struct LogAlerter {
    recipient: String,
}

impl LogAlerter {
    pub fn new(recipient: impl Into<String>) -> Self {
        Self { recipient: recipient.into() }
    }
}

#[async_trait]
impl AlertSink for LogAlerter {
    async fn send_alert(&self, kind: AlertKind, subject: &str, message: &str) -> Result<(), AlertError> {
        if kind.is_failure() {
            tracing::warn!(kind = %kind, recipient = %self.recipient, subject, message, "[ALERT]");
        } else {
            tracing::info!(kind = %kind, recipient = %self.recipient, subject, message, "[ALERT]");
        }
        Ok(())
    }
}

/// The JSON payload for the Telegram `sendMessage` endpoint.
#[derive(Debug, Serialize)]
struct SendMessagePayload<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str, // To allow for formatting like bold, italics etc.
}

const TELEGRAM_API: &str = "https://api.telegram.org";

/// A client for sending messages to the Telegram Bot API.
pub struct TelegramAlerter {
    client: Client,
    api_base: String,
    token: String,
    chat_id: String,
}

impl TelegramAlerter {
    /// Creates a new `TelegramAlerter`.
    ///
    /// Fails with `NotConfigured` if the token or chat_id is missing, allowing
    /// the caller to fall back to log-only alerting.
    pub fn new(config: &TelegramConfig) -> Result<Self, AlertError> {
        if config.token.is_empty() || config.chat_id.is_empty() {
            return Err(AlertError::NotConfigured);
        }
        Ok(Self {
            client: Client::new(),
            api_base: TELEGRAM_API.to_string(),
            token: config.token.clone(),
            chat_id: config.chat_id.clone(),
        })
    }

    /// Points the alerter at another Bot API host.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Sends a text message to the configured Telegram chat.
    pub async fn send_message(&self, message: &str) -> Result<(), AlertError> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.token);

        let payload = SendMessagePayload {
            chat_id: &self.chat_id,
            text: message,
            parse_mode: "MarkdownV2", // Use Markdown for rich formatting
        };

        let response = self.client.post(&url).json(&payload).send().await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Failed to decode error response".to_string());
            return Err(AlertError::ApiError(error_text));
        }

        Ok(())
    }
}

#[async_trait]
impl AlertSink for TelegramAlerter {
    async fn send_alert(&self, kind: AlertKind, subject: &str, message: &str) -> Result<(), AlertError> {
        self.send_message(&format_telegram(kind, subject, message)).await
    }
}

/// Renders an alert as a MarkdownV2 message.
fn format_telegram(kind: AlertKind, subject: &str, message: &str) -> String {
    let icon = match kind {
        AlertKind::ForecastUpdated => "✅",
        AlertKind::ThresholdBreached => "⚠️",
        AlertKind::FetchFailed | AlertKind::PersistFailed | AlertKind::CycleFailed => "🚨",
    };
    format!("{} *{}*\n{}", icon, escape_markdown(subject), escape_markdown(message))
}

/// A helper function to escape characters that have special meaning in Telegram's MarkdownV2.
fn escape_markdown(text: &str) -> String {
    let special_chars = r"\_*[]()~`>#+-=|{}.!";
    special_chars.chars().fold(text.to_string(), |s, c| s.replace(c, &format!("\\{}", c)))
}

/// Delivers every alert to each of its sinks.
pub struct FanoutAlerter {
    sinks: Vec<Arc<dyn AlertSink>>,
}

impl FanoutAlerter {
    pub fn new(sinks: Vec<Arc<dyn AlertSink>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl AlertSink for FanoutAlerter {
    async fn send_alert(&self, kind: AlertKind, subject: &str, message: &str) -> Result<(), AlertError> {
        let mut failed = 0;
        for sink in &self.sinks {
            if let Err(e) = sink.send_alert(kind, subject, message).await {
                tracing::warn!(error = %e, kind = %kind, "[ALERT_FAILED] Alert transport failed.");
                failed += 1;
            }
        }
        if failed > 0 {
            return Err(AlertError::Partial { failed, total: self.sinks.len() });
        }
        Ok(())
    }
}

/// Builds the alert sink described by the configuration: alerts are always
/// logged, and also sent to Telegram when a bot is configured.
pub fn build_alerter(config: &AlertsConfig) -> Arc<dyn AlertSink> {
    let mut sinks: Vec<Arc<dyn AlertSink>> = vec![Arc::new(LogAlerter::new(config.admin_email.clone()))];
    match TelegramAlerter::new(&config.telegram) {
        Ok(telegram) => sinks.push(Arc::new(telegram)),
        Err(e) => tracing::info!(reason = %e, "Telegram alerts disabled; alerts are logged only."),
    }
    Arc::new(FanoutAlerter::new(sinks))
}
