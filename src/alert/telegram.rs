//! Telegram Bot API delivery

use super::{format_alert_message, AlertError, AlertSink};
use crate::signal::Signal;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::Serialize;
use std::time::Duration;

/// Telegram Bot API base URL
pub const TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Configuration for the Telegram alerter
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    /// Base URL for the Bot API
    pub base_url: String,
    /// Bot token
    pub token: String,
    /// Destination chat
    pub chat_id: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl TelegramConfig {
    pub fn new(token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            base_url: TELEGRAM_API_URL.to_string(),
            token: token.into(),
            chat_id: chat_id.into(),
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
}

/// Sends alerts as a Markdown message followed by the chart photo
pub struct TelegramAlerter {
    config: TelegramConfig,
    client: Client,
}

impl TelegramAlerter {
    pub fn new(config: TelegramConfig) -> Result<Self, AlertError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.token,
            method
        )
    }

    async fn send_text(&self, text: &str) -> Result<(), AlertError> {
        let body = SendMessage {
            chat_id: &self.config.chat_id,
            text,
            parse_mode: "Markdown",
        };
        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&body)
            .send()
            .await?;
        check(response).await
    }

    async fn send_photo(&self, png: &[u8], caption: &str) -> Result<(), AlertError> {
        let photo = Part::bytes(png.to_vec())
            .file_name("chart.png")
            .mime_str("image/png")?;
        let form = Form::new()
            .text("chat_id", self.config.chat_id.clone())
            .text("caption", caption.to_string())
            .part("photo", photo);

        let response = self
            .client
            .post(self.method_url("sendPhoto"))
            .multipart(form)
            .send()
            .await?;
        check(response).await
    }
}

async fn check(response: Response) -> Result<(), AlertError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(AlertError::Api {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl AlertSink for TelegramAlerter {
    async fn send_signal(&self, signal: &Signal, chart: Option<&[u8]>) -> Result<(), AlertError> {
        let text = format_alert_message(signal);
        self.send_text(&text).await?;
        tracing::info!(
            instrument = %signal.instrument,
            timeframe = %signal.timeframe,
            direction = %signal.direction,
            "Telegram alert sent"
        );

        if let Some(png) = chart {
            let caption = format!(
                "{} {} {}",
                signal.instrument,
                signal.timeframe,
                signal.direction.action()
            );
            self.send_photo(png, &caption).await?;
            tracing::debug!(bytes = png.len(), "Telegram chart sent");
        }
        Ok(())
    }

    async fn send_notice(&self, text: &str) -> Result<(), AlertError> {
        self.send_text(text).await
    }
}
