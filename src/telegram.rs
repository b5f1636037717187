use crate::config::TelegramConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use std::path::Path;

/// Delivery channel for reports. Fire-and-forget: no retries, no receipts.
#[async_trait]
pub trait Notifier {
    async fn send_text(&self, text: &str) -> Result<()>;
    async fn send_image(&self, path: &Path, caption: &str) -> Result<()>;
}

pub struct TelegramNotifier {
    client: Client,
    config: TelegramConfig,
}

impl TelegramNotifier {
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("Failed to build Telegram HTTP client")?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.config.api_base.trim_end_matches('/'),
            self.config.bot_token,
            method
        )
    }

    // The response is only logged, never acted upon.
    async fn log_response(method: &str, response: Response) {
        let status = response.status();
        if status.is_success() {
            log::debug!("telegram {}: {}", method, status);
            return;
        }
        let body = response.text().await.unwrap_or_default();
        log::warn!("telegram {} rejected with {}: {}", method, status, body);
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send_text(&self, text: &str) -> Result<()> {
        let params = [("chat_id", self.config.chat_id.as_str()), ("text", text)];

        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .form(&params)
            .send()
            .await
            .map_err(reqwest::Error::without_url)
            .context("Telegram sendMessage request failed")?;

        Self::log_response("sendMessage", response).await;
        Ok(())
    }

    async fn send_image(&self, path: &Path, caption: &str) -> Result<()> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read chart {:?}", path))?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "chart.png".to_string());

        let photo = Part::bytes(bytes).file_name(file_name).mime_str("image/png")?;
        let form = Form::new()
            .text("chat_id", self.config.chat_id.clone())
            .text("caption", caption.to_string())
            .part("photo", photo);

        let response = self
            .client
            .post(self.method_url("sendPhoto"))
            .multipart(form)
            .send()
            .await
            .map_err(reqwest::Error::without_url)
            .context("Telegram sendPhoto request failed")?;

        Self::log_response("sendPhoto", response).await;
        Ok(())
    }
}
