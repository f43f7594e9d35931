//! Telegram 渠道 - 直接调用 Bot API

use crate::notification::channel::{Ack, ChatSink, MediaItem, ParseMode};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Telegram 渠道配置
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    /// Bot API 地址
    pub api_url: String,
    /// Bot token
    pub bot_token: String,
    /// Chat ID
    pub chat_id: i64,
    /// 超时时间（秒），0 表示不设超时
    pub timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.telegram.org".to_string(),
            bot_token: String::new(),
            chat_id: 0,
            timeout_secs: 0,
        }
    }
}

/// sendMessage 请求体
#[derive(Debug, Serialize)]
struct SendMessagePayload<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
}

/// sendMediaGroup 中的单个 InputMedia
#[derive(Debug, Serialize)]
struct InputMedia<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    media: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    caption: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
}

/// Bot API 响应
#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    description: Option<String>,
}

/// 从 result 中提取 message_id（单个消息或消息数组）
fn message_ids(result: &serde_json::Value) -> Vec<i64> {
    match result {
        serde_json::Value::Array(items) => items
            .iter()
            .filter_map(|m| m.get("message_id").and_then(|id| id.as_i64()))
            .collect(),
        other => other
            .get("message_id")
            .and_then(|id| id.as_i64())
            .into_iter()
            .collect(),
    }
}

/// Telegram 渠道
#[derive(Debug)]
pub struct TelegramChannel {
    client: Client,
    config: TelegramConfig,
}

impl TelegramChannel {
    pub fn new(config: TelegramConfig) -> Result<Self> {
        if config.bot_token.is_empty() {
            return Err(anyhow!("bot_token is required"));
        }

        let mut builder = Client::builder();
        if config.timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(config.timeout_secs));
        }
        let client = builder
            .build()
            .map_err(|e| anyhow!("Failed to create HTTP client: {}", e))?;

        Ok(Self { client, config })
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.config.api_url.trim_end_matches('/'),
            self.config.bot_token,
            method
        )
    }

    async fn parse_response(response: reqwest::Response) -> Result<ApiResponse> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| anyhow!("Failed to read response: {}", e))?;

        let parsed: ApiResponse = serde_json::from_str(&body)
            .map_err(|e| anyhow!("Telegram API error ({}): {} - body: {}", status, e, body))?;

        if !parsed.ok {
            return Err(anyhow!(
                "Telegram API error ({}): {}",
                status,
                parsed.description.as_deref().unwrap_or("unknown error")
            ));
        }
        Ok(parsed)
    }
}

#[async_trait]
impl ChatSink for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send_text(&self, text: &str, parse_mode: Option<ParseMode>) -> Result<Ack> {
        let payload = SendMessagePayload {
            chat_id: self.config.chat_id,
            text,
            parse_mode: parse_mode.map(|m| m.as_str()),
        };

        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&payload)
            .send()
            .await
            .map_err(|e| anyhow!("HTTP request failed: {}", e))?;

        let parsed = Self::parse_response(response).await?;
        let ack = Ack {
            message_ids: parsed.result.as_ref().map(message_ids).unwrap_or_default(),
        };
        info!(chat_id = self.config.chat_id, "Message sent successfully");
        Ok(ack)
    }

    async fn send_media_group(&self, media: &[MediaItem], caption: &str) -> Result<Option<Ack>> {
        let mut descriptors = Vec::with_capacity(media.len());
        let mut form = Form::new().text("chat_id", self.config.chat_id.to_string());

        for (i, item) in media.iter().enumerate() {
            let attach = format!("file{}", i);
            let bytes = tokio::fs::read(&item.path)
                .await
                .with_context(|| format!("Cannot read media file {}", item.path.display()))?;
            if bytes.is_empty() {
                return Err(anyhow!("file must be non-empty: {}", item.path.display()));
            }
            let file_name = item
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| attach.clone());
            debug!(index = i, kind = item.kind.as_str(), size = bytes.len(), "Attaching media");

            form = form.part(attach.clone(), Part::bytes(bytes).file_name(file_name));
            descriptors.push(InputMedia {
                kind: item.kind.as_str(),
                media: format!("attach://{}", attach),
                caption: (i == 0).then_some(caption),
                parse_mode: (i == 0).then_some(ParseMode::Markdown.as_str()),
            });
        }

        form = form.text("media", serde_json::to_string(&descriptors)?);

        let response = self
            .client
            .post(self.method_url("sendMediaGroup"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| anyhow!("Error send media group message: {}", e))?;

        let parsed = Self::parse_response(response).await?;
        let ids = parsed.result.as_ref().map(message_ids).unwrap_or_default();
        if ids.is_empty() {
            return Ok(None);
        }
        info!(chat_id = self.config.chat_id, messages = ids.len(), "Media group sent successfully");
        Ok(Some(Ack { message_ids: ids }))
    }
}
