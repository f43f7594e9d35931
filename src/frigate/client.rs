//! Frigate REST 客户端 - 拉取事件批次和下载视频片段

use super::event::Event;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// 事件来源抽象，轮询循环只依赖这个 trait
#[async_trait]
pub trait EventSource: Send + Sync {
    /// 拉取一批事件
    ///
    /// `before_window` 为 `Some(n)` 时只返回 n 秒之前就已存在的事件。
    async fn fetch_events(&self, before_window: Option<u64>) -> Result<Vec<Event>>;

    /// 下载事件视频片段到 `dest`，返回写入的字节数
    async fn download_clip(&self, event_id: &str, dest: &Path) -> Result<u64>;
}

/// Frigate 客户端配置
#[derive(Debug, Clone)]
pub struct FrigateConfig {
    /// 内部访问地址，如 http://frigate:5000
    pub base_url: String,
    /// 每次拉取的最大事件数
    pub event_limit: usize,
    /// 请求超时（秒），0 表示不设超时
    pub timeout_secs: u64,
}

impl Default for FrigateConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            event_limit: 20,
            timeout_secs: 0,
        }
    }
}

/// Frigate HTTP 客户端
#[derive(Debug, Clone)]
pub struct FrigateClient {
    client: Client,
    config: FrigateConfig,
}

impl FrigateClient {
    pub fn new(config: FrigateConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if config.timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(config.timeout_secs));
        }
        let client = builder
            .build()
            .map_err(|e| anyhow!("Failed to create HTTP client: {}", e))?;

        Ok(Self { client, config })
    }

    fn base(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    /// 事件列表 URL
    pub fn events_url(&self, before: Option<i64>) -> String {
        let mut url = format!("{}/api/events?limit={}", self.base(), self.config.event_limit);
        if let Some(ts) = before {
            url.push_str(&format!("&before={}", ts));
        }
        url
    }

    /// 视频片段 URL
    pub fn clip_url(&self, event_id: &str) -> String {
        format!("{}/api/events/{}/clip.mp4", self.base(), event_id)
    }
}

#[async_trait]
impl EventSource for FrigateClient {
    async fn fetch_events(&self, before_window: Option<u64>) -> Result<Vec<Event>> {
        let before = before_window.map(|secs| chrono::Utc::now().timestamp() - secs as i64);
        let url = self.events_url(before);
        debug!(url = %url, "Getting events from Frigate");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| anyhow!("Error get events from Frigate, error: {}", e))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(anyhow!(
                "Response status != 200 ({}), when getting events from Frigate",
                status
            ));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| anyhow!("Can't read JSON: {}", e))?;

        let events: Vec<Event> = serde_json::from_slice(&body)
            .map_err(|e| anyhow!("Error unmarshal json: {} (line {}, column {})", e, e.line(), e.column()))?;

        debug!(count = events.len(), "Fetched events");
        Ok(events)
    }

    async fn download_clip(&self, event_id: &str, dest: &Path) -> Result<u64> {
        let url = self.clip_url(event_id);
        debug!(url = %url, "Downloading clip");

        let mut response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| anyhow!("Error clip download: {}", e))?;

        if response.status() != StatusCode::OK {
            return Err(anyhow!("Return bad status: {}", response.status()));
        }
        if response.content_length() == Some(0) {
            return Err(anyhow!("Received empty clip from server (content length is 0)"));
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .with_context(|| format!("Error when create file {}", dest.display()))?;

        let mut written = 0u64;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| anyhow!("Error clip write: {}", e))?
        {
            file.write_all(&chunk).await.context("Error clip write")?;
            written += chunk.len() as u64;
        }
        file.sync_all().await.context("Error syncing file to disk")?;

        debug!(path = %dest.display(), bytes = written, "Clip downloaded");
        Ok(written)
    }
}
