//! Dry-run 渠道 - 只记录日志，不实际发送

use crate::notification::channel::{Ack, ChatSink, MediaItem, ParseMode};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::info;

/// 把通知写到日志的渠道，确认 ID 递增
#[derive(Debug, Default)]
pub struct DryRunChannel {
    next_id: AtomicI64,
}

impl DryRunChannel {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[async_trait]
impl ChatSink for DryRunChannel {
    fn name(&self) -> &str {
        "dry-run"
    }

    async fn send_text(&self, text: &str, parse_mode: Option<ParseMode>) -> Result<Ack> {
        info!(parse_mode = ?parse_mode, "[DRY-RUN] Would send text:\n{}", text);
        Ok(Ack { message_ids: vec![self.next()] })
    }

    async fn send_media_group(&self, media: &[MediaItem], caption: &str) -> Result<Option<Ack>> {
        for item in media {
            info!(kind = item.kind.as_str(), path = %item.path.display(), "[DRY-RUN] Would attach media");
        }
        info!("[DRY-RUN] Would send caption:\n{}", caption);
        Ok(Some(Ack {
            message_ids: media.iter().map(|_| self.next()).collect(),
        }))
    }
}
