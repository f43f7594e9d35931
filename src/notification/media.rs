//! 媒体组组装 - 缩略图与视频片段的临时文件
//!
//! 缩略图总是第一个附件；片段只在事件结束后下载，且大小必须在 (0, 50 MiB) 内。
//! 所有临时文件都记录在 [`MediaBundle`] 中，发送结束后统一删除。

use super::channel::MediaItem;
use crate::frigate::{Event, EventSource};
use anyhow::{anyhow, Context, Result};
use base64::Engine;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, warn};

/// Telegram 上传文件大小上限
pub const MAX_CLIP_BYTES: u64 = 50 * 1024 * 1024;

/// 片段能否放进媒体组
pub fn clip_fits(size: u64) -> bool {
    size > 0 && size < MAX_CLIP_BYTES
}

/// 一次通知的媒体组
#[derive(Debug, Default)]
pub struct MediaBundle {
    items: Vec<MediaItem>,
    /// 本次创建的所有临时文件，包括被丢弃的片段
    temp_files: Vec<PathBuf>,
}

impl MediaBundle {
    pub fn items(&self) -> &[MediaItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn temp_files(&self) -> &[PathBuf] {
        &self.temp_files
    }

    /// 删除全部临时文件，失败只记录日志
    pub async fn cleanup(self) {
        for path in &self.temp_files {
            match tokio::fs::remove_file(path).await {
                Ok(()) => debug!(path = %path.display(), "Removed temp file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove temp file"),
            }
        }
    }
}

/// 媒体组装器
#[derive(Debug, Clone)]
pub struct MediaComposer {
    media_dir: PathBuf,
}

impl MediaComposer {
    pub fn new(media_dir: impl Into<PathBuf>) -> Self {
        Self { media_dir: media_dir.into() }
    }

    pub fn thumbnail_path(&self, event_id: &str) -> PathBuf {
        self.media_dir.join(format!("{}.jpg", event_id))
    }

    pub fn clip_path(&self, event_id: &str) -> PathBuf {
        self.media_dir.join(format!("{}.mp4", event_id))
    }

    /// 组装媒体组
    ///
    /// 任一步失败时先删除已写入的临时文件再返回错误。
    pub async fn build(&self, event: &Event, source: &dyn EventSource) -> Result<MediaBundle> {
        let mut bundle = MediaBundle::default();
        let filled = self.fill(event, source, &mut bundle).await;
        match filled {
            Ok(()) => Ok(bundle),
            Err(e) => {
                bundle.cleanup().await;
                Err(e)
            }
        }
    }

    async fn fill(&self, event: &Event, source: &dyn EventSource, bundle: &mut MediaBundle) -> Result<()> {
        let thumbnail = self.thumbnail_path(&event.id);
        bundle.temp_files.push(thumbnail.clone());
        save_thumbnail(&event.thumbnail, &thumbnail).await?;
        bundle.items.push(MediaItem::photo(thumbnail));

        if !event.wants_clip() {
            return Ok(());
        }

        let clip = self.clip_path(&event.id);
        bundle.temp_files.push(clip.clone());
        source
            .download_clip(&event.id, &clip)
            .await
            .with_context(|| format!("Error clip download for event {}", event.id))?;

        let size = tokio::fs::metadata(&clip)
            .await
            .map_err(|e| anyhow!("Error receiving information about the clip file: {}", e))?
            .len();

        if clip_fits(size) {
            debug!(path = %clip.display(), size, "Adding clip to media group");
            bundle.items.push(MediaItem::video(clip));
        } else if size == 0 {
            error!(path = %clip.display(), "Clip file is empty");
        } else {
            debug!(size, limit = MAX_CLIP_BYTES, "Clip file size is too large");
        }
        Ok(())
    }
}

/// 解码 base64 缩略图并写入文件
pub async fn save_thumbnail(encoded: &str, path: &Path) -> Result<()> {
    let data = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| anyhow!("Error when base64 string decode: {}", e))?;

    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| anyhow!("Error when create file: {}", e))?;
    file.write_all(&data)
        .await
        .map_err(|e| anyhow!("Error when write file: {}", e))?;
    file.sync_all()
        .await
        .map_err(|e| anyhow!("Error when sync file: {}", e))?;
    Ok(())
}
