//! 聊天通知渠道 trait 定义

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 文本解析模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseMode {
    Markdown,
}

impl ParseMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParseMode::Markdown => "Markdown",
        }
    }
}

/// 媒体类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaKind {
    Photo,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Photo => "photo",
            MediaKind::Video => "video",
        }
    }
}

/// 一个待上传的媒体附件（本地临时文件）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaItem {
    pub kind: MediaKind,
    pub path: PathBuf,
}

impl MediaItem {
    pub fn photo(path: impl Into<PathBuf>) -> Self {
        Self { kind: MediaKind::Photo, path: path.into() }
    }

    pub fn video(path: impl Into<PathBuf>) -> Self {
        Self { kind: MediaKind::Video, path: path.into() }
    }
}

/// 服务端确认
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ack {
    /// 已发送消息的 ID
    pub message_ids: Vec<i64>,
}

/// 聊天通知渠道
#[async_trait]
pub trait ChatSink: Send + Sync {
    /// 渠道名称（用于日志）
    fn name(&self) -> &str;

    /// 发送文本消息
    async fn send_text(&self, text: &str, parse_mode: Option<ParseMode>) -> Result<Ack>;

    /// 以一组消息发送媒体，标题挂在第一个附件上
    ///
    /// 返回 `Ok(None)` 表示服务端没有确认任何消息。
    async fn send_media_group(&self, media: &[MediaItem], caption: &str) -> Result<Option<Ack>>;
}
