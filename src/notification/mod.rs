//! 通知层 - 渲染、组装媒体并投递到聊天渠道
//!
//! # 组成
//! 1. `formatter`：事件 -> Markdown 标题/文本
//! 2. `media`：缩略图和视频片段的临时文件
//! 3. `delivery`：发送并清理，错误告警路径
//! 4. `channels`：`ChatSink` 的具体实现（Telegram、dry-run）

pub mod channel;
pub mod channels;
pub mod delivery;
pub mod formatter;
pub mod media;

pub use channel::{Ack, ChatSink, MediaItem, MediaKind, ParseMode};
pub use channels::{DryRunChannel, TelegramChannel, TelegramConfig};
pub use delivery::{deliver_rich, deliver_text, report_error};
pub use formatter::MessageFormatter;
pub use media::{clip_fits, MediaBundle, MediaComposer, MAX_CLIP_BYTES};
