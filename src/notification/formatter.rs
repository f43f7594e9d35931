//! 消息格式化模块 - 将 Frigate 事件渲染为 Markdown 通知
//!
//! - 完整模式：媒体组标题，包含结束时间和三个链接
//! - 精简模式：watchdog 纯文本提醒，不含结束时间和媒体

use crate::frigate::Event;
use crate::tags::{normalize, tag_list};
use chrono::{Local, TimeZone};

/// 通知文案常量
pub mod msg {
    pub const EVENT: &str = "Event";
    pub const NEW_EVENT: &str = "New event";
    pub const CAMERA: &str = "Camera";
    pub const LABEL: &str = "Label";
    pub const START_TIME: &str = "Start time";
    pub const END_TIME: &str = "End time";
    pub const TOP_SCORE: &str = "Top score";
    pub const EVENT_ID: &str = "Event id";
    pub const ZONES: &str = "Zones";
    pub const URLS: &str = "URLs";
    pub const EVENT_URL: &str = "Event URL";
    // 拼写与已部署版本保持一致
    pub const IN_PROGRESS: &str = "In progess";
}

/// 消息格式化器
#[derive(Debug, Clone)]
pub struct MessageFormatter {
    /// 对外访问的 Frigate 地址（用于链接）
    external_url: String,
}

impl MessageFormatter {
    pub fn new(external_url: impl Into<String>) -> Self {
        let external_url = external_url.into().trim_end_matches('/').to_string();
        Self { external_url }
    }

    /// 事件筛选页 URL
    pub fn events_url(&self, event: &Event) -> String {
        format!(
            "{}/events?cameras={}&labels={}&zones={}",
            self.external_url,
            normalize(&event.camera),
            normalize(&event.label),
            tag_list(&event.zones).join(",")
        )
    }

    /// 原始视频片段 URL
    pub fn clip_url(&self, event: &Event) -> String {
        format!("{}/api/events/{}/clip.mp4", self.external_url, event.id)
    }

    /// 完整模式的媒体组标题
    pub fn caption(&self, event: &Event) -> String {
        let end_time = if event.is_open() {
            msg::IN_PROGRESS.to_string()
        } else {
            format_timestamp(event.end_time)
        };

        let mut text = format!("*{}*\n", msg::EVENT);
        text += &field(msg::CAMERA, &format!("#{}", normalize(&event.camera)));
        text += &field(msg::LABEL, &format!("#{}", normalize(&event.label)));
        text += &field(msg::START_TIME, &code(&format_timestamp(event.start_time)));
        text += &field(msg::END_TIME, &code(&end_time));
        text += &field(msg::TOP_SCORE, &code(&format_score(event.score())));
        text += &field(msg::EVENT_ID, &code(&event.id));
        text += &field(msg::ZONES, &hashtags(&tag_list(&event.zones)));
        text += &format!("*{}*\n", msg::URLS);
        text += &format!("┣[Events]({})\n", self.events_url(event));
        text += &format!("┣[General]({})\n", self.external_url);
        text += &format!("┗[Source clip]({})\n", self.clip_url(event));
        text
    }

    /// 精简模式的纯文本提醒
    pub fn compact(&self, event: &Event) -> String {
        let mut text = format!("*{}*\n", msg::NEW_EVENT);
        text += &field(msg::CAMERA, &code(&event.camera));
        text += &field(msg::LABEL, &code(&event.label));
        text += &field(msg::START_TIME, &code(&format_timestamp(event.start_time)));
        text += &field(msg::TOP_SCORE, &code(&format_score(event.score())));
        text += &field(msg::EVENT_ID, &code(&event.id));
        text += &field(msg::ZONES, &code(&tag_list(&event.zones).join(", ")));
        text += &format!("┣*{}*\n┗ {}", msg::EVENT_URL, self.events_url(event));
        text
    }
}

fn field(name: &str, value: &str) -> String {
    format!("┣*{}*\n┗ {}\n", name, value)
}

fn code(value: &str) -> String {
    format!("`{}`", value)
}

/// `#a, #b`，没有区域时只输出 `#`
fn hashtags(tags: &[String]) -> String {
    format!("#{}", tags.join(", #"))
}

/// 分数转为百分比，保留 6 位小数
pub fn format_score(score: f64) -> String {
    format!("{:.6}%", score * 100.0)
}

/// epoch 秒转为本地时间
pub fn format_timestamp(epoch_secs: f64) -> String {
    match Local.timestamp_opt(epoch_secs as i64, 0).single() {
        Some(t) => t.format("%Y-%m-%d %H:%M:%S %:z").to_string(),
        None => format!("{}", epoch_secs as i64),
    }
}
