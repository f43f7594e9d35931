//! Frigate 事件模型

use serde::{Deserialize, Serialize};

/// Frigate `/api/events` 返回的单条检测记录
///
/// 只建模管道会读取的字段，`box`、`region`、`plus_id` 等几何/标注字段直接忽略。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// 全局唯一的事件 ID
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub camera: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub label: String,
    /// 开始时间（epoch 秒）
    #[serde(default, deserialize_with = "null_as_default")]
    pub start_time: f64,
    /// 结束时间（epoch 秒），进行中的事件为 0 或 null
    #[serde(default, deserialize_with = "null_as_default")]
    pub end_time: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub has_clip: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub has_snapshot: bool,
    /// base64 编码的缩略图
    #[serde(default, deserialize_with = "null_as_default")]
    pub thumbnail: String,
    /// 区域名，允许 null 元素
    #[serde(default, deserialize_with = "null_as_default")]
    pub zones: Vec<Option<String>>,
    /// 检测详情（新版 Frigate 才有）
    #[serde(default)]
    pub data: Option<EventData>,
    /// 旧版顶层分数，类型不固定（数字、null 或缺失）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_score: Option<serde_json::Value>,
}

/// 事件的 `data` 子对象
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EventData {
    #[serde(default)]
    pub top_score: Option<f64>,
    #[serde(default)]
    pub score: Option<f64>,
}

/// `null` 按类型零值处理，与缺失字段一致
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Event {
    /// 事件是否仍在进行
    pub fn is_open(&self) -> bool {
        self.end_time == 0.0
    }

    /// 渲染用的最高分（0.0 - 1.0）
    ///
    /// 优先 `data.top_score`，其次是数值型的顶层 `top_score`，都没有时为 0。
    pub fn score(&self) -> f64 {
        self.data
            .as_ref()
            .and_then(|d| d.top_score)
            .or_else(|| self.top_score.as_ref().and_then(|v| v.as_f64()))
            .unwrap_or(0.0)
    }

    /// 是否需要下载视频片段（仅在事件结束后）
    pub fn wants_clip(&self) -> bool {
        self.has_clip && !self.is_open()
    }
}
