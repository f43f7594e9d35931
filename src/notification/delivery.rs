//! 通知投递 - 发送媒体组/文本，并在发送结束后清理临时文件

use super::channel::{Ack, ChatSink, ParseMode};
use super::media::MediaBundle;
use anyhow::{anyhow, Result};
use tracing::{debug, error, info};

/// 发送媒体组
///
/// 无论成功与否，发送结束后都会删除 bundle 的临时文件。
/// 服务端没有确认（`None` 或空 ID 列表）视为失败。
pub async fn deliver_rich(sink: &dyn ChatSink, bundle: MediaBundle, caption: &str) -> Result<Ack> {
    debug!(items = bundle.len(), channel = sink.name(), "Sending media group");
    let sent = sink.send_media_group(bundle.items(), caption).await;
    bundle.cleanup().await;

    match sent {
        Ok(Some(ack)) if !ack.message_ids.is_empty() => Ok(ack),
        Ok(_) => Err(anyhow!("No received messages")),
        Err(e) => Err(anyhow!("Error send media group message: {}", e)),
    }
}

/// 发送 Markdown 文本，空确认视为失败
pub async fn deliver_text(sink: &dyn ChatSink, text: &str) -> Result<Ack> {
    let ack = sink
        .send_text(text, Some(ParseMode::Markdown))
        .await
        .map_err(|e| anyhow!("Error send text message: {}", e))?;
    if ack.message_ids.is_empty() {
        return Err(anyhow!("No received messages"));
    }
    Ok(ack)
}

/// 错误告警路径
///
/// 尽力把错误发到聊天，附带事件 ID（批次级错误为 `ALL`）。发送失败只记录日志。
pub async fn report_error(sink: &dyn ChatSink, text: &str, event_id: &str) {
    let message = format!("{}\nEventID: {}", text, event_id);
    match sink.send_text(&message, None).await {
        Ok(_) => info!(event_id = %event_id, "Error report sent"),
        Err(e) => error!(event_id = %event_id, error = %e, "Failed to send error report"),
    }
    error!(event_id = %event_id, "{}", text);
}
