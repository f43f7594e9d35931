//! 单个事件的处理任务 - 组装、投递、写回状态

use crate::frigate::{Event, EventSource};
use crate::notification::{deliver_rich, deliver_text, report_error, ChatSink, MediaComposer, MessageFormatter};
use crate::state::{state_key, EventState, StateStore};
use anyhow::Result;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, info, warn};

/// 认领键的短 TTL
pub const CLAIM_TTL: Duration = Duration::from_secs(60);
/// 状态键的默认完整 TTL（14 天）
pub const DEFAULT_STATE_TTL: Duration = Duration::from_secs(14 * 24 * 60 * 60);

/// 单个事件失败后的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// 告警后结束进程，由外部进程管理器重启
    #[default]
    Exit,
    /// 告警后只结束当前任务
    Isolate,
}

/// 事件级失败
#[derive(Debug)]
pub struct DispatchFailure {
    pub event_id: String,
    pub error: anyhow::Error,
}

impl fmt::Display for DispatchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "event {} failed: {:#}", self.event_id, self.error)
    }
}

impl std::error::Error for DispatchFailure {}

/// 事件分发器，所有处理任务共享
pub struct Dispatcher {
    pub(crate) source: Arc<dyn EventSource>,
    pub(crate) store: Arc<dyn StateStore>,
    pub(crate) sink: Arc<dyn ChatSink>,
    formatter: MessageFormatter,
    media: MediaComposer,
    state_ttl: Duration,
    policy: FailurePolicy,
    failures: Option<UnboundedSender<DispatchFailure>>,
}

impl Dispatcher {
    pub fn new(
        source: Arc<dyn EventSource>,
        store: Arc<dyn StateStore>,
        sink: Arc<dyn ChatSink>,
        formatter: MessageFormatter,
        media: MediaComposer,
    ) -> Self {
        Self {
            source,
            store,
            sink,
            formatter,
            media,
            state_ttl: DEFAULT_STATE_TTL,
            policy: FailurePolicy::default(),
            failures: None,
        }
    }

    /// 设置状态键 TTL
    pub fn with_state_ttl(mut self, ttl: Duration) -> Self {
        self.state_ttl = ttl;
        self
    }

    /// 设置失败策略
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// 设置致命失败的上报通道（`FailurePolicy::Exit` 时使用）
    pub fn with_failure_channel(mut self, tx: UnboundedSender<DispatchFailure>) -> Self {
        self.failures = Some(tx);
        self
    }

    /// 完整模式：媒体组通知
    pub async fn run_rich(&self, event: Event) {
        if let Err(e) = self.send_rich(&event).await {
            self.fail(&event.id, e).await;
        }
    }

    /// 精简模式：watchdog 文本提醒
    pub async fn run_compact(&self, event: Event) {
        if let Err(e) = self.send_compact(&event).await {
            self.fail(&event.id, e).await;
        }
    }

    async fn send_rich(&self, event: &Event) -> Result<()> {
        let caption = self.formatter.caption(event);
        let bundle = self.media.build(event, self.source.as_ref()).await?;
        let items = bundle.len();
        deliver_rich(self.sink.as_ref(), bundle, &caption).await?;

        let state = if event.is_open() {
            EventState::InProgress
        } else {
            EventState::Finished
        };
        self.store
            .set(&state_key(&event.id, false), state, self.state_ttl)
            .await?;
        info!(event_id = %event.id, camera = %event.camera, items, state = %state, "Event notified");
        Ok(())
    }

    /// 文本发送失败只记录日志，状态照常写为 Finished
    async fn send_compact(&self, event: &Event) -> Result<()> {
        let text = self.formatter.compact(event);
        match deliver_text(self.sink.as_ref(), &text).await {
            Ok(_) => info!(event_id = %event.id, camera = %event.camera, "Watchdog alert sent"),
            Err(e) => error!(event_id = %event.id, error = %format!("{:#}", e), "Watchdog alert not delivered"),
        }
        self.store
            .set(&state_key(&event.id, true), EventState::Finished, self.state_ttl)
            .await?;
        Ok(())
    }

    async fn fail(&self, event_id: &str, error: anyhow::Error) {
        report_error(self.sink.as_ref(), &format!("{:#}", error), event_id).await;
        match self.policy {
            FailurePolicy::Isolate => {
                warn!(event_id = %event_id, "Event failed, continuing with other events");
            }
            FailurePolicy::Exit => {
                let failure = DispatchFailure {
                    event_id: event_id.to_string(),
                    error,
                };
                match &self.failures {
                    Some(tx) => {
                        if tx.send(failure).is_err() {
                            error!(event_id = %event_id, "Failure channel closed");
                        }
                    }
                    None => error!(event_id = %event_id, "No failure channel, dropping failure"),
                }
            }
        }
    }
}
