//! 轮询循环 - 拉取、过滤、认领、分发
//!
//! 两个实例（Main、Watchdog）各自定时运行，只共享状态存储。
//!
//! Main 模式为每个新事件 spawn 一个独立任务，不等待任务结束，也不限制并发数；
//! 下一轮轮询的节奏与在途任务无关。如需限制并发，可在 `dispatch_batch` 里加信号量。
//! Watchdog 模式在循环内按顺序逐个处理。

pub mod dispatcher;

use crate::filter::{is_eligible, FilterPolicy};
use crate::frigate::Event;
use crate::notification::report_error;
use crate::state::{state_key, EventState};
use anyhow::Result;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info};

pub use dispatcher::{DispatchFailure, Dispatcher, FailurePolicy, CLAIM_TTL, DEFAULT_STATE_TTL};

/// 批次级错误使用的事件 ID
pub const ALL_EVENTS: &str = "ALL";

/// 轮询模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Main,
    Watchdog,
}

impl Mode {
    pub fn is_watchdog(&self) -> bool {
        matches!(self, Mode::Watchdog)
    }

    /// 本模式下的状态键
    pub fn state_key(&self, event_id: &str) -> String {
        state_key(event_id, self.is_watchdog())
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Main => f.write_str("main"),
            Mode::Watchdog => f.write_str("watchdog"),
        }
    }
}

/// 轮询循环
pub struct PollLoop {
    mode: Mode,
    interval: Duration,
    before_window: Option<u64>,
    filter: FilterPolicy,
    dispatcher: Arc<Dispatcher>,
}

impl PollLoop {
    pub fn new(mode: Mode, filter: FilterPolicy, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            mode,
            interval: Duration::from_secs(5),
            before_window: None,
            filter,
            dispatcher,
        }
    }

    /// 设置轮询间隔
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// 只拉取 `secs` 秒之前的事件
    pub fn with_before_window(mut self, secs: Option<u64>) -> Self {
        self.before_window = secs;
        self
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// 持续运行，直到拉取或状态存储出错
    pub async fn run(&self) -> Result<()> {
        info!(
            mode = %self.mode,
            interval_secs = self.interval.as_secs(),
            before_window = ?self.before_window,
            "Poll loop started"
        );
        loop {
            // 在途任务的句柄直接丢弃，不等待
            let _in_flight = self.tick().await?;
            sleep(self.interval).await;
        }
    }

    /// 执行一轮：拉取并分发
    ///
    /// 返回本轮 spawn 的任务句柄（Watchdog 模式为空）。
    pub async fn tick(&self) -> Result<Vec<JoinHandle<()>>> {
        let events = match self.dispatcher.source.fetch_events(self.before_window).await {
            Ok(events) => events,
            Err(e) => {
                report_error(self.dispatcher.sink.as_ref(), &format!("{:#}", e), ALL_EVENTS).await;
                return Err(e);
            }
        };
        self.dispatch_batch(events).await
    }

    /// 过滤、认领并分发一批事件，顺序与拉取顺序一致
    pub async fn dispatch_batch(&self, events: Vec<Event>) -> Result<Vec<JoinHandle<()>>> {
        let mut handles = Vec::new();

        for event in events {
            if !is_eligible(&event, &self.filter) {
                continue;
            }

            let key = self.mode.state_key(&event.id);
            let claimed = match self
                .dispatcher
                .store
                .claim_if_absent(&key, EventState::InWork, CLAIM_TTL)
                .await
            {
                Ok(claimed) => claimed,
                Err(e) => {
                    report_error(self.dispatcher.sink.as_ref(), &format!("{:#}", e), ALL_EVENTS).await;
                    return Err(e);
                }
            };
            if !claimed {
                debug!(mode = %self.mode, event_id = %event.id, "Event already claimed, skip");
                continue;
            }

            info!(mode = %self.mode, event_id = %event.id, camera = %event.camera, label = %event.label, "Dispatching event");
            match self.mode {
                Mode::Main => {
                    let dispatcher = self.dispatcher.clone();
                    handles.push(tokio::spawn(async move {
                        dispatcher.run_rich(event).await;
                    }));
                }
                Mode::Watchdog => self.dispatcher.run_compact(event).await,
            }
        }

        Ok(handles)
    }
}
