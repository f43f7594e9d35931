//! 事件处理状态存储 - 带 TTL 的去重键值表
//!
//! 键是事件 ID（watchdog 模式加 `WatchDog_` 前缀），值是 [`EventState`]。
//! 键过期后同一事件可能再次被处理，这是有意的重复通知策略。

pub mod memory;
pub mod redis_store;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub use self::memory::{Clock, ManualClock, MemoryStateStore, SystemClock};
pub use self::redis_store::RedisStateStore;

/// watchdog 模式的键前缀
pub const WATCHDOG_PREFIX: &str = "WatchDog_";

/// 事件处理状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventState {
    /// 已认领，正在发送
    InWork,
    /// 已通知，但事件仍在进行
    InProgress,
    /// 已通知且事件已结束
    Finished,
}

impl EventState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventState::InWork => "InWork",
            EventState::InProgress => "InProgress",
            EventState::Finished => "Finished",
        }
    }
}

impl fmt::Display for EventState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventState {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "InWork" => Ok(EventState::InWork),
            "InProgress" => Ok(EventState::InProgress),
            "Finished" => Ok(EventState::Finished),
            other => Err(anyhow!("unknown event state: {}", other)),
        }
    }
}

/// 生成状态键
pub fn state_key(event_id: &str, watchdog: bool) -> String {
    if watchdog {
        format!("{}{}", WATCHDOG_PREFIX, event_id)
    } else {
        event_id.to_string()
    }
}

/// 去重状态存储
///
/// 各键独立读写，没有跨键事务。
#[async_trait]
pub trait StateStore: Send + Sync {
    /// 键是否存在（已被认领/处理过）
    async fn exists(&self, key: &str) -> Result<bool>;

    /// 写入状态并设置 TTL，覆盖已有值
    async fn set(&self, key: &str, state: EventState, ttl: Duration) -> Result<()>;

    /// 键不存在时原子地写入，返回是否认领成功
    async fn claim_if_absent(&self, key: &str, state: EventState, ttl: Duration) -> Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_key() {
        assert_eq!(state_key("1", false), "1");
        assert_eq!(state_key("1", true), "WatchDog_1");
    }

    #[test]
    fn test_event_state_round_trip_strings() {
        for state in [EventState::InWork, EventState::InProgress, EventState::Finished] {
            assert_eq!(state.as_str().parse::<EventState>().unwrap(), state);
        }
        assert!("Done".parse::<EventState>().is_err());
    }
}
