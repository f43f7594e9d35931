//! 进程内状态存储 - 单实例部署或测试使用

use super::{EventState, StateStore};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::debug;

/// 时间来源，测试中用 [`ManualClock`] 模拟时间流逝
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// 系统单调时钟
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// 手动推进的时钟
#[derive(Debug, Clone)]
pub struct ManualClock {
    start: Instant,
    offset: Arc<Mutex<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    /// 时间前进 `by`
    pub fn advance(&self, by: Duration) {
        if let Ok(mut offset) = self.offset.lock() {
            *offset += by;
        }
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let offset = self.offset.lock().map(|o| *o).unwrap_or_default();
        self.start + offset
    }
}

/// 内存状态表: key -> (state, expires_at)
pub struct MemoryStateStore {
    entries: Mutex<HashMap<String, (EventState, Instant)>>,
    clock: Arc<dyn Clock>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// 读取未过期的状态
    pub fn get(&self, key: &str) -> Option<EventState> {
        let now = self.clock.now();
        let entries = self.entries.lock().ok()?;
        entries
            .get(key)
            .filter(|(_, expires_at)| *expires_at > now)
            .map(|(state, _)| *state)
    }

    /// 当前未过期的键数量
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.entries
            .lock()
            .map(|e| e.values().filter(|(_, exp)| *exp > now).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, (EventState, Instant)>>> {
        self.entries.lock().map_err(|_| anyhow!("state store lock poisoned"))
    }
}

impl Default for MemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

/// 清理过期记录
fn cleanup_expired(entries: &mut HashMap<String, (EventState, Instant)>, now: Instant) {
    entries.retain(|_, (_, expires_at)| *expires_at > now);
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).is_some())
    }

    async fn set(&self, key: &str, state: EventState, ttl: Duration) -> Result<()> {
        let now = self.clock.now();
        let mut entries = self.lock()?;
        cleanup_expired(&mut entries, now);
        entries.insert(key.to_string(), (state, now + ttl));
        debug!(key = %key, state = %state, ttl_secs = ttl.as_secs(), "State written");
        Ok(())
    }

    async fn claim_if_absent(&self, key: &str, state: EventState, ttl: Duration) -> Result<bool> {
        let now = self.clock.now();
        let mut entries = self.lock()?;
        cleanup_expired(&mut entries, now);
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(key.to_string(), (state, now + ttl));
        Ok(true)
    }
}
