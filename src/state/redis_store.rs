//! Redis 状态存储

use super::{EventState, StateStore};
use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use std::time::Duration;
use tracing::{debug, info};

/// 基于 Redis 的状态存储，多个进程可共享
#[derive(Clone)]
pub struct RedisStateStore {
    conn: MultiplexedConnection,
}

impl RedisStateStore {
    /// 连接 Redis，如 `redis://:password@127.0.0.1:6379/0`
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).context("Invalid Redis URL")?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .context("Failed to connect to Redis")?;
        info!("Connected to Redis");
        Ok(Self { conn })
    }
}

/// Redis 的 TTL 以秒计，至少 1 秒
fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl StateStore for RedisStateStore {
    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let exists: bool = redis::cmd("EXISTS")
            .arg(key)
            .query_async(&mut conn)
            .await
            .with_context(|| format!("Redis EXISTS {} failed", key))?;
        Ok(exists)
    }

    async fn set(&self, key: &str, state: EventState, ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(state.as_str())
            .arg("EX")
            .arg(ttl_secs(ttl))
            .query_async(&mut conn)
            .await
            .with_context(|| format!("Redis SET {} failed", key))?;
        debug!(key = %key, state = %state, ttl_secs = ttl_secs(ttl), "State written");
        Ok(())
    }

    async fn claim_if_absent(&self, key: &str, state: EventState, ttl: Duration) -> Result<bool> {
        let mut conn = self.conn.clone();
        // SET NX 成功返回 OK，键已存在返回 nil
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(state.as_str())
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs(ttl))
            .query_async(&mut conn)
            .await
            .with_context(|| format!("Redis SET NX {} failed", key))?;
        Ok(reply.is_some())
    }
}
