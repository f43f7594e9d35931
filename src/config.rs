//! 运行配置 - 命令行参数，缺省时读取环境变量

use crate::filter::{FilterPolicy, EXCLUDE_NONE, INCLUDE_ALL};
use crate::frigate::FrigateConfig;
use crate::notification::TelegramConfig;
use anyhow::{bail, Result};
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Args, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

/// Frigate 连接参数
#[derive(Debug, Clone, Args)]
pub struct FrigateArgs {
    /// Frigate 内部地址
    #[arg(long, env = "FRIGATE_URL", default_value = "http://localhost:5000")]
    pub frigate_url: String,

    /// 通知中链接使用的外部地址（默认同 FRIGATE_URL）
    #[arg(long, env = "FRIGATE_EXTERNAL_URL")]
    pub frigate_external_url: Option<String>,

    /// 每次拉取的事件数
    #[arg(long, env = "FRIGATE_EVENT_LIMIT", default_value_t = 20)]
    pub frigate_event_limit: usize,

    /// HTTP 超时（秒），0 表示不限
    #[arg(long, env = "FRIGATE_TIMEOUT", default_value_t = 0)]
    pub frigate_timeout: u64,
}

impl FrigateArgs {
    pub fn external_url(&self) -> &str {
        self.frigate_external_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .unwrap_or(&self.frigate_url)
    }

    pub fn client_config(&self) -> FrigateConfig {
        FrigateConfig {
            base_url: self.frigate_url.clone(),
            event_limit: self.frigate_event_limit,
            timeout_secs: self.frigate_timeout,
        }
    }
}

/// 摄像头/标签过滤参数，逗号分隔
#[derive(Debug, Clone, Args)]
pub struct FilterArgs {
    #[arg(long, env = "FRIGATE_EXCLUDE_CAMERA", value_delimiter = ',', default_value = EXCLUDE_NONE)]
    pub frigate_exclude_camera: Vec<String>,

    #[arg(long, env = "FRIGATE_INCLUDE_CAMERA", value_delimiter = ',', default_value = INCLUDE_ALL)]
    pub frigate_include_camera: Vec<String>,

    #[arg(long, env = "FRIGATE_EXCLUDE_LABEL", value_delimiter = ',', default_value = EXCLUDE_NONE)]
    pub frigate_exclude_label: Vec<String>,

    #[arg(long, env = "FRIGATE_INCLUDE_LABEL", value_delimiter = ',', default_value = INCLUDE_ALL)]
    pub frigate_include_label: Vec<String>,
}

/// 去掉空白项，空列表回退为哨兵值
fn clean(list: &[String], sentinel: &str) -> Vec<String> {
    let items: Vec<String> = list
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if items.is_empty() {
        vec![sentinel.to_string()]
    } else {
        items
    }
}

impl FilterArgs {
    pub fn policy(&self) -> FilterPolicy {
        FilterPolicy {
            include_cameras: clean(&self.frigate_include_camera, INCLUDE_ALL),
            exclude_cameras: clean(&self.frigate_exclude_camera, EXCLUDE_NONE),
            include_labels: clean(&self.frigate_include_label, INCLUDE_ALL),
            exclude_labels: clean(&self.frigate_exclude_label, EXCLUDE_NONE),
        }
    }
}

/// 状态存储后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StateBackend {
    Redis,
    Memory,
}

/// `run` 子命令的完整配置
#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub frigate: FrigateArgs,

    #[command(flatten)]
    pub filter: FilterArgs,

    #[arg(long, env = "TELEGRAM_BOT_TOKEN", default_value = "", hide_env_values = true)]
    pub telegram_bot_token: String,

    #[arg(long, env = "TELEGRAM_CHAT_ID", default_value_t = 0, allow_hyphen_values = true)]
    pub telegram_chat_id: i64,

    #[arg(long, env = "TELEGRAM_API_URL", default_value = "https://api.telegram.org")]
    pub telegram_api_url: String,

    /// Main 循环间隔（秒）
    #[arg(long, env = "SLEEP_TIME", default_value_t = 5)]
    pub sleep_time: u64,

    /// Watchdog 循环间隔（秒）
    #[arg(long, env = "WATCH_DOG_SLEEP_TIME", default_value_t = 3)]
    pub watchdog_sleep_time: u64,

    /// Main 循环只处理该秒数之前的事件
    #[arg(long, env = "EVENT_BEFORE_SECONDS", default_value_t = 300)]
    pub event_before_seconds: u64,

    /// 启用 watchdog 文本提醒
    #[arg(long, env = "SEND_TEXT_EVENT", action = ArgAction::SetTrue, value_parser = BoolishValueParser::new())]
    pub send_text_event: bool,

    #[arg(long, env = "STATE_BACKEND", value_enum, default_value_t = StateBackend::Redis)]
    pub state_backend: StateBackend,

    #[arg(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379/0", hide_env_values = true)]
    pub redis_url: String,

    /// 状态键 TTL（秒）
    #[arg(long, env = "REDIS_TTL", default_value_t = 1_209_600)]
    pub redis_ttl: u64,

    /// 临时媒体目录（默认系统临时目录）
    #[arg(long, env = "MEDIA_DIR")]
    pub media_dir: Option<PathBuf>,

    /// 单个事件失败时不退出进程
    #[arg(long, env = "ISOLATE_EVENT_FAILURES", action = ArgAction::SetTrue, value_parser = BoolishValueParser::new())]
    pub isolate_event_failures: bool,

    /// 只打印通知，不发送
    #[arg(long, env = "DRY_RUN", action = ArgAction::SetTrue, value_parser = BoolishValueParser::new())]
    pub dry_run: bool,
}

impl RunArgs {
    /// 校验配置
    pub fn validate(&self) -> Result<()> {
        if self.frigate.frigate_event_limit == 0 {
            bail!("FRIGATE_EVENT_LIMIT must be greater than 0");
        }
        if self.sleep_time == 0 || self.watchdog_sleep_time == 0 {
            bail!("SLEEP_TIME and WATCH_DOG_SLEEP_TIME must be greater than 0");
        }
        if self.redis_ttl == 0 {
            bail!("REDIS_TTL must be greater than 0");
        }
        if !self.dry_run {
            if self.telegram_bot_token.trim().is_empty() {
                bail!("TELEGRAM_BOT_TOKEN is required");
            }
            if self.telegram_chat_id == 0 {
                bail!("TELEGRAM_CHAT_ID is required");
            }
        }
        Ok(())
    }

    pub fn telegram_config(&self) -> TelegramConfig {
        TelegramConfig {
            api_url: self.telegram_api_url.clone(),
            bot_token: self.telegram_bot_token.clone(),
            chat_id: self.telegram_chat_id,
            timeout_secs: 0,
        }
    }

    pub fn media_dir(&self) -> PathBuf {
        self.media_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    pub fn state_ttl(&self) -> Duration {
        Duration::from_secs(self.redis_ttl)
    }

    pub fn main_interval(&self) -> Duration {
        Duration::from_secs(self.sleep_time)
    }

    pub fn watchdog_interval(&self) -> Duration {
        Duration::from_secs(self.watchdog_sleep_time)
    }
}
