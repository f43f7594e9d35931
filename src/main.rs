//! Frigate Notify CLI
//!
//! 轮询 Frigate 事件并推送到 Telegram

use anyhow::{anyhow, Result};
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser, Subcommand};
use frigate_notify::{
    is_eligible, ChatSink, Dispatcher, DryRunChannel, EventSource, FailurePolicy, FilterArgs,
    FrigateArgs, FrigateClient, MediaComposer, MemoryStateStore, MessageFormatter, Mode, PollLoop,
    RedisStateStore, RunArgs, StateBackend, StateStore, TelegramChannel,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "frigate-notify")]
#[command(about = "Frigate Notify - 把 Frigate 检测事件推送到 Telegram")]
#[command(version)]
struct Cli {
    /// 默认日志级别提升为 debug
    #[arg(
        long,
        global = true,
        env = "DEBUG",
        action = ArgAction::SetTrue,
        value_parser = BoolishValueParser::new()
    )]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 启动轮询服务（Main 循环，可选 Watchdog 循环）
    Run(RunArgs),
    /// 拉取一批事件并显示过滤结果（不发送、不写状态）
    Events {
        #[command(flatten)]
        frigate: FrigateArgs,
        #[command(flatten)]
        filter: FilterArgs,
        /// 只拉取该秒数之前的事件
        #[arg(long)]
        before_window: Option<u64>,
        /// 输出 JSON 格式
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 通过 RUST_LOG 环境变量控制日志级别，默认为 info
    let default_filter = if cli.debug {
        "frigate_notify=debug"
    } else {
        "frigate_notify=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    match cli.command {
        Commands::Run(args) => run(args).await,
        Commands::Events {
            frigate,
            filter,
            before_window,
            json,
        } => list_events(frigate, filter, before_window, json).await,
    }
}

async fn run(args: RunArgs) -> Result<()> {
    args.validate()?;

    let source: Arc<dyn EventSource> = Arc::new(FrigateClient::new(args.frigate.client_config())?);

    let sink: Arc<dyn ChatSink> = if args.dry_run {
        warn!("Dry-run mode, notifications will only be logged");
        Arc::new(DryRunChannel::new())
    } else {
        Arc::new(TelegramChannel::new(args.telegram_config())?)
    };

    let store: Arc<dyn StateStore> = match args.state_backend {
        StateBackend::Redis => Arc::new(RedisStateStore::connect(&args.redis_url).await?),
        StateBackend::Memory => {
            warn!("Using in-memory state store, dedup state is lost on restart");
            Arc::new(MemoryStateStore::new())
        }
    };

    let media_dir = args.media_dir();
    tokio::fs::create_dir_all(&media_dir).await?;

    let policy = if args.isolate_event_failures {
        FailurePolicy::Isolate
    } else {
        FailurePolicy::Exit
    };
    let (failure_tx, mut failure_rx) = mpsc::unbounded_channel();

    let dispatcher = Arc::new(
        Dispatcher::new(
            source,
            store,
            sink,
            MessageFormatter::new(args.frigate.external_url()),
            MediaComposer::new(&media_dir),
        )
        .with_state_ttl(args.state_ttl())
        .with_failure_policy(policy)
        .with_failure_channel(failure_tx),
    );

    let filter = args.filter.policy();
    info!(
        frigate = %args.frigate.frigate_url,
        media_dir = %media_dir.display(),
        watchdog = args.send_text_event,
        policy = ?policy,
        "Starting frigate-notify"
    );

    let main_loop = PollLoop::new(Mode::Main, filter.clone(), dispatcher.clone())
        .with_interval(args.main_interval())
        .with_before_window(Some(args.event_before_seconds));
    let main_task = tokio::spawn(async move { main_loop.run().await });

    let watchdog_task = args.send_text_event.then(|| {
        let watchdog = PollLoop::new(Mode::Watchdog, filter, dispatcher.clone())
            .with_interval(args.watchdog_interval());
        tokio::spawn(async move { watchdog.run().await })
    });
    let watchdog_done = async move {
        match watchdog_task {
            Some(handle) => handle.await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        result = main_task => result.map_err(|e| anyhow!("main loop panicked: {}", e))?,
        result = watchdog_done => result.map_err(|e| anyhow!("watchdog loop panicked: {}", e))?,
        Some(failure) = failure_rx.recv() => Err(failure.into()),
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
            Ok(())
        }
    }
}

async fn list_events(
    frigate: FrigateArgs,
    filter: FilterArgs,
    before_window: Option<u64>,
    json: bool,
) -> Result<()> {
    let client = FrigateClient::new(frigate.client_config())?;
    let events = client.fetch_events(before_window).await?;
    let policy = filter.policy();

    if json {
        let rows: Vec<serde_json::Value> = events
            .iter()
            .map(|e| {
                serde_json::json!({
                    "event": e,
                    "eligible": is_eligible(e, &policy),
                    "reason": policy.check(e).err().map(|r| format!("{:?}", r)),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!("发现 {} 个事件:\n", events.len());
    for e in &events {
        let status = match policy.check(e) {
            Ok(()) => "通知".to_string(),
            Err(reason) => format!("跳过 ({:?})", reason),
        };
        let end = if e.is_open() { "进行中" } else { "已结束" };
        println!(
            "  ID: {} | 摄像头: {} | 标签: {} | {} | {}",
            e.id, e.camera, e.label, end, status
        );
    }
    Ok(())
}
