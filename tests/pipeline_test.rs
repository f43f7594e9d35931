//! 轮询管道集成测试：过滤、认领、媒体组装、投递与状态写回

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use frigate_notify::{
    Ack, ChatSink, DispatchFailure, Dispatcher, Event, EventSource, EventState, FailurePolicy,
    FilterPolicy, MediaComposer, MediaItem, MediaKind, MemoryStateStore, MessageFormatter, Mode,
    ParseMode, PollLoop, StateStore,
};
use frigate_notify::notification::MAX_CLIP_BYTES;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

const MIB: u64 = 1024 * 1024;

/// 测试用事件来源：返回固定批次，片段按指定大小生成稀疏文件
struct MockSource {
    events: Vec<Event>,
    clip_size: u64,
    fail_fetch: bool,
    clip_calls: AtomicUsize,
}

impl MockSource {
    fn new(events: Vec<Event>) -> Self {
        Self {
            events,
            clip_size: MIB,
            fail_fetch: false,
            clip_calls: AtomicUsize::new(0),
        }
    }

    fn with_clip_size(mut self, size: u64) -> Self {
        self.clip_size = size;
        self
    }

    fn failing() -> Self {
        Self {
            fail_fetch: true,
            ..Self::new(Vec::new())
        }
    }

    fn clip_calls(&self) -> usize {
        self.clip_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventSource for MockSource {
    async fn fetch_events(&self, _before_window: Option<u64>) -> Result<Vec<Event>> {
        if self.fail_fetch {
            return Err(anyhow!("Error get events from Frigate, error: connection refused"));
        }
        Ok(self.events.clone())
    }

    async fn download_clip(&self, _event_id: &str, dest: &Path) -> Result<u64> {
        self.clip_calls.fetch_add(1, Ordering::SeqCst);
        let file = std::fs::File::create(dest)?;
        file.set_len(self.clip_size)?;
        Ok(self.clip_size)
    }
}

/// 发送时记录的媒体组
#[derive(Debug, Clone)]
struct SentGroup {
    kinds: Vec<MediaKind>,
    paths: Vec<PathBuf>,
    sizes: Vec<u64>,
    caption: String,
}

/// 记录所有发送内容的渠道
struct RecordingSink {
    ack_media: bool,
    fail_text: bool,
    groups: Mutex<Vec<SentGroup>>,
    texts: Mutex<Vec<(String, Option<ParseMode>)>>,
}

impl RecordingSink {
    fn new() -> Self {
        Self {
            ack_media: true,
            fail_text: false,
            groups: Mutex::new(Vec::new()),
            texts: Mutex::new(Vec::new()),
        }
    }

    /// 媒体组返回空确认
    fn without_ack() -> Self {
        Self {
            ack_media: false,
            ..Self::new()
        }
    }

    /// 文本发送总是失败
    fn failing_text() -> Self {
        Self {
            fail_text: true,
            ..Self::new()
        }
    }

    fn groups(&self) -> Vec<SentGroup> {
        self.groups.lock().unwrap().clone()
    }

    fn texts(&self) -> Vec<(String, Option<ParseMode>)> {
        self.texts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send_text(&self, text: &str, parse_mode: Option<ParseMode>) -> Result<Ack> {
        if self.fail_text {
            return Err(anyhow!("Bad Request: chat not found"));
        }
        self.texts.lock().unwrap().push((text.to_string(), parse_mode));
        Ok(Ack { message_ids: vec![1] })
    }

    async fn send_media_group(&self, media: &[MediaItem], caption: &str) -> Result<Option<Ack>> {
        let group = SentGroup {
            kinds: media.iter().map(|m| m.kind).collect(),
            paths: media.iter().map(|m| m.path.clone()).collect(),
            sizes: media
                .iter()
                .map(|m| std::fs::metadata(&m.path).map(|md| md.len()).unwrap_or(0))
                .collect(),
            caption: caption.to_string(),
        };
        self.groups.lock().unwrap().push(group);
        if self.ack_media {
            Ok(Some(Ack {
                message_ids: (1..=media.len() as i64).collect(),
            }))
        } else {
            Ok(None)
        }
    }
}

fn yard_event(end_time: f64, has_clip: bool) -> Event {
    serde_json::from_value(serde_json::json!({
        "id": "1",
        "camera": "yard",
        "label": "person",
        "start_time": 1718000000.0,
        "end_time": end_time,
        "has_clip": has_clip,
        "has_snapshot": true,
        "top_score": 0.81,
        "zones": ["front_yard"],
        "thumbnail": "aGVsbG8="
    }))
    .unwrap()
}

struct Harness {
    source: Arc<MockSource>,
    sink: Arc<RecordingSink>,
    store: Arc<MemoryStateStore>,
    dispatcher: Arc<Dispatcher>,
    failures: mpsc::UnboundedReceiver<DispatchFailure>,
    media_dir: tempfile::TempDir,
}

impl Harness {
    fn new(source: MockSource, sink: RecordingSink, policy: FailurePolicy) -> Self {
        let media_dir = tempfile::tempdir().unwrap();
        let source = Arc::new(source);
        let sink = Arc::new(sink);
        let store = Arc::new(MemoryStateStore::new());
        let (tx, rx) = mpsc::unbounded_channel();

        let dispatcher = Arc::new(
            Dispatcher::new(
                source.clone(),
                store.clone(),
                sink.clone(),
                MessageFormatter::new("http://nvr.local"),
                MediaComposer::new(media_dir.path()),
            )
            .with_state_ttl(Duration::from_secs(3600))
            .with_failure_policy(policy)
            .with_failure_channel(tx),
        );

        Self {
            source,
            sink,
            store,
            dispatcher,
            failures: rx,
            media_dir,
        }
    }

    fn poll_loop(&self, mode: Mode, filter: FilterPolicy) -> PollLoop {
        PollLoop::new(mode, filter, self.dispatcher.clone())
    }

    /// 执行一轮并等待 spawn 出来的任务
    async fn tick(&self, mode: Mode, filter: FilterPolicy) -> Result<usize> {
        let handles = self.poll_loop(mode, filter).tick().await?;
        let spawned = handles.len();
        for handle in handles {
            handle.await.unwrap();
        }
        Ok(spawned)
    }

    fn media_files(&self) -> usize {
        std::fs::read_dir(self.media_dir.path()).unwrap().count()
    }
}

#[tokio::test]
async fn test_scenario_a_open_event_sends_thumbnail_only() {
    // Given: 进行中的事件，没有任何过滤
    let h = Harness::new(
        MockSource::new(vec![yard_event(0.0, true)]),
        RecordingSink::new(),
        FailurePolicy::Exit,
    );

    // When
    let spawned = h.tick(Mode::Main, FilterPolicy::default()).await.unwrap();

    // Then: 只有缩略图，不下载片段
    assert_eq!(spawned, 1);
    let groups = h.sink.groups();
    assert_eq!(groups.len(), 1);
    let group = &groups[0];
    assert_eq!(group.kinds, vec![MediaKind::Photo]);
    assert_eq!(group.sizes, vec![5]);
    for needle in ["#yard", "#person", "In progess", "81.000000%", "#frontyard"] {
        assert!(group.caption.contains(needle), "caption missing {}: {}", needle, group.caption);
    }
    assert_eq!(h.source.clip_calls(), 0);

    // 状态写为 InProgress，临时文件已删除
    assert_eq!(h.store.get("1"), Some(EventState::InProgress));
    assert!(!group.paths[0].exists());
    assert_eq!(h.media_files(), 0);
}

#[tokio::test]
async fn test_scenario_b_closed_event_with_clip() {
    // Given: 已结束且有 10 MiB 片段
    let h = Harness::new(
        MockSource::new(vec![yard_event(1718000060.0, true)]).with_clip_size(10 * MIB),
        RecordingSink::new(),
        FailurePolicy::Exit,
    );

    h.tick(Mode::Main, FilterPolicy::default()).await.unwrap();

    // Then: 缩略图在前，片段在后
    let groups = h.sink.groups();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].kinds, vec![MediaKind::Photo, MediaKind::Video]);
    assert_eq!(groups[0].sizes[1], 10 * MIB);
    assert!(!groups[0].caption.contains("In progess"));
    assert_eq!(h.source.clip_calls(), 1);
    assert_eq!(h.store.get("1"), Some(EventState::Finished));
    assert_eq!(h.media_files(), 0);
}

#[tokio::test]
async fn test_oversized_clip_is_omitted_and_removed() {
    let h = Harness::new(
        MockSource::new(vec![yard_event(1718000060.0, true)]).with_clip_size(MAX_CLIP_BYTES),
        RecordingSink::new(),
        FailurePolicy::Exit,
    );

    h.tick(Mode::Main, FilterPolicy::default()).await.unwrap();

    let groups = h.sink.groups();
    assert_eq!(groups[0].kinds, vec![MediaKind::Photo]);
    assert_eq!(h.source.clip_calls(), 1);
    assert_eq!(h.media_files(), 0);
}

#[tokio::test]
async fn test_empty_clip_is_omitted() {
    let h = Harness::new(
        MockSource::new(vec![yard_event(1718000060.0, true)]).with_clip_size(0),
        RecordingSink::new(),
        FailurePolicy::Exit,
    );

    h.tick(Mode::Main, FilterPolicy::default()).await.unwrap();

    assert_eq!(h.sink.groups()[0].kinds, vec![MediaKind::Photo]);
    assert_eq!(h.media_files(), 0);
}

#[tokio::test]
async fn test_scenario_c_excluded_camera_is_not_claimed() {
    // Given: 排除 yard 摄像头
    let h = Harness::new(
        MockSource::new(vec![yard_event(0.0, false)]),
        RecordingSink::new(),
        FailurePolicy::Exit,
    );
    let filter = FilterPolicy {
        exclude_cameras: vec!["yard".to_string()],
        ..Default::default()
    };

    let spawned = h.tick(Mode::Main, filter).await.unwrap();

    // Then: 不分发，也不写状态键
    assert_eq!(spawned, 0);
    assert!(h.sink.groups().is_empty());
    assert!(!h.store.exists("1").await.unwrap());
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn test_claimed_event_is_not_dispatched_twice() {
    let h = Harness::new(
        MockSource::new(vec![yard_event(0.0, false)]),
        RecordingSink::new(),
        FailurePolicy::Exit,
    );

    assert_eq!(h.tick(Mode::Main, FilterPolicy::default()).await.unwrap(), 1);
    assert_eq!(h.tick(Mode::Main, FilterPolicy::default()).await.unwrap(), 0);
    assert_eq!(h.sink.groups().len(), 1);
}

#[tokio::test]
async fn test_dispatch_follows_fetch_order() {
    let mut second = yard_event(0.0, false);
    second.id = "2".to_string();
    let mut third = yard_event(0.0, false);
    third.id = "3".to_string();
    third.label = "car".to_string();

    let h = Harness::new(
        MockSource::new(vec![yard_event(0.0, false), second, third]),
        RecordingSink::new(),
        FailurePolicy::Exit,
    );
    let filter = FilterPolicy {
        include_labels: vec!["person".to_string()],
        ..Default::default()
    };

    assert_eq!(h.tick(Mode::Main, filter).await.unwrap(), 2);
    assert!(h.store.exists("1").await.unwrap());
    assert!(h.store.exists("2").await.unwrap());
    assert!(!h.store.exists("3").await.unwrap());
}

#[tokio::test]
async fn test_watchdog_sends_compact_text_once() {
    let h = Harness::new(
        MockSource::new(vec![yard_event(0.0, true)]),
        RecordingSink::new(),
        FailurePolicy::Exit,
    );

    // Watchdog 模式不 spawn 任务
    assert_eq!(h.tick(Mode::Watchdog, FilterPolicy::default()).await.unwrap(), 0);
    let texts = h.sink.texts();
    assert_eq!(texts.len(), 1);
    assert!(texts[0].0.starts_with("*New event*"));
    assert!(!texts[0].0.contains("End time"));
    assert_eq!(texts[0].1, Some(ParseMode::Markdown));
    assert!(h.sink.groups().is_empty());
    assert_eq!(h.source.clip_calls(), 0);

    // 即使事件仍在进行也写为 Finished
    assert_eq!(h.store.get("WatchDog_1"), Some(EventState::Finished));
    // Main 模式的键不受影响
    assert!(!h.store.exists("1").await.unwrap());

    h.tick(Mode::Watchdog, FilterPolicy::default()).await.unwrap();
    assert_eq!(h.sink.texts().len(), 1);
}

#[tokio::test]
async fn test_watchdog_skips_finished_key() {
    let h = Harness::new(
        MockSource::new(vec![yard_event(0.0, false)]),
        RecordingSink::new(),
        FailurePolicy::Exit,
    );
    h.store
        .set("WatchDog_1", EventState::Finished, Duration::from_secs(3600))
        .await
        .unwrap();

    h.tick(Mode::Watchdog, FilterPolicy::default()).await.unwrap();
    assert!(h.sink.texts().is_empty());

    // Main 模式仍然可以处理同一事件
    assert_eq!(h.tick(Mode::Main, FilterPolicy::default()).await.unwrap(), 1);
}

#[tokio::test]
async fn test_fetch_failure_reports_all_and_errors() {
    let h = Harness::new(MockSource::failing(), RecordingSink::new(), FailurePolicy::Exit);

    let result = h.poll_loop(Mode::Main, FilterPolicy::default()).tick().await;

    assert!(result.is_err());
    let texts = h.sink.texts();
    assert_eq!(texts.len(), 1);
    assert!(texts[0].0.contains("Error get events from Frigate"));
    assert!(texts[0].0.ends_with("\nEventID: ALL"));
    assert_eq!(texts[0].1, None);
}

#[tokio::test]
async fn test_nil_ack_reports_and_signals_exit() {
    let mut h = Harness::new(
        MockSource::new(vec![yard_event(0.0, false)]),
        RecordingSink::without_ack(),
        FailurePolicy::Exit,
    );

    h.tick(Mode::Main, FilterPolicy::default()).await.unwrap();

    let failure = h.failures.try_recv().expect("failure should be forwarded");
    assert_eq!(failure.event_id, "1");
    assert!(failure.error.to_string().contains("No received messages"));

    let texts = h.sink.texts();
    assert_eq!(texts.len(), 1);
    assert!(texts[0].0.ends_with("\nEventID: 1"));

    // 认领键保留，完整状态未写入；临时文件已删除
    assert_eq!(h.store.get("1"), Some(EventState::InWork));
    assert_eq!(h.media_files(), 0);
}

#[tokio::test]
async fn test_isolate_policy_keeps_running() {
    let mut second = yard_event(0.0, false);
    second.id = "2".to_string();
    let mut h = Harness::new(
        MockSource::new(vec![yard_event(0.0, false), second]),
        RecordingSink::without_ack(),
        FailurePolicy::Isolate,
    );

    assert_eq!(h.tick(Mode::Main, FilterPolicy::default()).await.unwrap(), 2);

    assert!(h.failures.try_recv().is_err());
    assert_eq!(h.sink.groups().len(), 2);
    assert_eq!(h.sink.texts().len(), 2);
}

#[tokio::test]
async fn test_bad_thumbnail_is_event_scoped_failure() {
    let mut event = yard_event(0.0, false);
    event.thumbnail = "%%%".to_string();
    let mut h = Harness::new(MockSource::new(vec![event]), RecordingSink::new(), FailurePolicy::Exit);

    h.tick(Mode::Main, FilterPolicy::default()).await.unwrap();

    let failure = h.failures.try_recv().unwrap();
    assert!(failure.error.to_string().contains("base64"));
    assert!(h.sink.groups().is_empty());
    assert_eq!(h.media_files(), 0);
}

#[tokio::test]
async fn test_watchdog_send_failure_still_finishes_event() {
    // Given: 文本发送失败，默认 Exit 策略
    let mut h = Harness::new(
        MockSource::new(vec![yard_event(0.0, false)]),
        RecordingSink::failing_text(),
        FailurePolicy::Exit,
    );

    // When
    h.tick(Mode::Watchdog, FilterPolicy::default()).await.unwrap();

    // Then: 不触发退出，键写为 Finished，下一轮不再提醒
    assert!(h.failures.try_recv().is_err());
    assert_eq!(h.store.get("WatchDog_1"), Some(EventState::Finished));
    assert_eq!(h.tick(Mode::Watchdog, FilterPolicy::default()).await.unwrap(), 0);
    assert!(h.failures.try_recv().is_err());
}
