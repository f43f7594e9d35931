//! Frigate Notify - 把 Frigate NVR 检测事件转发到 Telegram

pub mod config;
pub mod filter;
pub mod frigate;
pub mod notification;
pub mod pipeline;
pub mod state;
pub mod tags;

pub use config::{FilterArgs, FrigateArgs, RunArgs, StateBackend};
pub use filter::{is_eligible, FilterPolicy, Rejection};
pub use frigate::{Event, EventData, EventSource, FrigateClient, FrigateConfig};
pub use notification::{
    Ack, ChatSink, DryRunChannel, MediaBundle, MediaComposer, MediaItem, MediaKind, MessageFormatter,
    ParseMode, TelegramChannel, TelegramConfig,
};
pub use pipeline::{DispatchFailure, Dispatcher, FailurePolicy, Mode, PollLoop};
pub use state::{state_key, EventState, MemoryStateStore, RedisStateStore, StateStore};
pub use tags::{normalize, tag_list};
