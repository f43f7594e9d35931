//! Frigate NVR 事件来源

pub mod client;
pub mod event;

pub use client::{EventSource, FrigateClient, FrigateConfig};
pub use event::{Event, EventData};
