//! 具体渠道实现

pub mod dry_run;
pub mod telegram;

pub use dry_run::DryRunChannel;
pub use telegram::{TelegramChannel, TelegramConfig};
