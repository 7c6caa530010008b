//! # warden-notify
//!
//! Outbound message channels for incident notifications.
//!
//! Every incident is represented by one message that is sent once and then
//! edited in place. The handle a channel returns from
//! [`NotificationChannel::send`] is the incident's correlation id.
//!
//! Channels:
//!
//! - [`TelegramChannel`]: Telegram Bot API, broadcast to several chats
//! - [`LogChannel`]: writes messages to the tracing log (dry run)
//! - [`MemoryChannel`]: records calls and injects failures (tests)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod channel;
pub mod error;
pub mod memory;
pub mod telegram;

pub use channel::{LogChannel, NotificationChannel};
pub use error::{ChannelError, EditFailure, Result};
pub use memory::{ChannelCall, MemoryChannel};
pub use telegram::{MessageRef, TelegramChannel, TelegramConfig};
