//! Microsoft Bot Framework Direct Line (v3) adapter.
//!
//! - `POST /v3/directline/conversations` starts a conversation per call
//! - `POST .../activities` sends the caller's turn
//! - `GET .../activities?watermark=` is polled for the bot's reply

mod client;
mod config;
mod messages;

pub use client::{DirectLineConversation, DirectLineProvider};
pub use config::{DIRECT_LINE_URL, DirectLineConfig};
pub use messages::{Activity, ActivitySet, ChannelAccount, Conversation, ReplyChannelData};
