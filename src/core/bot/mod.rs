//! Bot gateway: provider trait and the Direct Line implementation.

pub mod base;
pub mod directline;

pub use base::{
    BotError, BotProvider, BotResource, BotResponse, BotResult, BotSessionRequest, Disposition,
};
pub use directline::{DirectLineConfig, DirectLineProvider};
