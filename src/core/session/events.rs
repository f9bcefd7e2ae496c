//! Events delivered to a session from work running off its task.

use std::sync::Arc;

use crate::core::bot::{BotResource, BotResponse, BotResult};
use crate::core::capture::CaptureEvent;

/// Completion of asynchronous work started by a session.
///
/// Capture engines, bot creation and bot replies all run outside the
/// connection task; their results come back through the session's event
/// channel so every state change still happens on one task.
pub enum SessionEvent {
    /// A capture engine reported its final text or an error
    Capture(CaptureEvent),
    /// The bot provider finished creating the conversation
    BotCreated(BotResult<Arc<dyn BotResource>>),
    /// The bot answered a turn (or the greeting)
    BotReply(BotResult<BotResponse>),
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::Capture(_) => "capture",
            SessionEvent::BotCreated(_) => "bot_created",
            SessionEvent::BotReply(_) => "bot_reply",
        }
    }
}
