//! Inbound message dispatch.
//!
//! Maps an envelope `type` to the session method handling it. Parameters are
//! decoded by the handler; a known type with undecodable parameters is a
//! protocol violation, an unknown type never reaches this table's handlers.

use std::collections::HashMap;

use futures::future::BoxFuture;

use super::error::SessionResult;
use super::machine::Session;
use crate::core::protocol::ClientEnvelope;

/// Handler for one inbound message type
pub type MessageHandler =
    for<'a> fn(&'a mut Session, &'a ClientEnvelope) -> BoxFuture<'a, SessionResult<()>>;

pub const OPEN: &str = "open";
pub const CLOSE: &str = "close";
pub const PING: &str = "ping";
pub const DTMF: &str = "dtmf";
pub const PLAYBACK_STARTED: &str = "playback_started";
pub const PLAYBACK_COMPLETED: &str = "playback_completed";
pub const ERROR: &str = "error";

pub struct HandlerRegistry {
    handlers: HashMap<&'static str, MessageHandler>,
}

impl HandlerRegistry {
    /// Registry with no handlers
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register(&mut self, message_type: &'static str, handler: MessageHandler) {
        self.handlers.insert(message_type, handler);
    }

    pub fn get(&self, message_type: &str) -> Option<MessageHandler> {
        self.handlers.get(message_type).copied()
    }

    pub fn message_types(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.handlers.keys().copied()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(OPEN, on_open);
        registry.register(CLOSE, on_close);
        registry.register(PING, on_ping);
        registry.register(DTMF, on_dtmf);
        registry.register(PLAYBACK_STARTED, on_playback_started);
        registry.register(PLAYBACK_COMPLETED, on_playback_completed);
        registry.register(ERROR, on_error);
        registry
    }
}

fn on_open<'a>(
    session: &'a mut Session,
    envelope: &'a ClientEnvelope,
) -> BoxFuture<'a, SessionResult<()>> {
    Box::pin(session.handle_open(envelope))
}

fn on_close<'a>(
    session: &'a mut Session,
    envelope: &'a ClientEnvelope,
) -> BoxFuture<'a, SessionResult<()>> {
    Box::pin(session.handle_close(envelope))
}

fn on_ping<'a>(
    session: &'a mut Session,
    _envelope: &'a ClientEnvelope,
) -> BoxFuture<'a, SessionResult<()>> {
    Box::pin(session.handle_ping())
}

fn on_dtmf<'a>(
    session: &'a mut Session,
    envelope: &'a ClientEnvelope,
) -> BoxFuture<'a, SessionResult<()>> {
    Box::pin(async move { session.handle_dtmf(envelope) })
}

fn on_playback_started<'a>(
    session: &'a mut Session,
    _envelope: &'a ClientEnvelope,
) -> BoxFuture<'a, SessionResult<()>> {
    Box::pin(async move {
        session.handle_playback_started();
        Ok(())
    })
}

fn on_playback_completed<'a>(
    session: &'a mut Session,
    _envelope: &'a ClientEnvelope,
) -> BoxFuture<'a, SessionResult<()>> {
    Box::pin(async move {
        session.handle_playback_completed();
        Ok(())
    })
}

fn on_error<'a>(
    session: &'a mut Session,
    envelope: &'a ClientEnvelope,
) -> BoxFuture<'a, SessionResult<()>> {
    Box::pin(async move { session.handle_peer_error(envelope) })
}
