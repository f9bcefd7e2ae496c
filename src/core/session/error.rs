use thiserror::Error;

use crate::core::bot::BotError;
use crate::core::capture::CaptureError;
use crate::core::protocol::ProtocolError;

/// Anything that ends a session with `disconnect(error)`
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Bot(#[from] BotError),
}

pub type SessionResult<T> = Result<T, SessionError>;
