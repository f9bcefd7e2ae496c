//! Outbound traffic from a session to its connection's sender task.

use bytes::Bytes;

use crate::core::protocol::ServerEnvelope;

/// WebSocket close codes used by the connector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseCode {
    /// 1000
    Normal,
    /// 1008, policy violation
    Unauthorized,
    /// 1011
    InternalError,
}

impl CloseCode {
    pub fn code(&self) -> u16 {
        match self {
            CloseCode::Normal => 1000,
            CloseCode::Unauthorized => 1008,
            CloseCode::InternalError => 1011,
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            CloseCode::Normal => "Session closed",
            CloseCode::Unauthorized => "Unauthorized",
            CloseCode::InternalError => "Internal error",
        }
    }
}

/// Items on the ordered outbound channel
#[derive(Debug)]
pub enum MessageRoute {
    /// Stamped control message, serialized to a text frame
    Outgoing(ServerEnvelope),
    /// Raw audio frame
    Binary(Bytes),
    /// Close the transport; nothing is sent after this
    Close(CloseCode),
}

/// Split audio into frames of at most `max_frame_size` bytes.
///
/// Frames are zero-copy slices of `audio`; their concatenation is `audio`.
pub fn audio_frames(audio: Bytes, max_frame_size: usize) -> impl Iterator<Item = Bytes> {
    let max = max_frame_size.max(1);
    let len = audio.len();
    (0..len)
        .step_by(max)
        .map(move |start| audio.slice(start..(start + max).min(len)))
}
