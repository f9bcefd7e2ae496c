//! Wire protocol spoken with the telephony peer.
//!
//! Every control message travels inside a versioned, sequence-numbered JSON
//! envelope. Inbound envelopes carry the peer's `seq` plus the last server
//! sequence number it has seen (`serverseq`); outbound envelopes carry our
//! `seq` plus the last client sequence number we accepted (`clientseq`).
//! Binary frames carry raw audio with no envelope at all.

mod envelope;
mod sequencing;

use thiserror::Error;

pub use envelope::{
    BotTurnResponseData, ClientEnvelope, CloseParameters, ClosedParameters, DisconnectParameters,
    DisconnectReason, DtmfParameters, EmptyParameters, ErrorParameters, EventEntity,
    EventParameters, MediaParameter, OpenParameters, OpenedParameters, PROBE_CONVERSATION_ID,
    PROTOCOL_VERSION, ServerEnvelope, ServerMessage,
};
pub use sequencing::SequenceTracker;

/// Errors raised while validating inbound envelopes
///
/// Each of these means the peer and the session no longer agree on the state
/// of the conversation, so the session answers with `disconnect(error)`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// The text frame is not a well-formed envelope
    #[error("Invalid message format: {0}")]
    Malformed(String),

    /// Inbound `seq` skipped or repeated
    #[error("Unexpected sequence number: expected {expected}, received {received}")]
    UnexpectedSequence { expected: u64, received: u64 },

    /// Peer acknowledged a server sequence number that was never issued
    #[error(
        "Server sequence number {acknowledged} acknowledged but only {issued} were sent"
    )]
    ServerSequenceAhead { acknowledged: u64, issued: u64 },

    /// Envelope `id` does not belong to this session
    #[error("Session id mismatch: expected {expected}, received {received}")]
    SessionMismatch { expected: String, received: String },

    /// Known message type with undecodable parameters
    #[error("Invalid parameters for '{message_type}': {reason}")]
    InvalidParameters {
        message_type: String,
        reason: String,
    },

    /// Message not valid at this point of the session (e.g. a second `open`)
    #[error("Unexpected '{0}' message")]
    UnexpectedMessage(String),

    /// `open` offered no media this gateway can handle
    #[error("No supported media offered")]
    UnsupportedMedia,
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;
