use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ProtocolError, ProtocolResult};
use crate::core::audio::AudioEncoding;
use crate::core::bot::Disposition;

/// Protocol version stamped on every outbound envelope
pub const PROTOCOL_VERSION: &str = "2";

/// Conversation id the peer uses when it only wants to test connectivity
pub const PROBE_CONVERSATION_ID: &str = "00000000-0000-0000-0000-000000000000";

/// Sample rate of telephony media
const TELEPHONY_RATE: u32 = 8000;

// =============================================================================
// Inbound
// =============================================================================

/// Envelope received from the peer
///
/// `parameters` is kept as raw JSON until the handler for `message_type`
/// decodes it, so that unknown types can be logged and dropped without
/// failing the whole frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientEnvelope {
    pub version: String,
    pub id: String,
    #[serde(rename = "type")]
    pub message_type: String,
    pub seq: u64,
    pub serverseq: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(default)]
    pub parameters: serde_json::Value,
}

impl ClientEnvelope {
    /// Parse a text frame into an envelope
    pub fn parse(text: &str) -> ProtocolResult<Self> {
        serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }

    /// Decode `parameters` into the payload type of this message.
    ///
    /// A missing `parameters` field decodes like an empty object.
    pub fn parameters<T: DeserializeOwned>(&self) -> ProtocolResult<T> {
        let value = if self.parameters.is_null() {
            serde_json::Value::Object(serde_json::Map::new())
        } else {
            self.parameters.clone()
        };
        serde_json::from_value(value).map_err(|e| ProtocolError::InvalidParameters {
            message_type: self.message_type.clone(),
            reason: e.to_string(),
        })
    }
}

/// Negotiable media description (offered in `open`, echoed in `opened`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaParameter {
    #[serde(rename = "type")]
    pub media_type: String,
    pub format: AudioEncoding,
    #[serde(default)]
    pub channels: Vec<String>,
    pub rate: u32,
}

impl MediaParameter {
    /// Pick the media this gateway will use from the peer's offer.
    ///
    /// Only mono narrowband audio is accepted; μ-law is preferred over L16.
    pub fn select(offered: &[MediaParameter]) -> Option<MediaParameter> {
        let usable = |m: &&MediaParameter| {
            m.media_type == "audio" && m.rate == TELEPHONY_RATE && m.channels.len() <= 1
        };
        offered
            .iter()
            .filter(usable)
            .find(|m| m.format == AudioEncoding::Pcmu)
            .or_else(|| offered.iter().find(usable))
            .cloned()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenParameters {
    #[serde(default)]
    pub organization_id: Option<String>,
    pub conversation_id: String,
    #[serde(default)]
    pub participant: Option<serde_json::Value>,
    #[serde(default)]
    pub media: Vec<MediaParameter>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub input_variables: HashMap<String, String>,
}

impl OpenParameters {
    /// A nil conversation id marks a connectivity probe rather than a call
    pub fn is_connection_probe(&self) -> bool {
        Uuid::parse_str(&self.conversation_id).is_ok_and(|id| id.is_nil())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DtmfParameters {
    pub digit: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CloseParameters {
    #[serde(default)]
    pub reason: Option<String>,
}

/// Error the peer reports about its own side of the stream
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorParameters {
    #[serde(default)]
    pub code: Option<u16>,
    #[serde(default)]
    pub message: Option<String>,
}

// =============================================================================
// Outbound
// =============================================================================

/// Envelope sent to the peer
///
/// Only [`crate::core::session::Session`] builds these, so `seq`/`clientseq`
/// always come from the session's single stamping path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerEnvelope {
    pub version: &'static str,
    pub id: String,
    pub seq: u64,
    pub clientseq: u64,
    #[serde(flatten)]
    pub message: ServerMessage,
}

/// Outbound message kinds, serialized as `type` + `parameters`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "parameters", rename_all = "lowercase")]
pub enum ServerMessage {
    Opened(OpenedParameters),
    Closed(ClosedParameters),
    Pong(EmptyParameters),
    Event(EventParameters),
    Disconnect(DisconnectParameters),
}

impl ServerMessage {
    pub fn message_type(&self) -> &'static str {
        match self {
            ServerMessage::Opened(_) => "opened",
            ServerMessage::Closed(_) => "closed",
            ServerMessage::Pong(_) => "pong",
            ServerMessage::Event(_) => "event",
            ServerMessage::Disconnect(_) => "disconnect",
        }
    }
}

/// Serializes as `{}`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EmptyParameters {}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenedParameters {
    pub start_paused: bool,
    pub media: Vec<MediaParameter>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosedParameters {
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub output_variables: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventParameters {
    pub entities: Vec<EventEntity>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum EventEntity {
    BotTurnResponse(BotTurnResponseData),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BotTurnResponseData {
    pub disposition: Disposition,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

/// Reason attached to a `disconnect`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DisconnectReason {
    Completed,
    Error,
    #[serde(untagged)]
    Other(String),
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisconnectReason::Completed => write!(f, "completed"),
            DisconnectReason::Error => write!(f, "error"),
            DisconnectReason::Other(reason) => write!(f, "{reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisconnectParameters {
    pub reason: DisconnectReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub output_variables: HashMap<String, String>,
}
