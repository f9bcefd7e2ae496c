//! Direct Line v3 wire types.
//!
//! Only the fields the adapter reads or writes are modelled; everything else
//! in an activity is ignored on deserialization.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::bot::base::Disposition;

/// Activity type of a chat message
pub const ACTIVITY_MESSAGE: &str = "message";
/// Activity type of a named event
pub const ACTIVITY_EVENT: &str = "event";
/// Activity type the bot sends to hang up
pub const ACTIVITY_END_OF_CONVERSATION: &str = "endOfConversation";
/// Event name posted when a call starts
pub const SESSION_START_EVENT: &str = "sessionStart";

/// Response to `POST /v3/directline/conversations`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub conversation_id: String,
    /// Conversation-scoped token; preferred over the secret for later calls
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelAccount {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(rename = "type")]
    pub activity_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub from: ChannelAccount,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Event name for `event` activities
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_data: Option<Value>,
}

impl Activity {
    pub fn message(from: ChannelAccount, text: &str, locale: Option<String>) -> Self {
        Self {
            activity_type: ACTIVITY_MESSAGE.to_string(),
            id: None,
            from,
            text: Some(text.to_string()),
            name: None,
            value: None,
            locale,
            channel_data: None,
        }
    }

    pub fn event(from: ChannelAccount, name: &str, value: Value, locale: Option<String>) -> Self {
        Self {
            activity_type: ACTIVITY_EVENT.to_string(),
            id: None,
            from,
            text: None,
            name: Some(name.to_string()),
            value: Some(value),
            locale,
            channel_data: None,
        }
    }

    /// Parsed voice hints from `channelData`; absent or malformed data yields defaults
    pub fn reply_data(&self) -> ReplyChannelData {
        self.channel_data
            .as_ref()
            .and_then(|data| serde_json::from_value(data.clone()).ok())
            .unwrap_or_default()
    }
}

/// Response to `GET .../activities`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActivitySet {
    #[serde(default)]
    pub activities: Vec<Activity>,
    #[serde(default)]
    pub watermark: Option<String>,
}

/// Voice-specific fields a bot may attach to its reply
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyChannelData {
    #[serde(default)]
    pub disposition: Option<Disposition>,
    #[serde(default)]
    pub confidence: Option<f32>,
    #[serde(default)]
    pub end_session: bool,
    #[serde(default)]
    pub output_variables: HashMap<String, Value>,
}

/// Output variables are strings on the wire; other JSON values are rendered
pub fn stringify_variable(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
