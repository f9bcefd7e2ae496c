//! Bot gateway contract.
//!
//! A [`BotProvider`] creates one [`BotResource`] per call. The resource hides
//! how replies are obtained (the Direct Line adapter polls an activity feed);
//! callers only await a [`BotResponse`] or a [`BotError`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::protocol::MediaParameter;
use crate::core::tts::TTSError;

/// How the bot classified a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Match,
    #[default]
    #[serde(alias = "no-match", alias = "nomatch")]
    NoMatch,
    #[serde(alias = "no-input", alias = "noinput")]
    NoInput,
    Error,
}

/// One bot reply
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BotResponse {
    pub disposition: Disposition,
    pub text: Option<String>,
    pub confidence: Option<f32>,
    /// Synthesized reply, already encoded for the session's media
    pub audio_bytes: Option<Bytes>,
    pub end_session: bool,
    pub output_variables: HashMap<String, String>,
}

impl BotResponse {
    /// Text-only reply classified as a match
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            disposition: Disposition::Match,
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn with_audio(mut self, audio: impl Into<Bytes>) -> Self {
        self.audio_bytes = Some(audio.into());
        self
    }

    pub fn ending_session(mut self) -> Self {
        self.end_session = true;
        self
    }
}

/// Errors that can occur while talking to the bot backend
#[derive(Debug, Error)]
pub enum BotError {
    /// Backend unreachable
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Secret rejected
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Backend answered with an error status or an unexpected body
    #[error("Bot API error: {0}")]
    ApiError(String),

    /// No reply within the configured window
    #[error("No bot reply within {0:?}")]
    Timeout(Duration),

    /// Reply text could not be turned into audio
    #[error("Speech synthesis failed: {0}")]
    Synthesis(#[from] TTSError),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

pub type BotResult<T> = Result<T, BotError>;

/// What a provider needs to start a bot conversation for one call
#[derive(Debug, Clone)]
pub struct BotSessionRequest {
    /// Peer-assigned session id, used to name the caller in the conversation
    pub session_id: String,
    pub input_variables: HashMap<String, String>,
    pub media: MediaParameter,
    pub language: Option<String>,
}

/// A live bot conversation bound to one call
#[async_trait]
pub trait BotResource: Send + Sync {
    /// Backend conversation id
    fn conversation_id(&self) -> &str;

    /// Greeting played when the call starts
    async fn initial_response(&self) -> BotResult<BotResponse>;

    /// Reply to a caller utterance (transcript or collected digits)
    async fn response(&self, utterance: &str) -> BotResult<BotResponse>;
}

/// Factory for bot conversations
#[async_trait]
pub trait BotProvider: Send + Sync {
    async fn create(&self, request: BotSessionRequest) -> BotResult<Arc<dyn BotResource>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disposition_wire_names() {
        assert_eq!(serde_json::to_string(&Disposition::NoMatch).unwrap(), "\"no_match\"");
        assert_eq!(serde_json::to_string(&Disposition::NoInput).unwrap(), "\"no_input\"");
        let parsed: Disposition = serde_json::from_str("\"no-match\"").unwrap();
        assert_eq!(parsed, Disposition::NoMatch);
    }

    #[test]
    fn test_response_builders() {
        let response = BotResponse::text("Goodbye")
            .with_audio(vec![0u8; 4])
            .ending_session();
        assert_eq!(response.disposition, Disposition::Match);
        assert_eq!(response.text.as_deref(), Some("Goodbye"));
        assert_eq!(response.audio_bytes.as_ref().map(|a| a.len()), Some(4));
        assert!(response.end_session);
    }

    #[test]
    fn test_timeout_message() {
        let err = BotError::Timeout(Duration::from_secs(30));
        assert_eq!(err.to_string(), "No bot reply within 30s");
    }
}
