use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::core::protocol::MediaParameter;

/// Errors raised by speech synthesis
#[derive(Debug, Error)]
pub enum TTSError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Audio processing error: {0}")]
    AudioProcessingError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

pub type TTSResult<T> = Result<T, TTSError>;

/// Turns reply text into audio the telephony peer can play
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesize `text` encoded for `media` (rate and sample format)
    async fn synthesize(&self, text: &str, media: &MediaParameter) -> TTSResult<Bytes>;
}
