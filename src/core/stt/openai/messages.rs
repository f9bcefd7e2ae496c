//! Response types for the OpenAI Audio Transcription API.
//!
//! API Reference: https://platform.openai.com/docs/api-reference/audio/createTranscription

use serde::{Deserialize, Serialize};

/// Transcription response (`json` format).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TranscriptionResponse {
    pub text: String,
}

/// OpenAI API error response.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OpenAIErrorResponse {
    pub error: OpenAIError,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OpenAIError {
    pub message: String,

    #[serde(rename = "type", default)]
    pub error_type: String,

    #[serde(default)]
    pub code: Option<String>,
}

impl std::fmt::Display for OpenAIError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.error_type)
    }
}
