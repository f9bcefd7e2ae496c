//! Configuration types for OpenAI-compatible speech endpoints.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default speech endpoint
pub const OPENAI_TTS_URL: &str = "https://api.openai.com/v1/audio/speech";

/// Sample rate of `response_format = "pcm"` output
pub const OPENAI_PCM_SAMPLE_RATE: u32 = 24000;

/// Supported OpenAI TTS models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OpenAITTSModel {
    /// Standard quality, lower latency
    #[default]
    #[serde(rename = "tts-1")]
    Tts1,
    #[serde(rename = "tts-1-hd")]
    Tts1Hd,
    #[serde(rename = "gpt-4o-mini-tts")]
    Gpt4oMiniTts,
}

impl OpenAITTSModel {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tts1 => "tts-1",
            Self::Tts1Hd => "tts-1-hd",
            Self::Gpt4oMiniTts => "gpt-4o-mini-tts",
        }
    }

    /// Parse from string, with fallback to default.
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "tts-1" | "tts1" => Self::Tts1,
            "tts-1-hd" | "tts1-hd" | "tts1hd" => Self::Tts1Hd,
            "gpt-4o-mini-tts" | "gpt4o-mini-tts" => Self::Gpt4oMiniTts,
            _ => Self::default(),
        }
    }
}

impl std::fmt::Display for OpenAITTSModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Settings for [`super::OpenAISynthesizer`]
#[derive(Debug, Clone)]
pub struct OpenAISynthesizerConfig {
    pub api_url: String,
    pub api_key: String,
    pub model: OpenAITTSModel,
    /// Voice name passed through unchanged, so compatible servers can use their own
    pub voice: String,
    /// Speaking speed, clamped to 0.25..=4.0
    pub speed: f32,
    pub request_timeout: Duration,
}

impl Default for OpenAISynthesizerConfig {
    fn default() -> Self {
        Self {
            api_url: OPENAI_TTS_URL.to_string(),
            api_key: String::new(),
            model: OpenAITTSModel::default(),
            voice: "alloy".to_string(),
            speed: 1.0,
            request_timeout: Duration::from_secs(30),
        }
    }
}
