//! Configuration types for OpenAI-compatible transcription.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default transcription endpoint
pub const OPENAI_STT_URL: &str = "https://api.openai.com/v1/audio/transcriptions";

// =============================================================================
// OpenAI STT Models
// =============================================================================

/// Supported OpenAI STT models.
///
/// - `whisper-1`: Original Whisper model, good balance of speed and accuracy
/// - `gpt-4o-transcribe`: Enhanced transcription with GPT-4o intelligence
/// - `gpt-4o-mini-transcribe`: Faster, cost-effective transcription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OpenAISTTModel {
    #[default]
    #[serde(rename = "whisper-1")]
    Whisper1,
    #[serde(rename = "gpt-4o-transcribe")]
    Gpt4oTranscribe,
    #[serde(rename = "gpt-4o-mini-transcribe")]
    Gpt4oMiniTranscribe,
}

impl OpenAISTTModel {
    /// Convert to the API parameter value.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Whisper1 => "whisper-1",
            Self::Gpt4oTranscribe => "gpt-4o-transcribe",
            Self::Gpt4oMiniTranscribe => "gpt-4o-mini-transcribe",
        }
    }

    /// Parse from string, with fallback to default.
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "whisper-1" | "whisper1" | "whisper" => Self::Whisper1,
            "gpt-4o-transcribe" | "gpt4o-transcribe" => Self::Gpt4oTranscribe,
            "gpt-4o-mini-transcribe" | "gpt4o-mini-transcribe" => Self::Gpt4oMiniTranscribe,
            _ => Self::default(),
        }
    }
}

impl std::fmt::Display for OpenAISTTModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Endpointing
// =============================================================================

/// Energy-based end-of-utterance detection.
///
/// Durations are measured in received audio, not wall-clock time, so a
/// stalled stream never ends an utterance on its own.
#[derive(Debug, Clone, PartialEq)]
pub struct SilenceDetectionConfig {
    /// RMS level (0.0..=1.0) below which a frame counts as silence
    pub rms_threshold: f32,

    /// Trailing silence that ends an utterance once speech was heard
    pub silence_duration_ms: u32,

    /// Hard cap on the length of one utterance
    pub max_utterance_ms: u32,

    /// Caller audio with no speech at all ends the capture with an empty
    /// transcript after this long
    pub no_input_timeout_ms: u32,

    /// Leading silence kept in front of the first speech frame
    pub pre_roll_ms: u32,
}

impl Default for SilenceDetectionConfig {
    fn default() -> Self {
        Self {
            rms_threshold: 0.01,
            silence_duration_ms: 800,
            max_utterance_ms: 15_000,
            no_input_timeout_ms: 10_000,
            pre_roll_ms: 300,
        }
    }
}

// =============================================================================
// Recognizer configuration
// =============================================================================

#[derive(Debug, Clone)]
pub struct OpenAISTTConfig {
    pub api_url: String,
    pub api_key: String,
    pub model: OpenAISTTModel,
    /// ISO-639-1 language hint; the call's language wins when it has one
    pub language: Option<String>,
    /// Vocabulary hint passed as `prompt`
    pub prompt: Option<String>,
    pub silence_detection: SilenceDetectionConfig,
    pub request_timeout: Duration,
}

impl Default for OpenAISTTConfig {
    fn default() -> Self {
        Self {
            api_url: OPENAI_STT_URL.to_string(),
            api_key: String::new(),
            model: OpenAISTTModel::default(),
            language: None,
            prompt: None,
            silence_detection: SilenceDetectionConfig::default(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl OpenAISTTConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.api_key.is_empty() {
            return Err("API key is required for transcription".to_string());
        }
        let silence = &self.silence_detection;
        if !(0.0..=1.0).contains(&silence.rms_threshold) {
            return Err(format!(
                "rms_threshold must be within 0.0..=1.0, got {}",
                silence.rms_threshold
            ));
        }
        if silence.silence_duration_ms == 0 || silence.max_utterance_ms == 0 {
            return Err("silence_duration_ms and max_utterance_ms must be positive".to_string());
        }
        Ok(())
    }
}

/// Reduce a BCP-47 tag (`en-US`) to the ISO-639-1 code the API expects (`en`)
pub fn language_code(tag: &str) -> Option<String> {
    let primary = tag.split(['-', '_']).next()?.trim().to_lowercase();
    if primary.is_empty() {
        None
    } else {
        Some(primary)
    }
}
