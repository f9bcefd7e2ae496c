//! OpenAI-compatible text-to-speech.
//!
//! Works against `api.openai.com` or any server exposing the same
//! `/audio/speech` contract with raw PCM output.

mod config;
mod provider;

pub use config::{OPENAI_PCM_SAMPLE_RATE, OPENAI_TTS_URL, OpenAISynthesizerConfig, OpenAITTSModel};
pub use provider::OpenAISynthesizer;
