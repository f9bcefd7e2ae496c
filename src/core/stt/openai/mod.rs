//! OpenAI-compatible speech recognition.
//!
//! # Supported Models
//!
//! - `whisper-1` - Original Whisper model (default)
//! - `gpt-4o-transcribe` - Enhanced accuracy
//! - `gpt-4o-mini-transcribe` - Faster, cost-effective
//!
//! Any server exposing the `/audio/transcriptions` multipart contract works
//! by pointing `api_url` at it.

mod client;
mod config;
mod messages;


pub use client::{OpenAISTT, OpenAISTTFactory};
pub use config::{OPENAI_STT_URL, OpenAISTTConfig, OpenAISTTModel, SilenceDetectionConfig};
pub use messages::{OpenAIError, OpenAIErrorResponse, TranscriptionResponse};
