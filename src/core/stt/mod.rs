//! Speech-to-text engines.
//!
//! Each engine implements [`SpeechRecognizer`](crate::core::capture::SpeechRecognizer)
//! and is created per utterance by its factory.

pub mod openai;

pub use openai::{OpenAISTT, OpenAISTTConfig, OpenAISTTFactory, SilenceDetectionConfig};
