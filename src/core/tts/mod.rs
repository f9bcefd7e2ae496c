//! Speech synthesis for bot replies.

pub mod base;
pub mod openai;

pub use base::{Synthesizer, TTSError, TTSResult};
pub use openai::{OpenAISynthesizer, OpenAISynthesizerConfig};
