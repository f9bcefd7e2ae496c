pub mod audio;
pub mod bot;
pub mod capture;
pub mod protocol;
pub mod session;
pub mod stt;
pub mod tts;

pub use bot::{BotError, BotProvider, BotResource, BotResponse, DirectLineProvider, Disposition};
pub use capture::{CaptureError, DtmfCollectorFactory};
pub use protocol::{ProtocolError, SequenceTracker};
pub use session::{Session, SessionEvent, SessionServices, SessionSettings};
pub use stt::OpenAISTTFactory;
pub use tts::{OpenAISynthesizer, Synthesizer, TTSError};
