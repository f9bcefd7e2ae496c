//! Audio connector session: protocol state, capture arbitration and bot turns
//! for one telephony connection.

mod arbiter;
mod dispatch;
mod error;
mod events;
mod machine;
mod outbound;

#[cfg(test)]
pub(crate) mod test_support;

pub use arbiter::{CaptureArbiter, DropReason, Transition, TurnInput, TurnState};
pub use dispatch::{HandlerRegistry, MessageHandler};
pub use error::{SessionError, SessionResult};
pub use events::SessionEvent;
pub use machine::{DEFAULT_MAX_FRAME_SIZE, Session, SessionServices, SessionSettings};
pub use outbound::{CloseCode, MessageRoute, audio_frames};
