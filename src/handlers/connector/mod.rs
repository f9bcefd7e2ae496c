//! Audio connector WebSocket handler
//!
//! One telephony call per connection. Text frames carry sequence-numbered
//! JSON envelopes in both directions, binary frames carry call audio.
//!
//! ## Client → Server
//!
//! - **open**: Start the session (conversation id, media offers, input variables)
//! - **ping**: Liveness check, answered with `pong`
//! - **dtmf**: One keypad digit
//! - **playback_started** / **playback_completed**: Bot audio is / stopped playing
//! - **close**: End of call, answered with `closed`
//! - **error**: Peer-side failure report
//! - **Binary frames**: Caller audio in the negotiated media format
//!
//! ## Server → Client
//!
//! - **opened**, **pong**, **closed**: Replies to the above
//! - **event**: Bot turn result (disposition, text, confidence)
//! - **disconnect**: Server ends the call (`completed` or `error`)
//! - **Binary frames**: Bot audio, at most `max_frame_size` bytes each
//!
//! ## Headers
//!
//! - `X-API-KEY`: Required when `auth.required` is set
//! - `audiohook-session-id`: Optional, binds the session id before `open`

mod handler;

pub use handler::{SESSION_ID_HEADER, connector_handler};
