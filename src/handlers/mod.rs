//! HTTP and WebSocket request handlers
//!
//! - `api` - Health check endpoint
//! - `connector` - Audio connector WebSocket (one telephony call per connection)

pub mod api;
pub mod connector;

pub use connector::connector_handler;
