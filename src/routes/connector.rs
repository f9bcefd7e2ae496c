//! Audio connector WebSocket route configuration

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::connector_handler;
use crate::middleware::connection_limit_middleware;
use crate::state::AppState;
use std::sync::Arc;

/// Create the audio connector router
///
/// # Endpoint
///
/// `GET /audio-connector` - WebSocket upgrade for one telephony call
///
/// The connection-limit middleware runs before the upgrade and only on this
/// route, so unmatched paths still fall through to a 404. API key checks
/// happen in the handler so rejected nodes receive a close code.
pub fn create_connector_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/audio-connector", get(connector_handler))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            connection_limit_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}
