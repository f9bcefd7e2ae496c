pub mod api;
pub mod connector;

use axum::Router;
use std::sync::Arc;

use crate::state::AppState;

/// Every route the gateway serves, with state applied
///
/// Rate limiting and security headers are added by the binary.
pub fn create_app(state: Arc<AppState>) -> Router {
    api::create_api_router()
        .merge(connector::create_connector_router(state.clone()))
        .with_state(state)
}
