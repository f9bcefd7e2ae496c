//! Connection limit middleware for WebSocket connections
//!
//! This module provides middleware to enforce connection limits:
//! - Global maximum WebSocket connections
//! - Per-IP connection limits
//!
//! The slot taken here is released by the connector handler when the
//! connection task ends, or right away when the upgrade is refused.
//!
//! # Example
//!
//! ```ignore
//! use axum::Router;
//! use audio_connector_gateway::middleware::connection_limit_middleware;
//!
//! let app = Router::new()
//!     .route("/audio-connector", get(connector_handler))
//!     .layer(axum::middleware::from_fn_with_state(
//!         state.clone(),
//!         connection_limit_middleware,
//!     ));
//! ```

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use crate::state::{AppState, ConnectionLimitError};

/// Extension type to carry the client IP through to the handler
/// so the handler can release the connection when done.
#[derive(Clone, Debug)]
pub struct ClientIp(pub IpAddr);

/// Enforce the global and per-IP WebSocket limits.
///
/// Over the global limit the upgrade gets 503, over the per-IP limit 429.
/// Accepted upgrades carry a [`ClientIp`] extension so the handler can give
/// the slot back. Requests without an `Upgrade: websocket` header pass through.
pub async fn connection_limit_middleware(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let is_ws_upgrade = request
        .headers()
        .get("upgrade")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("websocket"))
        .unwrap_or(false);

    if !is_ws_upgrade {
        return next.run(request).await;
    }

    let client_ip = addr.ip();

    match state.try_acquire_connection(client_ip) {
        Ok(()) => {
            request.extensions_mut().insert(ClientIp(client_ip));
            let response = next.run(request).await;
            // The handler never ran, so nothing else will give the slot back
            if response.status() != StatusCode::SWITCHING_PROTOCOLS {
                state.release_connection(client_ip);
            }
            response
        }
        Err(ConnectionLimitError::GlobalLimitReached) => {
            tracing::warn!(
                ip = %client_ip,
                "Rejecting connection: global limit reached"
            );
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "Server at capacity. Please try again later.",
            )
                .into_response()
        }
        Err(ConnectionLimitError::PerIpLimitReached) => {
            tracing::warn!(
                ip = %client_ip,
                "Rejecting connection: per-IP limit reached"
            );
            (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many connections from your IP address.",
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::tests::{fake_state, test_config};
    use axum::{Extension, Router, extract::connect_info::MockConnectInfo, routing::get};
    use std::net::Ipv4Addr;
    use tower::ServiceExt;

    fn router(state: Arc<AppState>) -> Router {
        async fn echo_ip(ip: Option<Extension<ClientIp>>) -> (StatusCode, String) {
            let ip = ip
                .map(|Extension(ClientIp(ip))| ip.to_string())
                .unwrap_or_default();
            (StatusCode::SWITCHING_PROTOCOLS, ip)
        }

        async fn refuse() -> StatusCode {
            StatusCode::UPGRADE_REQUIRED
        }

        Router::new()
            .route("/audio-connector", get(echo_ip))
            .route("/refused", get(refuse))
            .layer(axum::middleware::from_fn_with_state(
                state.clone(),
                connection_limit_middleware,
            ))
            .with_state(state)
            .layer(MockConnectInfo(SocketAddr::from((
                Ipv4Addr::new(10, 0, 0, 7),
                40000,
            ))))
    }

    fn upgrade_request() -> Request<Body> {
        Request::builder()
            .uri("/audio-connector")
            .header("upgrade", "websocket")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_plain_requests_are_not_counted() {
        let state = fake_state(test_config(Some(1), 1));
        let response = router(state.clone())
            .oneshot(
                Request::builder()
                    .uri("/audio-connector")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SWITCHING_PROTOCOLS);
        assert_eq!(state.ws_connection_count(), 0);
    }

    #[tokio::test]
    async fn test_upgrade_takes_a_slot() {
        let state = fake_state(test_config(Some(10), 10));
        let response = router(state.clone())
            .oneshot(upgrade_request())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SWITCHING_PROTOCOLS);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"10.0.0.7");
        assert_eq!(state.ws_connection_count(), 1);
    }

    #[tokio::test]
    async fn test_per_ip_limit_rejects_with_429() {
        let state = fake_state(test_config(Some(10), 1));
        let app = router(state.clone());

        let first = app.clone().oneshot(upgrade_request()).await.unwrap();
        assert_eq!(first.status(), StatusCode::SWITCHING_PROTOCOLS);

        let second = app.oneshot(upgrade_request()).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(state.ws_connection_count(), 1);
    }

    #[tokio::test]
    async fn test_global_limit_rejects_with_503() {
        let state = fake_state(test_config(Some(1), 10));
        state
            .try_acquire_connection(Ipv4Addr::new(10, 0, 0, 8).into())
            .unwrap();

        let response = router(state).oneshot(upgrade_request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_refused_upgrade_releases_slot() {
        let state = fake_state(test_config(Some(1), 1));
        let request = Request::builder()
            .uri("/refused")
            .header("upgrade", "websocket")
            .body(Body::empty())
            .unwrap();

        let response = router(state.clone()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UPGRADE_REQUIRED);
        assert_eq!(state.ws_connection_count(), 0);
        assert_eq!(state.ip_connection_count(&Ipv4Addr::new(10, 0, 0, 7).into()), 0);
    }
}
