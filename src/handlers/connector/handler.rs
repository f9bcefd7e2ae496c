//! Connector WebSocket handler
//!
//! Drives one [`Session`] per connection: inbound frames, the session's
//! background results and its timers are all handled on the connection
//! task, so the session itself needs no locking.

use axum::{
    Extension,
    extract::{
        State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
    },
    http::HeaderMap,
    response::Response,
};
use futures::{SinkExt, StreamExt};
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep, sleep_until};
use tokio::{select, time::Duration};
use tracing::{debug, error, info, warn};

use crate::auth::extract_api_key;
use crate::core::session::{CloseCode, MessageRoute, Session};
use crate::middleware::ClientIp;
use crate::state::AppState;

/// Optimized channel buffer size for audio workloads
const CHANNEL_BUFFER_SIZE: usize = 1024;

/// Maximum WebSocket frame size (10 MB)
const MAX_WS_FRAME_SIZE: usize = 10 * 1024 * 1024;

/// Maximum WebSocket message size (10 MB)
const MAX_WS_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// Longest wait between idle checks
const IDLE_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Time the sender task gets to flush the close frame
const SENDER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Header a telephony node may use to announce the session id
pub const SESSION_ID_HEADER: &str = "audiohook-session-id";

/// Returns the connection slot taken by the connection-limit middleware,
/// also when the upgrade never completes
struct ConnectionSlot {
    state: Arc<AppState>,
    ip: Option<IpAddr>,
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        if let Some(ip) = self.ip {
            self.state.release_connection(ip);
        }
    }
}

/// Audio connector WebSocket handler
///
/// Authentication is checked here rather than in middleware: a rejected
/// node still gets the upgrade and then a close frame with code 1008.
pub async fn connector_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    client_ip: Option<Extension<ClientIp>>,
    headers: HeaderMap,
) -> Response {
    let auth_id = extract_api_key(&headers)
        .and_then(|key| state.config.find_api_secret_id(key))
        .map(str::to_string);
    let authorized = !state.config.auth_required || auth_id.is_some();

    let session_id = headers
        .get(SESSION_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string);

    info!(
        auth_id = ?auth_id,
        session_id = ?session_id,
        authorized,
        "Audio connector upgrade requested"
    );

    let slot = ConnectionSlot {
        state: state.clone(),
        ip: client_ip.map(|Extension(ClientIp(ip))| ip),
    };

    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| async move {
            if authorized {
                handle_connector_socket(socket, state, session_id).await;
            } else {
                reject_socket(socket).await;
            }
            drop(slot);
        })
}

fn close_frame(code: CloseCode) -> Message {
    Message::Close(Some(CloseFrame {
        code: code.code(),
        reason: code.reason().into(),
    }))
}

async fn reject_socket(mut socket: WebSocket) {
    warn!("Rejecting audio connector: missing or unknown API key");
    if let Err(e) = socket.send(close_frame(CloseCode::Unauthorized)).await {
        debug!("Failed to send unauthorized close: {}", e);
    }
}

/// Handle the connector WebSocket connection
async fn handle_connector_socket(
    socket: WebSocket,
    app_state: Arc<AppState>,
    session_id: Option<String>,
) {
    let (mut sender, mut receiver) = socket.split();
    let (message_tx, mut message_rx) = mpsc::channel::<MessageRoute>(CHANNEL_BUFFER_SIZE);

    // Sender task for outgoing messages
    let mut sender_task = tokio::spawn(async move {
        while let Some(route) = message_rx.recv().await {
            let should_close = matches!(route, MessageRoute::Close(_));

            let result = match route {
                MessageRoute::Outgoing(envelope) => match serde_json::to_string(&envelope) {
                    Ok(json_str) => sender.send(Message::Text(json_str.into())).await,
                    Err(e) => {
                        error!("Failed to serialize outgoing message: {}", e);
                        continue;
                    }
                },
                MessageRoute::Binary(data) => sender.send(Message::Binary(data)).await,
                MessageRoute::Close(code) => {
                    info!(code = code.code(), "Closing audio connector WebSocket");
                    sender.send(close_frame(code)).await
                }
            };

            if let Err(e) = result {
                error!("Failed to send WebSocket message: {}", e);
                break;
            }

            if should_close {
                break;
            }
        }
    });

    let (mut session, mut events) = Session::new(
        app_state.config.session_settings(),
        app_state.services.clone(),
        message_tx,
    );
    if let Some(id) = session_id {
        session.bind_session_id(id);
    }

    let idle_timeout = app_state.config.idle_timeout();
    let idle_check = idle_timeout.min(IDLE_CHECK_INTERVAL);
    let mut last_activity = Instant::now();

    loop {
        let grace_deadline = session.disconnect_deadline();

        select! {
            msg_result = receiver.next() => {
                last_activity = Instant::now();

                match msg_result {
                    Some(Ok(Message::Text(text))) => {
                        session.handle_text(text.as_str()).await;
                    }
                    Some(Ok(Message::Binary(data))) => {
                        session.handle_binary(&data);
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                        debug!("Received WebSocket control frame");
                    }
                    Some(Ok(Message::Close(frame))) => {
                        info!(frame = ?frame, "Audio connector close frame received");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!("Audio connector WebSocket error: {}", e);
                        break;
                    }
                    None => {
                        info!("Audio connector connection closed by peer");
                        break;
                    }
                }
            }
            Some(event) = events.recv() => {
                session.handle_event(event).await;
            }
            _ = sleep_until(grace_deadline.unwrap_or_else(Instant::now)), if grace_deadline.is_some() => {
                session.expire_disconnect_grace().await;
            }
            _ = sleep(idle_check) => {
                if last_activity.elapsed() > idle_timeout {
                    warn!(
                        "Audio connector idle for {}s, closing stale connection",
                        last_activity.elapsed().as_secs()
                    );
                    break;
                }
                debug!("Audio connector idle check - still active");
            }
        }

        if session.is_closed() {
            break;
        }
    }

    // Cleanup
    session.close().await;
    drop(session);

    if tokio::time::timeout(SENDER_DRAIN_TIMEOUT, &mut sender_task)
        .await
        .is_err()
    {
        sender_task.abort();
    }

    info!("Audio connector connection terminated");
}
