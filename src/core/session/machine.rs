//! Per-connection session.
//!
//! A [`Session`] owns everything the protocol needs for one call: sequence
//! counters, the negotiated media, the bot conversation and the capture
//! arbiter. It is driven from a single task that feeds it inbound frames
//! ([`Session::handle_text`], [`Session::handle_binary`]) and the results of
//! its own background work ([`Session::handle_event`]). Outbound traffic is
//! queued on one ordered channel; every control message is stamped by
//! [`Session::send_message`] at enqueue time.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use super::arbiter::{CaptureArbiter, Transition, TurnInput, TurnState};
use super::dispatch::{self, HandlerRegistry};
use super::error::{SessionError, SessionResult};
use super::events::SessionEvent;
use super::outbound::{CloseCode, MessageRoute, audio_frames};
use crate::core::bot::{BotProvider, BotResource, BotResponse, BotSessionRequest};
use crate::core::capture::{
    CaptureContext, CaptureKind, DigitRecognizerFactory, SpeechRecognizerFactory,
};
use crate::core::protocol::{
    BotTurnResponseData, ClientEnvelope, CloseParameters, ClosedParameters, DisconnectParameters,
    DisconnectReason, DtmfParameters, EmptyParameters, ErrorParameters, EventEntity,
    EventParameters, MediaParameter, OpenParameters, OpenedParameters, PROTOCOL_VERSION,
    ProtocolError, SequenceTracker, ServerEnvelope, ServerMessage,
};

/// Largest binary frame sent to the peer
pub const DEFAULT_MAX_FRAME_SIZE: usize = 64_000;

/// Per-session tunables, derived from the server configuration
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub max_frame_size: usize,
    /// How long the peer gets to answer a `disconnect` with `close`
    pub disconnect_grace: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            disconnect_grace: Duration::from_secs(5),
        }
    }
}

/// Shared collaborators handed to every session
#[derive(Clone)]
pub struct SessionServices {
    pub speech: Arc<dyn SpeechRecognizerFactory>,
    pub digits: Arc<dyn DigitRecognizerFactory>,
    pub bot: Arc<dyn BotProvider>,
}

pub struct Session {
    settings: SessionSettings,
    bot_provider: Arc<dyn BotProvider>,
    handlers: HandlerRegistry,

    sequence: SequenceTracker,
    arbiter: CaptureArbiter,

    client_session_id: Option<String>,
    conversation_id: Option<String>,
    input_variables: HashMap<String, String>,
    selected_media: Option<MediaParameter>,
    language: Option<String>,
    output_variables: HashMap<String, String>,
    bot: Option<Arc<dyn BotResource>>,
    opened: bool,
    /// Reason and time of the `disconnect` we sent
    disconnect: Option<(DisconnectReason, Instant)>,

    outbound: mpsc::Sender<MessageRoute>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl Session {
    /// Create a session writing to `outbound`.
    ///
    /// The returned receiver yields the session's background results; the
    /// connection task must pass each of them to [`Session::handle_event`].
    pub fn new(
        settings: SessionSettings,
        services: SessionServices,
        outbound: mpsc::Sender<MessageRoute>,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let arbiter = CaptureArbiter::new(services.speech, services.digits, events.clone());

        let session = Self {
            settings,
            bot_provider: services.bot,
            handlers: HandlerRegistry::default(),
            sequence: SequenceTracker::new(),
            arbiter,
            client_session_id: None,
            conversation_id: None,
            input_variables: HashMap::new(),
            selected_media: None,
            language: None,
            output_variables: HashMap::new(),
            bot: None,
            opened: false,
            disconnect: None,
            outbound,
            events,
        };
        (session, events_rx)
    }

    /// Bind the session id before the first envelope (from the upgrade request)
    pub fn bind_session_id(&mut self, id: impl Into<String>) {
        if self.client_session_id.is_none() {
            self.client_session_id = Some(id.into());
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn client_session_id(&self) -> Option<&str> {
        self.client_session_id.as_deref()
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    pub fn selected_media(&self) -> Option<&MediaParameter> {
        self.selected_media.as_ref()
    }

    pub fn input_variables(&self) -> &HashMap<String, String> {
        &self.input_variables
    }

    pub fn output_variables(&self) -> &HashMap<String, String> {
        &self.output_variables
    }

    pub fn turn_state(&self) -> &TurnState {
        self.arbiter.state()
    }

    pub fn last_client_seq(&self) -> u64 {
        self.sequence.last_client_seq()
    }

    pub fn last_server_seq(&self) -> u64 {
        self.sequence.last_server_seq()
    }

    /// Neither disconnecting nor closed
    pub fn is_active(&self) -> bool {
        self.arbiter.state().is_active()
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.arbiter.state(), TurnState::Closed)
    }

    /// When the transport should be closed if the peer never answers our
    /// `disconnect` with `close`
    pub fn disconnect_deadline(&self) -> Option<Instant> {
        if self.is_closed() {
            return None;
        }
        self.disconnect
            .as_ref()
            .map(|(_, at)| *at + self.settings.disconnect_grace)
    }

    pub fn disconnect_reason(&self) -> Option<&DisconnectReason> {
        self.disconnect.as_ref().map(|(reason, _)| reason)
    }

    fn sid(&self) -> &str {
        self.client_session_id.as_deref().unwrap_or("-")
    }

    // =========================================================================
    // Inbound
    // =========================================================================

    /// Process one inbound text frame
    pub async fn handle_text(&mut self, text: &str) {
        if self.is_closed() {
            return;
        }

        let envelope = match ClientEnvelope::parse(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                self.protocol_violation(e).await;
                return;
            }
        };

        if !self.is_active() {
            // After a disconnect only the peer's close is still answered
            if envelope.message_type == dispatch::CLOSE {
                if let Some(id) = self.client_session_id.clone() {
                    let _ = self.sequence.accept(&envelope, &id);
                }
                self.reply_closed().await;
            } else {
                debug!(
                    session_id = %self.sid(),
                    message_type = %envelope.message_type,
                    "Ignoring message after disconnect"
                );
            }
            return;
        }

        let session_id = self
            .client_session_id
            .get_or_insert_with(|| envelope.id.clone())
            .clone();

        if let Err(e) = self.sequence.accept(&envelope, &session_id) {
            self.protocol_violation(e).await;
            return;
        }

        debug!(
            session_id = %session_id,
            seq = envelope.seq,
            message_type = %envelope.message_type,
            "Received message"
        );

        let Some(handler) = self.handlers.get(&envelope.message_type) else {
            warn!(
                session_id = %session_id,
                message_type = %envelope.message_type,
                "Ignoring unknown message type"
            );
            return;
        };

        if let Err(e) = handler(self, &envelope).await {
            self.fail(e).await;
        }
    }

    /// Process one inbound audio frame
    pub fn handle_binary(&mut self, frame: &[u8]) {
        self.route(TurnInput::Audio(frame));
    }

    /// Process a result of the session's background work
    pub async fn handle_event(&mut self, event: SessionEvent) {
        if !self.is_active() {
            debug!(
                session_id = %self.sid(),
                event = event.name(),
                "Dropping event after disconnect"
            );
            return;
        }

        match event {
            SessionEvent::Capture(capture) => {
                if capture.is_stale() {
                    debug!(
                        session_id = %self.sid(),
                        kind = %capture.kind,
                        "Dropping result of discarded capture"
                    );
                    return;
                }
                if capture.kind == CaptureKind::Digits {
                    self.route(TurnInput::DigitsCompleted);
                }
                match capture.outcome {
                    Ok(text) => {
                        info!(
                            session_id = %self.sid(),
                            kind = %capture.kind,
                            chars = text.len(),
                            "Capture complete"
                        );
                        self.start_turn(text);
                    }
                    Err(e) => self.fail(e.into()).await,
                }
            }
            SessionEvent::BotCreated(Ok(bot)) => self.attach_bot(bot),
            SessionEvent::BotCreated(Err(e)) | SessionEvent::BotReply(Err(e)) => {
                self.fail(e.into()).await
            }
            SessionEvent::BotReply(Ok(response)) => self.deliver_response(response).await,
        }
    }

    fn route(&mut self, input: TurnInput<'_>) {
        if let Transition::Dropped(reason) = self.arbiter.apply(input) {
            trace!(
                session_id = %self.sid(),
                state = ?self.arbiter.state(),
                ?reason,
                "Input dropped"
            );
        }
    }

    async fn protocol_violation(&mut self, error: ProtocolError) {
        self.fail(error.into()).await;
    }

    /// End the session with `disconnect(error)`
    async fn fail(&mut self, error: SessionError) {
        warn!(session_id = %self.sid(), "Session failed: {}", error);
        self.send_disconnect(DisconnectReason::Error, Some(error.to_string()), HashMap::new())
            .await;
    }

    // =========================================================================
    // Message handlers
    // =========================================================================

    pub(super) async fn handle_open(&mut self, envelope: &ClientEnvelope) -> SessionResult<()> {
        if self.opened {
            return Err(ProtocolError::UnexpectedMessage(dispatch::OPEN.to_string()).into());
        }
        let params: OpenParameters = envelope.parameters()?;
        self.opened = true;

        if params.is_connection_probe() {
            info!(session_id = %self.sid(), "Answering connection probe");
            let media = MediaParameter::select(&params.media).into_iter().collect();
            self.send_message(ServerMessage::Opened(OpenedParameters {
                start_paused: false,
                media,
            }))
            .await;
            return Ok(());
        }

        let media = MediaParameter::select(&params.media).ok_or(ProtocolError::UnsupportedMedia)?;
        info!(
            session_id = %self.sid(),
            conversation_id = %params.conversation_id,
            format = %media.format,
            rate = media.rate,
            "Session opened"
        );

        self.input_variables = params.input_variables;
        self.language = params.language;
        self.selected_media = Some(media.clone());

        self.send_message(ServerMessage::Opened(OpenedParameters {
            start_paused: false,
            media: vec![media.clone()],
        }))
        .await;

        self.request_bot(media);
        Ok(())
    }

    pub(super) async fn handle_close(&mut self, envelope: &ClientEnvelope) -> SessionResult<()> {
        let params: CloseParameters = envelope.parameters()?;
        info!(
            session_id = %self.sid(),
            reason = params.reason.as_deref().unwrap_or("none"),
            "Peer closed session"
        );
        self.reply_closed().await;
        Ok(())
    }

    pub(super) async fn handle_ping(&mut self) -> SessionResult<()> {
        self.send_message(ServerMessage::Pong(EmptyParameters {})).await;
        Ok(())
    }

    pub(super) fn handle_dtmf(&mut self, envelope: &ClientEnvelope) -> SessionResult<()> {
        let params: DtmfParameters = envelope.parameters()?;
        let mut chars = params.digit.chars();
        let digit = match (chars.next(), chars.next()) {
            (Some(digit), None) => digit,
            _ => {
                return Err(ProtocolError::InvalidParameters {
                    message_type: dispatch::DTMF.to_string(),
                    reason: format!("expected a single digit, got {:?}", params.digit),
                }
                .into());
            }
        };
        self.route(TurnInput::Digit(digit));
        Ok(())
    }

    pub(super) fn handle_playback_started(&mut self) {
        debug!(session_id = %self.sid(), "Playback started");
        self.route(TurnInput::PlaybackStarted);
    }

    pub(super) fn handle_playback_completed(&mut self) {
        debug!(session_id = %self.sid(), "Playback completed");
        self.route(TurnInput::PlaybackCompleted);
    }

    pub(super) fn handle_peer_error(&mut self, envelope: &ClientEnvelope) -> SessionResult<()> {
        let params: ErrorParameters = envelope.parameters()?;
        warn!(
            session_id = %self.sid(),
            code = ?params.code,
            message = params.message.as_deref().unwrap_or(""),
            "Peer reported an error"
        );
        Ok(())
    }

    // =========================================================================
    // Bot turns
    // =========================================================================

    fn request_bot(&self, media: MediaParameter) {
        let request = BotSessionRequest {
            session_id: self.sid().to_string(),
            input_variables: self.input_variables.clone(),
            media,
            language: self.language.clone(),
        };
        let provider = self.bot_provider.clone();
        let events = self.events.clone();

        tokio::spawn(async move {
            let result = provider.create(request).await;
            let _ = events.send(SessionEvent::BotCreated(result));
        });
    }

    fn attach_bot(&mut self, bot: Arc<dyn BotResource>) {
        info!(
            session_id = %self.sid(),
            conversation_id = %bot.conversation_id(),
            "Bot conversation ready"
        );
        self.conversation_id = Some(bot.conversation_id().to_string());

        if let Some(media) = self.selected_media.clone() {
            self.arbiter.select_bot(CaptureContext {
                session_id: self.sid().to_string(),
                media,
                language: self.language.clone(),
            });
        }
        self.bot = Some(bot.clone());

        let events = self.events.clone();
        tokio::spawn(async move {
            let result = bot.initial_response().await;
            let _ = events.send(SessionEvent::BotReply(result));
        });
    }

    /// Ask the bot to answer `utterance`
    fn start_turn(&self, utterance: String) {
        let Some(bot) = self.bot.clone() else {
            warn!(session_id = %self.sid(), "Capture finished without a bot conversation");
            return;
        };
        let events = self.events.clone();

        tokio::spawn(async move {
            let result = bot.response(&utterance).await;
            let _ = events.send(SessionEvent::BotReply(result));
        });
    }

    async fn deliver_response(&mut self, response: BotResponse) {
        let BotResponse {
            disposition,
            text,
            confidence,
            audio_bytes,
            end_session,
            output_variables,
        } = response;

        if !output_variables.is_empty() {
            self.output_variables = output_variables;
        }

        if text.is_some() {
            self.send_message(ServerMessage::Event(EventParameters {
                entities: vec![EventEntity::BotTurnResponse(BotTurnResponseData {
                    disposition,
                    text,
                    confidence,
                })],
            }))
            .await;
        }

        if let Some(audio) = audio_bytes {
            self.send_audio(audio).await;
        }

        if end_session {
            let output_variables = self.output_variables.clone();
            self.send_disconnect(DisconnectReason::Completed, None, output_variables)
                .await;
        }
    }

    // =========================================================================
    // Outbound
    // =========================================================================

    /// Stamp and queue a control message. The only place envelopes are built.
    pub async fn send_message(&mut self, message: ServerMessage) {
        if self.is_closed() {
            return;
        }

        let (seq, clientseq) = self.sequence.stamp();
        let envelope = ServerEnvelope {
            version: PROTOCOL_VERSION,
            id: self.client_session_id.clone().unwrap_or_default(),
            seq,
            clientseq,
            message,
        };

        debug!(
            session_id = %envelope.id,
            seq,
            message_type = envelope.message.message_type(),
            "Sending message"
        );
        if let Err(e) = self.outbound.send(MessageRoute::Outgoing(envelope)).await {
            warn!("Failed to queue outbound message: {}", e);
        }
    }

    /// Queue audio as one or more binary frames; returns the frame count
    pub async fn send_audio(&mut self, audio: Bytes) -> usize {
        if !self.is_active() {
            return 0;
        }

        let total = audio.len();
        let mut frames = 0;
        for frame in audio_frames(audio, self.settings.max_frame_size) {
            if let Err(e) = self.outbound.send(MessageRoute::Binary(frame)).await {
                warn!("Failed to queue audio frame: {}", e);
                break;
            }
            frames += 1;
        }

        debug!(session_id = %self.sid(), bytes = total, frames, "Audio queued");
        frames
    }

    /// Send `disconnect` once; later calls are no-ops
    pub async fn send_disconnect(
        &mut self,
        reason: DisconnectReason,
        info: Option<String>,
        output_variables: HashMap<String, String>,
    ) {
        if !self.is_active() {
            return;
        }
        self.arbiter.apply(TurnInput::Disconnect);
        self.disconnect = Some((reason.clone(), Instant::now()));

        info!(session_id = %self.sid(), reason = %reason, "Disconnecting session");
        self.send_message(ServerMessage::Disconnect(DisconnectParameters {
            reason,
            info,
            output_variables,
        }))
        .await;
    }

    async fn reply_closed(&mut self) {
        let output_variables = self.output_variables.clone();
        self.send_message(ServerMessage::Closed(ClosedParameters { output_variables }))
            .await;
        self.close().await;
    }

    /// Close the transport normally. Idempotent.
    pub async fn close(&mut self) {
        self.close_with(CloseCode::Normal).await;
    }

    /// Close the transport with `code`. Idempotent; errors are swallowed.
    pub async fn close_with(&mut self, code: CloseCode) {
        if self.is_closed() {
            return;
        }
        self.arbiter.apply(TurnInput::Close);
        self.bot = None;

        info!(session_id = %self.sid(), code = code.code(), "Session closed");
        // The sender task may already be gone
        let _ = self.outbound.send(MessageRoute::Close(code)).await;
    }

    /// The peer never answered our `disconnect`; close the transport
    pub async fn expire_disconnect_grace(&mut self) {
        let code = match self.disconnect_reason() {
            Some(DisconnectReason::Error) => CloseCode::InternalError,
            _ => CloseCode::Normal,
        };
        warn!(
            session_id = %self.sid(),
            "Peer did not close after disconnect, closing transport"
        );
        self.close_with(code).await;
    }
}
