//! Audio connector end-to-end tests
//!
//! Runs the real router on an ephemeral port and drives it with a
//! WebSocket client, the way a telephony node would. Transcription and the
//! bot are scripted; keypad capture uses the real collector.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use audio_connector_gateway::config::AuthApiSecret;
use audio_connector_gateway::core::bot::{
    BotProvider, BotResource, BotResponse, BotResult, BotSessionRequest,
};
use audio_connector_gateway::core::capture::{
    CaptureCompletion, CaptureContext, CaptureState, DtmfCollectorFactory, SpeechRecognizer,
    SpeechRecognizerFactory,
};
use audio_connector_gateway::core::session::SessionServices;
use audio_connector_gateway::{AppState, ServerConfig, routes};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const SESSION_ID: &str = "e160e428-53e2-487c-977d-96989bf5c99d";
const CONVERSATION_ID: &str = "090eaa2f-72fa-480a-83e0-8667ff89c0ec";
const PROBE_ID: &str = "00000000-0000-0000-0000-000000000000";
const API_KEY: &str = "node-key";
const END_OF_SPEECH: u8 = 0xEE;

// =============================================================================
// Scripted collaborators
// =============================================================================

/// Recognizes "hello" once a frame starting with `END_OF_SPEECH` arrives
struct ScriptedSpeechFactory;

struct ScriptedSpeech {
    completion: Option<CaptureCompletion>,
    state: CaptureState,
}

impl SpeechRecognizerFactory for ScriptedSpeechFactory {
    fn create(
        &self,
        _context: &CaptureContext,
        completion: CaptureCompletion,
    ) -> Box<dyn SpeechRecognizer> {
        Box::new(ScriptedSpeech {
            completion: Some(completion),
            state: CaptureState::Idle,
        })
    }
}

impl SpeechRecognizer for ScriptedSpeech {
    fn process_audio(&mut self, audio: &[u8]) {
        if self.state == CaptureState::Complete {
            return;
        }
        self.state = CaptureState::Capturing;
        if audio.first() == Some(&END_OF_SPEECH)
            && let Some(completion) = self.completion.take()
        {
            self.state = CaptureState::Complete;
            completion.finish(Ok("hello".to_string()));
        }
    }

    fn state(&self) -> CaptureState {
        self.state
    }
}

struct ScriptedBot {
    greeting: BotResponse,
    replies: Mutex<VecDeque<BotResponse>>,
}

#[async_trait]
impl BotResource for ScriptedBot {
    fn conversation_id(&self) -> &str {
        "bot-conversation"
    }

    async fn initial_response(&self) -> BotResult<BotResponse> {
        Ok(self.greeting.clone())
    }

    async fn response(&self, utterance: &str) -> BotResult<BotResponse> {
        Ok(self
            .replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| BotResponse::text(format!("You said {utterance}"))))
    }
}

struct ScriptedBotProvider {
    bot: Arc<ScriptedBot>,
    requests: Mutex<Vec<BotSessionRequest>>,
}

impl ScriptedBotProvider {
    fn new(greeting: BotResponse, replies: Vec<BotResponse>) -> Arc<Self> {
        Arc::new(Self {
            bot: Arc::new(ScriptedBot {
                greeting,
                replies: Mutex::new(replies.into()),
            }),
            requests: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl BotProvider for ScriptedBotProvider {
    async fn create(&self, request: BotSessionRequest) -> BotResult<Arc<dyn BotResource>> {
        self.requests.lock().push(request);
        Ok(self.bot.clone())
    }
}

// =============================================================================
// Server and client helpers
// =============================================================================

fn create_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        tls: None,
        auth_required: false,
        auth_api_secrets: vec![AuthApiSecret {
            id: "node-1".to_string(),
            secret: API_KEY.to_string(),
        }],
        max_frame_size: 64_000,
        disconnect_grace_secs: 5,
        idle_timeout_secs: 60,
        bot_url: "http://127.0.0.1:9".to_string(),
        bot_secret: Some("unused".to_string()),
        bot_poll_interval_ms: 50,
        bot_reply_timeout_secs: 1,
        asr_url: "http://127.0.0.1:9/v1/audio/transcriptions".to_string(),
        asr_api_key: Some("unused".to_string()),
        asr_model: "whisper-1".to_string(),
        asr_language: None,
        asr_silence_threshold: 0.01,
        asr_silence_ms: 800,
        asr_max_utterance_ms: 15_000,
        tts_url: "http://127.0.0.1:9/v1/audio/speech".to_string(),
        tts_api_key: None,
        tts_model: "tts-1".to_string(),
        tts_voice: "alloy".to_string(),
        dtmf_terminator: "#".to_string(),
        dtmf_max_digits: None,
        rate_limit_requests_per_second: 100_000,
        rate_limit_burst_size: 10,
        max_websocket_connections: None,
        max_connections_per_ip: 100,
    }
}

async fn spawn_server(config: ServerConfig, bot: Arc<ScriptedBotProvider>) -> SocketAddr {
    let services = SessionServices {
        speech: Arc::new(ScriptedSpeechFactory),
        digits: Arc::new(DtmfCollectorFactory::new(config.dtmf_config())),
        bot,
    };
    let app = routes::create_app(AppState::with_services(config, services));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });
    addr
}

async fn connect(addr: SocketAddr, headers: &[(&'static str, &str)]) -> Client {
    let mut request = format!("ws://{addr}/audio-connector")
        .into_client_request()
        .unwrap();
    for (name, value) in headers {
        request
            .headers_mut()
            .insert(*name, HeaderValue::from_str(value).unwrap());
    }
    let (client, _) = connect_async(request).await.unwrap();
    client
}

/// What the server sent next
#[derive(Debug)]
enum Received {
    Envelope(Value),
    Binary(usize),
    Close(Option<u16>),
}

async fn next(client: &mut Client) -> Received {
    loop {
        let message = timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for the server")
            .expect("connection ended")
            .expect("websocket error");
        match message {
            Message::Text(text) => {
                return Received::Envelope(serde_json::from_str(text.as_str()).unwrap());
            }
            Message::Binary(data) => return Received::Binary(data.len()),
            Message::Close(frame) => return Received::Close(frame.map(|f| u16::from(f.code))),
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
        }
    }
}

async fn next_envelope(client: &mut Client) -> Value {
    match next(client).await {
        Received::Envelope(envelope) => envelope,
        other => panic!("expected an envelope, got {other:?}"),
    }
}

struct Peer {
    client: Client,
    seq: u64,
    serverseq: u64,
}

impl Peer {
    fn new(client: Client) -> Self {
        Self {
            client,
            seq: 0,
            serverseq: 0,
        }
    }

    async fn send(&mut self, message_type: &str, parameters: Value) {
        self.seq += 1;
        let envelope = json!({
            "version": "2",
            "id": SESSION_ID,
            "type": message_type,
            "seq": self.seq,
            "serverseq": self.serverseq,
            "position": "PT0S",
            "parameters": parameters,
        });
        self.client
            .send(Message::text(envelope.to_string()))
            .await
            .unwrap();
    }

    async fn send_audio(&mut self, frame: Vec<u8>) {
        self.client.send(Message::binary(frame)).await.unwrap();
    }

    async fn receive(&mut self) -> Received {
        let received = next(&mut self.client).await;
        if let Received::Envelope(envelope) = &received {
            self.serverseq = envelope["seq"].as_u64().unwrap();
        }
        received
    }

    async fn envelope(&mut self) -> Value {
        match self.receive().await {
            Received::Envelope(envelope) => envelope,
            other => panic!("expected an envelope, got {other:?}"),
        }
    }

    async fn open(&mut self, conversation_id: &str) -> Value {
        self.send(
            "open",
            json!({
                "organizationId": "d7934305-0972-4844-938e-9060eef73d05",
                "conversationId": conversation_id,
                "media": [
                    {"type": "audio", "format": "PCMU", "channels": ["external", "internal"], "rate": 8000},
                    {"type": "audio", "format": "PCMU", "channels": ["external"], "rate": 8000}
                ],
                "language": "en-US",
                "inputVariables": {"customerTier": "gold"}
            }),
        )
        .await;
        self.envelope().await
    }
}

fn bot_text(envelope: &Value) -> &str {
    assert_eq!(envelope["type"], "event", "{envelope}");
    envelope["parameters"]["entities"][0]["data"]["text"]
        .as_str()
        .unwrap_or_default()
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_call_with_speech_and_dtmf_turns() {
    let bot = ScriptedBotProvider::new(BotResponse::text("Welcome"), Vec::new());
    let addr = spawn_server(create_config(), bot.clone()).await;
    let mut peer = Peer::new(connect(addr, &[]).await);

    let opened = peer.open(CONVERSATION_ID).await;
    assert_eq!(opened["type"], "opened");
    assert_eq!(opened["id"], SESSION_ID);
    assert_eq!(opened["seq"], 1);
    assert_eq!(opened["clientseq"], 1);
    assert_eq!(opened["parameters"]["media"][0]["channels"], json!(["external"]));

    let greeting = peer.envelope().await;
    assert_eq!(bot_text(&greeting), "Welcome");
    assert_eq!(greeting["seq"], 2);

    let request = bot.requests.lock()[0].clone();
    assert_eq!(request.session_id, SESSION_ID);
    assert_eq!(request.input_variables.get("customerTier").unwrap(), "gold");

    peer.send_audio(vec![0xFF; 160]).await;
    peer.send_audio(vec![END_OF_SPEECH; 160]).await;
    assert_eq!(bot_text(&peer.envelope().await), "You said hello");

    for digit in ["4", "2", "#"] {
        peer.send("dtmf", json!({ "digit": digit })).await;
    }
    let reply = peer.envelope().await;
    assert_eq!(bot_text(&reply), "You said 42");
    assert_eq!(reply["seq"], 4);
    assert_eq!(reply["clientseq"], 4);

    peer.send("close", json!({ "reason": "end" })).await;
    let closed = peer.envelope().await;
    assert_eq!(closed["type"], "closed");
    assert!(matches!(peer.receive().await, Received::Close(Some(1000))));
}

#[tokio::test]
async fn test_connection_probe_and_ping() {
    let bot = ScriptedBotProvider::new(BotResponse::text("Welcome"), Vec::new());
    let addr = spawn_server(create_config(), bot.clone()).await;
    let mut peer = Peer::new(connect(addr, &[]).await);

    let opened = peer.open(PROBE_ID).await;
    assert_eq!(opened["type"], "opened");

    peer.send("ping", json!({})).await;
    let pong = peer.envelope().await;
    assert_eq!(pong["type"], "pong");
    assert_eq!(pong["seq"], 2);
    assert_eq!(pong["clientseq"], 2);

    assert!(bot.requests.lock().is_empty());
}

#[tokio::test]
async fn test_bot_audio_is_split_into_frames() {
    let mut config = create_config();
    config.max_frame_size = 1000;
    let greeting = BotResponse::text("Welcome").with_audio(vec![0x7F; 2500]);
    let bot = ScriptedBotProvider::new(greeting, Vec::new());
    let addr = spawn_server(config, bot).await;
    let mut peer = Peer::new(connect(addr, &[]).await);

    peer.open(CONVERSATION_ID).await;
    assert_eq!(bot_text(&peer.envelope().await), "Welcome");

    let mut frames = Vec::new();
    for _ in 0..3 {
        match peer.receive().await {
            Received::Binary(len) => frames.push(len),
            other => panic!("expected audio, got {other:?}"),
        }
    }
    assert_eq!(frames, vec![1000, 1000, 500]);
}

#[tokio::test]
async fn test_bot_ending_the_call() {
    let mut goodbye = BotResponse::text("Goodbye").ending_session();
    goodbye.output_variables = HashMap::from([("intent".to_string(), "billing".to_string())]);
    let bot = ScriptedBotProvider::new(BotResponse::text("Welcome"), vec![goodbye]);
    let addr = spawn_server(create_config(), bot).await;
    let mut peer = Peer::new(connect(addr, &[]).await);

    peer.open(CONVERSATION_ID).await;
    peer.envelope().await;

    peer.send("dtmf", json!({ "digit": "1" })).await;
    peer.send("dtmf", json!({ "digit": "#" })).await;
    assert_eq!(bot_text(&peer.envelope().await), "Goodbye");

    let disconnect = peer.envelope().await;
    assert_eq!(disconnect["type"], "disconnect");
    assert_eq!(disconnect["parameters"]["reason"], "completed");
    assert_eq!(disconnect["parameters"]["outputVariables"]["intent"], "billing");

    // Anything but close is ignored now
    peer.send("ping", json!({})).await;
    peer.send("close", json!({})).await;
    let closed = peer.envelope().await;
    assert_eq!(closed["type"], "closed");
    assert_eq!(closed["parameters"]["outputVariables"]["intent"], "billing");
    assert!(matches!(peer.receive().await, Received::Close(Some(1000))));
}

#[tokio::test]
async fn test_sequence_gap_disconnects_with_error() {
    let mut config = create_config();
    config.disconnect_grace_secs = 1;
    let bot = ScriptedBotProvider::new(BotResponse::text("Welcome"), Vec::new());
    let addr = spawn_server(config, bot).await;
    let mut peer = Peer::new(connect(addr, &[]).await);

    peer.open(CONVERSATION_ID).await;
    peer.envelope().await;

    peer.seq += 1;
    peer.send("ping", json!({})).await;

    let disconnect = peer.envelope().await;
    assert_eq!(disconnect["type"], "disconnect");
    assert_eq!(disconnect["parameters"]["reason"], "error");
    assert!(disconnect["parameters"]["info"].as_str().is_some());

    // The peer never answers, so the grace period closes the transport
    assert!(matches!(peer.receive().await, Received::Close(Some(1011))));
}

#[tokio::test]
async fn test_session_id_header_must_match_envelopes() {
    let bot = ScriptedBotProvider::new(BotResponse::text("Welcome"), Vec::new());
    let addr = spawn_server(create_config(), bot).await;
    let client = connect(addr, &[("audiohook-session-id", "another-session")]).await;
    let mut peer = Peer::new(client);

    let disconnect = peer.open(CONVERSATION_ID).await;
    assert_eq!(disconnect["type"], "disconnect");
    assert_eq!(disconnect["id"], "another-session");
    assert_eq!(disconnect["parameters"]["reason"], "error");
}

#[tokio::test]
async fn test_auth_required() {
    let mut config = create_config();
    config.auth_required = true;
    let bot = ScriptedBotProvider::new(BotResponse::text("Welcome"), Vec::new());
    let addr = spawn_server(config, bot).await;

    let mut rejected = connect(addr, &[("x-api-key", "wrong-key")]).await;
    assert!(matches!(next(&mut rejected).await, Received::Close(Some(1008))));

    let mut missing = connect(addr, &[]).await;
    assert!(matches!(next(&mut missing).await, Received::Close(Some(1008))));

    let mut peer = Peer::new(connect(addr, &[("x-api-key", API_KEY)]).await);
    assert_eq!(peer.open(CONVERSATION_ID).await["type"], "opened");
}

#[tokio::test]
async fn test_malformed_frame_disconnects() {
    let bot = ScriptedBotProvider::new(BotResponse::text("Welcome"), Vec::new());
    let addr = spawn_server(create_config(), bot).await;
    let mut client = connect(addr, &[]).await;

    client.send(Message::text("not json")).await.unwrap();
    let disconnect = next_envelope(&mut client).await;
    assert_eq!(disconnect["type"], "disconnect");
    assert_eq!(disconnect["parameters"]["reason"], "error");
}
