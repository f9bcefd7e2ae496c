//! Scripted capture engines and bot for session tests.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::core::audio::AudioEncoding;
use crate::core::bot::{
    BotError, BotProvider, BotResource, BotResponse, BotResult, BotSessionRequest,
};
use crate::core::capture::{
    CaptureCompletion, CaptureContext, CaptureError, CaptureOutcome, CaptureState,
    DigitRecognizer, DigitRecognizerFactory, DtmfCollectorFactory, SpeechRecognizer,
    SpeechRecognizerFactory,
};
use crate::core::protocol::MediaParameter;

/// A frame starting with this byte ends the utterance with the transcript
pub const END_OF_SPEECH: u8 = 0xEE;
/// A frame starting with this byte fails the recognizer
pub const SPEECH_FAILURE: u8 = 0xEF;

pub fn pcmu_media() -> MediaParameter {
    MediaParameter {
        media_type: "audio".to_string(),
        format: AudioEncoding::Pcmu,
        channels: vec!["external".to_string()],
        rate: 8000,
    }
}

pub fn capture_context() -> CaptureContext {
    CaptureContext {
        session_id: "session-1".to_string(),
        media: pcmu_media(),
        language: Some("en-US".to_string()),
    }
}

// =============================================================================
// Speech
// =============================================================================

#[derive(Default)]
struct SpeechLog {
    frames: usize,
    /// One slot per created engine, emptied when it reports
    completions: Vec<Option<CaptureCompletion>>,
}

pub struct FakeSpeechFactory {
    transcript: String,
    log: Arc<Mutex<SpeechLog>>,
}

impl FakeSpeechFactory {
    pub fn new(transcript: &str) -> Self {
        Self {
            transcript: transcript.to_string(),
            log: Arc::default(),
        }
    }

    pub fn created(&self) -> usize {
        self.log.lock().completions.len()
    }

    /// Frames routed to any engine
    pub fn frames(&self) -> usize {
        self.log.lock().frames
    }

    /// Report for the most recent engine that has not reported yet
    pub fn finish_last(&self, outcome: CaptureOutcome) {
        let completion = self
            .log
            .lock()
            .completions
            .iter_mut()
            .rev()
            .find_map(Option::take);
        completion
            .expect("no pending speech engine")
            .finish(outcome);
    }
}

impl SpeechRecognizerFactory for FakeSpeechFactory {
    fn create(
        &self,
        _context: &CaptureContext,
        completion: CaptureCompletion,
    ) -> Box<dyn SpeechRecognizer> {
        let mut log = self.log.lock();
        log.completions.push(Some(completion));
        Box::new(FakeSpeech {
            index: log.completions.len() - 1,
            transcript: self.transcript.clone(),
            state: CaptureState::Idle,
            log: self.log.clone(),
        })
    }
}

struct FakeSpeech {
    index: usize,
    transcript: String,
    state: CaptureState,
    log: Arc<Mutex<SpeechLog>>,
}

impl SpeechRecognizer for FakeSpeech {
    fn process_audio(&mut self, audio: &[u8]) {
        if self.state == CaptureState::Complete {
            return;
        }
        self.state = CaptureState::Capturing;

        let mut log = self.log.lock();
        log.frames += 1;

        let outcome = match audio.first() {
            Some(&END_OF_SPEECH) => Ok(self.transcript.clone()),
            Some(&SPEECH_FAILURE) => Err(CaptureError::Transcription(
                "recognizer failed".to_string(),
            )),
            _ => return,
        };
        self.state = CaptureState::Complete;
        if let Some(completion) = log.completions[self.index].take() {
            completion.finish(outcome);
        }
    }

    fn state(&self) -> CaptureState {
        self.state
    }
}

// =============================================================================
// Digits
// =============================================================================

#[derive(Default)]
struct DigitLog {
    created: usize,
    digits: Vec<char>,
}

/// Real keypad collector that also records what reached it
pub struct FakeDigitFactory {
    inner: DtmfCollectorFactory,
    log: Arc<Mutex<DigitLog>>,
}

impl FakeDigitFactory {
    pub fn new() -> Self {
        Self {
            inner: DtmfCollectorFactory::default(),
            log: Arc::default(),
        }
    }

    pub fn created(&self) -> usize {
        self.log.lock().created
    }

    pub fn digits(&self) -> Vec<char> {
        self.log.lock().digits.clone()
    }
}

impl DigitRecognizerFactory for FakeDigitFactory {
    fn create(&self, completion: CaptureCompletion) -> Box<dyn DigitRecognizer> {
        self.log.lock().created += 1;
        Box::new(RecordingDigits {
            inner: self.inner.create(completion),
            log: self.log.clone(),
        })
    }
}

struct RecordingDigits {
    inner: Box<dyn DigitRecognizer>,
    log: Arc<Mutex<DigitLog>>,
}

impl DigitRecognizer for RecordingDigits {
    fn process_digit(&mut self, digit: char) {
        self.log.lock().digits.push(digit);
        self.inner.process_digit(digit);
    }

    fn state(&self) -> CaptureState {
        self.inner.state()
    }
}

// =============================================================================
// Bot
// =============================================================================

pub const FAKE_CONVERSATION_ID: &str = "bot-conversation-1";

#[derive(Default)]
pub struct FakeBot {
    greeting: Mutex<Option<BotResult<BotResponse>>>,
    replies: Mutex<VecDeque<BotResult<BotResponse>>>,
    utterances: Mutex<Vec<String>>,
}

impl FakeBot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_greeting(self, greeting: BotResult<BotResponse>) -> Self {
        *self.greeting.lock() = Some(greeting);
        self
    }

    pub fn push_reply(&self, reply: BotResult<BotResponse>) {
        self.replies.lock().push_back(reply);
    }

    pub fn utterances(&self) -> Vec<String> {
        self.utterances.lock().clone()
    }
}

#[async_trait]
impl BotResource for FakeBot {
    fn conversation_id(&self) -> &str {
        FAKE_CONVERSATION_ID
    }

    async fn initial_response(&self) -> BotResult<BotResponse> {
        self.greeting
            .lock()
            .take()
            .unwrap_or_else(|| Ok(BotResponse::text("Welcome")))
    }

    async fn response(&self, utterance: &str) -> BotResult<BotResponse> {
        self.utterances.lock().push(utterance.to_string());
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(BotResponse::text(format!("You said {utterance}"))))
    }
}

pub struct FakeBotProvider {
    pub bot: Arc<FakeBot>,
    fail: bool,
    requests: Mutex<Vec<BotSessionRequest>>,
}

impl FakeBotProvider {
    pub fn new(bot: FakeBot) -> Self {
        Self {
            bot: Arc::new(bot),
            fail: false,
            requests: Mutex::default(),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(FakeBot::new())
        }
    }

    pub fn requests(&self) -> Vec<BotSessionRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl BotProvider for FakeBotProvider {
    async fn create(&self, request: BotSessionRequest) -> BotResult<Arc<dyn BotResource>> {
        self.requests.lock().push(request);
        if self.fail {
            return Err(BotError::ConnectionFailed("bot unreachable".to_string()));
        }
        Ok(self.bot.clone())
    }
}
