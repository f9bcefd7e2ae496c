//! Capture engine contract.
//!
//! A capture engine (speech recognizer or keypad collector) consumes caller
//! input incrementally and produces exactly one outcome per lifecycle: a
//! final text or an error. Engines report that outcome through a
//! [`CaptureCompletion`], which is consumed on use, so a second report is
//! impossible by construction.

use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::core::protocol::MediaParameter;
use crate::core::session::SessionEvent;

/// Lifecycle of one capture engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// Created, no input consumed yet
    Idle,
    /// Input consumed, no outcome reported yet
    Capturing,
    /// Outcome reported (or dispatched); the engine accepts no more input
    Complete,
}

impl std::fmt::Display for CaptureState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureState::Idle => write!(f, "idle"),
            CaptureState::Capturing => write!(f, "capturing"),
            CaptureState::Complete => write!(f, "complete"),
        }
    }
}

/// Which engine produced an outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureKind {
    Speech,
    Digits,
}

impl std::fmt::Display for CaptureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureKind::Speech => write!(f, "speech"),
            CaptureKind::Digits => write!(f, "digits"),
        }
    }
}

/// Errors a capture engine can report
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CaptureError {
    #[error("Invalid DTMF digit: {0:?}")]
    InvalidDigit(char),

    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("Audio processing error: {0}")]
    AudioProcessing(String),
}

/// Final text of a capture, or the reason it failed
pub type CaptureOutcome = Result<String, CaptureError>;

/// Outcome delivered to the session
pub struct CaptureEvent {
    pub kind: CaptureKind,
    pub outcome: CaptureOutcome,
    token: CancellationToken,
}

impl CaptureEvent {
    /// The engine was discarded before this outcome was handled
    pub fn is_stale(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// One-shot handle an engine uses to report its outcome
pub struct CaptureCompletion {
    kind: CaptureKind,
    token: CancellationToken,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl CaptureCompletion {
    pub fn new(
        kind: CaptureKind,
        token: CancellationToken,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            kind,
            token,
            events,
        }
    }

    pub fn kind(&self) -> CaptureKind {
        self.kind
    }

    /// True once the session has discarded the owning engine
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Report the outcome. Consumes the handle.
    pub fn finish(self, outcome: CaptureOutcome) {
        let event = CaptureEvent {
            kind: self.kind,
            outcome,
            token: self.token,
        };
        // The session may already be gone; nothing left to notify then
        let _ = self.events.send(SessionEvent::Capture(event));
    }
}

/// Per-call parameters handed to speech engines
#[derive(Debug, Clone)]
pub struct CaptureContext {
    pub session_id: String,
    pub media: MediaParameter,
    pub language: Option<String>,
}

/// Incremental speech recognizer
pub trait SpeechRecognizer: Send {
    /// Feed one frame of caller audio, encoded per the negotiated media
    fn process_audio(&mut self, audio: &[u8]);

    fn state(&self) -> CaptureState;
}

/// Incremental keypad collector
pub trait DigitRecognizer: Send {
    fn process_digit(&mut self, digit: char);

    fn state(&self) -> CaptureState;
}

/// Creates a fresh speech recognizer for each capture
pub trait SpeechRecognizerFactory: Send + Sync {
    fn create(
        &self,
        context: &CaptureContext,
        completion: CaptureCompletion,
    ) -> Box<dyn SpeechRecognizer>;
}

/// Creates a fresh keypad collector for each capture
pub trait DigitRecognizerFactory: Send + Sync {
    fn create(&self, completion: CaptureCompletion) -> Box<dyn DigitRecognizer>;
}
