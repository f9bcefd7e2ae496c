//! Capture-mode arbitration.
//!
//! Decides, for every piece of caller input, whether it reaches a capture
//! engine and which one. All transitions go through [`CaptureArbiter::apply`];
//! at most one engine is live at any time, and an engine leaving the state
//! machine before completing has its cancellation token fired so any result
//! it still delivers is recognized as stale. A completed engine is never
//! cancelled: its result may still be queued or in flight.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::events::SessionEvent;
use crate::core::capture::{
    CaptureCompletion, CaptureContext, CaptureKind, CaptureState, DigitRecognizer,
    DigitRecognizerFactory, SpeechRecognizer, SpeechRecognizerFactory,
};

/// The current engine of a capture plus its own cancellation token.
///
/// A completed engine is replaced lazily by the next input; the replacement
/// gets a fresh token.
pub struct CaptureRun<E: ?Sized> {
    engine: Box<E>,
    token: CancellationToken,
}

impl<E: ?Sized> CaptureRun<E> {
    /// Cancel the engine unless it already produced its outcome
    fn discard(self, state: CaptureState) {
        if state != CaptureState::Complete {
            self.token.cancel();
        }
    }
}

impl CaptureRun<dyn SpeechRecognizer> {
    pub fn engine_state(&self) -> CaptureState {
        self.engine.state()
    }
}

impl CaptureRun<dyn DigitRecognizer> {
    pub fn engine_state(&self) -> CaptureState {
        self.engine.state()
    }
}

/// Turn state of a session
pub enum TurnState {
    /// No engine live; the next input starts one
    Idle,
    ListeningSpeech(CaptureRun<dyn SpeechRecognizer>),
    CapturingDtmf(CaptureRun<dyn DigitRecognizer>),
    /// Bot audio is playing on the peer; caller input is dropped
    Suspended,
    /// `disconnect` sent; no further turn processing
    Disconnecting,
    /// Transport torn down
    Closed,
}

impl TurnState {
    pub fn name(&self) -> &'static str {
        match self {
            TurnState::Idle => "idle",
            TurnState::ListeningSpeech(_) => "listening_speech",
            TurnState::CapturingDtmf(_) => "capturing_dtmf",
            TurnState::Suspended => "suspended",
            TurnState::Disconnecting => "disconnecting",
            TurnState::Closed => "closed",
        }
    }

    /// Neither disconnecting nor closed
    pub fn is_active(&self) -> bool {
        !matches!(self, TurnState::Disconnecting | TurnState::Closed)
    }
}

impl std::fmt::Debug for TurnState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Inputs consumed by the arbiter
#[derive(Debug, Clone, Copy)]
pub enum TurnInput<'a> {
    Audio(&'a [u8]),
    Digit(char),
    PlaybackStarted,
    PlaybackCompleted,
    /// The digit engine delivered its result
    DigitsCompleted,
    Disconnect,
    Close,
}

/// Why an input did not reach an engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Session is disconnecting or closed
    Inactive,
    /// No bot conversation yet
    NoBot,
    /// Keypad capture owns the turn
    CapturingDigits,
    /// Bot audio is playing
    PlaybackActive,
    /// Playback completion without playback
    NotPlaying,
    /// Digit completion without a completed digit engine
    NoDigitCapture,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied,
    Dropped(DropReason),
}

pub struct CaptureArbiter {
    state: TurnState,
    /// Set once the bot conversation exists
    context: Option<CaptureContext>,
    speech: Arc<dyn SpeechRecognizerFactory>,
    digits: Arc<dyn DigitRecognizerFactory>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl CaptureArbiter {
    pub fn new(
        speech: Arc<dyn SpeechRecognizerFactory>,
        digits: Arc<dyn DigitRecognizerFactory>,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            state: TurnState::Idle,
            context: None,
            speech,
            digits,
            events,
        }
    }

    pub fn state(&self) -> &TurnState {
        &self.state
    }

    /// Caller input is captured only after this
    pub fn select_bot(&mut self, context: CaptureContext) {
        self.context = Some(context);
    }

    pub fn has_bot(&self) -> bool {
        self.context.is_some()
    }

    pub fn apply(&mut self, input: TurnInput<'_>) -> Transition {
        if matches!(self.state, TurnState::Closed) {
            return Transition::Dropped(DropReason::Inactive);
        }

        match input {
            TurnInput::Close => {
                self.discard_live();
                self.state = TurnState::Closed;
                Transition::Applied
            }
            TurnInput::Disconnect => {
                self.discard_live();
                self.state = TurnState::Disconnecting;
                Transition::Applied
            }
            _ if matches!(self.state, TurnState::Disconnecting) => {
                Transition::Dropped(DropReason::Inactive)
            }
            TurnInput::Audio(frame) => self.route_audio(frame),
            TurnInput::Digit(digit) => self.route_digit(digit),
            TurnInput::PlaybackStarted => {
                self.discard_live();
                self.state = TurnState::Suspended;
                Transition::Applied
            }
            TurnInput::PlaybackCompleted => {
                if matches!(self.state, TurnState::Suspended) {
                    self.state = TurnState::Idle;
                    Transition::Applied
                } else {
                    Transition::Dropped(DropReason::NotPlaying)
                }
            }
            TurnInput::DigitsCompleted => match &self.state {
                TurnState::CapturingDtmf(run) if run.engine.state() == CaptureState::Complete => {
                    self.state = TurnState::Idle;
                    Transition::Applied
                }
                _ => Transition::Dropped(DropReason::NoDigitCapture),
            },
        }
    }

    /// Cancel the live engine, if any, leaving the state `Idle`
    fn discard_live(&mut self) {
        match std::mem::replace(&mut self.state, TurnState::Idle) {
            TurnState::ListeningSpeech(run) => {
                let state = run.engine_state();
                debug!(%state, "Discarding speech capture");
                run.discard(state);
            }
            TurnState::CapturingDtmf(run) => {
                let state = run.engine_state();
                debug!(%state, "Discarding digit capture");
                run.discard(state);
            }
            other => self.state = other,
        }
    }

    fn route_audio(&mut self, frame: &[u8]) -> Transition {
        let Some(context) = self.context.as_ref() else {
            return Transition::Dropped(DropReason::NoBot);
        };

        if matches!(self.state, TurnState::Idle) {
            let token = CancellationToken::new();
            let completion =
                CaptureCompletion::new(CaptureKind::Speech, token.clone(), self.events.clone());
            let engine = self.speech.create(context, completion);
            self.state = TurnState::ListeningSpeech(CaptureRun { engine, token });
        }

        match &mut self.state {
            TurnState::ListeningSpeech(run) => {
                if run.engine.state() == CaptureState::Complete {
                    run.token = CancellationToken::new();
                    let completion = CaptureCompletion::new(
                        CaptureKind::Speech,
                        run.token.clone(),
                        self.events.clone(),
                    );
                    run.engine = self.speech.create(context, completion);
                }
                run.engine.process_audio(frame);
                Transition::Applied
            }
            TurnState::CapturingDtmf(_) => Transition::Dropped(DropReason::CapturingDigits),
            TurnState::Suspended => Transition::Dropped(DropReason::PlaybackActive),
            _ => Transition::Dropped(DropReason::Inactive),
        }
    }

    fn route_digit(&mut self, digit: char) -> Transition {
        if self.context.is_none() {
            return Transition::Dropped(DropReason::NoBot);
        }

        match self.state {
            TurnState::Suspended => return Transition::Dropped(DropReason::PlaybackActive),
            TurnState::ListeningSpeech(_) => self.discard_live(),
            _ => {}
        }

        if matches!(self.state, TurnState::Idle) {
            let token = CancellationToken::new();
            let completion =
                CaptureCompletion::new(CaptureKind::Digits, token.clone(), self.events.clone());
            let engine = self.digits.create(completion);
            self.state = TurnState::CapturingDtmf(CaptureRun { engine, token });
        }

        match &mut self.state {
            TurnState::CapturingDtmf(run) => {
                if run.engine.state() == CaptureState::Complete {
                    run.token = CancellationToken::new();
                    let completion = CaptureCompletion::new(
                        CaptureKind::Digits,
                        run.token.clone(),
                        self.events.clone(),
                    );
                    run.engine = self.digits.create(completion);
                }
                run.engine.process_digit(digit);
                Transition::Applied
            }
            _ => Transition::Dropped(DropReason::Inactive),
        }
    }
}
