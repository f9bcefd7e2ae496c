//! Caller input capture: the engine contract plus the keypad collector.
//!
//! Speech recognition lives in [`crate::core::stt`] and implements the same
//! [`SpeechRecognizer`] contract.

pub mod base;
pub mod dtmf;

pub use base::{
    CaptureCompletion, CaptureContext, CaptureError, CaptureEvent, CaptureKind, CaptureOutcome,
    CaptureState, DigitRecognizer, DigitRecognizerFactory, SpeechRecognizer,
    SpeechRecognizerFactory,
};
pub use dtmf::{DtmfCollector, DtmfCollectorConfig, DtmfCollectorFactory, is_dtmf_digit};
