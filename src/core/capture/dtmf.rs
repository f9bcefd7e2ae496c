//! Keypad digit collection.

use tracing::debug;

use super::base::{
    CaptureCompletion, CaptureError, CaptureOutcome, CaptureState, DigitRecognizer,
    DigitRecognizerFactory,
};

/// When a digit capture ends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DtmfCollectorConfig {
    /// Key that ends the capture; it is not part of the result
    pub terminator: char,
    /// Capture ends once this many digits were collected
    pub max_digits: Option<usize>,
}

impl Default for DtmfCollectorConfig {
    fn default() -> Self {
        Self {
            terminator: '#',
            max_digits: None,
        }
    }
}

/// Keys a telephone keypad can send
pub fn is_dtmf_digit(c: char) -> bool {
    matches!(c, '0'..='9' | '*' | '#')
}

/// Collects keypad digits until the terminator or the digit limit
pub struct DtmfCollector {
    config: DtmfCollectorConfig,
    digits: String,
    state: CaptureState,
    completion: Option<CaptureCompletion>,
}

impl DtmfCollector {
    pub fn new(config: DtmfCollectorConfig, completion: CaptureCompletion) -> Self {
        Self {
            config,
            digits: String::new(),
            state: CaptureState::Idle,
            completion: Some(completion),
        }
    }

    fn complete(&mut self, outcome: CaptureOutcome) {
        self.state = CaptureState::Complete;
        if let Some(completion) = self.completion.take() {
            completion.finish(outcome);
        }
    }
}

impl DigitRecognizer for DtmfCollector {
    fn process_digit(&mut self, digit: char) {
        if self.state == CaptureState::Complete {
            debug!(digit = %digit, "Digit capture already complete, ignoring digit");
            return;
        }
        self.state = CaptureState::Capturing;

        if !is_dtmf_digit(digit) {
            self.complete(Err(CaptureError::InvalidDigit(digit)));
            return;
        }

        if digit == self.config.terminator {
            let digits = std::mem::take(&mut self.digits);
            self.complete(Ok(digits));
            return;
        }

        self.digits.push(digit);
        if self
            .config
            .max_digits
            .is_some_and(|max| self.digits.len() >= max)
        {
            let digits = std::mem::take(&mut self.digits);
            self.complete(Ok(digits));
        }
    }

    fn state(&self) -> CaptureState {
        self.state
    }
}

/// Builds a [`DtmfCollector`] per capture
#[derive(Debug, Clone, Default)]
pub struct DtmfCollectorFactory {
    config: DtmfCollectorConfig,
}

impl DtmfCollectorFactory {
    pub fn new(config: DtmfCollectorConfig) -> Self {
        Self { config }
    }
}

impl DigitRecognizerFactory for DtmfCollectorFactory {
    fn create(&self, completion: CaptureCompletion) -> Box<dyn DigitRecognizer> {
        Box::new(DtmfCollector::new(self.config.clone(), completion))
    }
}
