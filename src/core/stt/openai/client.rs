//! OpenAI-compatible speech recognizer.
//!
//! # Architecture
//!
//! Whisper-style APIs are request/response, not streaming. This recognizer:
//!
//! 1. Decodes each caller frame (μ-law or L16) to linear PCM and buffers it
//! 2. Runs an energy endpointer over the frames to find the end of the utterance
//! 3. Wraps the utterance as WAV and uploads it on a spawned task
//! 4. Reports the transcript through its one-shot completion handle
//!
//! The recognizer is `Complete` as soon as the upload is dispatched; the
//! session lazily creates a fresh one for the next utterance.

use std::sync::Arc;

use reqwest::Client;
use reqwest::multipart::{Form, Part};
use tracing::{debug, info, warn};

use super::config::{OpenAISTTConfig, language_code};
use super::messages::{OpenAIErrorResponse, TranscriptionResponse};
use crate::core::audio::{AudioEncoding, rms, wav};
use crate::core::capture::{
    CaptureCompletion, CaptureContext, CaptureError, CaptureOutcome, CaptureState,
    SpeechRecognizer, SpeechRecognizerFactory,
};

/// Everything the upload task needs, detached from the recognizer
struct TranscriptionRequest {
    http_client: Client,
    config: Arc<OpenAISTTConfig>,
    language: Option<String>,
    sample_rate: u32,
}

impl TranscriptionRequest {
    async fn transcribe(self, samples: Vec<i16>) -> CaptureOutcome {
        let wav_data = wav::encode_wav(&samples, self.sample_rate)
            .map_err(|e| CaptureError::AudioProcessing(format!("WAV encoding failed: {e}")))?;

        info!(
            "Sending {} bytes of audio to transcription API",
            wav_data.len()
        );

        let file_part = Part::bytes(wav_data)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| CaptureError::Transcription(format!("Invalid MIME type: {e}")))?;

        let mut form = Form::new()
            .part("file", file_part)
            .text("model", self.config.model.as_str().to_string())
            .text("response_format", "json");

        if let Some(language) = self.language {
            form = form.text("language", language);
        }
        if let Some(ref prompt) = self.config.prompt {
            form = form.text("prompt", prompt.clone());
        }

        let response = self
            .http_client
            .post(&self.config.api_url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .multipart(form)
            .send()
            .await
            .map_err(|e| CaptureError::Transcription(format!("Request failed: {e}")))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| CaptureError::Transcription(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            let error_msg = if let Ok(error_response) =
                serde_json::from_str::<OpenAIErrorResponse>(&response_text)
            {
                format!("API error: {}", error_response.error)
            } else {
                format!("API error ({status}): {response_text}")
            };
            return Err(CaptureError::Transcription(error_msg));
        }

        let parsed: TranscriptionResponse = serde_json::from_str(&response_text)
            .map_err(|e| CaptureError::Transcription(format!("Unexpected response: {e}")))?;

        let transcript = parsed.text.trim().to_string();
        info!("Transcription complete: {} characters", transcript.len());
        Ok(transcript)
    }
}

/// One utterance worth of speech recognition
pub struct OpenAISTT {
    http_client: Client,
    config: Arc<OpenAISTTConfig>,
    encoding: AudioEncoding,
    sample_rate: u32,
    language: Option<String>,

    /// Buffered utterance audio (linear PCM)
    samples: Vec<i16>,
    /// Samples received in total, including trimmed leading silence
    received_samples: usize,
    /// Consecutive silent samples since the last speech frame
    trailing_silence: usize,
    heard_speech: bool,

    state: CaptureState,
    completion: Option<CaptureCompletion>,
}

impl OpenAISTT {
    pub fn new(
        http_client: Client,
        config: Arc<OpenAISTTConfig>,
        context: &CaptureContext,
        completion: CaptureCompletion,
    ) -> Self {
        let language = context
            .language
            .as_deref()
            .and_then(language_code)
            .or_else(|| config.language.clone());

        Self {
            http_client,
            encoding: context.media.format,
            sample_rate: context.media.rate,
            language,
            config,
            samples: Vec::new(),
            received_samples: 0,
            trailing_silence: 0,
            heard_speech: false,
            state: CaptureState::Idle,
            completion: Some(completion),
        }
    }

    fn ms_to_samples(&self, ms: u32) -> usize {
        (self.sample_rate as usize * ms as usize) / 1000
    }

    /// Keep only `pre_roll_ms` of audio while waiting for speech to start
    fn trim_leading_silence(&mut self) {
        let keep = self.ms_to_samples(self.config.silence_detection.pre_roll_ms);
        if self.samples.len() > keep {
            let excess = self.samples.len() - keep;
            self.samples.drain(..excess);
        }
    }

    /// Update endpointing with one decoded frame.
    ///
    /// Returns true once the utterance is over.
    fn update_endpoint(&mut self, frame: &[i16]) -> bool {
        let silence = &self.config.silence_detection;
        let is_silent = rms(frame) < silence.rms_threshold;

        if is_silent {
            if self.heard_speech {
                self.trailing_silence += frame.len();
            }
        } else {
            if !self.heard_speech {
                debug!("Speech started");
            }
            self.heard_speech = true;
            self.trailing_silence = 0;
        }

        if self.heard_speech {
            if self.trailing_silence >= self.ms_to_samples(silence.silence_duration_ms) {
                debug!(
                    "Silence duration threshold reached ({}ms), ending utterance",
                    silence.silence_duration_ms
                );
                return true;
            }
            if self.samples.len() >= self.ms_to_samples(silence.max_utterance_ms) {
                debug!("Maximum utterance length reached, ending utterance");
                return true;
            }
        } else if silence.no_input_timeout_ms > 0
            && self.received_samples >= self.ms_to_samples(silence.no_input_timeout_ms)
        {
            return true;
        }

        false
    }

    fn dispatch(&mut self) {
        self.state = CaptureState::Complete;
        let Some(completion) = self.completion.take() else {
            return;
        };

        if !self.heard_speech {
            debug!("No speech detected, completing with empty transcript");
            completion.finish(Ok(String::new()));
            return;
        }

        let samples = std::mem::take(&mut self.samples);
        let request = TranscriptionRequest {
            http_client: self.http_client.clone(),
            config: self.config.clone(),
            language: self.language.clone(),
            sample_rate: self.sample_rate,
        };

        tokio::spawn(async move {
            let outcome = request.transcribe(samples).await;
            if let Err(ref e) = outcome {
                warn!("Transcription failed: {}", e);
            }
            completion.finish(outcome);
        });
    }
}

impl SpeechRecognizer for OpenAISTT {
    fn process_audio(&mut self, audio: &[u8]) {
        if self.state == CaptureState::Complete {
            return;
        }
        self.state = CaptureState::Capturing;

        let frame = self.encoding.decode(audio);
        self.received_samples += frame.len();
        self.samples.extend_from_slice(&frame);

        let finished = self.update_endpoint(&frame);
        if !self.heard_speech {
            self.trim_leading_silence();
        }
        if finished {
            self.dispatch();
        }
    }

    fn state(&self) -> CaptureState {
        self.state
    }
}

/// Builds an [`OpenAISTT`] per utterance, sharing one HTTP connection pool
pub struct OpenAISTTFactory {
    http_client: Client,
    config: Arc<OpenAISTTConfig>,
}

impl OpenAISTTFactory {
    pub fn new(config: OpenAISTTConfig) -> Result<Self, String> {
        config.validate()?;
        let http_client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {e}"))?;
        Ok(Self {
            http_client,
            config: Arc::new(config),
        })
    }
}

impl SpeechRecognizerFactory for OpenAISTTFactory {
    fn create(
        &self,
        context: &CaptureContext,
        completion: CaptureCompletion,
    ) -> Box<dyn SpeechRecognizer> {
        Box::new(OpenAISTT::new(
            self.http_client.clone(),
            self.config.clone(),
            context,
            completion,
        ))
    }
}
