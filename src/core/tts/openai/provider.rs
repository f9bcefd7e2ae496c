//! OpenAI-compatible speech synthesis.
//!
//! # API Reference
//!
//! - Endpoint: `POST {api_url}` (default `https://api.openai.com/v1/audio/speech`)
//! - Request: `{"model", "input", "voice", "response_format": "pcm", "speed"?}`
//! - Output: raw PCM, 24kHz 16-bit mono little-endian
//!
//! The PCM is resampled to the call's media rate and encoded for the call's
//! sample format before it is handed back.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, info};

use super::config::{OPENAI_PCM_SAMPLE_RATE, OpenAISynthesizerConfig};
use crate::core::audio::{pcm16_from_le_bytes, resample};
use crate::core::protocol::MediaParameter;
use crate::core::tts::base::{Synthesizer, TTSError, TTSResult};

pub struct OpenAISynthesizer {
    http_client: Client,
    config: OpenAISynthesizerConfig,
}

impl OpenAISynthesizer {
    pub fn new(config: OpenAISynthesizerConfig) -> TTSResult<Self> {
        if config.api_key.is_empty() {
            return Err(TTSError::InvalidConfiguration(
                "API key is required for speech synthesis".to_string(),
            ));
        }

        let http_client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| TTSError::InvalidConfiguration(format!("HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            config,
        })
    }

    pub fn config(&self) -> &OpenAISynthesizerConfig {
        &self.config
    }

    fn build_request_body(&self, text: &str) -> serde_json::Value {
        let mut body = json!({
            "model": self.config.model.as_str(),
            "input": text,
            "voice": self.config.voice,
            "response_format": "pcm",
        });

        let speed = self.config.speed.clamp(0.25, 4.0);
        if (speed - 1.0).abs() > 0.001 {
            body["speed"] = json!(speed);
        }
        body
    }
}

#[async_trait]
impl Synthesizer for OpenAISynthesizer {
    async fn synthesize(&self, text: &str, media: &MediaParameter) -> TTSResult<Bytes> {
        debug!(chars = text.len(), model = %self.config.model, "Requesting speech synthesis");

        let response = self
            .http_client
            .post(&self.config.api_url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&self.build_request_body(text))
            .send()
            .await
            .map_err(|e| TTSError::NetworkError(format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = format!("Speech API error ({status}): {body}");
            return Err(if status.as_u16() == 401 {
                TTSError::AuthenticationFailed(message)
            } else {
                TTSError::ProviderError(message)
            });
        }

        let pcm = response
            .bytes()
            .await
            .map_err(|e| TTSError::NetworkError(format!("Failed to read response: {e}")))?;
        if pcm.is_empty() {
            return Err(TTSError::AudioProcessingError(
                "Speech API returned no audio".to_string(),
            ));
        }

        let samples = pcm16_from_le_bytes(&pcm);
        let resampled = resample(&samples, OPENAI_PCM_SAMPLE_RATE, media.rate);
        let encoded = media.format.encode(&resampled);

        info!(
            input_bytes = pcm.len(),
            output_bytes = encoded.len(),
            format = %media.format,
            "Speech synthesis complete"
        );
        Ok(Bytes::from(encoded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::audio::AudioEncoding;
    use crate::core::tts::openai::config::OpenAITTSModel;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn media(format: AudioEncoding) -> MediaParameter {
        MediaParameter {
            media_type: "audio".to_string(),
            format,
            channels: vec!["external".to_string()],
            rate: 8000,
        }
    }

    fn synthesizer(server: &MockServer) -> OpenAISynthesizer {
        OpenAISynthesizer::new(OpenAISynthesizerConfig {
            api_url: format!("{}/v1/audio/speech", server.uri()),
            api_key: "test-key".to_string(),
            model: OpenAITTSModel::Tts1,
            voice: "nova".to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_requires_api_key() {
        let result = OpenAISynthesizer::new(OpenAISynthesizerConfig::default());
        assert!(matches!(result, Err(TTSError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_speed_only_sent_when_not_default() {
        let mut config = OpenAISynthesizerConfig {
            api_key: "k".to_string(),
            ..Default::default()
        };
        let body = OpenAISynthesizer::new(config.clone())
            .unwrap()
            .build_request_body("hi");
        assert!(body.get("speed").is_none());
        assert_eq!(body["response_format"], "pcm");

        config.speed = 9.0;
        let body = OpenAISynthesizer::new(config).unwrap().build_request_body("hi");
        assert_eq!(body["speed"], 4.0);
    }

    #[tokio::test]
    async fn test_synthesize_downsamples_and_encodes_pcmu() {
        let server = MockServer::start().await;
        // Six silent 24kHz samples become two 8kHz μ-law bytes
        Mock::given(method("POST"))
            .and(path("/v1/audio/speech"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(json!({
                "model": "tts-1",
                "voice": "nova",
                "input": "Hello caller",
                "response_format": "pcm"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 12]))
            .expect(1)
            .mount(&server)
            .await;

        let audio = synthesizer(&server)
            .synthesize("Hello caller", &media(AudioEncoding::Pcmu))
            .await
            .unwrap();
        assert_eq!(audio.as_ref(), &[0xFF, 0xFF]);
    }

    #[tokio::test]
    async fn test_synthesize_l16_keeps_two_bytes_per_sample() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 24]))
            .mount(&server)
            .await;

        let audio = synthesizer(&server)
            .synthesize("Hi", &media(AudioEncoding::L16))
            .await
            .unwrap();
        assert_eq!(audio.len(), 8);
    }

    #[tokio::test]
    async fn test_unauthorized_maps_to_authentication_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let err = synthesizer(&server)
            .synthesize("Hi", &media(AudioEncoding::Pcmu))
            .await
            .unwrap_err();
        assert!(matches!(err, TTSError::AuthenticationFailed(_)));
    }

    #[tokio::test]
    async fn test_server_error_maps_to_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = synthesizer(&server)
            .synthesize("Hi", &media(AudioEncoding::Pcmu))
            .await
            .unwrap_err();
        assert!(matches!(err, TTSError::ProviderError(_)));
    }
}
