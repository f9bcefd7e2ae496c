//! Configuration module for the audio connector gateway
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//! The configuration is split into logical submodules for maintainability.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//! - `utils`: Utility functions for configuration parsing
//!
//! # Example
//! ```rust,no_run
//! use audio_connector_gateway::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

mod env;
mod merge;
mod utils;
mod validation;
mod yaml;

use crate::core::bot::DirectLineConfig;
use crate::core::capture::DtmfCollectorConfig;
use crate::core::session::SessionSettings;
use crate::core::stt::openai::{OpenAISTTConfig, OpenAISTTModel, SilenceDetectionConfig};
use crate::core::tts::openai::{OpenAISynthesizerConfig, OpenAITTSModel};

/// TLS configuration for HTTPS and WSS
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// API key accepted on the `X-API-KEY` header, with a client identifier
#[derive(Clone, PartialEq, Eq)]
pub struct AuthApiSecret {
    pub id: String,
    pub secret: String,
}

impl std::fmt::Debug for AuthApiSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthApiSecret")
            .field("id", &self.id)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Server configuration
///
/// Contains all configuration needed to run the gateway, including:
/// - Server settings (host, port, TLS)
/// - Authentication of telephony nodes
/// - Per-connection session tunables
/// - The Direct Line bot, transcription and synthesis backends
/// - Keypad capture settings
/// - Security settings (rate limiting, connection limits)
#[derive(Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // TLS configuration (optional)
    pub tls: Option<TlsConfig>,

    // Authentication configuration
    pub auth_required: bool,
    pub auth_api_secrets: Vec<AuthApiSecret>,

    // Session settings
    /// Largest outbound binary frame; longer audio is split
    pub max_frame_size: usize,
    /// Time the peer gets to answer a `disconnect` with `close`
    pub disconnect_grace_secs: u64,
    /// A connection with no inbound traffic for this long is closed
    pub idle_timeout_secs: u64,

    // Bot (Direct Line)
    pub bot_url: String,
    pub bot_secret: Option<String>,
    pub bot_poll_interval_ms: u64,
    pub bot_reply_timeout_secs: u64,

    // Transcription
    pub asr_url: String,
    pub asr_api_key: Option<String>,
    pub asr_model: String,
    /// Fallback language hint when the call does not carry one
    pub asr_language: Option<String>,
    /// RMS level (0.0..=1.0) below which caller audio counts as silence
    pub asr_silence_threshold: f32,
    pub asr_silence_ms: u32,
    pub asr_max_utterance_ms: u32,

    // Synthesis (disabled without an API key)
    pub tts_url: String,
    pub tts_api_key: Option<String>,
    pub tts_model: String,
    pub tts_voice: String,

    // Keypad capture
    pub dtmf_terminator: String,
    pub dtmf_max_digits: Option<usize>,

    // Rate limiting configuration
    /// Maximum requests per second per IP address
    /// Default: 60
    pub rate_limit_requests_per_second: u32,
    /// Maximum burst size for rate limiting
    /// Default: 10
    pub rate_limit_burst_size: u32,

    // Connection limits
    /// Maximum concurrent WebSocket connections
    /// Default: None (unlimited)
    pub max_websocket_connections: Option<usize>,
    /// Maximum connections per IP address
    /// Default: 100
    pub max_connections_per_ip: u32,
}

/// Zeroize every secret when the configuration is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut secret) = self.bot_secret {
            secret.zeroize();
        }
        if let Some(ref mut key) = self.asr_api_key {
            key.zeroize();
        }
        if let Some(ref mut key) = self.tts_api_key {
            key.zeroize();
        }
        for secret in &mut self.auth_api_secrets {
            secret.secret.zeroize();
        }
    }
}

fn redacted(secret: &Option<String>) -> Option<&'static str> {
    secret.as_ref().map(|_| "[REDACTED]")
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("tls", &self.tls)
            .field("auth_required", &self.auth_required)
            .field("auth_api_secrets", &self.auth_api_secrets)
            .field("max_frame_size", &self.max_frame_size)
            .field("disconnect_grace_secs", &self.disconnect_grace_secs)
            .field("idle_timeout_secs", &self.idle_timeout_secs)
            .field("bot_url", &self.bot_url)
            .field("bot_secret", &redacted(&self.bot_secret))
            .field("bot_poll_interval_ms", &self.bot_poll_interval_ms)
            .field("bot_reply_timeout_secs", &self.bot_reply_timeout_secs)
            .field("asr_url", &self.asr_url)
            .field("asr_api_key", &redacted(&self.asr_api_key))
            .field("asr_model", &self.asr_model)
            .field("asr_language", &self.asr_language)
            .field("asr_silence_threshold", &self.asr_silence_threshold)
            .field("asr_silence_ms", &self.asr_silence_ms)
            .field("asr_max_utterance_ms", &self.asr_max_utterance_ms)
            .field("tts_url", &self.tts_url)
            .field("tts_api_key", &redacted(&self.tts_api_key))
            .field("tts_model", &self.tts_model)
            .field("tts_voice", &self.tts_voice)
            .field("dtmf_terminator", &self.dtmf_terminator)
            .field("dtmf_max_digits", &self.dtmf_max_digits)
            .field(
                "rate_limit_requests_per_second",
                &self.rate_limit_requests_per_second,
            )
            .field("rate_limit_burst_size", &self.rate_limit_burst_size)
            .field("max_websocket_connections", &self.max_websocket_connections)
            .field("max_connections_per_ip", &self.max_connections_per_ip)
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables (and `.env`) only
    ///
    /// # Errors
    /// Returns an error if a variable has an invalid format or validation fails
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = merge::merge_config(None)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// After loading and merging, performs validation on the final configuration.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    ///
    /// # Example
    /// ```rust,no_run
    /// use audio_connector_gateway::config::ServerConfig;
    /// use std::path::PathBuf;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let config_path = PathBuf::from("config.yaml");
    /// let config = ServerConfig::from_file(&config_path)?;
    /// println!("Server listening on {}", config.address());
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        // .env is loaded into the environment by main before this runs
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        validation::validate_max_frame_size(self.max_frame_size)?;
        validation::validate_auth_api_secrets(&self.auth_api_secrets)?;
        validation::validate_auth_required(self.auth_required, &self.auth_api_secrets)?;
        validation::validate_bot_secret(&self.bot_secret)?;
        validation::validate_asr_api_key(&self.asr_api_key)?;
        validation::validate_dtmf_terminator(&self.dtmf_terminator)?;
        validation::validate_backend_url("bot.url", &self.bot_url)?;
        validation::validate_backend_url("asr.url", &self.asr_url)?;
        validation::validate_backend_url("tts.url", &self.tts_url)?;
        Ok(())
    }

    /// Get the server address as a string
    ///
    /// Returns the address in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if TLS is enabled
    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// Find the client identifier whose API key matches `token`
    ///
    /// Every configured key is compared in constant time.
    pub fn find_api_secret_id(&self, token: &str) -> Option<&str> {
        crate::auth::match_api_secret_id(&self.auth_api_secrets, token)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            max_frame_size: self.max_frame_size,
            disconnect_grace: Duration::from_secs(self.disconnect_grace_secs),
        }
    }

    pub fn direct_line_config(&self) -> DirectLineConfig {
        DirectLineConfig {
            base_url: self.bot_url.clone(),
            secret: self.bot_secret.clone().unwrap_or_default(),
            poll_interval: Duration::from_millis(self.bot_poll_interval_ms),
            reply_timeout: Duration::from_secs(self.bot_reply_timeout_secs),
            ..DirectLineConfig::default()
        }
    }

    pub fn stt_config(&self) -> OpenAISTTConfig {
        OpenAISTTConfig {
            api_url: self.asr_url.clone(),
            api_key: self.asr_api_key.clone().unwrap_or_default(),
            model: OpenAISTTModel::from_str_or_default(&self.asr_model),
            language: self.asr_language.clone(),
            silence_detection: SilenceDetectionConfig {
                rms_threshold: self.asr_silence_threshold,
                silence_duration_ms: self.asr_silence_ms,
                max_utterance_ms: self.asr_max_utterance_ms,
                ..SilenceDetectionConfig::default()
            },
            ..OpenAISTTConfig::default()
        }
    }

    /// Synthesis settings, or `None` when no TTS key is configured
    pub fn tts_config(&self) -> Option<OpenAISynthesizerConfig> {
        let api_key = self.tts_api_key.clone()?;
        Some(OpenAISynthesizerConfig {
            api_url: self.tts_url.clone(),
            api_key,
            model: OpenAITTSModel::from_str_or_default(&self.tts_model),
            voice: self.tts_voice.clone(),
            ..OpenAISynthesizerConfig::default()
        })
    }

    pub fn dtmf_config(&self) -> DtmfCollectorConfig {
        DtmfCollectorConfig {
            terminator: self.dtmf_terminator.chars().next().unwrap_or('#'),
            max_digits: self.dtmf_max_digits,
        }
    }
}

pub(crate) fn parse_auth_api_secrets_json(
    json_str: &str,
) -> Result<Vec<AuthApiSecret>, Box<dyn std::error::Error>> {
    #[derive(serde::Deserialize)]
    struct AuthApiSecretJson {
        id: String,
        secret: String,
    }

    let secrets: Vec<AuthApiSecretJson> = serde_json::from_str(json_str)
        .map_err(|e| format!("Invalid AUTH_API_SECRETS_JSON format: {e}"))?;

    Ok(secrets
        .into_iter()
        .map(|entry| AuthApiSecret {
            id: entry.id,
            secret: entry.secret,
        })
        .collect())
}
