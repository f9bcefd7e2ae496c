use serde::Deserialize;
use std::path::PathBuf;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present in
/// the file win over environment variables, which win over defaults.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 3001
///   tls:
///     enabled: true
///     cert_path: "/etc/connector/cert.pem"
///     key_path: "/etc/connector/key.pem"
///
/// auth:
///   required: true
///   api_keys:
///     - id: "telephony-eu"
///       secret: "your-api-key"
///
/// session:
///   max_frame_size: 64000
///   disconnect_grace_secs: 5
///   idle_timeout_secs: 60
///
/// bot:
///   url: "https://directline.botframework.com"
///   secret: "direct-line-secret"
///   poll_interval_ms: 500
///   reply_timeout_secs: 30
///
/// asr:
///   url: "https://api.openai.com/v1/audio/transcriptions"
///   api_key: "sk-..."
///   model: "whisper-1"
///   language: "en"
///   silence_threshold: 0.01
///   silence_ms: 800
///   max_utterance_ms: 15000
///
/// tts:
///   url: "https://api.openai.com/v1/audio/speech"
///   api_key: "sk-..."
///   model: "tts-1"
///   voice: "alloy"
///
/// dtmf:
///   terminator: "#"
///   max_digits: 16
///
/// security:
///   rate_limit_requests_per_second: 60
///   rate_limit_burst_size: 10
///   max_websocket_connections: 500
///   max_connections_per_ip: 100
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub auth: Option<AuthYaml>,
    pub session: Option<SessionYaml>,
    pub bot: Option<BotYaml>,
    pub asr: Option<AsrYaml>,
    pub tts: Option<TtsYaml>,
    pub dtmf: Option<DtmfYaml>,
    pub security: Option<SecurityYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls: Option<TlsYaml>,
}

/// TLS configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TlsYaml {
    pub enabled: Option<bool>,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

/// API key entry from YAML
#[derive(Debug, Clone, Deserialize)]
pub struct AuthApiSecretYaml {
    pub id: String,
    pub secret: String,
}

/// Authentication configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AuthYaml {
    pub required: Option<bool>,
    pub api_keys: Option<Vec<AuthApiSecretYaml>>,
}

/// Per-connection session tunables from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SessionYaml {
    pub max_frame_size: Option<usize>,
    pub disconnect_grace_secs: Option<u64>,
    pub idle_timeout_secs: Option<u64>,
}

/// Direct Line bot configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct BotYaml {
    pub url: Option<String>,
    pub secret: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub reply_timeout_secs: Option<u64>,
}

/// Transcription configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AsrYaml {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub language: Option<String>,
    pub silence_threshold: Option<f32>,
    pub silence_ms: Option<u32>,
    pub max_utterance_ms: Option<u32>,
}

/// Speech synthesis configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TtsYaml {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub voice: Option<String>,
}

/// Keypad capture configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct DtmfYaml {
    /// Kept as a string so a multi-character value is reported by validation
    pub terminator: Option<String>,
    pub max_digits: Option<usize>,
}

/// Security configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    pub rate_limit_requests_per_second: Option<u32>,
    pub rate_limit_burst_size: Option<u32>,
    pub max_websocket_connections: Option<usize>,
    pub max_connections_per_ip: Option<u32>,
}

impl YamlConfig {
    /// Load YAML configuration from a file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or the YAML is malformed
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig =
            serde_yaml::from_str(&contents).map_err(|e| format!("Failed to parse YAML: {e}"))?;

        Ok(config)
    }
}
