use std::path::PathBuf;

use super::env::{env_var, first_env_var, parse_env, parse_env_bool};
use super::utils::non_empty;
use super::yaml::YamlConfig;
use super::{AuthApiSecret, ServerConfig, TlsConfig, parse_auth_api_secrets_json};
use crate::core::bot::directline::DIRECT_LINE_URL;
use crate::core::session::DEFAULT_MAX_FRAME_SIZE;
use crate::core::stt::openai::OPENAI_STT_URL;
use crate::core::tts::openai::OPENAI_TTS_URL;

/// YAML value, else parsed environment variable, else default
macro_rules! get_value {
    ($yaml:expr, $env:expr, $default:expr) => {
        match $yaml {
            Some(value) => value,
            None => parse_env($env)?.unwrap_or($default),
        }
    };
}

/// YAML value, else parsed environment variable
macro_rules! get_optional {
    ($yaml:expr, $env:expr) => {
        match $yaml {
            Some(value) => Some(value),
            None => parse_env($env)?,
        }
    };
}

/// Build the final configuration from environment variables with optional
/// YAML overrides
///
/// Priority: YAML > environment variables > defaults. The `.env` file is
/// loaded into the environment by `main` before this runs.
pub fn merge_config(
    yaml: Option<YamlConfig>,
) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let yaml = yaml.unwrap_or_default();
    let server = yaml.server.unwrap_or_default();
    let tls_yaml = server.tls.unwrap_or_default();
    let auth = yaml.auth.unwrap_or_default();
    let session = yaml.session.unwrap_or_default();
    let bot = yaml.bot.unwrap_or_default();
    let asr = yaml.asr.unwrap_or_default();
    let tts = yaml.tts.unwrap_or_default();
    let dtmf = yaml.dtmf.unwrap_or_default();
    let security = yaml.security.unwrap_or_default();

    // Server
    let host = get_value!(non_empty(server.host), "HOST", "0.0.0.0".to_string());
    let port = get_value!(server.port, "PORT", 3001);

    let tls_enabled = match tls_yaml.enabled {
        Some(enabled) => enabled,
        None => parse_env_bool("TLS_ENABLED")?.unwrap_or(false),
    };
    let tls = if tls_enabled {
        let cert_path = non_empty(tls_yaml.cert_path)
            .or_else(|| env_var("TLS_CERT_PATH"))
            .ok_or("TLS is enabled but no certificate path is configured")?;
        let key_path = non_empty(tls_yaml.key_path)
            .or_else(|| env_var("TLS_KEY_PATH"))
            .ok_or("TLS is enabled but no private key path is configured")?;
        Some(TlsConfig {
            cert_path: PathBuf::from(cert_path),
            key_path: PathBuf::from(key_path),
        })
    } else {
        None
    };

    // Authentication
    let auth_required = match auth.required {
        Some(required) => required,
        None => parse_env_bool("AUTH_REQUIRED")?.unwrap_or(false),
    };
    let auth_api_secrets = match auth.api_keys {
        Some(keys) => keys
            .into_iter()
            .map(|entry| AuthApiSecret {
                id: entry.id,
                secret: entry.secret,
            })
            .collect(),
        None => auth_secrets_from_env()?,
    };

    // Session
    let max_frame_size = get_value!(
        session.max_frame_size,
        "SESSION_MAX_FRAME_SIZE",
        DEFAULT_MAX_FRAME_SIZE
    );
    let disconnect_grace_secs = get_value!(
        session.disconnect_grace_secs,
        "SESSION_DISCONNECT_GRACE_SECS",
        5
    );
    let idle_timeout_secs = get_value!(session.idle_timeout_secs, "SESSION_IDLE_TIMEOUT_SECS", 60);

    // Bot
    let bot_url = get_value!(non_empty(bot.url), "BOT_URL", DIRECT_LINE_URL.to_string());
    let bot_secret = non_empty(bot.secret).or_else(|| env_var("BOT_SECRET"));
    let bot_poll_interval_ms = get_value!(bot.poll_interval_ms, "BOT_POLL_INTERVAL_MS", 500);
    let bot_reply_timeout_secs = get_value!(bot.reply_timeout_secs, "BOT_REPLY_TIMEOUT_SECS", 30);

    // Transcription
    let asr_url = get_value!(non_empty(asr.url), "ASR_URL", OPENAI_STT_URL.to_string());
    let asr_api_key =
        non_empty(asr.api_key).or_else(|| first_env_var(&["ASR_API_KEY", "OPENAI_API_KEY"]));
    let asr_model = get_value!(non_empty(asr.model), "ASR_MODEL", "whisper-1".to_string());
    let asr_language = get_optional!(non_empty(asr.language), "ASR_LANGUAGE");
    let asr_silence_threshold = get_value!(asr.silence_threshold, "ASR_SILENCE_THRESHOLD", 0.01);
    let asr_silence_ms = get_value!(asr.silence_ms, "ASR_SILENCE_MS", 800);
    let asr_max_utterance_ms = get_value!(asr.max_utterance_ms, "ASR_MAX_UTTERANCE_MS", 15_000);

    // Synthesis
    let tts_url = get_value!(non_empty(tts.url), "TTS_URL", OPENAI_TTS_URL.to_string());
    let tts_api_key =
        non_empty(tts.api_key).or_else(|| first_env_var(&["TTS_API_KEY", "OPENAI_API_KEY"]));
    let tts_model = get_value!(non_empty(tts.model), "TTS_MODEL", "tts-1".to_string());
    let tts_voice = get_value!(non_empty(tts.voice), "TTS_VOICE", "alloy".to_string());

    // Keypad
    let dtmf_terminator = get_value!(
        non_empty(dtmf.terminator),
        "DTMF_TERMINATOR",
        "#".to_string()
    );
    let dtmf_max_digits = get_optional!(dtmf.max_digits, "DTMF_MAX_DIGITS");

    // Security
    let rate_limit_requests_per_second = get_value!(
        security.rate_limit_requests_per_second,
        "RATE_LIMIT_REQUESTS_PER_SECOND",
        60
    );
    let rate_limit_burst_size = get_value!(
        security.rate_limit_burst_size,
        "RATE_LIMIT_BURST_SIZE",
        10
    );
    let max_websocket_connections = get_optional!(
        security.max_websocket_connections,
        "MAX_WEBSOCKET_CONNECTIONS"
    );
    let max_connections_per_ip = get_value!(
        security.max_connections_per_ip,
        "MAX_CONNECTIONS_PER_IP",
        100
    );

    Ok(ServerConfig {
        host,
        port,
        tls,
        auth_required,
        auth_api_secrets,
        max_frame_size,
        disconnect_grace_secs,
        idle_timeout_secs,
        bot_url,
        bot_secret,
        bot_poll_interval_ms,
        bot_reply_timeout_secs,
        asr_url,
        asr_api_key,
        asr_model,
        asr_language,
        asr_silence_threshold,
        asr_silence_ms,
        asr_max_utterance_ms,
        tts_url,
        tts_api_key,
        tts_model,
        tts_voice,
        dtmf_terminator,
        dtmf_max_digits,
        rate_limit_requests_per_second,
        rate_limit_burst_size,
        max_websocket_connections,
        max_connections_per_ip,
    })
}

/// `AUTH_API_SECRETS_JSON` wins over the single `AUTH_API_SECRET`/`AUTH_API_SECRET_ID` pair
fn auth_secrets_from_env() -> Result<Vec<AuthApiSecret>, Box<dyn std::error::Error>> {
    if let Some(json) = env_var("AUTH_API_SECRETS_JSON") {
        return parse_auth_api_secrets_json(&json);
    }
    Ok(match env_var("AUTH_API_SECRET") {
        Some(secret) => vec![AuthApiSecret {
            id: env_var("AUTH_API_SECRET_ID").unwrap_or_else(|| "default".to_string()),
            secret,
        }],
        None => Vec::new(),
    })
}
