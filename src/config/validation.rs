use url::Url;

use super::AuthApiSecret;
use crate::core::capture::is_dtmf_digit;

/// Frames must be able to carry at least one byte
pub fn validate_max_frame_size(max_frame_size: usize) -> Result<(), Box<dyn std::error::Error>> {
    if max_frame_size == 0 {
        return Err("session.max_frame_size must be greater than zero".into());
    }
    Ok(())
}

/// Every API key entry needs an id and a secret, and ids must be unique
pub fn validate_auth_api_secrets(
    secrets: &[AuthApiSecret],
) -> Result<(), Box<dyn std::error::Error>> {
    for (index, entry) in secrets.iter().enumerate() {
        if entry.id.trim().is_empty() {
            return Err(format!("auth.api_keys[{index}] has an empty id").into());
        }
        if entry.secret.trim().is_empty() {
            return Err(format!("auth.api_keys[{index}] ({}) has an empty secret", entry.id).into());
        }
        if secrets[..index].iter().any(|other| other.id == entry.id) {
            return Err(format!("auth.api_keys id '{}' is configured twice", entry.id).into());
        }
    }
    Ok(())
}

/// Required authentication needs at least one key to check against
pub fn validate_auth_required(
    auth_required: bool,
    secrets: &[AuthApiSecret],
) -> Result<(), Box<dyn std::error::Error>> {
    if auth_required && secrets.is_empty() {
        return Err(
            "auth.required is true but no API keys are configured \
             (set auth.api_keys, AUTH_API_SECRETS_JSON or AUTH_API_SECRET)"
                .into(),
        );
    }
    Ok(())
}

pub fn validate_bot_secret(secret: &Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    if secret.is_none() {
        return Err("bot.secret (BOT_SECRET) is required to reach the Direct Line bot".into());
    }
    Ok(())
}

pub fn validate_asr_api_key(api_key: &Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    if api_key.is_none() {
        return Err("asr.api_key (ASR_API_KEY or OPENAI_API_KEY) is required".into());
    }
    Ok(())
}

/// Backend endpoints must be absolute http(s) URLs with a host
pub fn validate_backend_url(field: &str, value: &str) -> Result<(), Box<dyn std::error::Error>> {
    let url = Url::parse(value).map_err(|e| format!("{field} is not a valid URL ({value}): {e}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("{field} must use http or https, got '{}'", url.scheme()).into());
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(format!("{field} must have a host").into());
    }
    Ok(())
}

/// The terminator is one keypad key
pub fn validate_dtmf_terminator(terminator: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut chars = terminator.chars();
    match (chars.next(), chars.next()) {
        (Some(key), None) if is_dtmf_digit(key) => Ok(()),
        _ => Err(format!("dtmf.terminator must be a single keypad key, got '{terminator}'").into()),
    }
}
