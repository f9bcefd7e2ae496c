//! API key authentication for telephony nodes.
//!
//! Nodes present their key on the `X-API-KEY` header of the WebSocket
//! upgrade request. `Authorization: Bearer <key>` is accepted as well.

use http::HeaderMap;
use subtle::ConstantTimeEq;

use crate::config::AuthApiSecret;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Key presented on the request, if any
pub fn extract_api_key(headers: &HeaderMap) -> Option<&str> {
    if let Some(value) = headers.get(API_KEY_HEADER) {
        return value.to_str().ok().map(str::trim);
    }
    headers
        .get(http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
}

/// Identifier of the configured secret equal to `token`
///
/// Every entry is compared so timing does not reveal which one matched.
pub fn match_api_secret_id<'a>(secrets: &'a [AuthApiSecret], token: &str) -> Option<&'a str> {
    if token.is_empty() {
        return None;
    }
    let mut matched = None;
    for entry in secrets {
        if bool::from(entry.secret.as_bytes().ct_eq(token.as_bytes())) && matched.is_none() {
            matched = Some(entry.id.as_str());
        }
    }
    matched
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn secrets() -> Vec<AuthApiSecret> {
        vec![
            AuthApiSecret {
                id: "node-a".to_string(),
                secret: "alpha".to_string(),
            },
            AuthApiSecret {
                id: "node-b".to_string(),
                secret: "bravo".to_string(),
            },
        ]
    }

    #[test]
    fn test_match_api_secret_id() {
        let secrets = secrets();
        assert_eq!(match_api_secret_id(&secrets, "bravo"), Some("node-b"));
        assert_eq!(match_api_secret_id(&secrets, "alph"), None);
        assert_eq!(match_api_secret_id(&secrets, ""), None);
        assert_eq!(match_api_secret_id(&[], "alpha"), None);
    }

    #[test]
    fn test_extract_api_key() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_api_key(&headers), None);

        headers.insert(
            http::header::AUTHORIZATION,
            HeaderValue::from_static("Bearer from-bearer"),
        );
        assert_eq!(extract_api_key(&headers), Some("from-bearer"));

        headers.insert(API_KEY_HEADER, HeaderValue::from_static("from-header"));
        assert_eq!(extract_api_key(&headers), Some("from-header"));
    }
}
