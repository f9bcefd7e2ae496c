//! Configuration for the Direct Line bot adapter.

use std::time::Duration;

/// Public Direct Line endpoint
pub const DIRECT_LINE_URL: &str = "https://directline.botframework.com";

#[derive(Clone)]
pub struct DirectLineConfig {
    /// Base URL without the `/v3/directline` suffix
    pub base_url: String,
    /// Direct Line channel secret
    pub secret: String,
    /// Delay between activity polls while waiting for a reply
    pub poll_interval: Duration,
    /// Longest wait for one bot reply
    pub reply_timeout: Duration,
    /// Per-request HTTP timeout
    pub request_timeout: Duration,
}

impl Default for DirectLineConfig {
    fn default() -> Self {
        Self {
            base_url: DIRECT_LINE_URL.to_string(),
            secret: String::new(),
            poll_interval: Duration::from_millis(500),
            reply_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl std::fmt::Debug for DirectLineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectLineConfig")
            .field("base_url", &self.base_url)
            .field("secret", &"[REDACTED]")
            .field("poll_interval", &self.poll_interval)
            .field("reply_timeout", &self.reply_timeout)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl DirectLineConfig {
    /// `{base}/v3/directline/conversations`
    pub fn conversations_url(&self) -> String {
        format!(
            "{}/v3/directline/conversations",
            self.base_url.trim_end_matches('/')
        )
    }

    /// `{base}/v3/directline/conversations/{id}/activities`
    pub fn activities_url(&self, conversation_id: &str) -> String {
        format!("{}/{}/activities", self.conversations_url(), conversation_id)
    }
}
