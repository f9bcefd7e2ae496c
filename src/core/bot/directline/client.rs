//! Direct Line bot adapter.
//!
//! Direct Line is a REST channel: activities are posted to the conversation
//! and replies are fetched by polling the activity feed with a watermark.
//! Callers only see [`BotResource::response`] resolve once the bot answered
//! or the reply window elapsed.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::config::DirectLineConfig;
use super::messages::{
    ACTIVITY_END_OF_CONVERSATION, ACTIVITY_MESSAGE, Activity, ActivitySet, ChannelAccount,
    Conversation, SESSION_START_EVENT, stringify_variable,
};
use crate::core::bot::base::{
    BotError, BotProvider, BotResource, BotResponse, BotResult, BotSessionRequest, Disposition,
};
use crate::core::protocol::MediaParameter;
use crate::core::tts::Synthesizer;

/// Map a non-success status to a bot error
async fn status_error(response: Response, context: &str) -> BotError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = format!("{context} ({status}): {body}");
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BotError::AuthenticationFailed(message),
        _ => BotError::ApiError(message),
    }
}

/// One Direct Line conversation bound to a call
pub struct DirectLineConversation {
    http_client: Client,
    config: Arc<DirectLineConfig>,
    conversation_id: String,
    token: String,
    caller: ChannelAccount,
    media: MediaParameter,
    language: Option<String>,
    input_variables: HashMap<String, String>,
    synthesizer: Option<Arc<dyn Synthesizer>>,
    /// Feed position; held across a fetch so polls never interleave
    watermark: Mutex<Option<String>>,
}

impl DirectLineConversation {
    async fn post_activity(&self, activity: &Activity) -> BotResult<()> {
        let response = self
            .http_client
            .post(self.config.activities_url(&self.conversation_id))
            .bearer_auth(&self.token)
            .json(activity)
            .send()
            .await
            .map_err(|e| BotError::ConnectionFailed(format!("Failed to post activity: {e}")))?;

        if !response.status().is_success() {
            return Err(status_error(response, "Posting activity failed").await);
        }
        debug!(
            conversation_id = %self.conversation_id,
            activity_type = %activity.activity_type,
            "Activity posted"
        );
        Ok(())
    }

    /// Fetch activities newer than the watermark, advancing it
    async fn fetch_activities(&self) -> BotResult<Vec<Activity>> {
        let mut watermark = self.watermark.lock().await;

        let mut request = self
            .http_client
            .get(self.config.activities_url(&self.conversation_id))
            .bearer_auth(&self.token);
        if let Some(ref position) = *watermark {
            request = request.query(&[("watermark", position.as_str())]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| BotError::ConnectionFailed(format!("Failed to poll activities: {e}")))?;
        if !response.status().is_success() {
            return Err(status_error(response, "Polling activities failed").await);
        }

        let set: ActivitySet = response
            .json()
            .await
            .map_err(|e| BotError::ApiError(format!("Invalid activity set: {e}")))?;
        if set.watermark.is_some() {
            *watermark = set.watermark;
        }
        Ok(set.activities)
    }

    fn is_bot_reply(&self, activity: &Activity) -> bool {
        activity.from.id != self.caller.id
            && (activity.activity_type == ACTIVITY_MESSAGE
                || activity.activity_type == ACTIVITY_END_OF_CONVERSATION)
    }

    /// Poll until the bot replied or the reply window elapsed
    async fn await_reply(&self) -> BotResult<BotResponse> {
        let deadline = Instant::now() + self.config.reply_timeout;

        loop {
            let replies: Vec<Activity> = self
                .fetch_activities()
                .await?
                .into_iter()
                .filter(|activity| self.is_bot_reply(activity))
                .collect();

            if !replies.is_empty() {
                let mut response = build_response(&replies);
                self.attach_audio(&mut response).await?;
                return Ok(response);
            }

            if Instant::now() + self.config.poll_interval > deadline {
                warn!(
                    conversation_id = %self.conversation_id,
                    "Bot did not reply within {:?}", self.config.reply_timeout
                );
                return Err(BotError::Timeout(self.config.reply_timeout));
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    async fn attach_audio(&self, response: &mut BotResponse) -> BotResult<()> {
        let (Some(synthesizer), Some(text)) = (&self.synthesizer, &response.text) else {
            return Ok(());
        };
        let audio = synthesizer.synthesize(text, &self.media).await?;
        response.audio_bytes = Some(audio);
        Ok(())
    }
}

/// Fold the bot's activities for one turn into a single reply
fn build_response(replies: &[Activity]) -> BotResponse {
    let mut texts = Vec::new();
    let mut disposition = None;
    let mut confidence = None;
    let mut end_session = false;
    let mut output_variables = HashMap::new();

    for activity in replies {
        if activity.activity_type == ACTIVITY_END_OF_CONVERSATION {
            end_session = true;
        }
        match activity.text.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => texts.push(text.to_string()),
            _ => {}
        }

        let data = activity.reply_data();
        disposition = data.disposition.or(disposition);
        confidence = data.confidence.or(confidence);
        end_session |= data.end_session;
        for (name, value) in &data.output_variables {
            output_variables.insert(name.clone(), stringify_variable(value));
        }
    }

    let text = (!texts.is_empty()).then(|| texts.join(" "));
    let disposition = disposition.unwrap_or(if text.is_some() {
        Disposition::Match
    } else {
        Disposition::NoMatch
    });

    BotResponse {
        disposition,
        text,
        confidence,
        audio_bytes: None,
        end_session,
        output_variables,
    }
}

#[async_trait]
impl BotResource for DirectLineConversation {
    fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    async fn initial_response(&self) -> BotResult<BotResponse> {
        let value = serde_json::to_value(&self.input_variables)
            .map_err(|e| BotError::ApiError(format!("Invalid input variables: {e}")))?;
        let activity = Activity::event(
            self.caller.clone(),
            SESSION_START_EVENT,
            value,
            self.language.clone(),
        );
        self.post_activity(&activity).await?;
        self.await_reply().await
    }

    async fn response(&self, utterance: &str) -> BotResult<BotResponse> {
        let activity = Activity::message(self.caller.clone(), utterance, self.language.clone());
        self.post_activity(&activity).await?;
        self.await_reply().await
    }
}

/// Starts one Direct Line conversation per call
pub struct DirectLineProvider {
    http_client: Client,
    config: Arc<DirectLineConfig>,
    synthesizer: Option<Arc<dyn Synthesizer>>,
}

impl DirectLineProvider {
    pub fn new(
        config: DirectLineConfig,
        synthesizer: Option<Arc<dyn Synthesizer>>,
    ) -> BotResult<Self> {
        if config.secret.is_empty() {
            return Err(BotError::InvalidConfiguration(
                "Direct Line secret is required".to_string(),
            ));
        }
        let http_client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| BotError::InvalidConfiguration(format!("HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            config: Arc::new(config),
            synthesizer,
        })
    }
}

#[async_trait]
impl BotProvider for DirectLineProvider {
    async fn create(&self, request: BotSessionRequest) -> BotResult<Arc<dyn BotResource>> {
        let response = self
            .http_client
            .post(self.config.conversations_url())
            .bearer_auth(&self.config.secret)
            .send()
            .await
            .map_err(|e| BotError::ConnectionFailed(format!("Failed to start conversation: {e}")))?;

        if !response.status().is_success() {
            return Err(status_error(response, "Starting conversation failed").await);
        }

        let conversation: Conversation = response
            .json()
            .await
            .map_err(|e| BotError::ApiError(format!("Invalid conversation response: {e}")))?;

        info!(
            session_id = %request.session_id,
            conversation_id = %conversation.conversation_id,
            "Direct Line conversation started"
        );

        let token = conversation
            .token
            .unwrap_or_else(|| self.config.secret.clone());

        Ok(Arc::new(DirectLineConversation {
            http_client: self.http_client.clone(),
            config: self.config.clone(),
            conversation_id: conversation.conversation_id,
            token,
            caller: ChannelAccount {
                id: request.session_id,
                name: Some("caller".to_string()),
            },
            media: request.media,
            language: request.language,
            input_variables: request.input_variables,
            synthesizer: self.synthesizer.clone(),
            watermark: Mutex::new(None),
        }))
    }
}
