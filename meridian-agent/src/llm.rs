use crate::action::ActionDirective;
use async_trait::async_trait;
use meridian_shared::app_config::CollaboratorConfig;
use meridian_shared::models::chat::HistoryEntry;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// One request to the chat-model collaborator.
#[derive(Debug, Clone, Serialize)]
pub struct ModelTurn {
    pub message: String,
    #[serde(rename = "contextData")]
    pub context_data: serde_json::Value,
    pub history: Vec<HistoryEntry>,
}

/// The model's structured reply: display text plus an optional typed
/// action directive.
#[derive(Debug, Clone)]
pub struct ModelReply {
    pub reply: String,
    pub action: Option<ActionDirective>,
}

/// Wire shape. The action arrives as loose JSON and is parsed separately
/// so a malformed directive degrades to content-only instead of failing
/// the whole reply.
#[derive(Debug, Deserialize)]
struct RawReply {
    reply: String,
    #[serde(default)]
    action: Option<serde_json::Value>,
}

impl From<RawReply> for ModelReply {
    fn from(raw: RawReply) -> Self {
        let action = raw.action.and_then(|value| {
            match serde_json::from_value::<ActionDirective>(value) {
                Ok(directive) => Some(directive),
                Err(err) => {
                    tracing::warn!(%err, "discarding malformed action directive");
                    None
                }
            }
        });
        Self {
            reply: raw.reply,
            action,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    #[error("Collaborator configuration invalid: {0}")]
    Config(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Unexpected response shape: {0}")]
    Protocol(String),
}

/// Seam for the language-model collaborator.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, turn: ModelTurn) -> Result<ModelReply, CollaboratorError>;
}

/// Production implementation: POSTs the turn to the configured endpoint.
pub struct HttpChatModel {
    client: reqwest::Client,
    url: String,
}

impl HttpChatModel {
    pub fn new(config: &CollaboratorConfig) -> Result<Self, CollaboratorError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(api_key) = &config.api_key {
            let value = format!("Bearer {}", api_key);
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&value)
                    .map_err(|e| CollaboratorError::Config(format!("invalid api_key: {}", e)))?,
            );
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| CollaboratorError::Config(e.to_string()))?;

        Ok(Self {
            client,
            url: config.chat_model_url.clone(),
        })
    }
}

#[async_trait]
impl ChatModel for HttpChatModel {
    async fn complete(&self, turn: ModelTurn) -> Result<ModelReply, CollaboratorError> {
        let response = self
            .client
            .post(&self.url)
            .json(&turn)
            .send()
            .await
            .map_err(|e| CollaboratorError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CollaboratorError::Http(format!(
                "chat model returned {}",
                status
            )));
        }

        let raw: RawReply = response
            .json()
            .await
            .map_err(|e| CollaboratorError::Protocol(e.to_string()))?;
        Ok(raw.into())
    }
}

/// Canned replies for tests, in the spirit of a mock payment adapter:
/// pops the next scripted result per call, erroring when the script runs dry.
pub struct ScriptedChatModel {
    replies: Mutex<VecDeque<Result<ModelReply, CollaboratorError>>>,
}

impl ScriptedChatModel {
    pub fn new(replies: Vec<Result<ModelReply, CollaboratorError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
        }
    }

    pub fn reply(text: &str) -> Result<ModelReply, CollaboratorError> {
        Ok(ModelReply {
            reply: text.to_string(),
            action: None,
        })
    }

    pub fn reply_with_action(
        text: &str,
        action: ActionDirective,
    ) -> Result<ModelReply, CollaboratorError> {
        Ok(ModelReply {
            reply: text.to_string(),
            action: Some(action),
        })
    }
}

#[async_trait]
impl ChatModel for ScriptedChatModel {
    async fn complete(&self, _turn: ModelTurn) -> Result<ModelReply, CollaboratorError> {
        self.replies
            .lock()
            .expect("scripted replies lock")
            .pop_front()
            .unwrap_or_else(|| {
                Err(CollaboratorError::Http(
                    "scripted model has no more replies".to_string(),
                ))
            })
    }
}
