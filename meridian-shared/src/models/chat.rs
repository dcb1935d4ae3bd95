use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// A single turn in the conversation transcript.
///
/// When the assistant stages a transactional action, `pending` carries the
/// transaction id of the confirmation awaiting resolution. The marker is
/// cleared the moment the confirmation resolves, whatever the outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending: Option<Uuid>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Assistant, content)
    }

    pub fn assistant_pending(content: impl Into<String>, transaction_id: Uuid) -> Self {
        let mut msg = Self::new(ChatRole::Assistant, content);
        msg.pending = Some(transaction_id);
        msg
    }

    fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            pending: None,
        }
    }

    /// Drop the pending marker once its confirmation has resolved.
    pub fn clear_pending(&mut self) {
        self.pending = None;
    }
}

/// Role/content pair sent to the chat-model collaborator as history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: ChatRole,
    pub content: String,
}

impl From<&ChatMessage> for HistoryEntry {
    fn from(msg: &ChatMessage) -> Self {
        Self {
            role: msg.role,
            content: msg.content.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_marker_cleared() {
        let txn = Uuid::new_v4();
        let mut msg = ChatMessage::assistant_pending("Confirm booking?", txn);
        assert_eq!(msg.pending, Some(txn));

        msg.clear_pending();
        assert!(msg.pending.is_none());
    }

    #[test]
    fn test_role_serialization() {
        let msg = ChatMessage::user("hello");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "user");
        // No pending field when there is no pending confirmation
        assert!(json.get("pending").is_none());
    }
}
