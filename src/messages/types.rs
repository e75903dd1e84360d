use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sender {
    User,
    Assistant,
}

/// A single conversation entry. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub content: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a user message with a fresh id.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Sender::User, content, None)
    }

    /// Create an assistant message, reusing the server-provided id when
    /// one exists.
    pub fn assistant(content: impl Into<String>, id: Option<String>) -> Self {
        Self::new(Sender::Assistant, content, id)
    }

    fn new(sender: Sender, content: impl Into<String>, id: Option<String>) -> Self {
        Self {
            id: id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            content: content.into(),
            sender,
            timestamp: Utc::now(),
        }
    }

    /// Project this message to its wire shape. Only assistant entries
    /// carry their id on the wire.
    pub fn to_wire(&self) -> ConversationMessage {
        ConversationMessage {
            role: match self.sender {
                Sender::User => Role::User,
                Sender::Assistant => Role::Assistant,
            },
            content: self.content.clone(),
            id: match self.sender {
                Sender::Assistant => Some(self.id.clone()),
                Sender::User => None,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Wire-shape projection of a [`Message`], recomputed before each
/// outbound request and never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}
