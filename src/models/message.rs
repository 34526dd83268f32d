use crate::models::user::PublicUser;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Message row matching the database schema.
///
/// Within a conversation messages are totally ordered by (created_at, id);
/// the datastore's commit order is authoritative. `is_read` is
/// recipient-scoped and flips one way only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Message payload as serialized to clients, optionally decorated with the
/// sender's public display fields (set on the send path).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDto {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<PublicUser>,
}

impl MessageDto {
    pub fn from_row(message: Message) -> Self {
        Self {
            id: message.id,
            conversation_id: message.conversation_id,
            sender_id: message.sender_id,
            content: message.content,
            is_read: message.is_read,
            created_at: message.created_at,
            sender: None,
        }
    }

    pub fn with_sender(mut self, sender: PublicUser) -> Self {
        self.sender = Some(sender);
        self
    }
}
