use crate::db::SERVICE_NAME;
use crate::error::{AppError, AppResult};
use crate::models::{Message, MessageDto};
use crate::services::conversation_service::ConversationService;
use crate::services::directory::UserDirectory;
use db_pool::{acquire_with_metrics, PgPool};
use tokio_postgres::Row;
use uuid::Uuid;

pub(crate) fn row_to_message(row: &Row) -> Message {
    Message {
        id: row.get("id"),
        conversation_id: row.get("conversation_id"),
        sender_id: row.get("sender_id"),
        content: row.get("content"),
        is_read: row.get("is_read"),
        created_at: row.get("created_at"),
    }
}

pub struct MessageService;

impl MessageService {
    /// Append a message and bump the conversation's activity timestamp in
    /// one transaction. Participant membership is re-checked here even
    /// though callers already passed the authorization gate: a conversation
    /// existing does not prove the sender still belongs to it.
    pub async fn append(
        db: &PgPool,
        directory: &dyn UserDirectory,
        conversation_id: Uuid,
        sender_id: Uuid,
        content: &str,
    ) -> AppResult<MessageDto> {
        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::BadRequest("message content is empty".into()));
        }

        let conversation = ConversationService::find_by_id(db, conversation_id)
            .await?
            .ok_or(AppError::NotFound)?;
        if !conversation.is_participant(sender_id) {
            return Err(AppError::Forbidden);
        }

        let mut client = acquire_with_metrics(db, SERVICE_NAME).await?;
        let tx = client.transaction().await?;
        let row = tx
            .query_one(
                "INSERT INTO messages (conversation_id, sender_id, content) \
                 VALUES ($1, $2, $3) \
                 RETURNING id, conversation_id, sender_id, content, is_read, created_at",
                &[&conversation_id, &sender_id, &content],
            )
            .await?;
        tx.execute(
            "UPDATE conversations SET updated_at = now() WHERE id = $1",
            &[&conversation_id],
        )
        .await?;
        tx.commit().await?;
        // release before the directory lookup; holding a pooled connection
        // while acquiring another can exhaust the pool under load
        drop(client);

        let mut dto = MessageDto::from_row(row_to_message(&row));
        if let Some(sender) = directory.get_user(sender_id).await? {
            dto = dto.with_sender(sender);
        }
        Ok(dto)
    }

    /// Unread messages in the conversation authored by `from_user_id`.
    pub async fn count_unread_from(
        db: &PgPool,
        conversation_id: Uuid,
        from_user_id: Uuid,
    ) -> AppResult<i64> {
        let client = acquire_with_metrics(db, SERVICE_NAME).await?;
        let row = client
            .query_one(
                "SELECT COUNT(*) FROM messages \
                 WHERE conversation_id = $1 AND sender_id = $2 AND NOT is_read",
                &[&conversation_id, &from_user_id],
            )
            .await?;
        Ok(row.get(0))
    }

    /// Flip one message to read. Reading your own sent message is a no-op,
    /// and re-reading an already-read message is too.
    pub async fn mark_read(db: &PgPool, message_id: Uuid, requester_id: Uuid) -> AppResult<Message> {
        // one pooled connection at a time on this path: the message fetch,
        // the participant check and the update each acquire and release
        let message = {
            let client = acquire_with_metrics(db, SERVICE_NAME).await?;
            let row = client
                .query_opt(
                    "SELECT id, conversation_id, sender_id, content, is_read, created_at \
                     FROM messages WHERE id = $1",
                    &[&message_id],
                )
                .await?
                .ok_or(AppError::NotFound)?;
            row_to_message(&row)
        };

        let conversation = ConversationService::find_by_id(db, message.conversation_id)
            .await?
            .ok_or(AppError::NotFound)?;
        if !conversation.is_participant(requester_id) {
            return Err(AppError::Forbidden);
        }
        if message.sender_id == requester_id || message.is_read {
            return Ok(message);
        }

        let client = acquire_with_metrics(db, SERVICE_NAME).await?;
        let row = client
            .query_one(
                "UPDATE messages SET is_read = TRUE WHERE id = $1 \
                 RETURNING id, conversation_id, sender_id, content, is_read, created_at",
                &[&message_id],
            )
            .await?;
        Ok(row_to_message(&row))
    }

    /// Mark every counterpart-sent message in the conversation as read.
    /// Idempotent; returns the number of rows actually flipped.
    pub async fn mark_conversation_read(
        db: &PgPool,
        conversation_id: Uuid,
        requester_id: Uuid,
    ) -> AppResult<u64> {
        let conversation = ConversationService::find_by_id(db, conversation_id)
            .await?
            .ok_or(AppError::NotFound)?;
        if !conversation.is_participant(requester_id) {
            return Err(AppError::Forbidden);
        }

        let client = acquire_with_metrics(db, SERVICE_NAME).await?;
        let updated = client
            .execute(
                "UPDATE messages SET is_read = TRUE \
                 WHERE conversation_id = $1 AND sender_id <> $2 AND NOT is_read",
                &[&conversation_id, &requester_id],
            )
            .await?;
        Ok(updated)
    }
}
