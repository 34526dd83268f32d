use crate::db::SERVICE_NAME;
use crate::error::{AppError, AppResult};
use crate::models::{ordered_pair, Conversation, ConversationSummary, MessageDto};
use crate::services::directory::UserDirectory;
use crate::services::message_service::row_to_message;
use crate::services::presence::PresenceTracker;
use db_pool::{acquire_with_metrics, PgPool};
use std::collections::HashMap;
use tokio_postgres::error::SqlState;
use tokio_postgres::Row;
use tracing::{debug, warn};
use uuid::Uuid;

const CONVERSATION_COLUMNS: &str = "id, user_a, user_b, created_at, updated_at";

pub(crate) fn row_to_conversation(row: &Row) -> Conversation {
    Conversation {
        id: row.get("id"),
        user_a: row.get("user_a"),
        user_b: row.get("user_b"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

pub struct ConversationService;

impl ConversationService {
    pub async fn find_by_id(db: &PgPool, id: Uuid) -> AppResult<Option<Conversation>> {
        let client = acquire_with_metrics(db, SERVICE_NAME).await?;
        let row = client
            .query_opt(
                &format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = $1"),
                &[&id],
            )
            .await?;
        Ok(row.map(|r| row_to_conversation(&r)))
    }

    async fn find_by_pair(db: &PgPool, user_a: Uuid, user_b: Uuid) -> AppResult<Option<Conversation>> {
        let client = acquire_with_metrics(db, SERVICE_NAME).await?;
        let row = client
            .query_opt(
                &format!(
                    "SELECT {CONVERSATION_COLUMNS} FROM conversations \
                     WHERE user_a = $1 AND user_b = $2"
                ),
                &[&user_a, &user_b],
            )
            .await?;
        Ok(row.map(|r| row_to_conversation(&r)))
    }

    /// Idempotent get-or-create for the unordered pair. A concurrent create
    /// for the same pair loses the insert race on the unique constraint and
    /// recovers by re-fetching the winner's row.
    pub async fn get_or_create(db: &PgPool, a: Uuid, b: Uuid) -> AppResult<Conversation> {
        let (user_a, user_b) = ordered_pair(a, b);

        if let Some(existing) = Self::find_by_pair(db, user_a, user_b).await? {
            return Ok(existing);
        }

        let client = acquire_with_metrics(db, SERVICE_NAME).await?;
        let inserted = client
            .query_one(
                &format!(
                    "INSERT INTO conversations (user_a, user_b) VALUES ($1, $2) \
                     RETURNING {CONVERSATION_COLUMNS}"
                ),
                &[&user_a, &user_b],
            )
            .await;

        match inserted {
            Ok(row) => Ok(row_to_conversation(&row)),
            Err(e) if e.code() == Some(&SqlState::UNIQUE_VIOLATION) => {
                debug!(%user_a, %user_b, "conversation create race, re-fetching");
                drop(client);
                Self::find_by_pair(db, user_a, user_b)
                    .await?
                    .ok_or(AppError::Internal)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// One page of the user's conversations, most recently active first,
    /// each decorated with the counterpart's profile, the latest message and
    /// the caller's unread count. Callers page with limit/offset.
    pub async fn list_for_user(
        db: &PgPool,
        directory: &dyn UserDirectory,
        presence: &PresenceTracker,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<ConversationSummary>> {
        let client = acquire_with_metrics(db, SERVICE_NAME).await?;
        let rows = client
            .query(
                "SELECT c.id, c.user_a, c.user_b, c.created_at, c.updated_at, \
                        m.id AS last_id, m.sender_id AS last_sender_id, \
                        m.content AS last_content, m.is_read AS last_is_read, \
                        m.created_at AS last_created_at, \
                        (SELECT COUNT(*) FROM messages u \
                          WHERE u.conversation_id = c.id \
                            AND u.sender_id <> $1 AND NOT u.is_read) AS unread_count \
                 FROM conversations c \
                 LEFT JOIN LATERAL ( \
                     SELECT id, sender_id, content, is_read, created_at \
                     FROM messages \
                     WHERE conversation_id = c.id \
                     ORDER BY created_at DESC, id DESC LIMIT 1 \
                 ) m ON TRUE \
                 WHERE c.user_a = $1 OR c.user_b = $1 \
                 ORDER BY c.updated_at DESC \
                 LIMIT $2 OFFSET $3",
                &[&user_id, &limit, &offset],
            )
            .await?;
        drop(client);

        let other_ids: Vec<Uuid> = rows
            .iter()
            .map(|r| row_to_conversation(r).other_participant(user_id))
            .collect();
        let profiles: HashMap<Uuid, _> = directory
            .find_users_by_ids(&other_ids)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        let mut summaries = Vec::with_capacity(rows.len());
        for row in &rows {
            let conversation = row_to_conversation(row);
            let other_id = conversation.other_participant(user_id);
            let Some(mut other_user) = profiles.get(&other_id).cloned() else {
                warn!(conversation_id = %conversation.id, %other_id, "counterpart profile missing, skipping");
                continue;
            };
            other_user.is_online = presence.is_online(other_id);

            let last_message = row
                .get::<_, Option<Uuid>>("last_id")
                .map(|last_id| MessageDto {
                    id: last_id,
                    conversation_id: conversation.id,
                    sender_id: row.get("last_sender_id"),
                    content: row.get("last_content"),
                    is_read: row.get("last_is_read"),
                    created_at: row.get("last_created_at"),
                    sender: None,
                });

            summaries.push(ConversationSummary {
                id: conversation.id,
                other_user,
                last_message,
                unread_count: row.get("unread_count"),
                created_at: conversation.created_at,
                updated_at: conversation.updated_at,
            });
        }
        Ok(summaries)
    }

    /// Conversation plus one chronological page of messages. Fetches
    /// newest-first for cheap "last N" paging, then reverses so the client
    /// reads oldest-to-newest.
    pub async fn get_details(
        db: &PgPool,
        conversation_id: Uuid,
        requester_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Conversation, Vec<MessageDto>)> {
        let conversation = Self::find_by_id(db, conversation_id)
            .await?
            .ok_or(AppError::NotFound)?;
        if !conversation.is_participant(requester_id) {
            return Err(AppError::Forbidden);
        }

        let client = acquire_with_metrics(db, SERVICE_NAME).await?;
        let rows = client
            .query(
                "SELECT id, conversation_id, sender_id, content, is_read, created_at \
                 FROM messages WHERE conversation_id = $1 \
                 ORDER BY created_at DESC, id DESC \
                 LIMIT $2 OFFSET $3",
                &[&conversation_id, &limit, &offset],
            )
            .await?;

        let mut messages: Vec<MessageDto> = rows
            .iter()
            .map(|r| MessageDto::from_row(row_to_message(r)))
            .collect();
        messages.reverse();

        Ok((conversation, messages))
    }

    /// Irreversibly delete a conversation and its messages. Messages go
    /// first so no message row is ever left pointing at a dead conversation.
    pub async fn delete(db: &PgPool, conversation_id: Uuid, requester_id: Uuid) -> AppResult<()> {
        let conversation = Self::find_by_id(db, conversation_id)
            .await?
            .ok_or(AppError::NotFound)?;
        if !conversation.is_participant(requester_id) {
            return Err(AppError::Forbidden);
        }

        let mut client = acquire_with_metrics(db, SERVICE_NAME).await?;
        let tx = client.transaction().await?;
        tx.execute(
            "DELETE FROM messages WHERE conversation_id = $1",
            &[&conversation_id],
        )
        .await?;
        tx.execute("DELETE FROM conversations WHERE id = $1", &[&conversation_id])
            .await?;
        tx.commit().await?;
        Ok(())
    }
}
