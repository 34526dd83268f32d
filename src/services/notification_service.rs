use crate::db::SERVICE_NAME;
use crate::error::{AppError, AppResult};
use crate::models::{Notification, NotificationKind};
use crate::websocket::message_types::ServerEvent;
use crate::websocket::ConnectionRegistry;
use db_pool::{acquire_with_metrics, PgPool};
use tokio_postgres::Row;
use tracing::{debug, error};
use uuid::Uuid;

const NOTIFICATION_COLUMNS: &str =
    "id, user_id, kind, metadata, title, body, is_read, created_at";

fn row_to_notification(row: &Row) -> AppResult<Notification> {
    let kind_str: String = row.get("kind");
    let metadata: serde_json::Value = row.get("metadata");
    let kind = NotificationKind::from_stored(&kind_str, metadata)
        .map_err(|e| AppError::Database(format!("stored notification malformed: {e}")))?;
    Ok(Notification {
        id: row.get("id"),
        user_id: row.get("user_id"),
        kind,
        title: row.get("title"),
        body: row.get("body"),
        is_read: row.get("is_read"),
        created_at: row.get("created_at"),
    })
}

/// Durable alert records plus opportunistic realtime push.
///
/// Created notifications are always stored; if the recipient holds an open
/// socket they additionally get the payload pushed immediately. The push is
/// best-effort and its failure never affects the stored record.
pub struct NotificationService {
    db: PgPool,
    registry: ConnectionRegistry,
}

impl NotificationService {
    pub fn new(db: PgPool, registry: ConnectionRegistry) -> Self {
        Self { db, registry }
    }

    pub async fn create(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        title: &str,
        body: &str,
    ) -> AppResult<Notification> {
        let client = acquire_with_metrics(&self.db, SERVICE_NAME).await?;
        let row = client
            .query_one(
                &format!(
                    "INSERT INTO notifications (user_id, kind, metadata, title, body) \
                     VALUES ($1, $2, $3, $4, $5) RETURNING {NOTIFICATION_COLUMNS}"
                ),
                &[&user_id, &kind.as_str(), &kind.metadata(), &title, &body],
            )
            .await?;
        let notification = row_to_notification(&row)?;

        let delivered = self.registry.send_to_user(
            user_id,
            ServerEvent::Notification {
                notification: notification.clone(),
            },
        );
        debug!(notification_id = %notification.id, %user_id, delivered, "notification created");
        Ok(notification)
    }

    /// Advisory creation for callers whose own operation must not fail on a
    /// notification problem. Errors are logged and swallowed.
    pub async fn create_best_effort(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        title: &str,
        body: &str,
    ) {
        if let Err(e) = self.create(user_id, kind, title, body).await {
            error!(%user_id, error = %e, "notification creation failed, continuing");
        }
    }

    /// Notifications for the owner, newest first, with an unread total.
    pub async fn list(
        &self,
        user_id: Uuid,
        is_read: Option<bool>,
        limit: i64,
    ) -> AppResult<(Vec<Notification>, i64)> {
        let client = acquire_with_metrics(&self.db, SERVICE_NAME).await?;
        let rows = match is_read {
            Some(filter) => {
                client
                    .query(
                        &format!(
                            "SELECT {NOTIFICATION_COLUMNS} FROM notifications \
                             WHERE user_id = $1 AND is_read = $2 \
                             ORDER BY created_at DESC LIMIT $3"
                        ),
                        &[&user_id, &filter, &limit],
                    )
                    .await?
            }
            None => {
                client
                    .query(
                        &format!(
                            "SELECT {NOTIFICATION_COLUMNS} FROM notifications \
                             WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2"
                        ),
                        &[&user_id, &limit],
                    )
                    .await?
            }
        };
        let notifications: AppResult<Vec<Notification>> =
            rows.iter().map(row_to_notification).collect();

        let unread = client
            .query_one(
                "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND NOT is_read",
                &[&user_id],
            )
            .await?;
        Ok((notifications?, unread.get(0)))
    }

    pub async fn mark_read(
        &self,
        notification_id: Uuid,
        requester_id: Uuid,
        requester_is_admin: bool,
    ) -> AppResult<Notification> {
        let client = acquire_with_metrics(&self.db, SERVICE_NAME).await?;
        let row = client
            .query_opt(
                &format!("SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = $1"),
                &[&notification_id],
            )
            .await?
            .ok_or(AppError::NotFound)?;
        let notification = row_to_notification(&row)?;
        if notification.user_id != requester_id && !requester_is_admin {
            return Err(AppError::Forbidden);
        }
        if notification.is_read {
            return Ok(notification);
        }

        let row = client
            .query_one(
                &format!(
                    "UPDATE notifications SET is_read = TRUE WHERE id = $1 \
                     RETURNING {NOTIFICATION_COLUMNS}"
                ),
                &[&notification_id],
            )
            .await?;
        row_to_notification(&row)
    }

    pub async fn mark_all_read(&self, user_id: Uuid) -> AppResult<u64> {
        let client = acquire_with_metrics(&self.db, SERVICE_NAME).await?;
        let updated = client
            .execute(
                "UPDATE notifications SET is_read = TRUE WHERE user_id = $1 AND NOT is_read",
                &[&user_id],
            )
            .await?;
        Ok(updated)
    }

    pub async fn delete(
        &self,
        notification_id: Uuid,
        requester_id: Uuid,
        requester_is_admin: bool,
    ) -> AppResult<()> {
        let client = acquire_with_metrics(&self.db, SERVICE_NAME).await?;
        let row = client
            .query_opt(
                "SELECT user_id FROM notifications WHERE id = $1",
                &[&notification_id],
            )
            .await?
            .ok_or(AppError::NotFound)?;
        let owner: Uuid = row.get(0);
        if owner != requester_id && !requester_is_admin {
            return Err(AppError::Forbidden);
        }

        client
            .execute("DELETE FROM notifications WHERE id = $1", &[&notification_id])
            .await?;
        Ok(())
    }
}
