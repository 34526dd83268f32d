use crate::error::AppResult;
use crate::middleware::guards::load_actor;
use crate::state::AppState;
use actix_middleware::UserId;
use actix_web::{delete, get, put, web, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct NotificationListQuery {
    pub is_read: Option<bool>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
struct NotificationListResponse {
    notifications: Vec<crate::models::Notification>,
    unread_count: i64,
}

const DEFAULT_LIST_LIMIT: i64 = 100;

#[get("/notifications")]
pub async fn list_notifications(
    state: web::Data<AppState>,
    user: UserId,
    query: web::Query<NotificationListQuery>,
) -> AppResult<HttpResponse> {
    load_actor(&state, user.0).await?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, DEFAULT_LIST_LIMIT);
    let (notifications, unread_count) = state
        .notifications
        .list(user.0, query.is_read, limit)
        .await?;
    Ok(HttpResponse::Ok().json(NotificationListResponse {
        notifications,
        unread_count,
    }))
}

#[put("/notifications/{id}/read")]
pub async fn mark_notification_read(
    state: web::Data<AppState>,
    user: UserId,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let actor = load_actor(&state, user.0).await?;
    let notification = state
        .notifications
        .mark_read(path.into_inner(), actor.id, actor.role.is_admin())
        .await?;
    Ok(HttpResponse::Ok().json(notification))
}

#[put("/notifications/read-all")]
pub async fn mark_all_notifications_read(
    state: web::Data<AppState>,
    user: UserId,
) -> AppResult<HttpResponse> {
    load_actor(&state, user.0).await?;
    let updated = state.notifications.mark_all_read(user.0).await?;
    Ok(HttpResponse::Ok().json(json!({ "updated": updated })))
}

#[delete("/notifications/{id}")]
pub async fn delete_notification(
    state: web::Data<AppState>,
    user: UserId,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let actor = load_actor(&state, user.0).await?;
    state
        .notifications
        .delete(path.into_inner(), actor.id, actor.role.is_admin())
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "notification deleted" })))
}
