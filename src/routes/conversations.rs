use crate::error::{AppError, AppResult};
use crate::middleware::guards::load_actor;
use crate::models::{ConversationSummary, MessageDto, PublicUser};
use crate::services::{ConversationService, MessageService};
use crate::state::AppState;
use actix_middleware::UserId;
use actix_web::{delete, get, post, put, web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateConversationRequest {
    pub other_user_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
struct ConversationResponse {
    id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    other_user: Option<PublicUser>,
    unread_count: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct ConversationDetailsResponse {
    id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    other_user: Option<PublicUser>,
    messages: Vec<MessageDto>,
    /// Participants currently typing, excluding the requester
    typing: Vec<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[get("/conversations")]
pub async fn list_conversations(
    state: web::Data<AppState>,
    user: UserId,
    query: web::Query<PageQuery>,
) -> AppResult<HttpResponse> {
    load_actor(&state, user.0).await?;
    let limit = query
        .limit
        .unwrap_or(state.config.conversation_list_limit)
        .clamp(1, state.config.conversation_list_limit);
    let offset = query.offset.unwrap_or(0).max(0);
    let summaries: Vec<ConversationSummary> = ConversationService::list_for_user(
        &state.db,
        state.directory.as_ref(),
        &state.presence,
        user.0,
        limit,
        offset,
    )
    .await?;
    Ok(HttpResponse::Ok().json(json!({
        "conversations": summaries,
        "limit": limit,
        "offset": offset,
    })))
}

#[post("/conversations")]
pub async fn create_conversation(
    state: web::Data<AppState>,
    user: UserId,
    body: web::Json<CreateConversationRequest>,
) -> AppResult<HttpResponse> {
    let actor = load_actor(&state, user.0).await?;
    let other_user_id = body
        .other_user_id
        .ok_or_else(|| AppError::BadRequest("other_user_id is required".into()))?;
    if other_user_id == actor.id {
        return Err(AppError::BadRequest(
            "cannot start a conversation with yourself".into(),
        ));
    }

    let mut other_user = state
        .directory
        .get_user(other_user_id)
        .await?
        .ok_or(AppError::NotFound)?;
    if !state
        .gate
        .can_message(actor.id, other_user_id, actor.role)
        .await?
    {
        return Err(AppError::Forbidden);
    }

    let conversation = ConversationService::get_or_create(&state.db, actor.id, other_user_id).await?;
    let unread_count =
        MessageService::count_unread_from(&state.db, conversation.id, other_user_id).await?;
    other_user.is_online = state.presence.is_online(other_user_id);

    Ok(HttpResponse::Ok().json(ConversationResponse {
        id: conversation.id,
        other_user: Some(other_user),
        unread_count,
        created_at: conversation.created_at,
        updated_at: conversation.updated_at,
    }))
}

#[get("/conversations/{id}")]
pub async fn get_conversation(
    state: web::Data<AppState>,
    user: UserId,
    path: web::Path<Uuid>,
    query: web::Query<PageQuery>,
) -> AppResult<HttpResponse> {
    load_actor(&state, user.0).await?;
    let conversation_id = path.into_inner();
    let limit = query
        .limit
        .unwrap_or(state.config.message_page_limit)
        .clamp(1, state.config.message_page_limit);
    let offset = query.offset.unwrap_or(0).max(0);

    let (conversation, messages) =
        ConversationService::get_details(&state.db, conversation_id, user.0, limit, offset).await?;

    let other_id = conversation.other_participant(user.0);
    let other_user = state.directory.get_user(other_id).await?.map(|mut u| {
        u.is_online = state.presence.is_online(other_id);
        u
    });
    let typing: Vec<Uuid> = state
        .presence
        .typing_users(conversation_id)
        .into_iter()
        .filter(|u| *u != user.0)
        .collect();

    Ok(HttpResponse::Ok().json(ConversationDetailsResponse {
        id: conversation.id,
        other_user,
        messages,
        typing,
        created_at: conversation.created_at,
        updated_at: conversation.updated_at,
    }))
}

#[delete("/conversations/{id}")]
pub async fn delete_conversation(
    state: web::Data<AppState>,
    user: UserId,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    load_actor(&state, user.0).await?;
    ConversationService::delete(&state.db, path.into_inner(), user.0).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "conversation deleted" })))
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

/// REST alternative to the websocket `send_message` event. Same pipeline:
/// persist, push to the recipient if connected, notify otherwise.
#[post("/conversations/{id}/messages")]
pub async fn send_message(
    state: web::Data<AppState>,
    user: UserId,
    path: web::Path<Uuid>,
    body: web::Json<SendMessageRequest>,
) -> AppResult<HttpResponse> {
    load_actor(&state, user.0).await?;
    let message = state
        .deliver_message(path.into_inner(), user.0, &body.content)
        .await?;
    Ok(HttpResponse::Created().json(message))
}

/// Bulk read-state update for everything the counterpart sent.
#[post("/conversations/{id}/read")]
pub async fn mark_conversation_read(
    state: web::Data<AppState>,
    user: UserId,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    load_actor(&state, user.0).await?;
    let updated =
        MessageService::mark_conversation_read(&state.db, path.into_inner(), user.0).await?;
    Ok(HttpResponse::Ok().json(json!({ "updated": updated })))
}

#[put("/messages/{id}/read")]
pub async fn mark_message_read(
    state: web::Data<AppState>,
    user: UserId,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    load_actor(&state, user.0).await?;
    let message = MessageService::mark_read(&state.db, path.into_inner(), user.0).await?;
    Ok(HttpResponse::Ok().json(MessageDto::from_row(message)))
}
