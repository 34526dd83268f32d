pub mod conversations;
pub mod notifications;
pub mod wsroute;

use crate::error::{AppError, AppResult};
use crate::state::AppState;
use actix_web::{get, web, HttpResponse};
use prometheus::{Encoder, TextEncoder};
use serde_json::json;

/// Authenticated REST surface, mounted under /api/v1.
pub fn configure_api(cfg: &mut web::ServiceConfig) {
    cfg.service(conversations::list_conversations)
        .service(conversations::create_conversation)
        .service(conversations::get_conversation)
        .service(conversations::delete_conversation)
        .service(conversations::send_message)
        .service(conversations::mark_conversation_read)
        .service(conversations::mark_message_read)
        .service(notifications::list_notifications)
        .service(notifications::mark_notification_read)
        .service(notifications::mark_all_notifications_read)
        .service(notifications::delete_notification);
}

#[get("/health")]
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "service": crate::db::SERVICE_NAME,
        "sessions": state.registry.session_count(),
        "online_users": state.presence.online_count(),
    }))
}

#[get("/metrics")]
pub async fn metrics() -> AppResult<HttpResponse> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&prometheus::gather(), &mut buffer)
        .map_err(|_| AppError::Internal)?;
    Ok(HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer))
}
