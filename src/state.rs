use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::{MessageDto, NotificationKind};
use crate::services::{
    AuthorizationGate, ConversationService, MessageService, NotificationService, PresenceTracker,
    UserDirectory,
};
use crate::websocket::message_types::ServerEvent;
use crate::websocket::ConnectionRegistry;
use db_pool::PgPool;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const NOTIFICATION_BODY_MAX: usize = 120;

/// Shared application state handed to every handler via `web::Data`.
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,
    pub registry: ConnectionRegistry,
    pub presence: PresenceTracker,
    pub directory: Arc<dyn UserDirectory>,
    pub gate: AuthorizationGate,
    pub notifications: Arc<NotificationService>,
}

impl AppState {
    pub fn new(db: PgPool, config: Arc<Config>, directory: Arc<dyn UserDirectory>) -> Self {
        let registry = ConnectionRegistry::new();
        let presence = PresenceTracker::new();
        let notifications = Arc::new(NotificationService::new(db.clone(), registry.clone()));
        let gate = AuthorizationGate::new(directory.clone());
        Self {
            db,
            config,
            registry,
            presence,
            directory,
            gate,
            notifications,
        }
    }

    /// The full send path, shared by the REST append endpoint and the
    /// websocket `send_message` event: persist, clear the sender's typing
    /// indicator, push to the recipient if connected, and fall back to a
    /// durable notification if not. The persisted message is returned
    /// regardless of delivery outcome.
    pub async fn deliver_message(
        &self,
        conversation_id: Uuid,
        sender_id: Uuid,
        content: &str,
    ) -> AppResult<MessageDto> {
        let conversation = ConversationService::find_by_id(&self.db, conversation_id)
            .await?
            .ok_or(AppError::NotFound)?;
        if !conversation.is_participant(sender_id) {
            return Err(AppError::Forbidden);
        }

        let message = MessageService::append(
            &self.db,
            self.directory.as_ref(),
            conversation_id,
            sender_id,
            content,
        )
        .await?;

        // sending ends the typing indicator
        self.presence.set_typing(
            conversation_id,
            sender_id,
            false,
            Duration::from_secs(self.config.typing_ttl_secs),
        );

        let event = ServerEvent::MessageNew {
            message: message.clone(),
        };
        // echo to the sender's other views with the server-assigned id
        self.registry.send_to_user(sender_id, event.clone());

        let recipient = conversation.other_participant(sender_id);
        let pushed = self.registry.send_to_user(recipient, event);
        if !pushed {
            let sender_name = message
                .sender
                .as_ref()
                .map(|s| format!("{} {}", s.first_name, s.last_name))
                .unwrap_or_else(|| "Someone".to_owned());
            let body: String = message.content.chars().take(NOTIFICATION_BODY_MAX).collect();
            self.notifications
                .create_best_effort(
                    recipient,
                    NotificationKind::Message {
                        conversation_id,
                        sender_id,
                    },
                    &format!("New message from {sender_name}"),
                    &body,
                )
                .await;
        }
        Ok(message)
    }
}
