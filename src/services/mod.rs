pub mod authorization;
pub mod conversation_service;
pub mod directory;
pub mod message_service;
pub mod notification_service;
pub mod presence;

pub use authorization::AuthorizationGate;
pub use conversation_service::ConversationService;
pub use directory::{PgUserDirectory, UserDirectory};
pub use message_service::MessageService;
pub use notification_service::NotificationService;
pub use presence::PresenceTracker;
