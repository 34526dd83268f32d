pub mod conversation;
pub mod message;
pub mod notification;
pub mod user;

pub use conversation::{ordered_pair, Conversation, ConversationSummary};
pub use message::{Message, MessageDto};
pub use notification::{Notification, NotificationKind};
pub use user::{PublicUser, UserRole};
