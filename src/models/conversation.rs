use crate::models::message::MessageDto;
use crate::models::user::PublicUser;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Return the unordered pair in canonical storage order (smaller UUID first).
///
/// Every lookup and insert goes through this normalization so the unique
/// constraint on (user_a, user_b) can guarantee at most one conversation per
/// pair regardless of who initiated it.
pub fn ordered_pair(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Conversation row matching the database schema.
/// Invariant: user_a < user_b (enforced by normalization + CHECK constraint).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub user_a: Uuid,
    pub user_b: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// The counterpart of `viewer` in this conversation.
    pub fn other_participant(&self, viewer: Uuid) -> Uuid {
        if self.user_a == viewer {
            self.user_b
        } else {
            self.user_a
        }
    }

    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.user_a == user_id || self.user_b == user_id
    }
}

/// Per-caller conversation view: the counterpart, the most recent message and
/// the caller's unread count. Never exposes both participants symmetrically.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    pub id: Uuid,
    pub other_user: PublicUser,
    pub last_message: Option<MessageDto>,
    pub unread_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordered_pair_is_commutative() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(ordered_pair(a, b), ordered_pair(b, a));
    }

    #[test]
    fn ordered_pair_puts_smaller_first() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let (x, y) = ordered_pair(a, b);
        assert!(x <= y);
    }

    #[test]
    fn other_participant_returns_counterpart() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let (user_a, user_b) = ordered_pair(a, b);
        let conv = Conversation {
            id: Uuid::new_v4(),
            user_a,
            user_b,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(conv.other_participant(user_a), user_b);
        assert_eq!(conv.other_participant(user_b), user_a);
        assert!(conv.is_participant(user_a));
        assert!(!conv.is_participant(Uuid::new_v4()));
    }
}
