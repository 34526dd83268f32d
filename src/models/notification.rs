use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Closed set of notification kinds. Each variant carries exactly the
/// metadata its kind needs, so malformed payloads are unrepresentable and
/// rejected at deserialization time rather than stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationKind {
    Message {
        conversation_id: Uuid,
        sender_id: Uuid,
    },
    ContactRequest {
        requester_id: Uuid,
    },
    ResourceShared {
        resource_id: Uuid,
        shared_by: Uuid,
    },
    SessionBooked {
        session_id: Uuid,
        starts_at: DateTime<Utc>,
    },
    SessionReminder {
        session_id: Uuid,
        starts_at: DateTime<Utc>,
    },
    System,
}

impl NotificationKind {
    /// Stable discriminant stored in the `kind` column for filtering.
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Message { .. } => "message",
            NotificationKind::ContactRequest { .. } => "contact_request",
            NotificationKind::ResourceShared { .. } => "resource_shared",
            NotificationKind::SessionBooked { .. } => "session_booked",
            NotificationKind::SessionReminder { .. } => "session_reminder",
            NotificationKind::System => "system",
        }
    }

    /// Rebuild the kind from the stored discriminant + metadata columns.
    pub fn from_stored(kind: &str, metadata: serde_json::Value) -> Result<Self, serde_json::Error> {
        let mut tagged = match metadata {
            serde_json::Value::Object(map) => map,
            serde_json::Value::Null => serde_json::Map::new(),
            other => {
                return serde_json::from_value(other);
            }
        };
        tagged.insert("kind".into(), serde_json::Value::String(kind.to_owned()));
        serde_json::from_value(serde_json::Value::Object(tagged))
    }

    /// Variant metadata as stored in the `metadata` jsonb column (the
    /// discriminant lives in its own column and is stripped here).
    pub fn metadata(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or(serde_json::Value::Null);
        if let serde_json::Value::Object(map) = &mut value {
            map.remove("kind");
        }
        value
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(flatten)]
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stored_form_round_trips() {
        let conversation_id = Uuid::new_v4();
        let sender_id = Uuid::new_v4();
        let kind = NotificationKind::Message {
            conversation_id,
            sender_id,
        };
        let rebuilt = NotificationKind::from_stored(kind.as_str(), kind.metadata()).unwrap();
        assert_eq!(rebuilt, kind);
    }

    #[test]
    fn system_kind_has_empty_metadata() {
        let kind = NotificationKind::System;
        assert_eq!(kind.metadata(), json!({}));
        assert_eq!(
            NotificationKind::from_stored("system", serde_json::Value::Null).unwrap(),
            NotificationKind::System
        );
    }

    #[test]
    fn unknown_kind_is_rejected() {
        assert!(NotificationKind::from_stored("marketing_blast", json!({})).is_err());
    }

    #[test]
    fn missing_required_metadata_is_rejected() {
        // message notifications must reference a conversation and sender
        assert!(NotificationKind::from_stored("message", json!({})).is_err());
        assert!(NotificationKind::from_stored(
            "message",
            json!({ "conversation_id": Uuid::new_v4() })
        )
        .is_err());
    }

    #[test]
    fn serialized_notification_flattens_kind_tag() {
        let n = Notification {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            kind: NotificationKind::ContactRequest {
                requester_id: Uuid::new_v4(),
            },
            title: "New contact request".into(),
            body: "Someone wants to connect".into(),
            is_read: false,
            created_at: Utc::now(),
        };
        let value = serde_json::to_value(&n).unwrap();
        assert_eq!(value["kind"], "contact_request");
        assert!(value["requester_id"].is_string());
    }
}
