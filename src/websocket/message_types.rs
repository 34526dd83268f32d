use crate::models::{MessageDto, Notification};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Events a connected client may send over the socket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    SendMessage {
        conversation_id: Uuid,
        content: String,
    },
    Typing {
        conversation_id: Uuid,
        is_typing: bool,
    },
    Subscribe {
        conversation_id: Uuid,
    },
    Unsubscribe {
        conversation_id: Uuid,
    },
    MarkRead {
        conversation_id: Uuid,
    },
}

/// Events pushed from the server to a connected client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    Connected {
        user_id: Uuid,
    },
    MessageNew {
        message: MessageDto,
    },
    Typing {
        conversation_id: Uuid,
        user_id: Uuid,
        is_typing: bool,
    },
    Notification {
        notification: Notification,
    },
    Presence {
        user_id: Uuid,
        is_online: bool,
    },
    Error {
        code: String,
        message: String,
    },
}

impl ServerEvent {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        ServerEvent::Error {
            code: code.to_owned(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_events_deserialize_by_type_tag() {
        let conversation_id = Uuid::new_v4();
        let raw = json!({
            "type": "typing",
            "conversation_id": conversation_id,
            "is_typing": true
        });
        let event: ClientEvent = serde_json::from_value(raw).unwrap();
        match event {
            ClientEvent::Typing {
                conversation_id: cid,
                is_typing,
            } => {
                assert_eq!(cid, conversation_id);
                assert!(is_typing);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn unknown_client_event_type_is_rejected() {
        let raw = json!({ "type": "eval", "payload": "rm -rf" });
        assert!(serde_json::from_value::<ClientEvent>(raw).is_err());
    }

    #[test]
    fn server_events_serialize_with_type_tag() {
        let event = ServerEvent::Presence {
            user_id: Uuid::new_v4(),
            is_online: false,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "presence");
        assert_eq!(value["is_online"], false);
    }
}
