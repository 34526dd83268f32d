use crate::websocket::message_types::ServerEvent;
use crate::websocket::ConnectionRegistry;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

/// In-memory presence and typing state.
///
/// Process-local by design: online/typing status is transient, so losing it
/// on restart is accepted. Typing entries expire after a TTL so a client
/// that dies mid-keystroke does not leave a permanent indicator behind.
#[derive(Clone, Default)]
pub struct PresenceTracker {
    online: Arc<RwLock<HashSet<Uuid>>>,
    // (conversation, user) -> expiry deadline
    typing: Arc<Mutex<HashMap<(Uuid, Uuid), Instant>>>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the user was previously offline.
    pub fn set_online(&self, user_id: Uuid) -> bool {
        self.online
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(user_id)
    }

    /// Returns true if the user was previously online. Also clears any
    /// typing entries the user left behind.
    pub fn set_offline(&self, user_id: Uuid) -> bool {
        let was_online = self
            .online
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&user_id);
        self.typing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|(_, u), _| *u != user_id);
        was_online
    }

    pub fn is_online(&self, user_id: Uuid) -> bool {
        self.online
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&user_id)
    }

    pub fn online_count(&self) -> usize {
        self.online.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Record or clear a typing entry. Refreshing an existing entry pushes
    /// its deadline out.
    pub fn set_typing(&self, conversation_id: Uuid, user_id: Uuid, is_typing: bool, ttl: Duration) {
        let mut typing = self.typing.lock().unwrap_or_else(|e| e.into_inner());
        if is_typing {
            typing.insert((conversation_id, user_id), Instant::now() + ttl);
        } else {
            typing.remove(&(conversation_id, user_id));
        }
    }

    pub fn typing_users(&self, conversation_id: Uuid) -> Vec<Uuid> {
        let now = Instant::now();
        self.typing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|((c, _), deadline)| *c == conversation_id && **deadline > now)
            .map(|((_, u), _)| *u)
            .collect()
    }

    /// Drop entries whose deadline passed and return them so the caller can
    /// notify counterparts that typing stopped.
    pub fn sweep_expired(&self, now: Instant) -> Vec<(Uuid, Uuid)> {
        let mut typing = self.typing.lock().unwrap_or_else(|e| e.into_inner());
        let expired: Vec<(Uuid, Uuid)> = typing
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(key, _)| *key)
            .collect();
        for key in &expired {
            typing.remove(key);
        }
        expired
    }
}

/// Background task that expires stale typing entries and broadcasts the
/// implied "stopped typing" to each conversation's subscribers.
pub fn spawn_typing_sweeper(
    presence: PresenceTracker,
    registry: ConnectionRegistry,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            for (conversation_id, user_id) in presence.sweep_expired(Instant::now()) {
                debug!(%conversation_id, %user_id, "typing entry expired");
                registry.broadcast_to_conversation(
                    conversation_id,
                    &ServerEvent::Typing {
                        conversation_id,
                        user_id,
                        is_typing: false,
                    },
                    Some(user_id),
                );
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn online_transitions_report_changes() {
        let presence = PresenceTracker::new();
        let user = Uuid::new_v4();

        assert!(presence.set_online(user));
        assert!(!presence.set_online(user)); // already online
        assert!(presence.is_online(user));

        assert!(presence.set_offline(user));
        assert!(!presence.set_offline(user)); // already offline
        assert!(!presence.is_online(user));
    }

    #[test]
    fn typing_entry_expires_after_ttl() {
        let presence = PresenceTracker::new();
        let conversation = Uuid::new_v4();
        let user = Uuid::new_v4();

        presence.set_typing(conversation, user, true, Duration::from_secs(5));
        assert_eq!(presence.typing_users(conversation), vec![user]);

        // before the deadline nothing is swept
        assert!(presence.sweep_expired(Instant::now()).is_empty());

        let after_deadline = Instant::now() + Duration::from_secs(6);
        assert_eq!(
            presence.sweep_expired(after_deadline),
            vec![(conversation, user)]
        );
        assert!(presence.typing_users(conversation).is_empty());
    }

    #[test]
    fn explicit_stop_clears_the_entry() {
        let presence = PresenceTracker::new();
        let conversation = Uuid::new_v4();
        let user = Uuid::new_v4();

        presence.set_typing(conversation, user, true, Duration::from_secs(5));
        presence.set_typing(conversation, user, false, Duration::from_secs(5));
        assert!(presence.typing_users(conversation).is_empty());
    }

    #[test]
    fn going_offline_clears_typing_state() {
        let presence = PresenceTracker::new();
        let conversation = Uuid::new_v4();
        let user = Uuid::new_v4();

        presence.set_online(user);
        presence.set_typing(conversation, user, true, Duration::from_secs(5));
        presence.set_offline(user);
        assert!(presence.typing_users(conversation).is_empty());
    }

    #[test]
    fn typing_is_scoped_per_conversation() {
        let presence = PresenceTracker::new();
        let user = Uuid::new_v4();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        presence.set_typing(first, user, true, Duration::from_secs(5));
        assert_eq!(presence.typing_users(first), vec![user]);
        assert!(presence.typing_users(second).is_empty());
    }
}
