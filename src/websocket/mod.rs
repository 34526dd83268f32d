pub mod message_types;
pub mod reconnect;

use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use message_types::ServerEvent;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

/// Identifies one physical socket. A user who reconnects gets a fresh id,
/// which lets the registry tell a stale disconnect from a live session.
pub type ConnectionId = Uuid;

/// Commands delivered to a live session task.
#[derive(Debug, Clone)]
pub enum SessionCommand {
    Deliver(ServerEvent),
    /// A newer connection for the same user took over; close this one.
    Shutdown,
}

struct Entry {
    conn_id: ConnectionId,
    tx: UnboundedSender<SessionCommand>,
}

/// Shared registry of live websocket sessions, keyed by user.
///
/// At most one session per user: registering while a session is already
/// present supersedes it (the old session is told to shut down). All methods
/// take the lock briefly and never block on delivery; sends to closed
/// sessions are dropped silently.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    sessions: Arc<RwLock<HashMap<Uuid, Entry>>>,
    // conversation id -> users who asked for realtime events on it
    subscriptions: Arc<RwLock<HashMap<Uuid, HashSet<Uuid>>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session for `user_id`, superseding any existing one.
    /// Returns the new connection id and the command receiver for the session.
    pub fn register(&self, user_id: Uuid) -> (ConnectionId, UnboundedReceiver<SessionCommand>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = unbounded();

        let previous = {
            let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
            sessions.insert(user_id, Entry { conn_id, tx })
        };

        if let Some(old) = previous {
            debug!(%user_id, old_conn = %old.conn_id, new_conn = %conn_id, "session superseded");
            let _ = old.tx.unbounded_send(SessionCommand::Shutdown);
        }

        (conn_id, rx)
    }

    /// Remove the session iff it is still the registered one. A disconnect
    /// racing a reconnect carries the old connection id and is ignored here,
    /// so the fresh session survives. Returns whether a session was removed.
    pub fn unregister(&self, user_id: Uuid, conn_id: ConnectionId) -> bool {
        let removed = {
            let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
            match sessions.get(&user_id) {
                Some(entry) if entry.conn_id == conn_id => {
                    sessions.remove(&user_id);
                    true
                }
                _ => false,
            }
        };

        if removed {
            let mut subs = self.subscriptions.write().unwrap_or_else(|e| e.into_inner());
            subs.retain(|_, users| {
                users.remove(&user_id);
                !users.is_empty()
            });
        } else {
            debug!(%user_id, %conn_id, "stale unregister ignored");
        }
        removed
    }

    /// Deliver an event to the user's live session, if any.
    /// Returns whether the user had a registered session.
    pub fn send_to_user(&self, user_id: Uuid, event: ServerEvent) -> bool {
        let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
        match sessions.get(&user_id) {
            Some(entry) => {
                if entry
                    .tx
                    .unbounded_send(SessionCommand::Deliver(event))
                    .is_err()
                {
                    warn!(%user_id, "send to closed session dropped");
                }
                true
            }
            None => false,
        }
    }

    pub fn subscribe(&self, conversation_id: Uuid, user_id: Uuid) {
        self.subscriptions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(conversation_id)
            .or_default()
            .insert(user_id);
    }

    pub fn unsubscribe(&self, conversation_id: Uuid, user_id: Uuid) {
        let mut subs = self.subscriptions.write().unwrap_or_else(|e| e.into_inner());
        if let Some(users) = subs.get_mut(&conversation_id) {
            users.remove(&user_id);
            if users.is_empty() {
                subs.remove(&conversation_id);
            }
        }
    }

    /// Push an event to every subscriber of a conversation except `exclude`
    /// (typically the originator, who already has the result locally).
    pub fn broadcast_to_conversation(
        &self,
        conversation_id: Uuid,
        event: &ServerEvent,
        exclude: Option<Uuid>,
    ) {
        let targets: Vec<Uuid> = {
            let subs = self.subscriptions.read().unwrap_or_else(|e| e.into_inner());
            match subs.get(&conversation_id) {
                Some(users) => users
                    .iter()
                    .copied()
                    .filter(|u| Some(*u) != exclude)
                    .collect(),
                None => return,
            }
        };
        for user_id in targets {
            self.send_to_user(user_id, event.clone());
        }
    }

    /// Push an event to every live session except `exclude`. Used for
    /// presence changes, which are not scoped to one conversation.
    pub fn broadcast_all(&self, event: &ServerEvent, exclude: Option<Uuid>) {
        let targets: Vec<Uuid> = {
            let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
            sessions
                .keys()
                .copied()
                .filter(|u| Some(*u) != exclude)
                .collect()
        };
        for user_id in targets {
            self.send_to_user(user_id, event.clone());
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn next(rx: &mut UnboundedReceiver<SessionCommand>) -> Option<SessionCommand> {
        rx.try_next().ok().flatten()
    }

    #[test]
    fn register_supersedes_previous_session() {
        let registry = ConnectionRegistry::new();
        let user = Uuid::new_v4();

        let (first_conn, mut first_rx) = registry.register(user);
        let (second_conn, mut second_rx) = registry.register(user);
        assert_ne!(first_conn, second_conn);

        // old session told to shut down, new one receives traffic
        assert!(matches!(next(&mut first_rx), Some(SessionCommand::Shutdown)));
        assert!(registry.send_to_user(user, ServerEvent::Connected { user_id: user }));
        assert!(matches!(
            next(&mut second_rx),
            Some(SessionCommand::Deliver(ServerEvent::Connected { .. }))
        ));
        assert!(next(&mut first_rx).is_none());
    }

    #[test]
    fn stale_unregister_does_not_evict_new_session() {
        let registry = ConnectionRegistry::new();
        let user = Uuid::new_v4();

        let (old_conn, _old_rx) = registry.register(user);
        let (_new_conn, _new_rx) = registry.register(user);

        assert!(!registry.unregister(user, old_conn));
        assert!(registry.send_to_user(user, ServerEvent::Connected { user_id: user }));
    }

    #[test]
    fn unregister_removes_session_and_subscriptions() {
        let registry = ConnectionRegistry::new();
        let user = Uuid::new_v4();
        let conversation = Uuid::new_v4();

        let (conn, _rx) = registry.register(user);
        registry.subscribe(conversation, user);

        assert!(registry.unregister(user, conn));
        assert!(!registry.send_to_user(user, ServerEvent::Connected { user_id: user }));

        // broadcast after unregister reaches nobody
        registry.broadcast_to_conversation(
            conversation,
            &ServerEvent::Connected { user_id: user },
            None,
        );
        assert_eq!(registry.session_count(), 0);
    }

    #[test]
    fn broadcast_excludes_the_originator() {
        let registry = ConnectionRegistry::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let conversation = Uuid::new_v4();

        let (_a_conn, mut a_rx) = registry.register(alice);
        let (_b_conn, mut b_rx) = registry.register(bob);
        registry.subscribe(conversation, alice);
        registry.subscribe(conversation, bob);

        registry.broadcast_to_conversation(
            conversation,
            &ServerEvent::Typing {
                conversation_id: conversation,
                user_id: alice,
                is_typing: true,
            },
            Some(alice),
        );

        assert!(next(&mut a_rx).is_none());
        assert!(matches!(
            next(&mut b_rx),
            Some(SessionCommand::Deliver(ServerEvent::Typing { .. }))
        ));
    }

    #[test]
    fn send_to_unknown_user_reports_offline() {
        let registry = ConnectionRegistry::new();
        assert!(!registry.send_to_user(
            Uuid::new_v4(),
            ServerEvent::Connected {
                user_id: Uuid::new_v4()
            }
        ));
    }
}
