use actix::Recipient;
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::debug;
use uuid::Uuid;

use crate::services::events::ServerEvent;

/// Identifier of one live WebSocket session. A user with several tabs or
/// devices holds several session ids.
pub type SessionId = Uuid;

/// Typed key of a fan-out room. Personal rooms carry notification-style
/// delivery for one user; conversation rooms carry chat delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoomKey {
    User(Uuid),
    Conversation(Uuid),
}

impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoomKey::User(id) => write!(f, "user_{}", id),
            RoomKey::Conversation(id) => write!(f, "conversation_{}", id),
        }
    }
}

/// In-memory presence and room membership. Rooms are created lazily on
/// first join and removed when the last member leaves; a process restart
/// clears everything and clients re-join on reconnect.
///
/// Owned by the composition root and shared by reference. Membership
/// mutations are keyed by session id, so concurrent joins and leaves from
/// different sessions never contend on application-level locks.
pub struct RoomRegistry {
    // room -> session -> delivery handle
    rooms: DashMap<RoomKey, HashMap<SessionId, Recipient<ServerEvent>>>,
    // session -> rooms it joined, for disconnect cleanup
    sessions: DashMap<SessionId, HashSet<RoomKey>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            sessions: DashMap::new(),
        }
    }

    /// Add a session to a room. Idempotent: re-joining replaces the stored
    /// delivery handle.
    pub fn join(&self, room: RoomKey, session_id: SessionId, recipient: Recipient<ServerEvent>) {
        self.rooms
            .entry(room)
            .or_default()
            .insert(session_id, recipient);
        self.sessions.entry(session_id).or_default().insert(room);

        debug!(
            room = %room,
            session_id = %session_id,
            members = self.room_size(&room),
            "Session joined room"
        );
    }

    /// Remove a session from one room. Never errors on unknown rooms or
    /// sessions; empty rooms are garbage-collected.
    pub fn leave(&self, room: RoomKey, session_id: SessionId) {
        if let Some(mut members) = self.rooms.get_mut(&room) {
            members.remove(&session_id);
            let empty = members.is_empty();
            drop(members);
            if empty {
                self.rooms.remove_if(&room, |_, m| m.is_empty());
            }
        }
        if let Some(mut joined) = self.sessions.get_mut(&session_id) {
            joined.remove(&room);
        }

        debug!(room = %room, session_id = %session_id, "Session left room");
    }

    /// Remove a session from every room it joined. Called unconditionally
    /// on disconnect; cannot fail.
    pub fn leave_all(&self, session_id: SessionId) {
        let Some((_, joined)) = self.sessions.remove(&session_id) else {
            return;
        };

        for room in joined {
            if let Some(mut members) = self.rooms.get_mut(&room) {
                members.remove(&session_id);
                let empty = members.is_empty();
                drop(members);
                if empty {
                    self.rooms.remove_if(&room, |_, m| m.is_empty());
                }
            }
        }

        debug!(session_id = %session_id, "Session removed from all rooms");
    }

    /// Fan an event out to every member of a room, optionally excluding the
    /// originating session. Publishing into an empty or unknown room is a
    /// silent no-op. Returns the number of sessions the event was handed to.
    pub fn broadcast(
        &self,
        room: RoomKey,
        event: ServerEvent,
        exclude: Option<SessionId>,
    ) -> usize {
        let Some(members) = self.rooms.get(&room) else {
            return 0;
        };

        let mut delivered = 0;
        for (session_id, recipient) in members.iter() {
            if Some(*session_id) == exclude {
                continue;
            }
            recipient.do_send(event.clone());
            delivered += 1;
        }

        debug!(room = %room, delivered = delivered, "Broadcast event to room");
        delivered
    }

    pub fn room_size(&self, room: &RoomKey) -> usize {
        self.rooms.get(room).map(|m| m.len()).unwrap_or(0)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::events::TypingEvent;
    use actix::prelude::*;
    use std::sync::{Arc, Mutex};

    /// Test actor that records every ServerEvent it receives.
    struct Collector {
        received: Arc<Mutex<Vec<ServerEvent>>>,
    }

    impl Actor for Collector {
        type Context = Context<Self>;
    }

    impl Handler<ServerEvent> for Collector {
        type Result = ();

        fn handle(&mut self, event: ServerEvent, _: &mut Self::Context) {
            self.received.lock().unwrap().push(event);
        }
    }

    /// Mailbox flush: awaiting a round trip guarantees all prior do_send
    /// messages were processed.
    #[derive(Message)]
    #[rtype(result = "()")]
    struct Probe;

    impl Handler<Probe> for Collector {
        type Result = ();

        fn handle(&mut self, _: Probe, _: &mut Self::Context) {}
    }

    fn spawn_collector() -> (Addr<Collector>, Arc<Mutex<Vec<ServerEvent>>>) {
        let received = Arc::new(Mutex::new(Vec::new()));
        let addr = Collector {
            received: received.clone(),
        }
        .start();
        (addr, received)
    }

    fn typing_event() -> ServerEvent {
        ServerEvent::UserTyping(TypingEvent {
            conversation_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            user_name: "Ana".to_string(),
        })
    }

    #[actix_rt::test]
    async fn test_room_isolation() {
        let registry = RoomRegistry::new();
        let conversation_a = RoomKey::Conversation(Uuid::new_v4());
        let conversation_b = RoomKey::Conversation(Uuid::new_v4());

        let (addr_a, received_a) = spawn_collector();
        let (addr_b, received_b) = spawn_collector();
        registry.join(conversation_a, Uuid::new_v4(), addr_a.clone().recipient());
        registry.join(conversation_b, Uuid::new_v4(), addr_b.clone().recipient());

        let delivered = registry.broadcast(conversation_a, typing_event(), None);
        assert_eq!(delivered, 1);

        addr_a.send(Probe).await.unwrap();
        addr_b.send(Probe).await.unwrap();
        assert_eq!(received_a.lock().unwrap().len(), 1);
        assert!(received_b.lock().unwrap().is_empty());
    }

    #[actix_rt::test]
    async fn test_personal_room_reaches_every_session_of_a_user() {
        let registry = RoomRegistry::new();
        let user = Uuid::new_v4();
        let room = RoomKey::User(user);

        let (addr_one, received_one) = spawn_collector();
        let (addr_two, received_two) = spawn_collector();
        registry.join(room, Uuid::new_v4(), addr_one.clone().recipient());
        registry.join(room, Uuid::new_v4(), addr_two.clone().recipient());

        let delivered = registry.broadcast(room, typing_event(), None);
        assert_eq!(delivered, 2);

        addr_one.send(Probe).await.unwrap();
        addr_two.send(Probe).await.unwrap();
        assert_eq!(received_one.lock().unwrap().len(), 1);
        assert_eq!(received_two.lock().unwrap().len(), 1);
    }

    #[actix_rt::test]
    async fn test_exclude_skips_the_originating_session() {
        let registry = RoomRegistry::new();
        let room = RoomKey::Conversation(Uuid::new_v4());
        let origin = Uuid::new_v4();

        let (addr_origin, received_origin) = spawn_collector();
        let (addr_other, received_other) = spawn_collector();
        registry.join(room, origin, addr_origin.clone().recipient());
        registry.join(room, Uuid::new_v4(), addr_other.clone().recipient());

        let delivered = registry.broadcast(room, typing_event(), Some(origin));
        assert_eq!(delivered, 1);

        addr_origin.send(Probe).await.unwrap();
        addr_other.send(Probe).await.unwrap();
        assert!(received_origin.lock().unwrap().is_empty());
        assert_eq!(received_other.lock().unwrap().len(), 1);
    }

    #[actix_rt::test]
    async fn test_leave_all_cleans_up_and_broadcast_stays_silent() {
        let registry = RoomRegistry::new();
        let session = Uuid::new_v4();
        let user_room = RoomKey::User(Uuid::new_v4());
        let chat_room = RoomKey::Conversation(Uuid::new_v4());

        let (addr, received) = spawn_collector();
        registry.join(user_room, session, addr.clone().recipient());
        registry.join(chat_room, session, addr.clone().recipient());
        assert_eq!(registry.session_count(), 1);
        assert_eq!(registry.room_count(), 2);

        registry.leave_all(session);
        assert_eq!(registry.session_count(), 0);
        // Empty rooms are garbage-collected.
        assert_eq!(registry.room_count(), 0);

        // Publishing after disconnect delivers nothing and does not error.
        assert_eq!(registry.broadcast(chat_room, typing_event(), None), 0);
        addr.send(Probe).await.unwrap();
        assert!(received.lock().unwrap().is_empty());

        // leave/leave_all on unknown sessions are no-ops.
        registry.leave(chat_room, session);
        registry.leave_all(session);
    }

    #[actix_rt::test]
    async fn test_rejoin_is_idempotent() {
        let registry = RoomRegistry::new();
        let room = RoomKey::User(Uuid::new_v4());
        let session = Uuid::new_v4();

        let (addr, received) = spawn_collector();
        registry.join(room, session, addr.clone().recipient());
        registry.join(room, session, addr.clone().recipient());
        assert_eq!(registry.room_size(&room), 1);

        registry.broadcast(room, typing_event(), None);
        addr.send(Probe).await.unwrap();
        assert_eq!(received.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_room_key_rendering() {
        let id = Uuid::nil();
        assert_eq!(
            RoomKey::User(id).to_string(),
            format!("user_{}", id)
        );
        assert_eq!(
            RoomKey::Conversation(id).to_string(),
            format!("conversation_{}", id)
        );
    }
}
