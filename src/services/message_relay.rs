use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::db::repositories::message_repository::ChatMessage;
use crate::services::events::{
    ChatMessageEvent, InboundChatMessage, MessageNotificationEvent, ServerEvent, TypingEvent,
};
use crate::services::room_registry::{RoomKey, RoomRegistry, SessionId};

/// Rejections the relay reports back to the originating session. Everything
/// else about delivery is best-effort: offline rooms are silently skipped.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RelayError {
    #[error("message text must not be empty")]
    EmptyText,
    #[error("event sender {claimed} does not match authenticated user {authenticated}")]
    SenderMismatch { claimed: Uuid, authenticated: Uuid },
}

impl RelayError {
    /// Stable error code for the client-facing error frame.
    pub fn code(&self) -> &'static str {
        match self {
            RelayError::EmptyText => "empty_message",
            RelayError::SenderMismatch { .. } => "sender_mismatch",
        }
    }
}

/// Delivery summary of one relayed chat message.
#[derive(Debug, Clone, Copy)]
pub struct ChatDelivery {
    /// Sessions reached in the conversation room.
    pub conversation_delivered: usize,
    /// Sessions reached in the recipient's personal room.
    pub personal_delivered: usize,
    pub created_at: DateTime<Utc>,
}

/// Routes chat and typing events between rooms. Pure routing: the relay
/// never touches the store; the REST send path persists first and invokes
/// the relay only after a successful write.
pub struct MessageRelay {
    rooms: Arc<RoomRegistry>,
}

impl MessageRelay {
    pub fn new(rooms: Arc<RoomRegistry>) -> Self {
        Self { rooms }
    }

    /// Relay an inbound socket chat message: fan out to the conversation
    /// room (origin session excluded) and independently push a compact
    /// notification to the recipient's personal room with a server-assigned
    /// timestamp.
    pub fn relay_chat_message(
        &self,
        origin: Option<SessionId>,
        authenticated_user: Uuid,
        message: InboundChatMessage,
    ) -> Result<ChatDelivery, RelayError> {
        if message.sender_id != authenticated_user {
            return Err(RelayError::SenderMismatch {
                claimed: message.sender_id,
                authenticated: authenticated_user,
            });
        }

        let text = message.text.trim();
        if text.is_empty() {
            return Err(RelayError::EmptyText);
        }

        let event = ChatMessageEvent {
            conversation_id: message.conversation_id,
            sender_id: message.sender_id,
            recipient_id: message.recipient_id,
            text: text.to_string(),
            created_at: Utc::now(),
        };

        Ok(self.fan_out(origin, event))
    }

    /// Relay a message already persisted by the REST send path. No origin
    /// session exists, so every conversation-room member receives it, and
    /// the timestamp is the stored one.
    pub fn relay_persisted(&self, message: &ChatMessage) -> ChatDelivery {
        let event = ChatMessageEvent {
            conversation_id: message.conversation_id,
            sender_id: message.sender_id,
            recipient_id: message.recipient_id,
            text: message.body.clone(),
            created_at: message.created_at,
        };

        self.fan_out(None, event)
    }

    /// Ephemeral typing pass-through: conversation room minus the sender.
    /// No persistence, no debouncing; staleness is the client's problem.
    pub fn relay_typing(
        &self,
        origin: SessionId,
        authenticated_user: Uuid,
        event: TypingEvent,
    ) -> Result<usize, RelayError> {
        if event.user_id != authenticated_user {
            return Err(RelayError::SenderMismatch {
                claimed: event.user_id,
                authenticated: authenticated_user,
            });
        }

        let delivered = self.rooms.broadcast(
            RoomKey::Conversation(event.conversation_id),
            ServerEvent::UserTyping(event),
            Some(origin),
        );
        Ok(delivered)
    }

    fn fan_out(&self, origin: Option<SessionId>, event: ChatMessageEvent) -> ChatDelivery {
        let notification = MessageNotificationEvent {
            conversation_id: event.conversation_id,
            sender_id: event.sender_id,
            text: event.text.clone(),
            created_at: event.created_at,
        };
        let conversation_room = RoomKey::Conversation(event.conversation_id);
        let personal_room = RoomKey::User(event.recipient_id);
        let created_at = event.created_at;

        let conversation_delivered =
            self.rooms
                .broadcast(conversation_room, ServerEvent::ReceiveMessage(event), origin);
        let personal_delivered = self.rooms.broadcast(
            personal_room,
            ServerEvent::NewMessageNotification(notification),
            None,
        );

        debug!(
            room = %conversation_room,
            conversation_delivered = conversation_delivered,
            personal_delivered = personal_delivered,
            "Relayed chat message"
        );

        ChatDelivery {
            conversation_delivered,
            personal_delivered,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix::prelude::*;
    use std::sync::Mutex;

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

    fn inbound(conversation_id: Uuid, sender: Uuid, recipient: Uuid, text: &str) -> InboundChatMessage {
        InboundChatMessage {
            conversation_id,
            sender_id: sender,
            recipient_id: recipient,
            text: text.to_string(),
        }
    }

    #[actix_rt::test]
    async fn test_empty_text_is_rejected() {
        let relay = MessageRelay::new(Arc::new(RoomRegistry::new()));
        let sender = Uuid::new_v4();

        let result = relay.relay_chat_message(
            None,
            sender,
            inbound(Uuid::new_v4(), sender, Uuid::new_v4(), "   "),
        );
        assert_eq!(result.unwrap_err(), RelayError::EmptyText);
    }

    #[actix_rt::test]
    async fn test_sender_spoofing_is_rejected() {
        let relay = MessageRelay::new(Arc::new(RoomRegistry::new()));
        let authenticated = Uuid::new_v4();
        let claimed = Uuid::new_v4();

        let result = relay.relay_chat_message(
            None,
            authenticated,
            inbound(Uuid::new_v4(), claimed, Uuid::new_v4(), "hi"),
        );
        assert!(matches!(result, Err(RelayError::SenderMismatch { .. })));
        assert_eq!(result.unwrap_err().code(), "sender_mismatch");
    }

    #[actix_rt::test]
    async fn test_offline_recipient_is_a_silent_no_op() {
        let relay = MessageRelay::new(Arc::new(RoomRegistry::new()));
        let sender = Uuid::new_v4();

        let delivery = relay
            .relay_chat_message(
                None,
                sender,
                inbound(Uuid::new_v4(), sender, Uuid::new_v4(), "hi"),
            )
            .expect("publish never fails on zero subscribers");
        assert_eq!(delivery.conversation_delivered, 0);
        assert_eq!(delivery.personal_delivered, 0);
    }

    #[actix_rt::test]
    async fn test_chat_message_reaches_room_and_personal_feed() {
        let registry = Arc::new(RoomRegistry::new());
        let relay = MessageRelay::new(registry.clone());

        let user_a = Uuid::new_v4();
        let user_b = Uuid::new_v4();
        let conversation_id = Uuid::new_v4();

        // A's session and B's session are both in the conversation room;
        // B's session is also in B's personal room.
        let session_a = Uuid::new_v4();
        let session_b = Uuid::new_v4();
        let (addr_a, received_a) = spawn_collector();
        let (addr_b, received_b) = spawn_collector();

        registry.join(
            RoomKey::Conversation(conversation_id),
            session_a,
            addr_a.clone().recipient(),
        );
        registry.join(
            RoomKey::Conversation(conversation_id),
            session_b,
            addr_b.clone().recipient(),
        );
        registry.join(RoomKey::User(user_b), session_b, addr_b.clone().recipient());

        let before = Utc::now();
        let delivery = relay
            .relay_chat_message(
                Some(session_a),
                user_a,
                inbound(conversation_id, user_a, user_b, "hi"),
            )
            .expect("relay");

        assert_eq!(delivery.conversation_delivered, 1);
        assert_eq!(delivery.personal_delivered, 1);

        addr_a.send(Probe).await.unwrap();
        addr_b.send(Probe).await.unwrap();

        // The origin session saw nothing.
        assert!(received_a.lock().unwrap().is_empty());

        // B got the room fan-out and the personal notification, with a
        // server-assigned timestamp.
        let events = received_b.lock().unwrap();
        assert_eq!(events.len(), 2);
        let mut saw_room_event = false;
        let mut saw_notification = false;
        for event in events.iter() {
            match event {
                ServerEvent::ReceiveMessage(m) => {
                    assert_eq!(m.text, "hi");
                    assert_eq!(m.sender_id, user_a);
                    assert!(m.created_at >= before && m.created_at <= Utc::now());
                    saw_room_event = true;
                }
                ServerEvent::NewMessageNotification(n) => {
                    assert_eq!(n.text, "hi");
                    assert_eq!(n.conversation_id, conversation_id);
                    saw_notification = true;
                }
                other => panic!("unexpected event: {:?}", other),
            }
        }
        assert!(saw_room_event && saw_notification);
    }

    #[actix_rt::test]
    async fn test_typing_excludes_the_sender_session() {
        let registry = Arc::new(RoomRegistry::new());
        let relay = MessageRelay::new(registry.clone());

        let conversation_id = Uuid::new_v4();
        let typer = Uuid::new_v4();
        let session_typing = Uuid::new_v4();
        let session_other = Uuid::new_v4();

        let (addr_typing, received_typing) = spawn_collector();
        let (addr_other, received_other) = spawn_collector();
        registry.join(
            RoomKey::Conversation(conversation_id),
            session_typing,
            addr_typing.clone().recipient(),
        );
        registry.join(
            RoomKey::Conversation(conversation_id),
            session_other,
            addr_other.clone().recipient(),
        );

        let delivered = relay
            .relay_typing(
                session_typing,
                typer,
                TypingEvent {
                    conversation_id,
                    user_id: typer,
                    user_name: "Ana".to_string(),
                },
            )
            .expect("relay typing");
        assert_eq!(delivered, 1);

        addr_typing.send(Probe).await.unwrap();
        addr_other.send(Probe).await.unwrap();
        assert!(received_typing.lock().unwrap().is_empty());
        assert_eq!(received_other.lock().unwrap().len(), 1);
    }
}
