use actix::Message;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::repositories::notification_repository::Notification;

/// A server-to-client frame delivered through room fan-out. Every live
/// session actor handles this message by serializing it onto its socket.
/// The serde tag yields the wire event name (`receive_message`, ...);
/// payload keys are camelCase at the transport edge.
#[derive(Message, Clone, Debug, Serialize)]
#[rtype(result = "()")]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    ReceiveMessage(ChatMessageEvent),
    NewMessageNotification(MessageNotificationEvent),
    UserTyping(TypingEvent),
    NotificationCreated(Notification),
}

/// Inbound `send_message` payload as the client submits it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundChatMessage {
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub text: String,
}

/// The chat event fanned out to a conversation room: the inbound shape
/// plus the server-assigned timestamp.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageEvent {
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Compact payload pushed to the recipient's personal room alongside a
/// chat message, for badge/list updates.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageNotificationEvent {
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Typing indicator, relayed verbatim in both directions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingEvent {
    pub conversation_id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_wire_event_names() {
        let event = ServerEvent::UserTyping(TypingEvent {
            conversation_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            user_name: "Ana".to_string(),
        });

        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&event).unwrap()).unwrap();
        assert_eq!(json["type"], "user_typing");
        assert_eq!(json["userName"], "Ana");
        // Keys are camelCase at the edge.
        assert!(json.get("conversationId").is_some());
        assert!(json.get("conversation_id").is_none());
    }
}
