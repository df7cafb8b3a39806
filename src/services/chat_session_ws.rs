use actix::prelude::*;
use actix_web_actors::ws;
use actix_web_actors::ws::{CloseCode, CloseReason};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::repositories::conversation_repository::ConversationRepository;
use crate::models::authenticated_user::AuthenticatedUser;
use crate::services::events::{InboundChatMessage, ServerEvent, TypingEvent};
use crate::services::message_relay::MessageRelay;
use crate::services::room_registry::{RoomKey, RoomRegistry};

/// How often heartbeat pings are sent
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// How long before lack of client response causes a timeout
const CLIENT_TIMEOUT: Duration = Duration::from_secs(60);

/// Token bucket rate limiter for per-connection rate limiting
struct TokenBucket {
    tokens: u32,
    capacity: u32,
    refill_per_sec: u32,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: u32, refill_per_sec: u32) -> Self {
        Self {
            tokens: capacity,
            capacity,
            refill_per_sec,
            last_refill: Instant::now(),
        }
    }

    fn allow(&mut self) -> bool {
        let elapsed = self.last_refill.elapsed().as_secs();
        if elapsed > 0 {
            let add = (elapsed as u32) * self.refill_per_sec;
            self.tokens = self.tokens.saturating_add(add).min(self.capacity);
            self.last_refill = Instant::now();
        }
        if self.tokens > 0 {
            self.tokens -= 1;
            true
        } else {
            false
        }
    }
}

/// WebSocket actor for one authenticated chat session.
///
/// Each connection owns its own actor; inbound frames become typed actix
/// messages handled on the actor's context, so all session state changes
/// are serialized without explicit locking. Room membership lives in the
/// shared RoomRegistry and is torn down unconditionally in `stopped`.
pub struct ChatSessionWs {
    /// Unique identifier for this WebSocket connection
    session_id: Uuid,
    /// The user behind this session (from the handshake JWT)
    user: AuthenticatedUser,
    rooms: Arc<RoomRegistry>,
    relay: Arc<MessageRelay>,
    conversations: Arc<ConversationRepository>,
    /// Last heartbeat time
    last_heartbeat: Instant,
    /// Per-connection rate limiter
    rate: TokenBucket,
}

impl ChatSessionWs {
    pub fn new(
        user: AuthenticatedUser,
        rooms: Arc<RoomRegistry>,
        relay: Arc<MessageRelay>,
        conversations: Arc<ConversationRepository>,
    ) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            user,
            rooms,
            relay,
            conversations,
            last_heartbeat: Instant::now(),
            rate: TokenBucket::new(50, 25),
        }
    }

    /// Start heartbeat process for this connection
    fn start_heartbeat(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.last_heartbeat) > CLIENT_TIMEOUT {
                warn!(
                    session_id = %act.session_id,
                    user_id = %act.user.user_id,
                    "WebSocket client heartbeat failed, disconnecting"
                );
                ctx.stop();
                return;
            }

            ctx.ping(b"heartbeat");
        });
    }

    /// Send error message to client
    fn send_error(&self, code: &str, message: &str, ctx: &mut ws::WebsocketContext<Self>) {
        let error_response = serde_json::json!({
            "type": "error",
            "code": code,
            "message": message,
            "timestamp": chrono::Utc::now()
        });

        ctx.text(error_response.to_string());
    }

    /// Parse an inbound frame and dispatch it as a typed command to this
    /// actor's mailbox.
    fn handle_frame(&mut self, text: &str, ctx: &mut ws::WebsocketContext<Self>) {
        let parsed: JsonValue = match serde_json::from_str(text) {
            Ok(json) => json,
            Err(_) => {
                warn!(
                    session_id = %self.session_id,
                    "Failed to parse WebSocket message"
                );
                self.send_error("invalid_json", "Invalid JSON format", ctx);
                return;
            }
        };

        let message_type = parsed
            .get("type")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");

        debug!(
            session_id = %self.session_id,
            message_type = %message_type,
            user_id = %self.user.user_id,
            "Received WebSocket message"
        );

        let addr = ctx.address();

        match message_type {
            "join_user" => {
                addr.do_send(JoinUser { payload: parsed });
            }
            "join_conversation" => {
                addr.do_send(JoinConversation { payload: parsed });
            }
            "send_message" => {
                addr.do_send(SendChatMessage { payload: parsed });
            }
            "typing" => {
                addr.do_send(Typing { payload: parsed });
            }
            "ping" => {
                let pong = serde_json::json!({ "type": "pong" });
                ctx.text(pong.to_string());
            }
            "pong" => {
                debug!(session_id = %self.session_id, "Received pong message from client");
            }
            _ => {
                warn!(
                    session_id = %self.session_id,
                    message_type = %message_type,
                    "Unknown message type received"
                );
                self.send_error(
                    "unknown_message_type",
                    &format!("Unknown message type: {}", message_type),
                    ctx,
                );
            }
        }
    }
}

impl Actor for ChatSessionWs {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        info!(
            session_id = %self.session_id,
            user_id = %self.user.user_id,
            "Chat session started"
        );
        self.start_heartbeat(ctx);
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        // Unconditional cleanup: after this, no room broadcast can reach
        // the session.
        self.rooms.leave_all(self.session_id);

        info!(
            session_id = %self.session_id,
            user_id = %self.user.user_id,
            "Chat session stopped"
        );
    }
}

/// Room fan-out delivery: serialize the event onto this session's socket.
impl Handler<ServerEvent> for ChatSessionWs {
    type Result = ();

    fn handle(&mut self, event: ServerEvent, ctx: &mut Self::Context) {
        match serde_json::to_string(&event) {
            Ok(frame) => ctx.text(frame),
            Err(e) => warn!(
                session_id = %self.session_id,
                error = %e,
                "Failed to serialize outbound event"
            ),
        }
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for ChatSessionWs {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.last_heartbeat = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.last_heartbeat = Instant::now();
            }
            Ok(ws::Message::Text(text)) => {
                self.last_heartbeat = Instant::now();

                // Check rate limit before processing
                if !self.rate.allow() {
                    warn!(
                        session_id = %self.session_id,
                        user_id = %self.user.user_id,
                        "Rate limit exceeded; closing WebSocket"
                    );
                    ctx.close(Some(CloseReason {
                        code: CloseCode::Policy,
                        description: Some("rate limit exceeded".into()),
                    }));
                    ctx.stop();
                    return;
                }

                self.handle_frame(&text, ctx);
            }
            Ok(ws::Message::Binary(bin)) => {
                // The chat protocol is text-only JSON.
                debug!(
                    session_id = %self.session_id,
                    len = bin.len(),
                    "Ignoring unexpected binary frame"
                );
            }
            Ok(ws::Message::Close(reason)) => {
                info!(
                    session_id = %self.session_id,
                    reason = ?reason,
                    "WebSocket close message received"
                );
                ctx.stop();
            }
            Err(e) => {
                warn!(
                    session_id = %self.session_id,
                    error = %e,
                    "WebSocket protocol error"
                );
                ctx.stop();
            }
            _ => {}
        }
    }
}

/// Internal typed commands, one per inbound event type.
#[derive(Message)]
#[rtype(result = "()")]
struct JoinUser {
    payload: JsonValue,
}

#[derive(Message)]
#[rtype(result = "()")]
struct JoinConversation {
    payload: JsonValue,
}

#[derive(Message)]
#[rtype(result = "()")]
struct SendChatMessage {
    payload: JsonValue,
}

#[derive(Message)]
#[rtype(result = "()")]
struct Typing {
    payload: JsonValue,
}

impl Handler<JoinUser> for ChatSessionWs {
    type Result = ();

    fn handle(&mut self, msg: JoinUser, ctx: &mut Self::Context) -> Self::Result {
        // The personal room is derived from the handshake identity. A
        // client may echo its own userId; a mismatch is a spoofing attempt.
        if let Some(claimed) = msg.payload.get("userId").and_then(|v| v.as_str()) {
            match Uuid::parse_str(claimed) {
                Ok(id) if id == self.user.user_id => {}
                _ => {
                    warn!(
                        session_id = %self.session_id,
                        user_id = %self.user.user_id,
                        claimed = %claimed,
                        "join_user with foreign user id rejected"
                    );
                    self.send_error("user_mismatch", "Cannot join another user's room", ctx);
                    return;
                }
            }
        }

        let room = RoomKey::User(self.user.user_id);
        self.rooms
            .join(room, self.session_id, ctx.address().recipient());

        debug!(
            session_id = %self.session_id,
            room = %room,
            "Joined personal room"
        );
    }
}

impl Handler<JoinConversation> for ChatSessionWs {
    type Result = ();

    fn handle(&mut self, msg: JoinConversation, ctx: &mut Self::Context) -> Self::Result {
        let conversation_id = match msg
            .payload
            .get("conversationId")
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s).ok())
        {
            Some(id) => id,
            None => {
                self.send_error(
                    "invalid_payload",
                    "join_conversation requires a conversationId",
                    ctx,
                );
                return;
            }
        };

        // A session may only join conversations it participates in; the
        // membership check hits the store before the join is admitted.
        let conversations = self.conversations.clone();
        let user_id = self.user.user_id;

        ctx.spawn(
            async move { conversations.is_participant(&conversation_id, &user_id).await }
                .into_actor(self)
                .map(move |result, act, ctx| match result {
                    Ok(true) => {
                        let room = RoomKey::Conversation(conversation_id);
                        act.rooms.join(room, act.session_id, ctx.address().recipient());
                        debug!(
                            session_id = %act.session_id,
                            room = %room,
                            "Joined conversation room"
                        );
                    }
                    Ok(false) => {
                        warn!(
                            session_id = %act.session_id,
                            user_id = %act.user.user_id,
                            conversation_id = %conversation_id,
                            "join_conversation rejected: not a participant"
                        );
                        act.send_error(
                            "not_participant",
                            "Not a participant of this conversation",
                            ctx,
                        );
                    }
                    Err(e) => {
                        warn!(
                            session_id = %act.session_id,
                            conversation_id = %conversation_id,
                            error = %e,
                            "Participant check failed"
                        );
                        act.send_error(
                            "membership_check_failed",
                            "Could not verify conversation membership",
                            ctx,
                        );
                    }
                }),
        );
    }
}

impl Handler<SendChatMessage> for ChatSessionWs {
    type Result = ();

    fn handle(&mut self, msg: SendChatMessage, ctx: &mut Self::Context) -> Self::Result {
        let message: InboundChatMessage = match serde_json::from_value(msg.payload) {
            Ok(m) => m,
            Err(e) => {
                debug!(
                    session_id = %self.session_id,
                    error = %e,
                    "Malformed send_message payload"
                );
                self.send_error(
                    "invalid_payload",
                    "send_message requires conversationId, senderId, recipientId and text",
                    ctx,
                );
                return;
            }
        };

        // Participant check first, then hand the message to the relay. The
        // relay routes only; the durable record is written by the REST
        // send path.
        let conversations = self.conversations.clone();
        let conversation_id = message.conversation_id;
        let user_id = self.user.user_id;

        ctx.spawn(
            async move {
                let check = conversations.is_participant(&conversation_id, &user_id).await;
                (check, message)
            }
            .into_actor(self)
            .map(move |(check, message), act, ctx| match check {
                Ok(true) => {
                    match act
                        .relay
                        .relay_chat_message(Some(act.session_id), act.user.user_id, message)
                    {
                        Ok(delivery) => {
                            debug!(
                                session_id = %act.session_id,
                                conversation_delivered = delivery.conversation_delivered,
                                personal_delivered = delivery.personal_delivered,
                                "Chat message relayed"
                            );
                        }
                        Err(e) => {
                            act.send_error(e.code(), &e.to_string(), ctx);
                        }
                    }
                }
                Ok(false) => {
                    warn!(
                        session_id = %act.session_id,
                        user_id = %act.user.user_id,
                        conversation_id = %conversation_id,
                        "send_message rejected: not a participant"
                    );
                    act.send_error(
                        "not_participant",
                        "Not a participant of this conversation",
                        ctx,
                    );
                }
                Err(e) => {
                    warn!(
                        session_id = %act.session_id,
                        conversation_id = %conversation_id,
                        error = %e,
                        "Participant check failed"
                    );
                    act.send_error(
                        "membership_check_failed",
                        "Could not verify conversation membership",
                        ctx,
                    );
                }
            }),
        );
    }
}

impl Handler<Typing> for ChatSessionWs {
    type Result = ();

    fn handle(&mut self, msg: Typing, ctx: &mut Self::Context) -> Self::Result {
        let event: TypingEvent = match serde_json::from_value(msg.payload) {
            Ok(e) => e,
            Err(_) => {
                self.send_error(
                    "invalid_payload",
                    "typing requires conversationId, userId and userName",
                    ctx,
                );
                return;
            }
        };

        match self
            .relay
            .relay_typing(self.session_id, self.user.user_id, event)
        {
            Ok(delivered) => {
                debug!(
                    session_id = %self.session_id,
                    delivered = delivered,
                    "Typing indicator relayed"
                );
            }
            Err(e) => {
                self.send_error(e.code(), &e.to_string(), ctx);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_bucket_exhausts_and_refills() {
        let mut bucket = TokenBucket::new(2, 1);
        assert!(bucket.allow());
        assert!(bucket.allow());
        assert!(!bucket.allow());

        // Simulate a second of elapsed time; one token comes back.
        bucket.last_refill = Instant::now() - Duration::from_secs(1);
        assert!(bucket.allow());
        assert!(!bucket.allow());
    }

    #[test]
    fn test_token_bucket_refill_caps_at_capacity() {
        let mut bucket = TokenBucket::new(3, 100);
        bucket.tokens = 0;
        bucket.last_refill = Instant::now() - Duration::from_secs(5);
        assert!(bucket.allow());
        assert!(bucket.tokens <= bucket.capacity);
    }
}
