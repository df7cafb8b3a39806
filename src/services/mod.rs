pub mod auth;
pub mod chat_session_ws;
pub mod events;
pub mod message_relay;
pub mod notification_dispatcher;
pub mod room_registry;
