pub mod conversation_handlers;
pub mod health;
pub mod notification_handlers;
pub mod realtime_handlers;
