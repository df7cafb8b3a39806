pub mod conversation_repository;
pub mod message_repository;
pub mod notification_repository;

pub use conversation_repository::{Conversation, ConversationRepository};
pub use message_repository::{ChatMessage, MessageRepository};
pub use notification_repository::{NOTIFICATION_PAGE_SIZE, Notification, NotificationRepository};
