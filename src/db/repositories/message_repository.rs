use crate::error::AppError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// A persisted chat message. Immutable once created.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

pub struct MessageRepository {
    db_pool: Arc<PgPool>,
}

impl MessageRepository {
    pub fn new(db_pool: Arc<PgPool>) -> Self {
        Self { db_pool }
    }

    pub async fn create(
        &self,
        conversation_id: &Uuid,
        sender_id: &Uuid,
        recipient_id: &Uuid,
        body: &str,
    ) -> Result<ChatMessage, AppError> {
        let message = sqlx::query_as::<_, ChatMessage>(
            r#"
            INSERT INTO messages (conversation_id, sender_id, recipient_id, body)
            VALUES ($1, $2, $3, $4)
            RETURNING id, conversation_id, sender_id, recipient_id, body, created_at
            "#,
        )
        .bind(conversation_id)
        .bind(sender_id)
        .bind(recipient_id)
        .bind(body)
        .fetch_one(&*self.db_pool)
        .await
        .map_err(|e| AppError::Database(format!("Failed to store message: {}", e)))?;

        Ok(message)
    }

    /// Full history for a conversation, oldest first.
    pub async fn list_for_conversation(
        &self,
        conversation_id: &Uuid,
    ) -> Result<Vec<ChatMessage>, AppError> {
        let messages = sqlx::query_as::<_, ChatMessage>(
            r#"
            SELECT id, conversation_id, sender_id, recipient_id, body, created_at
            FROM messages
            WHERE conversation_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(conversation_id)
        .fetch_all(&*self.db_pool)
        .await
        .map_err(|e| AppError::Database(format!("Failed to list messages: {}", e)))?;

        Ok(messages)
    }
}
