use crate::error::AppError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// A chat thread between two marketplace parties, optionally anchored to a
/// pet listing. The participant pair is stored order-normalized so that
/// "start or get" is idempotent regardless of which party initiates.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: Uuid,
    pub participant_one: Uuid,
    pub participant_two: Uuid,
    pub pet_id: Option<Uuid>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub last_message_preview: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    pub fn involves(&self, user_id: &Uuid) -> bool {
        self.participant_one == *user_id || self.participant_two == *user_id
    }

    /// The other party of the pair.
    pub fn counterparty(&self, user_id: &Uuid) -> Option<Uuid> {
        if self.participant_one == *user_id {
            Some(self.participant_two)
        } else if self.participant_two == *user_id {
            Some(self.participant_one)
        } else {
            None
        }
    }
}

pub struct ConversationRepository {
    db_pool: Arc<PgPool>,
}

impl ConversationRepository {
    pub fn new(db_pool: Arc<PgPool>) -> Self {
        Self { db_pool }
    }

    /// Find the conversation for a participant pair, creating it on first
    /// contact. The no-op ON CONFLICT update lets RETURNING yield the
    /// existing row; an existing conversation keeps its pet anchor.
    pub async fn start_or_get(
        &self,
        user_a: &Uuid,
        user_b: &Uuid,
        pet_id: Option<Uuid>,
    ) -> Result<Conversation, AppError> {
        let (one, two) = normalize_pair(user_a, user_b);

        let conversation = sqlx::query_as::<_, Conversation>(
            r#"
            INSERT INTO conversations (participant_one, participant_two, pet_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (participant_one, participant_two) DO UPDATE SET
                participant_one = conversations.participant_one
            RETURNING
                id, participant_one, participant_two, pet_id,
                last_message_at, last_message_preview, created_at
            "#,
        )
        .bind(one)
        .bind(two)
        .bind(pet_id)
        .fetch_one(&*self.db_pool)
        .await
        .map_err(|e| AppError::Database(format!("Failed to start conversation: {}", e)))?;

        Ok(conversation)
    }

    pub async fn get_by_id(&self, conversation_id: &Uuid) -> Result<Conversation, AppError> {
        let conversation = sqlx::query_as::<_, Conversation>(
            r#"
            SELECT
                id, participant_one, participant_two, pet_id,
                last_message_at, last_message_preview, created_at
            FROM conversations
            WHERE id = $1
            "#,
        )
        .bind(conversation_id)
        .fetch_one(&*self.db_pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                AppError::NotFound(format!("Conversation not found: {}", conversation_id))
            }
            _ => AppError::Database(format!("Failed to fetch conversation: {}", e)),
        })?;

        Ok(conversation)
    }

    /// Conversations the user participates in, most recently active first.
    pub async fn list_for_user(&self, user_id: &Uuid) -> Result<Vec<Conversation>, AppError> {
        let conversations = sqlx::query_as::<_, Conversation>(
            r#"
            SELECT
                id, participant_one, participant_two, pet_id,
                last_message_at, last_message_preview, created_at
            FROM conversations
            WHERE participant_one = $1 OR participant_two = $1
            ORDER BY last_message_at DESC NULLS LAST, created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&*self.db_pool)
        .await
        .map_err(|e| AppError::Database(format!("Failed to list conversations: {}", e)))?;

        Ok(conversations)
    }

    /// Membership check used to gate room joins and message sends.
    pub async fn is_participant(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<bool, AppError> {
        let (exists,) = sqlx::query_as::<_, (bool,)>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM conversations
                WHERE id = $1 AND (participant_one = $2 OR participant_two = $2)
            )
            "#,
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_one(&*self.db_pool)
        .await
        .map_err(|e| AppError::Database(format!("Failed to check participation: {}", e)))?;

        Ok(exists)
    }

    /// Refresh the last-message denormalization after an append.
    pub async fn record_last_message(
        &self,
        conversation_id: &Uuid,
        at: DateTime<Utc>,
        preview: &str,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE conversations
            SET last_message_at = $2, last_message_preview = $3
            WHERE id = $1
            "#,
        )
        .bind(conversation_id)
        .bind(at)
        .bind(preview)
        .execute(&*self.db_pool)
        .await
        .map_err(|e| AppError::Database(format!("Failed to record last message: {}", e)))?;

        Ok(())
    }
}

fn normalize_pair(a: &Uuid, b: &Uuid) -> (Uuid, Uuid) {
    if a <= b { (*a, *b) } else { (*b, *a) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_pair_is_order_independent() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(normalize_pair(&a, &b), normalize_pair(&b, &a));
    }

    #[test]
    fn test_counterparty() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let (one, two) = normalize_pair(&a, &b);
        let conversation = Conversation {
            id: Uuid::new_v4(),
            participant_one: one,
            participant_two: two,
            pet_id: None,
            last_message_at: None,
            last_message_preview: None,
            created_at: Utc::now(),
        };

        assert_eq!(conversation.counterparty(&a), Some(b));
        assert_eq!(conversation.counterparty(&b), Some(a));
        assert_eq!(conversation.counterparty(&Uuid::new_v4()), None);
        assert!(conversation.involves(&a) && conversation.involves(&b));
    }
}
