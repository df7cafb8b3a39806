use crate::error::AppError;
use crate::models::recipient::{NotificationKind, NotificationRecipient, RecipientKind};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Cap on a single notification fetch. The unread count is computed by a
/// separate query and is never bounded by this.
pub const NOTIFICATION_PAGE_SIZE: i64 = 50;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub recipient_type: RecipientKind,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub read: bool,
    pub related_link: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub struct NotificationRepository {
    db_pool: Arc<PgPool>,
}

impl NotificationRepository {
    pub fn new(db_pool: Arc<PgPool>) -> Self {
        Self { db_pool }
    }

    pub async fn create(
        &self,
        recipient: NotificationRecipient,
        kind: NotificationKind,
        title: &str,
        message: &str,
        related_link: Option<&str>,
    ) -> Result<Notification, AppError> {
        let notification = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (recipient_id, recipient_type, kind, title, message, related_link)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, recipient_id, recipient_type, kind, title, message, read, related_link, created_at
            "#,
        )
        .bind(recipient.id())
        .bind(recipient.kind())
        .bind(kind)
        .bind(title)
        .bind(message)
        .bind(related_link)
        .fetch_one(&*self.db_pool)
        .await
        .map_err(|e| AppError::Database(format!("Failed to store notification: {}", e)))?;

        Ok(notification)
    }

    /// The most recent notifications for a recipient, newest first, capped
    /// at NOTIFICATION_PAGE_SIZE.
    pub async fn list_recent(
        &self,
        recipient: NotificationRecipient,
    ) -> Result<Vec<Notification>, AppError> {
        let notifications = sqlx::query_as::<_, Notification>(
            r#"
            SELECT id, recipient_id, recipient_type, kind, title, message, read, related_link, created_at
            FROM notifications
            WHERE recipient_id = $1 AND recipient_type = $2
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(recipient.id())
        .bind(recipient.kind())
        .bind(NOTIFICATION_PAGE_SIZE)
        .fetch_all(&*self.db_pool)
        .await
        .map_err(|e| AppError::Database(format!("Failed to list notifications: {}", e)))?;

        Ok(notifications)
    }

    /// True unread total for a recipient, independent of the list page cap:
    /// unread records older than the returned page still count.
    pub async fn unread_count(&self, recipient: NotificationRecipient) -> Result<i64, AppError> {
        let (count,) = sqlx::query_as::<_, (i64,)>(
            r#"
            SELECT COUNT(*) FROM notifications
            WHERE recipient_id = $1 AND recipient_type = $2 AND read = FALSE
            "#,
        )
        .bind(recipient.id())
        .bind(recipient.kind())
        .fetch_one(&*self.db_pool)
        .await
        .map_err(|e| AppError::Database(format!("Failed to count unread notifications: {}", e)))?;

        Ok(count)
    }

    /// Mark one notification read. Idempotent: re-marking an already-read
    /// notification succeeds without change. NotFound when the record does
    /// not exist or belongs to someone else.
    pub async fn mark_read(
        &self,
        recipient: NotificationRecipient,
        notification_id: &Uuid,
    ) -> Result<Notification, AppError> {
        let notification = sqlx::query_as::<_, Notification>(
            r#"
            UPDATE notifications
            SET read = TRUE
            WHERE id = $1 AND recipient_id = $2 AND recipient_type = $3
            RETURNING id, recipient_id, recipient_type, kind, title, message, read, related_link, created_at
            "#,
        )
        .bind(notification_id)
        .bind(recipient.id())
        .bind(recipient.kind())
        .fetch_one(&*self.db_pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                AppError::NotFound(format!("Notification not found: {}", notification_id))
            }
            _ => AppError::Database(format!("Failed to mark notification read: {}", e)),
        })?;

        Ok(notification)
    }

    /// Mark every unread notification read. Succeeds even when nothing was
    /// unread; returns the number of rows updated.
    pub async fn mark_all_read(&self, recipient: NotificationRecipient) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET read = TRUE
            WHERE recipient_id = $1 AND recipient_type = $2 AND read = FALSE
            "#,
        )
        .bind(recipient.id())
        .bind(recipient.kind())
        .execute(&*self.db_pool)
        .await
        .map_err(|e| AppError::Database(format!("Failed to mark notifications read: {}", e)))?;

        Ok(result.rows_affected())
    }

    /// Owner-only delete.
    pub async fn delete(
        &self,
        recipient: NotificationRecipient,
        notification_id: &Uuid,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            DELETE FROM notifications
            WHERE id = $1 AND recipient_id = $2 AND recipient_type = $3
            "#,
        )
        .bind(notification_id)
        .bind(recipient.id())
        .bind(recipient.kind())
        .execute(&*self.db_pool)
        .await
        .map_err(|e| AppError::Database(format!("Failed to delete notification: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(
                "Notification not found or not owned by user".to_string(),
            ));
        }

        Ok(())
    }
}

// Database-backed tests. These exercise the unread-count and idempotence
// invariants against a real schema and are skipped unless
// PAWHOME_TEST_DATABASE_URL points at a migrated database.
#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;
    use std::env;

    async fn test_pool() -> Option<Arc<PgPool>> {
        let url = env::var("PAWHOME_TEST_DATABASE_URL").ok()?;
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect(&url)
            .await
            .ok()?;
        Some(Arc::new(pool))
    }

    #[tokio::test]
    async fn test_unread_count_is_not_bounded_by_page_size() {
        let Some(pool) = test_pool().await else { return };
        let repo = NotificationRepository::new(pool);
        let recipient = NotificationRecipient::Adopter(Uuid::new_v4());

        // 55 unread first, then 5 read: the read ones are the newest.
        for i in 0..60 {
            let n = repo
                .create(
                    recipient,
                    NotificationKind::Info,
                    &format!("n{}", i),
                    "body",
                    None,
                )
                .await
                .expect("create notification");
            if i >= 55 {
                repo.mark_read(recipient, &n.id).await.expect("mark read");
            }
        }

        let page = repo.list_recent(recipient).await.expect("list");
        assert_eq!(page.len(), NOTIFICATION_PAGE_SIZE as usize);

        let unread = repo.unread_count(recipient).await.expect("count");
        assert_eq!(unread, 55);
        // The returned page holds fewer unread entries than the true total.
        let unread_in_page = page.iter().filter(|n| !n.read).count();
        assert!(unread_in_page < unread as usize);
    }

    #[tokio::test]
    async fn test_mark_read_is_idempotent() {
        let Some(pool) = test_pool().await else { return };
        let repo = NotificationRepository::new(pool);
        let recipient = NotificationRecipient::Shelter(Uuid::new_v4());

        let n = repo
            .create(recipient, NotificationKind::Application, "t", "m", None)
            .await
            .expect("create");

        let first = repo.mark_read(recipient, &n.id).await.expect("first mark");
        assert!(first.read);
        let second = repo.mark_read(recipient, &n.id).await.expect("second mark");
        assert!(second.read);

        // Someone else's notification is invisible to mark_read.
        let stranger = NotificationRecipient::Adopter(Uuid::new_v4());
        let err = repo.mark_read(stranger, &n.id).await;
        assert!(matches!(err, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_mark_all_read_is_idempotent() {
        let Some(pool) = test_pool().await else { return };
        let repo = NotificationRepository::new(pool);
        let recipient = NotificationRecipient::Adopter(Uuid::new_v4());

        for _ in 0..3 {
            repo.create(recipient, NotificationKind::Pet, "t", "m", None)
                .await
                .expect("create");
        }

        let first = repo.mark_all_read(recipient).await.expect("first pass");
        assert_eq!(first, 3);
        assert_eq!(repo.unread_count(recipient).await.expect("count"), 0);

        let second = repo.mark_all_read(recipient).await.expect("second pass");
        assert_eq!(second, 0);
        assert_eq!(repo.unread_count(recipient).await.expect("count"), 0);
    }
}
