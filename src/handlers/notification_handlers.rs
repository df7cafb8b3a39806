use actix_web::{HttpResponse, web};
use serde::Serialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::db::repositories::notification_repository::{Notification, NotificationRepository};
use crate::error::AppError;
use crate::models::authenticated_user::AuthenticatedUser;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationListResponse {
    pub notifications: Vec<Notification>,
    /// True unread total, computed independently of the returned page:
    /// unread records older than the page still count.
    pub unread_count: i64,
}

/// The 50 most recent notifications for the caller, newest first, plus the
/// unread total.
pub async fn list_notifications(
    user: AuthenticatedUser,
    notifications: web::Data<NotificationRepository>,
) -> Result<HttpResponse, AppError> {
    let recipient = user.as_recipient();

    let page = notifications.list_recent(recipient).await?;
    let unread_count = notifications.unread_count(recipient).await?;

    Ok(HttpResponse::Ok().json(NotificationListResponse {
        notifications: page,
        unread_count,
    }))
}

/// Mark one notification read. Idempotent: already-read records return
/// success unchanged.
pub async fn mark_notification_read(
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
    notifications: web::Data<NotificationRepository>,
) -> Result<HttpResponse, AppError> {
    let notification_id = path.into_inner();

    let updated = notifications
        .mark_read(user.as_recipient(), &notification_id)
        .await?;

    Ok(HttpResponse::Ok().json(updated))
}

/// Mark everything read. Succeeds even when nothing was unread.
pub async fn mark_all_notifications_read(
    user: AuthenticatedUser,
    notifications: web::Data<NotificationRepository>,
) -> Result<HttpResponse, AppError> {
    let updated = notifications.mark_all_read(user.as_recipient()).await?;

    info!(
        user_id = %user.user_id,
        updated = updated,
        "Marked all notifications read"
    );

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "updated": updated
    })))
}

/// Owner-only delete.
pub async fn delete_notification(
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
    notifications: web::Data<NotificationRepository>,
) -> Result<HttpResponse, AppError> {
    let notification_id = path.into_inner();

    notifications
        .delete(user.as_recipient(), &notification_id)
        .await?;

    info!(
        user_id = %user.user_id,
        notification_id = %notification_id,
        "Notification deleted"
    );

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Notification deleted"
    })))
}
