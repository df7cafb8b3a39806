use actix_web::{HttpResponse, web};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::repositories::conversation_repository::ConversationRepository;
use crate::db::repositories::message_repository::MessageRepository;
use crate::error::AppError;
use crate::models::authenticated_user::AuthenticatedUser;
use crate::services::message_relay::MessageRelay;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartConversationRequest {
    pub participant_id: Uuid,
    pub pet_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub text: String,
}

/// Start a conversation with another party, or return the existing one for
/// the pair. The UI calls this on every "message the shelter" click, so it
/// must be idempotent.
pub async fn start_conversation(
    user: AuthenticatedUser,
    payload: web::Json<StartConversationRequest>,
    conversations: web::Data<ConversationRepository>,
) -> Result<HttpResponse, AppError> {
    if payload.participant_id == user.user_id {
        return Err(AppError::Validation(
            "Cannot start a conversation with yourself".to_string(),
        ));
    }

    let conversation = conversations
        .start_or_get(&user.user_id, &payload.participant_id, payload.pet_id)
        .await?;

    info!(
        user_id = %user.user_id,
        conversation_id = %conversation.id,
        "Conversation started or fetched"
    );

    Ok(HttpResponse::Ok().json(conversation))
}

/// Conversations the caller participates in, most recently active first.
pub async fn list_conversations(
    user: AuthenticatedUser,
    conversations: web::Data<ConversationRepository>,
) -> Result<HttpResponse, AppError> {
    let list = conversations.list_for_user(&user.user_id).await?;
    Ok(HttpResponse::Ok().json(list))
}

/// Message history for one conversation, oldest first. Non-participants get
/// NotFound rather than Forbidden so conversation ids cannot be probed.
pub async fn list_messages(
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
    conversations: web::Data<ConversationRepository>,
    messages: web::Data<MessageRepository>,
) -> Result<HttpResponse, AppError> {
    let conversation_id = path.into_inner();

    let conversation = conversations.get_by_id(&conversation_id).await?;
    if !conversation.involves(&user.user_id) {
        return Err(AppError::NotFound(format!(
            "Conversation not found: {}",
            conversation_id
        )));
    }

    let history = messages.list_for_conversation(&conversation_id).await?;
    Ok(HttpResponse::Ok().json(history))
}

/// Durable send path: persist the message, refresh the conversation's
/// last-message denormalization, then hand the stored record to the relay
/// for live fan-out. Emitting only after a successful write keeps REST
/// history the source of truth.
pub async fn send_message(
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
    payload: web::Json<SendMessageRequest>,
    conversations: web::Data<ConversationRepository>,
    messages: web::Data<MessageRepository>,
    relay: web::Data<MessageRelay>,
) -> Result<HttpResponse, AppError> {
    let conversation_id = path.into_inner();

    let text = payload.text.trim();
    if text.is_empty() {
        return Err(AppError::Validation(
            "Message text must not be empty".to_string(),
        ));
    }

    let conversation = conversations.get_by_id(&conversation_id).await?;
    let Some(recipient_id) = conversation.counterparty(&user.user_id) else {
        return Err(AppError::NotFound(format!(
            "Conversation not found: {}",
            conversation_id
        )));
    };

    let message = messages
        .create(&conversation_id, &user.user_id, &recipient_id, text)
        .await?;

    // The denormalized preview is cosmetic; its failure must not undo a
    // stored message.
    if let Err(e) = conversations
        .record_last_message(&conversation_id, message.created_at, text)
        .await
    {
        warn!(
            conversation_id = %conversation_id,
            error = %e,
            "Failed to refresh last-message preview"
        );
    }

    let delivery = relay.relay_persisted(&message);

    info!(
        user_id = %user.user_id,
        conversation_id = %conversation_id,
        message_id = %message.id,
        conversation_delivered = delivery.conversation_delivered,
        personal_delivered = delivery.personal_delivered,
        "Message stored and relayed"
    );

    Ok(HttpResponse::Created().json(message))
}
