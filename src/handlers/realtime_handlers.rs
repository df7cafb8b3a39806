use actix_web::{HttpRequest, HttpResponse, web};
use actix_web_actors::ws;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::repositories::conversation_repository::ConversationRepository;
use crate::models::authenticated_user::AuthenticatedUser;
use crate::services::auth::jwt;
use crate::services::chat_session_ws::ChatSessionWs;
use crate::services::message_relay::MessageRelay;
use crate::services::room_registry::RoomRegistry;

/// WebSocket endpoint for the chat/notification channel.
pub async fn chat_ws_handler(
    req: HttpRequest,
    stream: web::Payload,
    rooms: web::Data<RoomRegistry>,
    relay: web::Data<MessageRelay>,
    conversations: web::Data<ConversationRepository>,
    user: Option<AuthenticatedUser>,
) -> Result<HttpResponse, actix_web::Error> {
    // The middleware may not run for this route; fall back to the
    // Authorization header on the handshake request.
    let user = user.or_else(|| authenticate_from_headers(&req));

    let Some(user) = user else {
        warn!("WebSocket chat requires authentication");
        return Ok(HttpResponse::Unauthorized().json(serde_json::json!({
            "error": "Authentication required for WebSocket connection"
        })));
    };

    info!(
        user_id = %user.user_id,
        "Starting chat WebSocket connection"
    );

    let session = ChatSessionWs::new(
        user,
        rooms.into_inner(),
        relay.into_inner(),
        conversations.into_inner(),
    );

    let resp = ws::start(session, &req, stream)?;
    Ok(resp)
}

/// Resolve the handshake bearer token to a user identity.
fn authenticate_from_headers(req: &HttpRequest) -> Option<AuthenticatedUser> {
    let auth_header = req.headers().get("Authorization")?;
    let auth_str = auth_header.to_str().ok()?;
    let token = auth_str.strip_prefix("Bearer ")?.trim();

    let claims = jwt::verify_token(token).ok()?;
    let user_id = Uuid::parse_str(&claims.sub).ok()?;

    Some(AuthenticatedUser {
        user_id,
        email: claims.email,
        role: claims.role,
    })
}
