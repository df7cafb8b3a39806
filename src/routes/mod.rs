use actix_web::web;

use crate::handlers::{conversation_handlers, health, notification_handlers, realtime_handlers};

// Configure protected API routes (requires authentication)
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    // Conversation routes (/api/conversations/*)
    cfg.service(
        web::scope("/conversations")
            .route("", web::post().to(conversation_handlers::start_conversation))
            .route("", web::get().to(conversation_handlers::list_conversations))
            .route(
                "/{id}/messages",
                web::get().to(conversation_handlers::list_messages),
            )
            .route(
                "/{id}/messages",
                web::post().to(conversation_handlers::send_message),
            ),
    );

    // Notification routes (/api/notifications/*)
    cfg.service(
        web::scope("/notifications")
            .route("", web::get().to(notification_handlers::list_notifications))
            .route(
                "/read-all",
                web::put().to(notification_handlers::mark_all_notifications_read),
            )
            .route(
                "/{id}/read",
                web::put().to(notification_handlers::mark_notification_read),
            )
            .route(
                "/{id}",
                web::delete().to(notification_handlers::delete_notification),
            ),
    );
}

// Configure the realtime channel (auth happens inside the handshake handler,
// so reconnecting clients can pass the token as a plain header)
pub fn configure_realtime_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/chat", web::get().to(realtime_handlers::chat_ws_handler));
}

// Configure public routes (no authentication required)
pub fn configure_public_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health::health_check));
}
