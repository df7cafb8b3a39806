use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware::Logger, web};
use dotenv::dotenv;
use std::net::TcpListener;
use std::sync::Arc;

mod config;
mod db;
mod error;
mod handlers;
mod middleware;
mod models;
mod routes;
mod services;

use crate::config::AppSettings;
use crate::db::connection::{create_pool, verify_connection};
use crate::db::repositories::{ConversationRepository, MessageRepository, NotificationRepository};
use crate::middleware::BearerAuthentication;
use crate::routes::{configure_public_routes, configure_realtime_routes, configure_routes};
use crate::services::auth::jwt;
use crate::services::message_relay::MessageRelay;
use crate::services::notification_dispatcher::NotificationDispatcher;
use crate::services::room_registry::RoomRegistry;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    // Tracing events from the realtime layer; the log bridge may already be
    // claimed by env_logger, in which case only the dispatcher is installed.
    let _ = tracing_subscriber::fmt().try_init();

    // Load application settings
    let app_settings = match AppSettings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            log::error!("Failed to load application settings: {}", e);
            log::error!("Cannot start server without valid settings");
            std::process::exit(1);
        }
    };

    // Initialize JWT keys with app settings
    if let Err(e) = jwt::init_jwt_keys(&app_settings.auth.jwt_secret) {
        log::error!("Failed to initialize JWT keys: {}", e);
        log::error!("Cannot start server without working JWT keys");
        std::process::exit(1);
    }
    log::info!("JWT keys initialized successfully");

    // Database connection setup
    let db_pool = match create_pool(&app_settings.database).await {
        Ok(pool) => {
            if let Err(e) = verify_connection(&pool).await {
                log::error!("Database connection verification failed: {}", e);
                log::error!("Cannot start server without a working database connection");
                std::process::exit(1);
            }
            log::info!("Database connection established successfully");
            Arc::new(pool)
        }
        Err(e) => {
            log::error!("Failed to create database connection pool: {}", e);
            log::error!("Cannot start server without a working database connection");
            std::process::exit(1);
        }
    };

    // Realtime state and repositories: constructed once here, shared by
    // every worker. Presence and rooms are process-local; a second server
    // instance has its own rooms.
    let rooms = Arc::new(RoomRegistry::new());
    let relay = Arc::new(MessageRelay::new(rooms.clone()));
    let conversations = Arc::new(ConversationRepository::new(db_pool.clone()));
    let messages = Arc::new(MessageRepository::new(db_pool.clone()));
    let notifications = Arc::new(NotificationRepository::new(db_pool.clone()));
    // Write path for business workflows (pet review, application updates);
    // the handlers in this crate only read notifications.
    let dispatcher = Arc::new(NotificationDispatcher::new(
        notifications.clone(),
        rooms.clone(),
    ));

    let host = app_settings.server.host.clone();
    let port = app_settings.server.port;

    log::info!("Starting server at http://{}:{}", host, port);

    let server_addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(server_addr)?;

    HttpServer::new(move || {
        // Configure CORS using actix-cors
        let mut cors = Cors::default().supports_credentials();

        if app_settings.server.cors_origins.contains(&"*".to_string()) {
            cors = cors.allow_any_origin();
        } else {
            for origin in &app_settings.server.cors_origins {
                cors = cors.allowed_origin(origin);
            }
        }

        cors = cors.allow_any_method().allow_any_header();

        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .app_data(web::Data::new(app_settings.clone()))
            .app_data(web::Data::from(rooms.clone()))
            .app_data(web::Data::from(relay.clone()))
            .app_data(web::Data::from(conversations.clone()))
            .app_data(web::Data::from(messages.clone()))
            .app_data(web::Data::from(notifications.clone()))
            .app_data(web::Data::from(dispatcher.clone()))
            // Public endpoints without auth
            .configure(configure_public_routes)
            // Realtime channel: auth happens in the handshake handler
            .service(web::scope("/ws").configure(configure_realtime_routes))
            // Protected REST API
            .service(
                web::scope("/api")
                    .wrap(BearerAuthentication::new())
                    .configure(configure_routes),
            )
    })
    .listen(listener)?
    .run()
    .await
}
