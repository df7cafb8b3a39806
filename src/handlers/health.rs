use actix_web::HttpResponse;
use serde_json::json;

/// Liveness probe. No auth, no database.
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "service": "pawhome-server",
        "timestamp": chrono::Utc::now()
    }))
}
