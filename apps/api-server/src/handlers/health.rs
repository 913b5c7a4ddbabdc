//! Liveness and readiness endpoints.

use actix_web::HttpResponse;

use turnstile_shared::dto::HealthResponse;

fn status_body(status: &str) -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// GET /api/health
pub async fn health_check() -> HttpResponse {
    status_body("ok")
}

/// GET /api/ready
///
/// The admission layer holds no external connections, so once routes are
/// mounted the process is ready.
pub async fn readiness() -> HttpResponse {
    status_body("ready")
}
