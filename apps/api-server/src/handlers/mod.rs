//! HTTP handlers and route configuration.

mod auth;
mod health;

use actix_web::{HttpRequest, HttpResponse, web};

use crate::middleware::{ApiError, AppResult};

/// Configure all application routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            // Bypassed by default
            .route("/health", web::get().to(health::health_check))
            .route("/ready", web::get().to(health::readiness))
            // Protected
            .service(web::scope("/auth").route("/me", web::get().to(auth::me))),
    );
}

/// Fallback for unmatched routes.
pub async fn not_found(req: HttpRequest) -> AppResult<HttpResponse> {
    Err(ApiError::NotFound(format!("No route for {}", req.path())))
}
