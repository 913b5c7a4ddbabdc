//! Identity handlers.

use actix_web::HttpResponse;

use turnstile_shared::dto::IdentityResponse;

use crate::middleware::Identity;
use crate::observability::RequestId;

/// GET /api/auth/me
///
/// Echo the verified subject back to the caller.
pub async fn me(identity: Identity, request_id: RequestId) -> HttpResponse {
    tracing::debug!(
        subject_id = %identity.subject_id,
        request_id = %request_id.as_str(),
        "Identity lookup"
    );

    HttpResponse::Ok().json(IdentityResponse {
        subject_id: identity.subject_id,
        email: identity.email,
        expires_at: identity.expires_at.to_rfc3339(),
    })
}
