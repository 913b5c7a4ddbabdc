//! Authentication stage and identity extractors.

use actix_web::{
    Error, FromRequest, HttpMessage, HttpRequest, ResponseError,
    body::EitherBody,
    dev::{Payload, Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    http::header,
};
use chrono::{DateTime, Utc};
use std::future::{Future, Ready, ready};
use std::pin::Pin;

use turnstile_core::domain::Claims;
use turnstile_core::error::Rejection;
use turnstile_core::{AuthOutcome, Authenticator};

use super::error::ApiError;

/// Authenticated caller identity extractor.
///
/// Populated by [`AuthMiddleware`]; use this in handlers to require
/// authentication:
/// ```ignore
/// async fn protected_route(identity: Identity) -> impl Responder {
///     format!("Hello, {}!", identity.subject_id)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Identity {
    pub subject_id: String,
    pub email: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        Self {
            subject_id: claims.subject_id,
            email: claims.email,
            expires_at: claims.expires_at,
        }
    }
}

impl FromRequest for Identity {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        // Absent on bypassed paths, or when the stage is not mounted.
        let identity = req.extensions().get::<Identity>().cloned();
        ready(identity.ok_or_else(|| {
            ApiError::from(Rejection::Unauthorized(
                "Missing authorization header".to_string(),
            ))
        }))
    }
}

/// Optional identity extractor - doesn't fail if not authenticated.
pub struct OptionalIdentity(pub Option<Identity>);

impl FromRequest for OptionalIdentity {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(Ok(OptionalIdentity(req.extensions().get::<Identity>().cloned())))
    }
}

/// Authentication middleware factory.
pub struct AuthMiddleware {
    authenticator: Authenticator,
}

impl AuthMiddleware {
    pub fn new(authenticator: Authenticator) -> Self {
        Self { authenticator }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = AuthMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service,
            authenticator: self.authenticator.clone(),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: S,
    authenticator: Authenticator,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // A header that is not visible ASCII cannot be a bearer credential.
        let outcome = {
            let authorization = req
                .headers()
                .get(header::AUTHORIZATION)
                .map(|v| v.to_str().unwrap_or_default());
            self.authenticator.authenticate(req.path(), authorization)
        };

        match outcome {
            Ok(AuthOutcome::Bypassed) => {
                tracing::trace!(path = %req.path(), "Authentication bypassed");
            }
            Ok(AuthOutcome::Authenticated(claims)) => {
                tracing::debug!(subject_id = %claims.subject_id, "Request authenticated");
                req.extensions_mut().insert(Identity::from(claims));
            }
            Err(err) => {
                tracing::debug!(kind = err.kind(), path = %req.path(), error = %err, "Authentication failed");

                let response = ApiError::from(err).error_response();
                let (http_req, _payload) = req.into_parts();
                let srv_response = ServiceResponse::new(http_req, response);
                return Box::pin(async move { Ok(srv_response.map_into_right_body()) });
            }
        }

        let fut = self.service.call(req);
        Box::pin(async move {
            let res = fut.await?;
            Ok(res.map_into_left_body())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, HttpResponse, http::StatusCode, test, web};
    use chrono::TimeDelta;
    use std::sync::Arc;
    use std::time::Duration;
    use turnstile_core::domain::BypassPaths;
    use turnstile_core::ports::TokenService;
    use turnstile_infra::{JwtConfig, JwtTokenService};

    fn token_service() -> Arc<JwtTokenService> {
        Arc::new(JwtTokenService::new(JwtConfig {
            secret: "test-secret".to_string(),
            lifetime: Duration::from_secs(3600),
            issuer: "test".to_string(),
        }))
    }

    fn authenticator(tokens: Arc<JwtTokenService>) -> Authenticator {
        Authenticator::new(tokens, BypassPaths::new(["/public"]))
    }

    async fn whoami(identity: Identity) -> HttpResponse {
        HttpResponse::Ok().body(identity.subject_id)
    }

    async fn maybe_whoami(identity: OptionalIdentity) -> HttpResponse {
        match identity.0 {
            Some(identity) => HttpResponse::Ok().body(identity.subject_id),
            None => HttpResponse::Ok().body("anonymous"),
        }
    }

    macro_rules! app {
        ($tokens:expr) => {
            test::init_service(
                App::new()
                    .wrap(AuthMiddleware::new(authenticator($tokens)))
                    .route("/private", web::get().to(whoami))
                    .route("/public", web::get().to(maybe_whoami))
                    .route("/public/whoami", web::get().to(whoami)),
            )
            .await
        };
    }

    async fn error_code<B: actix_web::body::MessageBody>(resp: ServiceResponse<B>) -> String {
        let body: serde_json::Value = test::read_body_json(resp).await;
        body["error"]["code"].as_str().unwrap_or_default().to_string()
    }

    #[actix_web::test]
    async fn test_valid_token_attaches_identity() {
        let tokens = token_service();
        let token = tokens.generate_token("user-7", None).unwrap();
        let app = app!(tokens);

        let req = test::TestRequest::get()
            .uri("/private")
            .insert_header((header::AUTHORIZATION, format!("Bearer {token}")))
            .to_request();
        let body = test::call_and_read_body(&app, req).await;
        assert_eq!(body, "user-7");
    }

    #[actix_web::test]
    async fn test_scheme_is_case_insensitive() {
        let tokens = token_service();
        let token = tokens.generate_token("user-7", None).unwrap();
        let app = app!(tokens);

        let req = test::TestRequest::get()
            .uri("/private")
            .insert_header((header::AUTHORIZATION, format!("bearer {token}")))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_missing_header() {
        let app = app!(token_service());

        let req = test::TestRequest::get().uri("/private").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(error_code(resp).await, "UNAUTHORIZED");
    }

    #[actix_web::test]
    async fn test_malformed_header() {
        let app = app!(token_service());

        for value in ["Token abc", "Bearer", "Bearer a b", "Basic dXNlcjpwYXNz"] {
            let req = test::TestRequest::get()
                .uri("/private")
                .insert_header((header::AUTHORIZATION, value))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
            assert_eq!(error_code(resp).await, "UNAUTHORIZED");
        }
    }

    #[actix_web::test]
    async fn test_expired_token() {
        let tokens = token_service();
        let token = tokens
            .issue_at("user-7", None, Utc::now() - TimeDelta::hours(2))
            .unwrap();
        let app = app!(tokens);

        let req = test::TestRequest::get()
            .uri("/private")
            .insert_header((header::AUTHORIZATION, format!("Bearer {token}")))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(error_code(resp).await, "TOKEN_EXPIRED");
    }

    #[actix_web::test]
    async fn test_invalid_token() {
        let app = app!(token_service());

        let req = test::TestRequest::get()
            .uri("/private")
            .insert_header((header::AUTHORIZATION, "Bearer not.a.jwt"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(error_code(resp).await, "INVALID_TOKEN");
    }

    #[actix_web::test]
    async fn test_bypass_path_without_header() {
        let app = app!(token_service());

        let req = test::TestRequest::get().uri("/public").to_request();
        let body = test::call_and_read_body(&app, req).await;
        assert_eq!(body, "anonymous");
    }

    #[actix_web::test]
    async fn test_bypass_ignores_bad_credentials() {
        let app = app!(token_service());

        let req = test::TestRequest::get()
            .uri("/public")
            .insert_header((header::AUTHORIZATION, "Bearer not.a.jwt"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_identity_extractor_rejects_on_bypassed_path() {
        let app = app!(token_service());

        let req = test::TestRequest::get().uri("/public/whoami").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(error_code(resp).await, "UNAUTHORIZED");
    }
}
