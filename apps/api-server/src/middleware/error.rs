//! Error rendering - every rejection becomes a `{error:{code,message}}` body.

use actix_web::http::header::{HeaderValue, RETRY_AFTER};
use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use std::fmt;

use turnstile_core::error::{ErrorCode, Rejection};
use turnstile_core::ports::AuthError;
use turnstile_shared::ErrorResponse;

/// Header carrying the bucket capacity on rate-limited responses.
pub const RATE_LIMIT_LIMIT_HEADER: &str = "x-ratelimit-limit";
/// Header carrying the whole requests left for the caller.
pub const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";

/// Application-level error type that converts to the JSON error envelope.
#[derive(Debug)]
pub enum ApiError {
    Rejected(Rejection),
    NotFound(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Rejected(rejection) => write!(f, "{}: {}", rejection.code(), rejection),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
        }
    }
}

impl ApiError {
    fn code(&self) -> ErrorCode {
        match self {
            ApiError::Rejected(rejection) => rejection.code(),
            ApiError::NotFound(_) => ErrorCode::NotFound,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Rejected(rejection) => rejection.to_string(),
            ApiError::NotFound(msg) => msg.clone(),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Rejected(rejection) => StatusCode::from_u16(rejection.status())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = ErrorResponse::new(self.code().as_str(), self.message());
        let mut builder = HttpResponse::build(self.status_code());

        if let ApiError::Rejected(Rejection::RateLimitExceeded { retry_after, limit }) = self {
            // Whole seconds, rounded up, never zero.
            let secs = retry_after.as_secs_f64().ceil().max(1.0) as u64;
            builder
                .insert_header((RETRY_AFTER, HeaderValue::from(secs)))
                .insert_header((RATE_LIMIT_LIMIT_HEADER, HeaderValue::from(*limit)))
                .insert_header((RATE_LIMIT_REMAINING_HEADER, HeaderValue::from_static("0")));
        }

        builder.json(body)
    }
}

impl From<Rejection> for ApiError {
    fn from(rejection: Rejection) -> Self {
        ApiError::Rejected(rejection)
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Rejected(Rejection::from(err))
    }
}

/// Result type alias for handlers.
pub type AppResult<T> = Result<T, ApiError>;
