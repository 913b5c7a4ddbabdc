//! Rejection taxonomy and policy errors.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::ports::AuthError;

/// Stable machine-readable error codes sent to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    RateLimitExceeded,
    Unauthorized,
    TokenExpired,
    InvalidToken,
    NotFound,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::TokenExpired => "TOKEN_EXPIRED",
            ErrorCode::InvalidToken => "INVALID_TOKEN",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a request was stopped before reaching its handler.
///
/// Every failure of the admission layer is classified into one of these
/// kinds. None of them is fatal to the process and none should be retried
/// by the layer itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// The caller's bucket had no whole token left.
    #[error("Too many requests, please try again later")]
    RateLimitExceeded { retry_after: Duration, limit: u32 },

    /// Credential missing or not of the form `Bearer <token>`.
    #[error("{0}")]
    Unauthorized(String),

    /// Signature verified but the validity window has lapsed.
    #[error("Token has expired")]
    TokenExpired,

    /// Signature, algorithm or claims did not verify.
    #[error("Invalid token")]
    InvalidToken,

    /// A stage panicked or was misconfigured.
    #[error("An unexpected error occurred")]
    Internal,
}

impl Rejection {
    pub fn code(&self) -> ErrorCode {
        match self {
            Rejection::RateLimitExceeded { .. } => ErrorCode::RateLimitExceeded,
            Rejection::Unauthorized(_) => ErrorCode::Unauthorized,
            Rejection::TokenExpired => ErrorCode::TokenExpired,
            Rejection::InvalidToken => ErrorCode::InvalidToken,
            Rejection::Internal => ErrorCode::InternalError,
        }
    }

    /// HTTP status the delivery layer should use.
    pub fn status(&self) -> u16 {
        match self {
            Rejection::RateLimitExceeded { .. } => 429,
            Rejection::Unauthorized(_) | Rejection::TokenExpired | Rejection::InvalidToken => 401,
            Rejection::Internal => 500,
        }
    }
}

impl From<AuthError> for Rejection {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingAuth => Rejection::Unauthorized("Missing authorization header".into()),
            AuthError::MalformedHeader => {
                Rejection::Unauthorized("Invalid authorization header format".into())
            }
            AuthError::TokenExpired => Rejection::TokenExpired,
            AuthError::InvalidToken(_) => Rejection::InvalidToken,
            AuthError::Signing(_) => Rejection::Internal,
        }
    }
}

/// Invalid policy values supplied at startup.
#[derive(Debug, Error, PartialEq)]
pub enum PolicyError {
    #[error("requests per second must be greater than zero")]
    ZeroRate,

    #[error("burst size must be at least 1")]
    ZeroBurst,

    #[error("cleanup interval must be greater than zero")]
    ZeroCleanupInterval,

    #[error("signing secret must not be empty")]
    EmptySecret,

    #[error("token lifetime must be positive")]
    NonPositiveLifetime,

    #[error("unknown eviction mode: {0}")]
    UnknownEvictionMode(String),
}
