//! Authentication ports.

use crate::domain::Claims;

/// Token service trait for bearer credential operations.
pub trait TokenService: Send + Sync {
    /// Sign a token for `subject_id`, valid for the configured lifetime.
    fn generate_token(&self, subject_id: &str, email: Option<&str>) -> Result<String, AuthError>;

    /// Verify signature, algorithm and expiry, and decode the claims.
    fn validate_token(&self, token: &str) -> Result<Claims, AuthError>;
}

/// Authentication errors.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing authorization header")]
    MissingAuth,

    #[error("Invalid authorization header format")]
    MalformedHeader,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token signing failed: {0}")]
    Signing(String),
}

impl AuthError {
    /// Short label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::MissingAuth => "header_missing",
            AuthError::MalformedHeader => "malformed",
            AuthError::TokenExpired => "expired",
            AuthError::InvalidToken(_) => "signature_invalid",
            AuthError::Signing(_) => "signing",
        }
    }
}
