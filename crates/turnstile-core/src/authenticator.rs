//! Token authenticator - the per-request credential state machine.
//!
//! ```text
//! Unauthenticated -> Bypassed
//!                 -> HeaderMissing     (fail)
//!                 -> Malformed         (fail)
//!                 -> SignatureInvalid  (fail)
//!                 -> Expired           (fail)
//!                 -> Authenticated
//! ```

use std::sync::Arc;

use crate::domain::{BypassPaths, Claims};
use crate::ports::{AuthError, TokenService};

/// Successful end states. Both let the request proceed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Bypassed,
    Authenticated(Claims),
}

/// Verifies bearer credentials for every path outside the bypass list.
#[derive(Clone)]
pub struct Authenticator {
    tokens: Arc<dyn TokenService>,
    bypass: BypassPaths,
}

impl Authenticator {
    pub fn new(tokens: Arc<dyn TokenService>, bypass: BypassPaths) -> Self {
        Self { tokens, bypass }
    }

    /// Run the state machine for one request.
    ///
    /// `authorization` is the raw `Authorization` header value, if any.
    pub fn authenticate(
        &self,
        path: &str,
        authorization: Option<&str>,
    ) -> Result<AuthOutcome, AuthError> {
        if self.bypass.matches(path) {
            return Ok(AuthOutcome::Bypassed);
        }
        self.verify(authorization).map(AuthOutcome::Authenticated)
    }

    /// Verify a credential regardless of path.
    pub fn verify(&self, authorization: Option<&str>) -> Result<Claims, AuthError> {
        let header = authorization.ok_or(AuthError::MissingAuth)?;
        let token = parse_bearer(header)?;
        self.tokens.validate_token(token)
    }
}

/// Extract the token from `Bearer <token>`.
///
/// Exactly two space-separated parts; the scheme is case-insensitive.
pub fn parse_bearer(header: &str) -> Result<&str, AuthError> {
    let mut parts = header.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None)
            if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() =>
        {
            Ok(token)
        }
        _ => Err(AuthError::MalformedHeader),
    }
}
