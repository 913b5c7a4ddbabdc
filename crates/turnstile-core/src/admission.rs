//! Admission controller - binds the admission policy to a rate limiter.

use std::sync::Arc;

use crate::domain::AdmissionPolicy;
use crate::error::Rejection;
use crate::ports::{RateLimitResult, RateLimiter};

/// Decides whether a caller may consume capacity right now.
///
/// The limiter behind it knows nothing about HTTP or error kinds; this type
/// turns a denied check into [`Rejection::RateLimitExceeded`].
#[derive(Clone)]
pub struct AdmissionController {
    limiter: Arc<dyn RateLimiter>,
    policy: AdmissionPolicy,
}

impl AdmissionController {
    pub fn new(limiter: Arc<dyn RateLimiter>, policy: AdmissionPolicy) -> Self {
        Self { limiter, policy }
    }

    /// Admit one request for `key`.
    pub fn allow(&self, key: &str) -> Result<RateLimitResult, Rejection> {
        let result = self.limiter.check(key);
        if result.allowed {
            return Ok(result);
        }

        tracing::warn!(
            key = %key,
            retry_after_ms = result.reset_after.as_millis() as u64,
            "Rate limit exceeded"
        );
        Err(Rejection::RateLimitExceeded {
            retry_after: result.reset_after,
            limit: self.policy.burst_size,
        })
    }

    pub fn policy(&self) -> &AdmissionPolicy {
        &self.policy
    }
}
