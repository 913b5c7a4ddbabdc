//! Rate limiting port.

use std::time::Duration;

/// Rate limiter trait - abstraction over per-key admission backends.
///
/// Checks are synchronous and infallible: a backend that cannot decide must
/// still answer, so the pipeline never sees an unclassified error.
pub trait RateLimiter: Send + Sync {
    /// Spend one unit of the caller's capacity if available.
    fn check(&self, key: &str) -> RateLimitResult;

    /// Boolean projection of [`RateLimiter::check`].
    fn allow(&self, key: &str) -> bool {
        self.check(key).allowed
    }
}

/// Result of a rate limit check.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitResult {
    pub allowed: bool,
    /// Whole requests the caller may still issue right now.
    pub remaining: u32,
    /// Time until the next unit becomes available; zero when allowed.
    pub reset_after: Duration,
}

impl RateLimitResult {
    pub fn allowed(remaining: u32) -> Self {
        Self {
            allowed: true,
            remaining,
            reset_after: Duration::ZERO,
        }
    }

    pub fn denied(reset_after: Duration) -> Self {
        Self {
            allowed: false,
            remaining: 0,
            reset_after,
        }
    }
}
