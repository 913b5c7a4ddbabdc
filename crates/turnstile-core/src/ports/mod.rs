//! Ports - trait definitions for external dependencies.
//! These are the "interfaces" that infrastructure must implement.

mod auth;
mod rate_limit;

pub use auth::{AuthError, TokenService};
pub use rate_limit::{RateLimitResult, RateLimiter};
