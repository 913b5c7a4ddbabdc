//! # Turnstile Infrastructure
//!
//! Concrete implementations of the ports defined in `turnstile-core`.
//!
//! ## Feature Flags
//!
//! - `full` (default) - All features enabled
//! - `auth` - HS256 JWT token service
//! - `rate-limit` - Per-key token bucket registry and its sweeper

#[cfg(feature = "auth")]
pub mod auth;

#[cfg(feature = "rate-limit")]
pub mod rate_limit;

#[cfg(feature = "auth")]
pub use auth::{JwtConfig, JwtTokenService};

#[cfg(feature = "rate-limit")]
pub use rate_limit::{BucketRegistry, SweepStats, Sweeper, SweeperConfig};
