//! Middleware modules - the stages of the admission pipeline.

pub mod auth;
pub mod error;
pub mod rate_limit;
pub mod recovery;
pub mod security_headers;

pub use auth::{AuthMiddleware, Identity, OptionalIdentity};
pub use error::{ApiError, AppResult};
pub use rate_limit::RateLimitMiddleware;
pub use recovery::RecoveryMiddleware;
pub use security_headers::security_headers;
