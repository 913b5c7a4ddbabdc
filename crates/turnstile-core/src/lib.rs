//! # Turnstile Core
//!
//! The domain layer of the admission pipeline: policies, claims, the error
//! taxonomy, and the two request-path decisions (admission and
//! authentication). This crate has no I/O or crypto dependencies; concrete
//! limiters and token services live in `turnstile-infra`.

pub mod admission;
pub mod authenticator;
pub mod domain;
pub mod error;
pub mod ports;

pub use admission::AdmissionController;
pub use authenticator::{AuthOutcome, Authenticator};
pub use error::{ErrorCode, PolicyError, Rejection};
