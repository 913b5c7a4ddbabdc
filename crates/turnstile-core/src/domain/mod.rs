//! Domain types.

mod claims;
mod policy;

pub use claims::Claims;
pub use policy::{AdmissionPolicy, AuthPolicy, BypassPaths, DEFAULT_BYPASS_PATHS, EvictionMode};
