//! Rate limiting implementations.

mod bucket;
mod registry;
mod sweeper;

pub use registry::{BucketRegistry, SweepStats};
pub use sweeper::{Sweeper, SweeperConfig};
