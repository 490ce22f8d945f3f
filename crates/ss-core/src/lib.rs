//! ss-core: stable foundation for stagesync.
//!
//! Contains:
//! - ids (stage identifiers shared by configuration, controller and host)
//! - numeric (Real/Time + range checks)
//! - error (shared error types)

pub mod error;
pub mod ids;
pub mod numeric;

// Re-exports: nice ergonomics for downstream crates
pub use error::{CoreError, CoreResult};
pub use ids::*;
pub use numeric::*;
