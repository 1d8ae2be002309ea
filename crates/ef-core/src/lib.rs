//! ef-core: shared types, IDs, errors, configuration, and telemetry.
//!
//! This crate is the foundational dependency for all other ef-* crates,
//! providing type-safe identifiers, a unified error type, the job/task
//! entities and their state machines, media-domain enums, application
//! configuration, and the telemetry event bus.

pub mod config;
pub mod error;
pub mod events;
pub mod ids;
pub mod jobs;
pub mod media;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use ids::*;
pub use jobs::*;
pub use media::*;
