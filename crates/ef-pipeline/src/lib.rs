//! # ef-pipeline
//!
//! Job orchestration for encodeforge.
//!
//! This crate provides:
//!
//! - **[`ProfileRegistry`]** -- resolves profiles from the read-only system
//!   catalog and the user profile store.
//! - **[`ProgressParser`] / [`ProgressMonitor`]** -- turn ffmpeg progress text
//!   into persisted samples and throttled telemetry.
//! - **[`ExecutionStrategy`]** -- how a job's tasks are scheduled:
//!   [`SequentialStrategy`] (default) or the dependency-respecting
//!   [`DependencyStrategy`].
//! - **[`JobExecutor`]** -- creates, runs, cancels, retries and reports on
//!   jobs, keeping every job and task on its state machine.

pub mod executor;
pub mod progress;
pub mod registry;
pub mod strategy;
pub mod task;

// Re-export key types at the crate root.
pub use executor::{JobExecutor, JobStatus};
pub use progress::{ProgressMonitor, ProgressParser, ProgressSnapshot};
pub use registry::ProfileRegistry;
pub use strategy::{
    strategy_for, DependencyStrategy, ExecutionStrategy, RunOutcome, SequentialStrategy,
};
pub use task::{TaskCommands, TaskOutcome, TaskRunner};
