//! ef-planner: task weighting, job splitting and task dependency graphs.
//!
//! Everything here is pure: no I/O, no clocks. The executor asks the
//! [`TaskSplitter`] for task definitions when a job is created, persists
//! the weights it computed, and later walks a [`TaskGraph`] to decide which
//! tasks may start.

pub mod graph;
pub mod splitter;
pub mod weights;

pub use graph::TaskGraph;
pub use splitter::{materialize, TaskDefinition, TaskSplitter};
pub use weights::{estimate_encoding_time, estimate_job_time, job_weight, weight_of, WeightSubject};
