//! # ef-av
//!
//! External tool plumbing for the encodeforge pipeline.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache paths to ffmpeg
//!   and ffprobe.
//! - **Command execution** ([`ToolCommand`]) -- async builder with timeout
//!   support for short-lived tool invocations.
//! - **Stream analysis** ([`FfprobeAnalyzer`]) -- implements
//!   [`ef_probe::StreamAnalyzer`] by shelling out to ffprobe.
//! - **Process running** ([`FfmpegRunner`]) -- implements [`ProcessRunner`]
//!   for long encodes with streamed progress and cancellation.
//! - **Hardware discovery** ([`HardwareDiscovery`]) -- which hwaccel methods
//!   this machine offers.

pub mod command;
pub mod hardware;
pub mod probe;
pub mod runner;
pub mod tools;

// ---- Re-exports for convenience ----

pub use command::{ToolCommand, ToolOutput};
pub use hardware::{
    discovery_from_config, FfmpegHardwareDiscovery, HardwareDiscovery, NoHardware,
    StaticHardwareDiscovery,
};
pub use probe::FfprobeAnalyzer;
pub use runner::{FfmpegRunner, ProcessOutcome, ProcessRequest, ProcessRunner};
pub use tools::{ToolConfig, ToolInfo, ToolRegistry};
