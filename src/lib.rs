//! encodeforge - profile-driven transcoding orchestrator.
//!
//! The library half of the binary: [`App`] wires configuration, tool
//! discovery, the SQLite store and the job executor together. It is exposed
//! for integration testing.

pub mod app;

pub use app::App;
