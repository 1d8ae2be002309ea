//! # ef-probe
//!
//! The stream analysis boundary: the [`StreamAnalysis`] snapshot produced
//! for every job, the [`StreamAnalyzer`] port that produces it, and the
//! best-effort HDR classifier shared by all analyzer implementations.
//!
//! Concrete analyzers live elsewhere (`ef-av` ships an ffprobe-backed
//! one); this crate only fixes the output contract.

pub mod analyzer;
pub mod hdr;
pub mod types;

pub use analyzer::StreamAnalyzer;
pub use hdr::{classify_hdr, ColorTags};
pub use types::{AudioStream, Chapter, StreamAnalysis, SubtitleStream, VideoStream};
