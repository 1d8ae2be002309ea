//! ef-codec: codec and container capability model plus encoding profiles.
//!
//! Codecs and containers are closed sets of tagged variants that all
//! implement the same small capability surface: a name, an ordered list of
//! command-line arguments, and self-validation. [`factory`] maps the many
//! spellings users type ("x264", "libx264", "m3u8", ...) onto those
//! variants. [`profile`] composes them into named, versioned output specs
//! and [`catalog`] ships the read-only system profiles.

pub mod audio;
pub mod catalog;
pub mod codec;
pub mod container;
pub mod factory;
pub mod preset;
pub mod profile;
pub mod subtitle;
pub mod video;

pub use audio::{AudioCodec, AudioEncoder};
pub use codec::{Arg, Codec, VideoFamily};
pub use container::{CodecValidation, Container, HlsOptions, PlaylistType, SegmentType};
pub use profile::{
    AudioOutputConfig, EncodingProfile, ProfileOptions, SubtitleOutputConfig, ThumbnailConfig,
    ThumbnailFormat, ValidationResult, VideoOutputConfig,
};
pub use subtitle::{SubtitleCodec, SubtitleEncoder};
pub use video::{VideoCodec, VideoEncoder};
