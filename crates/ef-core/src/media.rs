//! Media-domain enums shared by the analyzer, codec model and synthesizer.
//!
//! All enums serialize in snake_case and implement `Display` manually for
//! consistent string representation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

// ---------------------------------------------------------------------------
// HdrFormat
// ---------------------------------------------------------------------------

/// HDR classification of a video stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HdrFormat {
    #[default]
    Sdr,
    Hdr10,
    Hlg,
    DolbyVision,
}

impl HdrFormat {
    /// Whether this format needs tone-mapping to display correctly as SDR.
    pub fn is_hdr(self) -> bool {
        !matches!(self, Self::Sdr)
    }
}

impl fmt::Display for HdrFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sdr => write!(f, "sdr"),
            Self::Hdr10 => write!(f, "hdr10"),
            Self::Hlg => write!(f, "hlg"),
            Self::DolbyVision => write!(f, "dolby_vision"),
        }
    }
}

// ---------------------------------------------------------------------------
// StreamType
// ---------------------------------------------------------------------------

/// Kind of elementary stream inside a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamType {
    Video,
    Audio,
    Subtitle,
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Audio => write!(f, "audio"),
            Self::Subtitle => write!(f, "subtitle"),
        }
    }
}

// ---------------------------------------------------------------------------
// ScaleMode
// ---------------------------------------------------------------------------

/// How a video output is fitted into its target dimensions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleMode {
    /// Shrink to fit inside the box, then letterbox/pillarbox with padding.
    #[default]
    Fit,
    /// Grow to cover the box, then crop the overflow.
    Fill,
    /// Scale straight to the box, ignoring aspect ratio.
    Stretch,
    /// Fit inside `min(target, source)`, never enlarging.
    DownscaleOnly,
}

impl fmt::Display for ScaleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fit => write!(f, "fit"),
            Self::Fill => write!(f, "fill"),
            Self::Stretch => write!(f, "stretch"),
            Self::DownscaleOnly => write!(f, "downscale_only"),
        }
    }
}

impl FromStr for ScaleMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fit" => Ok(Self::Fit),
            "fill" => Ok(Self::Fill),
            "stretch" => Ok(Self::Stretch),
            "downscale_only" | "downscaleonly" | "downscale-only" => Ok(Self::DownscaleOnly),
            other => Err(Error::Validation(format!("unknown scale mode '{other}'"))),
        }
    }
}

// ---------------------------------------------------------------------------
// PresetTier
// ---------------------------------------------------------------------------

/// Coarse speed/quality trade-off, resolved per codec into a concrete
/// preset string and quality value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresetTier {
    Fast,
    #[default]
    Balanced,
    HighQuality,
}

impl fmt::Display for PresetTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fast => write!(f, "fast"),
            Self::Balanced => write!(f, "balanced"),
            Self::HighQuality => write!(f, "high_quality"),
        }
    }
}

impl FromStr for PresetTier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fast" => Ok(Self::Fast),
            "balanced" => Ok(Self::Balanced),
            "high_quality" | "highquality" | "high-quality" | "hq" => Ok(Self::HighQuality),
            other => Err(Error::Validation(format!("unknown preset tier '{other}'"))),
        }
    }
}
