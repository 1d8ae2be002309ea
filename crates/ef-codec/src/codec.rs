//! The capability surface shared by every codec.

use std::fmt;

use ef_core::StreamType;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Arg
// ---------------------------------------------------------------------------

/// One command-line flag with an optional value, e.g. `-crf 23` or `-y`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Arg {
    pub flag: String,
    pub value: Option<String>,
}

impl Arg {
    pub fn new(flag: impl Into<String>, value: impl ToString) -> Self {
        Self {
            flag: flag.into(),
            value: Some(value.to_string()),
        }
    }

    /// A bare switch with no value.
    pub fn switch(flag: impl Into<String>) -> Self {
        Self {
            flag: flag.into(),
            value: None,
        }
    }

    /// Scope this argument to the `index`-th output stream of `kind`.
    ///
    /// A flag that already names the stream type (`-c:v`) gains the index
    /// (`-c:v:1`); any other flag gains both (`-crf` becomes `-crf:v:1`).
    pub fn for_stream(&self, kind: StreamType, index: usize) -> Self {
        let spec = stream_letter(kind);
        let suffix = format!(":{spec}");
        let flag = if self.flag.ends_with(&suffix) {
            format!("{}:{index}", self.flag)
        } else {
            format!("{}:{spec}:{index}", self.flag)
        };
        Self {
            flag,
            value: self.value.clone(),
        }
    }

    /// Push the flag and value onto a flat argument list.
    pub fn extend_into(&self, out: &mut Vec<String>) {
        out.push(self.flag.clone());
        if let Some(ref value) = self.value {
            out.push(value.clone());
        }
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            Some(ref value) => write!(f, "{} {}", self.flag, value),
            None => write!(f, "{}", self.flag),
        }
    }
}

/// The ffmpeg stream specifier letter for a stream type.
pub fn stream_letter(kind: StreamType) -> char {
    match kind {
        StreamType::Video => 'v',
        StreamType::Audio => 'a',
        StreamType::Subtitle => 's',
    }
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

/// Capabilities every codec exposes.
pub trait Codec {
    /// The encoder name passed to the external tool (e.g. "libx264").
    fn name(&self) -> &'static str;

    fn stream_type(&self) -> StreamType;

    /// Ordered, unscoped arguments configuring this codec.
    fn build_arguments(&self) -> Vec<Arg>;

    /// Problems with this codec's own parameters; empty when valid.
    fn validate(&self) -> Vec<String>;

    /// Whether this codec passes the stream through without re-encoding.
    fn is_copy(&self) -> bool;
}

// ---------------------------------------------------------------------------
// VideoFamily
// ---------------------------------------------------------------------------

/// Bitstream format produced by a video encoder. Container whitelists and
/// bitstream filters are keyed on this, not on the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoFamily {
    H264,
    Hevc,
    Av1,
    Vp9,
}

impl VideoFamily {
    /// Classify a codec or encoder name ("h264", "hevc_nvenc", "libsvtav1").
    pub fn from_codec_name(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        if name.contains("264") || name == "avc" {
            Some(Self::H264)
        } else if name.contains("265") || name.contains("hevc") {
            Some(Self::Hevc)
        } else if name.contains("av1") || name == "libaom" {
            Some(Self::Av1)
        } else if name.contains("vp9") {
            Some(Self::Vp9)
        } else {
            None
        }
    }
}

impl fmt::Display for VideoFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::H264 => write!(f, "h264"),
            Self::Hevc => write!(f, "hevc"),
            Self::Av1 => write!(f, "av1"),
            Self::Vp9 => write!(f, "vp9"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_scoping() {
        let codec = Arg::new("-c:v", "libx264");
        assert_eq!(codec.for_stream(StreamType::Video, 1).flag, "-c:v:1");

        let crf = Arg::new("-crf", 23);
        assert_eq!(crf.for_stream(StreamType::Video, 2).flag, "-crf:v:2");

        let bitrate = Arg::new("-b:a", "128k");
        assert_eq!(bitrate.for_stream(StreamType::Audio, 0).flag, "-b:a:0");
        assert_eq!(bitrate.for_stream(StreamType::Audio, 0).value.as_deref(), Some("128k"));
    }

    #[test]
    fn display_and_flatten() {
        assert_eq!(Arg::new("-preset", "slow").to_string(), "-preset slow");
        assert_eq!(Arg::switch("-y").to_string(), "-y");

        let mut out = Vec::new();
        Arg::new("-g", 48).extend_into(&mut out);
        Arg::switch("-an").extend_into(&mut out);
        assert_eq!(out, vec!["-g", "48", "-an"]);
    }

    #[test]
    fn family_classification() {
        assert_eq!(VideoFamily::from_codec_name("h264"), Some(VideoFamily::H264));
        assert_eq!(VideoFamily::from_codec_name("libx264"), Some(VideoFamily::H264));
        assert_eq!(VideoFamily::from_codec_name("HEVC"), Some(VideoFamily::Hevc));
        assert_eq!(VideoFamily::from_codec_name("h265"), Some(VideoFamily::Hevc));
        assert_eq!(VideoFamily::from_codec_name("hevc_nvenc"), Some(VideoFamily::Hevc));
        assert_eq!(VideoFamily::from_codec_name("libsvtav1"), Some(VideoFamily::Av1));
        assert_eq!(VideoFamily::from_codec_name("libvpx-vp9"), Some(VideoFamily::Vp9));
        assert_eq!(VideoFamily::from_codec_name("mpeg2video"), None);
    }
}
