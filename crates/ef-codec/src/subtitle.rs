//! Subtitle encoders.

use std::fmt;

use ef_core::StreamType;
use serde::{Deserialize, Serialize};

use crate::codec::{Arg, Codec};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtitleEncoder {
    #[serde(rename = "webvtt")]
    WebVtt,
    Srt,
    Ass,
    MovText,
    Copy,
}

impl SubtitleEncoder {
    pub fn ffmpeg_name(&self) -> &'static str {
        match self {
            Self::WebVtt => "webvtt",
            Self::Srt => "srt",
            Self::Ass => "ass",
            Self::MovText => "mov_text",
            Self::Copy => "copy",
        }
    }
}

impl fmt::Display for SubtitleEncoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ffmpeg_name())
    }
}

/// A subtitle encoder. Text subtitle encoders take no parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleCodec {
    pub encoder: SubtitleEncoder,
}

impl SubtitleCodec {
    pub fn new(encoder: SubtitleEncoder) -> Self {
        Self { encoder }
    }
}

impl Codec for SubtitleCodec {
    fn name(&self) -> &'static str {
        self.encoder.ffmpeg_name()
    }

    fn stream_type(&self) -> StreamType {
        StreamType::Subtitle
    }

    fn build_arguments(&self) -> Vec<Arg> {
        vec![Arg::new("-c:s", self.encoder.ffmpeg_name())]
    }

    fn validate(&self) -> Vec<String> {
        Vec::new()
    }

    fn is_copy(&self) -> bool {
        self.encoder == SubtitleEncoder::Copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mov_text_arguments() {
        let codec = SubtitleCodec::new(SubtitleEncoder::MovText);
        assert_eq!(codec.name(), "mov_text");
        assert_eq!(codec.build_arguments(), vec![Arg::new("-c:s", "mov_text")]);
        assert!(codec.validate().is_empty());
    }

    #[test]
    fn serde_names() {
        assert_eq!(
            serde_json::to_string(&SubtitleEncoder::WebVtt).unwrap(),
            "\"webvtt\""
        );
        assert_eq!(
            serde_json::to_string(&SubtitleEncoder::MovText).unwrap(),
            "\"mov_text\""
        );
    }
}
