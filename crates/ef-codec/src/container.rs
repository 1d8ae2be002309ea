//! Output containers: their metadata, codec whitelists and muxer arguments.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::audio::{AudioCodec, AudioEncoder};
use crate::codec::{Arg, Codec, VideoFamily};
use crate::subtitle::{SubtitleCodec, SubtitleEncoder};
use crate::video::VideoCodec;

// ---------------------------------------------------------------------------
// HLS options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaylistType {
    #[default]
    Vod,
    Event,
}

impl fmt::Display for PlaylistType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vod => write!(f, "vod"),
            Self::Event => write!(f, "event"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentType {
    #[default]
    Mpegts,
    Fmp4,
}

impl SegmentType {
    /// File extension of individual segments.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mpegts => "ts",
            Self::Fmp4 => "m4s",
        }
    }
}

impl fmt::Display for SegmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mpegts => write!(f, "mpegts"),
            Self::Fmp4 => write!(f, "fmp4"),
        }
    }
}

/// Segmenting parameters of an HLS output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HlsOptions {
    /// Target segment length in seconds. Keyframes are forced on these
    /// boundaries so every segment starts independently decodable.
    pub segment_duration: u32,
    pub playlist_type: PlaylistType,
    pub segment_type: SegmentType,
}

impl Default for HlsOptions {
    fn default() -> Self {
        Self {
            segment_duration: 6,
            playlist_type: PlaylistType::Vod,
            segment_type: SegmentType::Mpegts,
        }
    }
}

impl HlsOptions {
    /// Bitstream filter a codec needs to be repackaged into segments.
    ///
    /// `h264` maps to `h264_mp4toannexb` and `h265`/`hevc` to
    /// `hevc_mp4toannexb`; every other codec needs none.
    pub fn bitstream_filter(&self, codec_name: &str) -> Option<&'static str> {
        match VideoFamily::from_codec_name(codec_name) {
            Some(VideoFamily::H264) => Some("h264_mp4toannexb"),
            Some(VideoFamily::Hevc) => Some("hevc_mp4toannexb"),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Container
// ---------------------------------------------------------------------------

/// A container format together with its muxer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum Container {
    Mp4 {
        /// Move the index to the front for progressive playback.
        #[serde(default = "default_true")]
        faststart: bool,
    },
    Matroska,
    #[serde(rename = "webm")]
    WebM,
    Hls(HlsOptions),
}

fn default_true() -> bool {
    true
}

/// Outcome of [`Container::validate_codecs`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CodecValidation {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl Container {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Mp4 { .. } => "mp4",
            Self::Matroska => "matroska",
            Self::WebM => "webm",
            Self::Hls(_) => "hls",
        }
    }

    /// Extension of the primary output file (the playlist for HLS).
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp4 { .. } => "mp4",
            Self::Matroska => "mkv",
            Self::WebM => "webm",
            Self::Hls(_) => "m3u8",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Mp4 { .. } => "video/mp4",
            Self::Matroska => "video/x-matroska",
            Self::WebM => "video/webm",
            Self::Hls(_) => "application/vnd.apple.mpegurl",
        }
    }

    /// Whether the output can be played while still being downloaded.
    pub fn supports_streaming(&self) -> bool {
        match self {
            Self::Mp4 { faststart } => *faststart,
            Self::Matroska => false,
            Self::WebM | Self::Hls(_) => true,
        }
    }

    pub fn hls(&self) -> Option<&HlsOptions> {
        match self {
            Self::Hls(options) => Some(options),
            _ => None,
        }
    }

    pub fn video_whitelist(&self) -> &'static [VideoFamily] {
        use VideoFamily::*;
        match self {
            Self::Mp4 { .. } | Self::Matroska => &[H264, Hevc, Av1, Vp9],
            Self::WebM => &[Vp9, Av1],
            Self::Hls(HlsOptions {
                segment_type: SegmentType::Mpegts,
                ..
            }) => &[H264, Hevc],
            Self::Hls(_) => &[H264, Hevc, Av1],
        }
    }

    pub fn audio_whitelist(&self) -> &'static [AudioEncoder] {
        use AudioEncoder::*;
        match self {
            Self::Mp4 { .. } => &[Aac, Ac3, Eac3, Mp3, Opus, Flac],
            Self::Matroska => &[Aac, Ac3, Eac3, Mp3, Opus, Flac, Vorbis],
            Self::WebM => &[Opus, Vorbis],
            Self::Hls(_) => &[Aac, Ac3, Eac3, Mp3],
        }
    }

    pub fn subtitle_whitelist(&self) -> &'static [SubtitleEncoder] {
        use SubtitleEncoder::*;
        match self {
            Self::Mp4 { .. } => &[MovText],
            Self::Matroska => &[Srt, Ass, WebVtt],
            Self::WebM => &[WebVtt],
            Self::Hls(_) => &[],
        }
    }

    /// Whether the muxer writes subtitle streams at all. HLS renditions
    /// are video and audio only.
    pub fn carries_subtitles(&self) -> bool {
        !matches!(self, Self::Hls(_))
    }

    /// Muxer arguments. Output-path-dependent HLS flags (segment file
    /// names, variant maps) are added by the command synthesizer.
    pub fn build_arguments(&self) -> Vec<Arg> {
        match self {
            Self::Mp4 { faststart } => {
                let mut args = Vec::new();
                if *faststart {
                    args.push(Arg::new("-movflags", "+faststart"));
                }
                args.push(Arg::new("-f", "mp4"));
                args
            }
            Self::Matroska => vec![Arg::new("-f", "matroska")],
            Self::WebM => vec![Arg::new("-f", "webm")],
            Self::Hls(options) => vec![
                Arg::new("-f", "hls"),
                Arg::new("-hls_time", options.segment_duration),
                Arg::new("-hls_playlist_type", options.playlist_type),
                Arg::new("-hls_segment_type", options.segment_type),
                Arg::new("-hls_list_size", 0),
            ],
        }
    }

    /// Check that every codec may be muxed into this container. Stream
    /// copies are accepted, except subtitles on a container that carries
    /// none.
    pub fn validate_codecs<'a>(
        &self,
        video: impl IntoIterator<Item = &'a VideoCodec>,
        audio: impl IntoIterator<Item = &'a AudioCodec>,
        subtitle: impl IntoIterator<Item = &'a SubtitleCodec>,
    ) -> CodecValidation {
        let mut errors = Vec::new();
        let container = self.name();

        for codec in video {
            if let Some(family) = codec.family() {
                if !self.video_whitelist().contains(&family) {
                    errors.push(format!(
                        "{container} does not support video codec {}",
                        codec.name()
                    ));
                }
            }
        }

        for codec in audio {
            if !codec.is_copy() && !self.audio_whitelist().contains(&codec.encoder) {
                errors.push(format!(
                    "{container} does not support audio codec {}",
                    codec.name()
                ));
            }
        }

        for codec in subtitle {
            if !self.carries_subtitles() {
                errors.push(format!(
                    "{container} outputs cannot carry subtitles (got {})",
                    codec.name()
                ));
            } else if !codec.is_copy() && !self.subtitle_whitelist().contains(&codec.encoder) {
                errors.push(format!(
                    "{container} does not support subtitle codec {}",
                    codec.name()
                ));
            }
        }

        CodecValidation {
            is_valid: errors.is_empty(),
            errors,
        }
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::VideoEncoder;

    fn v(encoder: VideoEncoder) -> VideoCodec {
        VideoCodec::new(encoder)
    }

    fn a(encoder: AudioEncoder) -> AudioCodec {
        AudioCodec::new(encoder)
    }

    #[test]
    fn webm_rejects_h264_aac() {
        let result = Container::WebM.validate_codecs(
            [&v(VideoEncoder::X264)],
            [&a(AudioEncoder::Aac)],
            [],
        );
        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 2);
    }

    #[test]
    fn webm_accepts_vp9_opus() {
        let result = Container::WebM.validate_codecs(
            [&v(VideoEncoder::Vp9)],
            [&a(AudioEncoder::Opus)],
            [],
        );
        assert!(result.is_valid, "{:?}", result.errors);
    }

    #[test]
    fn copy_always_passes() {
        let result = Container::WebM.validate_codecs(
            [&v(VideoEncoder::Copy)],
            [&a(AudioEncoder::Copy)],
            [&SubtitleCodec::new(SubtitleEncoder::Copy)],
        );
        assert!(result.is_valid);
    }

    #[test]
    fn hls_rejects_every_subtitle_codec() {
        let hls = Container::Hls(HlsOptions::default());
        for encoder in [SubtitleEncoder::WebVtt, SubtitleEncoder::Copy] {
            let result = hls.validate_codecs([], [], [&SubtitleCodec::new(encoder)]);
            assert!(!result.is_valid, "{encoder:?}");
            assert!(result.errors[0].contains("cannot carry subtitles"));
        }
        assert!(hls.subtitle_whitelist().is_empty());
        assert!(Container::WebM.carries_subtitles());
    }

    #[test]
    fn hls_segment_type_gates_av1() {
        let ts = Container::Hls(HlsOptions::default());
        assert!(!ts.validate_codecs([&v(VideoEncoder::SvtAv1)], [], []).is_valid);
        let fmp4 = Container::Hls(HlsOptions {
            segment_type: SegmentType::Fmp4,
            ..Default::default()
        });
        assert!(fmp4.validate_codecs([&v(VideoEncoder::SvtAv1)], [], []).is_valid);
    }

    #[test]
    fn hls_bitstream_filters() {
        let hls = HlsOptions::default();
        assert_eq!(hls.bitstream_filter("h264"), Some("h264_mp4toannexb"));
        assert_eq!(hls.bitstream_filter("libx264"), Some("h264_mp4toannexb"));
        assert_eq!(hls.bitstream_filter("h265"), Some("hevc_mp4toannexb"));
        assert_eq!(hls.bitstream_filter("hevc"), Some("hevc_mp4toannexb"));
        assert_eq!(hls.bitstream_filter("vp9"), None);
        assert_eq!(hls.bitstream_filter("av1"), None);
        assert_eq!(hls.bitstream_filter("aac"), None);
    }

    #[test]
    fn container_metadata() {
        let mp4 = Container::Mp4 { faststart: true };
        assert_eq!(mp4.extension(), "mp4");
        assert_eq!(mp4.mime_type(), "video/mp4");
        assert!(mp4.supports_streaming());
        assert!(!Container::Matroska.supports_streaming());
        assert_eq!(Container::Hls(HlsOptions::default()).extension(), "m3u8");
    }

    #[test]
    fn hls_arguments() {
        let args: Vec<String> = Container::Hls(HlsOptions::default())
            .build_arguments()
            .iter()
            .map(Arg::to_string)
            .collect();
        assert_eq!(
            args,
            vec![
                "-f hls",
                "-hls_time 6",
                "-hls_playlist_type vod",
                "-hls_segment_type mpegts",
                "-hls_list_size 0"
            ]
        );
    }

    #[test]
    fn serde_tagging() {
        let json = serde_json::to_value(Container::Hls(HlsOptions::default())).unwrap();
        assert_eq!(json["format"], "hls");
        assert_eq!(json["segment_duration"], 6);

        let mp4: Container = serde_json::from_str(r#"{"format": "mp4"}"#).unwrap();
        assert_eq!(mp4, Container::Mp4 { faststart: true });
        let webm: Container = serde_json::from_str(r#"{"format": "webm"}"#).unwrap();
        assert_eq!(webm, Container::WebM);
    }
}
