//! Stream analysis snapshot types.

use std::path::PathBuf;

use ef_core::HdrFormat;
use serde::{Deserialize, Serialize};

/// Probed description of a source file's media streams.
///
/// A snapshot is immutable once produced. The executor takes one at job
/// creation (for weighting) and a fresh one when execution starts (for
/// command synthesis).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamAnalysis {
    /// Path to the analyzed file.
    pub path: PathBuf,
    /// File size in bytes.
    pub file_size: u64,
    /// Container format name as reported by the analyzer (e.g. "matroska,webm").
    pub format_name: String,
    /// Total duration in seconds; 0 when unknown.
    pub duration_secs: f64,
    /// Overall bitrate in bits per second.
    pub bit_rate: Option<u64>,
    pub video_streams: Vec<VideoStream>,
    pub audio_streams: Vec<AudioStream>,
    pub subtitle_streams: Vec<SubtitleStream>,
    pub chapters: Vec<Chapter>,
    /// Whether the primary video stream carries HDR signalling.
    pub is_hdr: bool,
}

impl StreamAnalysis {
    /// An empty snapshot for `path`, to be filled in by an analyzer.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file_size: 0,
            format_name: String::new(),
            duration_secs: 0.0,
            bit_rate: None,
            video_streams: Vec::new(),
            audio_streams: Vec::new(),
            subtitle_streams: Vec::new(),
            chapters: Vec::new(),
            is_hdr: false,
        }
    }

    /// Returns the primary video stream.
    ///
    /// Prefers the first stream marked as default; falls back to the first stream.
    pub fn primary_video(&self) -> Option<&VideoStream> {
        self.video_streams
            .iter()
            .find(|s| s.default)
            .or_else(|| self.video_streams.first())
    }

    /// Returns the primary audio stream, with the same preference as
    /// [`primary_video`](Self::primary_video).
    pub fn primary_audio(&self) -> Option<&AudioStream> {
        self.audio_streams
            .iter()
            .find(|s| s.default)
            .or_else(|| self.audio_streams.first())
    }

    pub fn duration_minutes(&self) -> f64 {
        self.duration_secs / 60.0
    }

    /// HDR format of the primary video stream (`Sdr` without video).
    pub fn hdr_format(&self) -> HdrFormat {
        self.primary_video()
            .map(|v| v.hdr_format)
            .unwrap_or_default()
    }

    /// `(width, height)` of the primary video stream.
    pub fn resolution(&self) -> Option<(u32, u32)> {
        self.primary_video().map(|v| (v.width, v.height))
    }
}

/// A video stream within a media file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoStream {
    /// Absolute stream index within the container.
    pub index: u32,
    /// Codec name as reported by the analyzer (e.g. "h264", "hevc").
    pub codec: String,
    pub width: u32,
    pub height: u32,
    pub frame_rate: Option<f64>,
    pub bit_depth: Option<u8>,
    pub pixel_format: Option<String>,
    pub color_primaries: Option<String>,
    pub color_transfer: Option<String>,
    pub color_space: Option<String>,
    pub hdr_format: HdrFormat,
    pub default: bool,
    pub language: Option<String>,
}

/// An audio stream within a media file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioStream {
    pub index: u32,
    pub codec: String,
    pub channels: u32,
    pub sample_rate: Option<u32>,
    pub bit_rate: Option<u64>,
    pub language: Option<String>,
    pub default: bool,
}

/// A subtitle stream within a media file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleStream {
    pub index: u32,
    /// Codec/format identifier (e.g. "subrip", "ass", "hdmv_pgs_subtitle").
    pub codec: String,
    pub language: Option<String>,
    pub forced: bool,
    pub default: bool,
}

impl SubtitleStream {
    /// Whether the stream is a bitmap format that cannot be converted to text.
    pub fn is_bitmap(&self) -> bool {
        matches!(
            self.codec.as_str(),
            "hdmv_pgs_subtitle" | "dvd_subtitle" | "dvb_subtitle" | "pgs" | "vobsub"
        )
    }
}

/// A chapter marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub start_secs: f64,
    pub end_secs: f64,
    pub title: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video(width: u32, height: u32, default: bool) -> VideoStream {
        VideoStream {
            index: 0,
            codec: "hevc".into(),
            width,
            height,
            frame_rate: Some(24.0),
            bit_depth: Some(10),
            pixel_format: Some("yuv420p10le".into()),
            color_primaries: None,
            color_transfer: None,
            color_space: None,
            hdr_format: HdrFormat::Sdr,
            default,
            language: None,
        }
    }

    #[test]
    fn primary_video_prefers_default() {
        let mut analysis = StreamAnalysis::new("/test.mkv");
        analysis.video_streams = vec![video(1920, 1080, false), video(3840, 2160, true)];
        assert_eq!(analysis.resolution(), Some((3840, 2160)));
    }

    #[test]
    fn primary_video_falls_back_to_first() {
        let mut analysis = StreamAnalysis::new("/test.mkv");
        analysis.video_streams = vec![video(1280, 720, false), video(640, 360, false)];
        assert_eq!(analysis.resolution(), Some((1280, 720)));
    }

    #[test]
    fn empty_analysis() {
        let analysis = StreamAnalysis::new("/audio.flac");
        assert!(analysis.primary_video().is_none());
        assert!(analysis.primary_audio().is_none());
        assert_eq!(analysis.hdr_format(), HdrFormat::Sdr);
    }

    #[test]
    fn duration_minutes() {
        let mut analysis = StreamAnalysis::new("/a.mkv");
        analysis.duration_secs = 5400.0;
        assert!((analysis.duration_minutes() - 90.0).abs() < f64::EPSILON);
    }

    #[test]
    fn bitmap_subtitles() {
        let pgs = SubtitleStream {
            index: 3,
            codec: "hdmv_pgs_subtitle".into(),
            language: Some("eng".into()),
            forced: false,
            default: false,
        };
        assert!(pgs.is_bitmap());
        let srt = SubtitleStream {
            codec: "subrip".into(),
            ..pgs
        };
        assert!(!srt.is_bitmap());
    }

    #[test]
    fn serde_roundtrip() {
        let mut analysis = StreamAnalysis::new("/test.mkv");
        analysis.video_streams.push(video(1920, 1080, true));
        analysis.chapters.push(Chapter {
            start_secs: 0.0,
            end_secs: 60.0,
            title: Some("Intro".into()),
        });
        let json = serde_json::to_string(&analysis).unwrap();
        let back: StreamAnalysis = serde_json::from_str(&json).unwrap();
        assert_eq!(analysis, back);
    }
}
