//! FFprobe-backed [`StreamAnalyzer`].
//!
//! Shells out to `ffprobe -v quiet -print_format json -show_format
//! -show_streams -show_chapters` and maps the JSON into a
//! [`StreamAnalysis`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use ef_core::{Error, Result};
use ef_probe::{
    classify_hdr, AudioStream, Chapter, ColorTags, StreamAnalysis, StreamAnalyzer, SubtitleStream,
    VideoStream,
};
use serde::Deserialize;

use crate::command::ToolCommand;
use crate::tools::{ToolRegistry, FFPROBE};

const PROBE_TIMEOUT: Duration = Duration::from_secs(120);

/// Side-data type ffprobe reports for a Dolby Vision configuration record.
const DOVI_SIDE_DATA: &str = "DOVI configuration record";

#[derive(Debug, Clone)]
pub struct FfprobeAnalyzer {
    ffprobe_path: PathBuf,
}

impl FfprobeAnalyzer {
    pub fn new(ffprobe_path: PathBuf) -> Self {
        Self { ffprobe_path }
    }

    pub fn from_registry(tools: &ToolRegistry) -> Result<Self> {
        Ok(Self::new(tools.require(FFPROBE)?.path.clone()))
    }
}

#[async_trait]
impl StreamAnalyzer for FfprobeAnalyzer {
    fn name(&self) -> &'static str {
        "ffprobe"
    }

    async fn analyze(&self, path: &Path) -> Result<StreamAnalysis> {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(Error::not_found("file", path.display()));
        }

        let output = ToolCommand::new(self.ffprobe_path.clone())
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
                "-show_chapters",
            ])
            .arg(path.to_string_lossy())
            .timeout(PROBE_TIMEOUT)
            .execute()
            .await?;

        let ff: FfprobeOutput = serde_json::from_str(&output.stdout)
            .map_err(|e| Error::Probe(format!("ffprobe JSON parse error: {e}")))?;
        let analysis = parse_ffprobe_output(path, ff);
        tracing::debug!(
            path = %path.display(),
            duration = analysis.duration_secs,
            video = analysis.video_streams.len(),
            audio = analysis.audio_streams.len(),
            subtitles = analysis.subtitle_streams.len(),
            hdr = analysis.is_hdr,
            "Analyzed source"
        );
        Ok(analysis)
    }
}

// ---------------------------------------------------------------------------
// JSON structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    #[serde(default)]
    chapters: Vec<FfprobeChapter>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeFormat {
    format_name: Option<String>,
    duration: Option<String>,
    size: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeStream {
    index: u32,
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    bits_per_raw_sample: Option<String>,
    pix_fmt: Option<String>,
    color_primaries: Option<String>,
    color_transfer: Option<String>,
    color_space: Option<String>,
    channels: Option<u32>,
    sample_rate: Option<String>,
    bit_rate: Option<String>,
    #[serde(default)]
    disposition: FfprobeDisposition,
    #[serde(default)]
    tags: FfprobeTags,
    #[serde(default)]
    side_data_list: Vec<FfprobeSideData>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeDisposition {
    #[serde(default)]
    default: u8,
    #[serde(default)]
    forced: u8,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeTags {
    language: Option<String>,
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeSideData {
    side_data_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeChapter {
    start_time: Option<String>,
    end_time: Option<String>,
    #[serde(default)]
    tags: FfprobeTags,
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

fn parse_num<T: std::str::FromStr>(s: Option<&str>) -> Option<T> {
    s.and_then(|s| s.trim().parse().ok())
}

fn parse_ffprobe_output(path: &Path, output: FfprobeOutput) -> StreamAnalysis {
    let mut analysis = StreamAnalysis::new(path);
    analysis.format_name = output.format.format_name.unwrap_or_default();
    analysis.duration_secs = parse_num(output.format.duration.as_deref()).unwrap_or(0.0);
    analysis.file_size = parse_num(output.format.size.as_deref()).unwrap_or(0);
    analysis.bit_rate = parse_num(output.format.bit_rate.as_deref());

    for mut stream in output.streams {
        let kind = stream.codec_type.take().unwrap_or_default();
        match kind.as_str() {
            "video" => analysis.video_streams.push(video_stream(stream)),
            "audio" => analysis.audio_streams.push(AudioStream {
                index: stream.index,
                codec: stream.codec_name.unwrap_or_default(),
                channels: stream.channels.unwrap_or(2),
                sample_rate: parse_num(stream.sample_rate.as_deref()),
                bit_rate: parse_num(stream.bit_rate.as_deref()),
                language: stream.tags.language,
                default: stream.disposition.default == 1,
            }),
            "subtitle" => analysis.subtitle_streams.push(SubtitleStream {
                index: stream.index,
                codec: stream.codec_name.unwrap_or_default(),
                language: stream.tags.language,
                forced: stream.disposition.forced == 1,
                default: stream.disposition.default == 1,
            }),
            // Attachments and data streams.
            _ => {}
        }
    }

    analysis.chapters = output
        .chapters
        .into_iter()
        .map(|c| Chapter {
            start_secs: parse_num(c.start_time.as_deref()).unwrap_or(0.0),
            end_secs: parse_num(c.end_time.as_deref()).unwrap_or(0.0),
            title: c.tags.title,
        })
        .collect();

    analysis.is_hdr = analysis.hdr_format().is_hdr();
    analysis
}

fn video_stream(stream: FfprobeStream) -> VideoStream {
    let has_dovi_record = stream
        .side_data_list
        .iter()
        .any(|sd| sd.side_data_type.as_deref() == Some(DOVI_SIDE_DATA));
    let hdr_format = classify_hdr(&ColorTags {
        pixel_format: stream.pix_fmt.as_deref(),
        color_transfer: stream.color_transfer.as_deref(),
        color_primaries: stream.color_primaries.as_deref(),
        color_space: stream.color_space.as_deref(),
        has_dovi_record,
    });
    let bit_depth = parse_num(stream.bits_per_raw_sample.as_deref()).or_else(|| {
        stream.pix_fmt.as_deref().map(|p| {
            if p.contains("p12") {
                12
            } else if p.contains("p10") {
                10
            } else {
                8
            }
        })
    });

    VideoStream {
        index: stream.index,
        codec: stream.codec_name.unwrap_or_default(),
        width: stream.width.unwrap_or(0),
        height: stream.height.unwrap_or(0),
        frame_rate: stream.r_frame_rate.as_deref().and_then(parse_frame_rate),
        bit_depth,
        pixel_format: stream.pix_fmt,
        color_primaries: stream.color_primaries,
        color_transfer: stream.color_transfer,
        color_space: stream.color_space,
        hdr_format,
        default: stream.disposition.default == 1,
        language: stream.tags.language,
    }
}

fn parse_frame_rate(rate: &str) -> Option<f64> {
    if let Some((num, den)) = rate.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        return (den != 0.0).then(|| num / den);
    }
    rate.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ef_core::HdrFormat;

    const SAMPLE: &str = r#"{
        "streams": [
            {"index": 0, "codec_type": "video", "codec_name": "hevc", "width": 3840, "height": 2160,
             "r_frame_rate": "24000/1001", "pix_fmt": "yuv420p10le",
             "color_primaries": "bt2020", "color_transfer": "smpte2084", "color_space": "bt2020nc",
             "disposition": {"default": 1}},
            {"index": 1, "codec_type": "audio", "codec_name": "eac3", "channels": 6,
             "sample_rate": "48000", "bit_rate": "640000",
             "tags": {"language": "eng"}, "disposition": {"default": 1}},
            {"index": 2, "codec_type": "subtitle", "codec_name": "subrip",
             "tags": {"language": "spa"}, "disposition": {"forced": 1}},
            {"index": 3, "codec_type": "attachment", "codec_name": "ttf"}
        ],
        "chapters": [
            {"start_time": "0.000000", "end_time": "300.5", "tags": {"title": "Opening"}}
        ],
        "format": {"format_name": "matroska,webm", "duration": "5400.250000",
                   "size": "4000000000", "bit_rate": "5925000"}
    }"#;

    fn parse(json: &str) -> StreamAnalysis {
        parse_ffprobe_output(Path::new("/m.mkv"), serde_json::from_str(json).unwrap())
    }

    #[test]
    fn full_sample() {
        let a = parse(SAMPLE);
        assert_eq!(a.format_name, "matroska,webm");
        assert!((a.duration_secs - 5400.25).abs() < 1e-9);
        assert_eq!(a.file_size, 4_000_000_000);
        assert_eq!(a.bit_rate, Some(5_925_000));
        assert!(a.is_hdr);

        let v = &a.video_streams[0];
        assert_eq!((v.width, v.height), (3840, 2160));
        assert_eq!(v.hdr_format, HdrFormat::Hdr10);
        assert_eq!(v.bit_depth, Some(10));
        assert!((v.frame_rate.unwrap() - 23.976).abs() < 0.01);

        let audio = &a.audio_streams[0];
        assert_eq!(audio.index, 1);
        assert_eq!(audio.channels, 6);
        assert_eq!(audio.sample_rate, Some(48000));
        assert_eq!(audio.language.as_deref(), Some("eng"));

        let sub = &a.subtitle_streams[0];
        assert!(sub.forced);
        assert!(!sub.is_bitmap());

        assert_eq!(a.chapters.len(), 1);
        assert_eq!(a.chapters[0].title.as_deref(), Some("Opening"));
        assert!((a.chapters[0].end_secs - 300.5).abs() < 1e-9);
    }

    #[test]
    fn dovi_side_data() {
        let json = r#"{"streams": [{"index": 0, "codec_type": "video", "codec_name": "hevc",
            "side_data_list": [{"side_data_type": "DOVI configuration record"}]}]}"#;
        let a = parse(json);
        assert_eq!(a.video_streams[0].hdr_format, HdrFormat::DolbyVision);
        assert!(a.is_hdr);
    }

    #[test]
    fn sparse_output_is_tolerated() {
        let a = parse(r#"{"format": {}}"#);
        assert_eq!(a.duration_secs, 0.0);
        assert!(a.video_streams.is_empty());
        assert!(!a.is_hdr);
    }

    #[test]
    fn frame_rate_fraction() {
        assert_eq!(parse_frame_rate("30/1"), Some(30.0));
        assert_eq!(parse_frame_rate("25"), Some(25.0));
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("invalid"), None);
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let analyzer = FfprobeAnalyzer::new(PathBuf::from("ffprobe"));
        let err = analyzer
            .analyze(Path::new("/definitely/not/here.mkv"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
