//! Heuristic cost model for encoding work.
//!
//! A weight of `1.0` is one hour of 1080p software H.264 at the `medium`
//! preset on reference hardware, roughly sixty minutes of wall time. Every
//! other encode is expressed relative to that:
//!
//! ```text
//! video = 1.0 × resolution × codec × preset × hdr_to_sdr × minutes / 60
//! audio = 0.1 × codec × channels / 2 × minutes / 60
//! job   = Σ video + Σ audio + subtitles × 0.05   (no subtitles on HLS)
//! ```
//!
//! Unknown codec or preset names weigh `1.0`; the model never fails.

use std::time::Duration;

use ef_codec::{factory, AudioEncoder, EncodingProfile, VideoCodec, VideoEncoder};
use ef_command::scale::ScaleDecision;
use ef_command::synthesizer::plan_renditions;
use ef_core::EncodingTask;
use ef_probe::StreamAnalysis;

use crate::splitter::TaskDefinition;

const BASE_VIDEO_WEIGHT: f64 = 1.0;
const BASE_AUDIO_WEIGHT: f64 = 0.1;
const SUBTITLE_WEIGHT: f64 = 0.05;
const HDR_TO_SDR_FACTOR: f64 = 1.5;

/// Wall time of a weight-1.0 encode on reference hardware.
const REFERENCE_MINUTES: f64 = 60.0;

// ---------------------------------------------------------------------------
// Multipliers
// ---------------------------------------------------------------------------

/// Cost of a resolution relative to 1080p.
///
/// Buckets are keyed on the larger frame dimension against the 16:9 width
/// of each class, so portrait sources and cinemascope crops price the same
/// as their landscape full-frame counterparts.
pub fn resolution_multiplier(width: u32, height: u32) -> f64 {
    match width.max(height) {
        d if d >= 7680 => 16.0,
        d if d >= 3840 => 4.0,
        d if d >= 2560 => 1.78,
        d if d >= 1920 => 1.0,
        d if d >= 1280 => 0.44,
        d if d >= 1024 => 0.28,
        d if d >= 854 => 0.22,
        d if d >= 640 => 0.11,
        _ => 0.05,
    }
}

/// Cost of a video encoder relative to software H.264.
pub fn video_codec_multiplier(encoder: VideoEncoder) -> f64 {
    match encoder {
        VideoEncoder::X264 => 1.0,
        VideoEncoder::X265 => 1.5,
        VideoEncoder::LibAom => 3.0,
        VideoEncoder::SvtAv1 => 2.0,
        VideoEncoder::Vp9 => 1.8,
        VideoEncoder::H264Nvenc => 0.3,
        VideoEncoder::HevcNvenc => 0.35,
        VideoEncoder::Av1Nvenc => 0.4,
        VideoEncoder::H264Qsv => 0.4,
        VideoEncoder::HevcQsv => 0.45,
        VideoEncoder::H264Vaapi => 0.45,
        VideoEncoder::HevcVaapi => 0.5,
        VideoEncoder::H264VideoToolbox => 0.5,
        VideoEncoder::HevcVideoToolbox => 0.55,
        VideoEncoder::Copy => 0.05,
    }
}

/// [`video_codec_multiplier`] by name; unknown names weigh `1.0`.
pub fn video_codec_multiplier_by_name(name: &str) -> f64 {
    factory::video_encoder(name)
        .map(video_codec_multiplier)
        .unwrap_or(1.0)
}

pub fn audio_codec_multiplier(encoder: AudioEncoder) -> f64 {
    match encoder {
        AudioEncoder::Aac => 1.0,
        AudioEncoder::Opus => 1.2,
        AudioEncoder::Flac => 0.8,
        AudioEncoder::Ac3 => 0.9,
        AudioEncoder::Eac3 => 1.0,
        AudioEncoder::Mp3 => 1.0,
        AudioEncoder::Vorbis => 1.1,
        AudioEncoder::Copy => 0.1,
    }
}

pub fn audio_codec_multiplier_by_name(name: &str) -> f64 {
    factory::audio_encoder(name)
        .map(audio_codec_multiplier)
        .unwrap_or(1.0)
}

/// SVT-AV1 presets 0 (slowest) to 13.
const SVT_PRESETS: [f64; 14] = [
    8.0, 6.0, 4.0, 3.0, 2.5, 2.0, 1.5, 1.2, 1.0, 0.8, 0.6, 0.5, 0.4, 0.3,
];

/// libaom `-cpu-used` 0 (slowest) to 8.
const AOM_CPU_USED: [f64; 9] = [8.0, 6.0, 4.0, 2.5, 1.5, 1.0, 0.7, 0.5, 0.3];

/// Cost of a speed preset relative to `medium`.
///
/// The vocabulary depends on the encoder: x264/x265 names, NVENC `p1`..`p7`,
/// VP9 deadlines, and numeric SVT-AV1 / libaom levels. Anything else,
/// including no preset at all, weighs `1.0`.
pub fn preset_multiplier(encoder: VideoEncoder, preset: Option<&str>) -> f64 {
    let Some(preset) = preset.map(str::trim).filter(|p| !p.is_empty()) else {
        return 1.0;
    };
    let preset = preset.to_ascii_lowercase();

    match encoder {
        VideoEncoder::SvtAv1 => numbered(&SVT_PRESETS, &preset),
        VideoEncoder::LibAom => numbered(&AOM_CPU_USED, &preset),
        VideoEncoder::Vp9 => match preset.as_str() {
            "realtime" => 0.3,
            "good" => 1.0,
            "best" => 2.5,
            _ => 1.0,
        },
        _ => named_preset(&preset),
    }
}

fn numbered(table: &[f64], preset: &str) -> f64 {
    preset
        .parse::<usize>()
        .ok()
        .and_then(|i| table.get(i).copied())
        .unwrap_or(1.0)
}

fn named_preset(preset: &str) -> f64 {
    match preset {
        "ultrafast" => 0.2,
        "superfast" => 0.3,
        "veryfast" => 0.5,
        "faster" => 0.7,
        "fast" => 0.85,
        "medium" => 1.0,
        "slow" => 1.5,
        "slower" => 2.5,
        "veryslow" => 4.0,
        "placebo" => 8.0,
        "p1" => 0.5,
        "p2" => 0.6,
        "p3" => 0.8,
        "p4" => 1.0,
        "p5" => 1.3,
        "p6" => 1.6,
        "p7" => 2.0,
        _ => 1.0,
    }
}

fn duration_factor(duration_minutes: f64) -> f64 {
    duration_minutes.max(0.0) / 60.0
}

// ---------------------------------------------------------------------------
// Output weights
// ---------------------------------------------------------------------------

/// Weight of one video encode.
pub fn video_weight(
    codec: &VideoCodec,
    resolution: (u32, u32),
    hdr_to_sdr: bool,
    duration_minutes: f64,
) -> f64 {
    let hdr = if hdr_to_sdr { HDR_TO_SDR_FACTOR } else { 1.0 };
    BASE_VIDEO_WEIGHT
        * resolution_multiplier(resolution.0, resolution.1)
        * video_codec_multiplier(codec.encoder)
        * preset_multiplier(codec.encoder, codec.preset.as_deref())
        * hdr
        * duration_factor(duration_minutes)
}

/// Weight of one audio encode.
pub fn audio_weight(encoder: AudioEncoder, channels: u32, duration_minutes: f64) -> f64 {
    BASE_AUDIO_WEIGHT
        * audio_codec_multiplier(encoder)
        * (channels as f64 / 2.0)
        * duration_factor(duration_minutes)
}

/// Total weight of running `profile` against the analyzed source.
///
/// Video is weighed per rendition that survives the scale policy, at the
/// resolution it will actually be encoded at.
pub fn job_weight(profile: &EncodingProfile, analysis: &StreamAnalysis) -> f64 {
    let minutes = analysis.duration_minutes();
    let source = analysis.resolution();

    let video: f64 = plan_renditions(profile, analysis)
        .iter()
        .map(|r| {
            let resolution = match r.decision {
                ScaleDecision::Scale { width, height } => (width, height),
                _ => source
                    .or(r.output.width.zip(r.output.height))
                    .unwrap_or((1920, 1080)),
            };
            let hdr_to_sdr = r.output.tone_map && analysis.is_hdr;
            video_weight(r.codec, resolution, hdr_to_sdr, minutes)
        })
        .sum();

    let source_channels = analysis.primary_audio().map(|a| a.channels).unwrap_or(2);
    let audio: f64 = if analysis.audio_streams.is_empty() {
        0.0
    } else {
        profile
            .audio_codecs()
            .map(|c| audio_weight(c.encoder, c.channels.unwrap_or(source_channels), minutes))
            .sum()
    };

    let subtitles = if profile.container.carries_subtitles() {
        profile.subtitle_outputs.len() as f64 * SUBTITLE_WEIGHT
    } else {
        0.0
    };

    video + audio + subtitles
}

/// Weight of re-encoding `analysis` as reference 1080p-class H.264 at its
/// own resolution.
fn reference_weight(analysis: &StreamAnalysis) -> f64 {
    let Some(resolution) = analysis.resolution() else {
        return 0.0;
    };
    let codec = VideoCodec::new(VideoEncoder::X264).with_preset("medium");
    video_weight(&codec, resolution, false, analysis.duration_minutes())
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Anything the weighting engine can price.
#[derive(Debug, Clone, Copy)]
pub enum WeightSubject<'a> {
    /// A persisted task: its frozen weight.
    Task(&'a EncodingTask),
    /// A task definition that has not been persisted yet.
    Definition(&'a TaskDefinition),
    /// A bare source with no profile: priced as a reference encode.
    Analysis(&'a StreamAnalysis),
    /// A profile applied to a source.
    Profile {
        profile: &'a EncodingProfile,
        analysis: &'a StreamAnalysis,
    },
}

pub fn weight_of(subject: WeightSubject<'_>) -> f64 {
    match subject {
        WeightSubject::Task(task) => task.weight,
        WeightSubject::Definition(def) => def.weight,
        WeightSubject::Analysis(analysis) => reference_weight(analysis),
        WeightSubject::Profile { profile, analysis } => job_weight(profile, analysis),
    }
}

// ---------------------------------------------------------------------------
// Time estimates
// ---------------------------------------------------------------------------

/// Expected wall time for `weight` on hardware `speed_factor` times as fast
/// as the reference. A non-positive factor counts as `1.0`.
pub fn estimate_encoding_time(weight: f64, speed_factor: f64) -> Duration {
    let factor = if speed_factor > 0.0 { speed_factor } else { 1.0 };
    let minutes = weight.max(0.0) * REFERENCE_MINUTES / factor;
    Duration::from_secs_f64(minutes * 60.0)
}

/// [`estimate_encoding_time`] over the summed weight of `tasks`.
pub fn estimate_job_time<'a>(
    tasks: impl IntoIterator<Item = &'a EncodingTask>,
    speed_factor: f64,
) -> Duration {
    let total: f64 = tasks.into_iter().map(|t| t.weight).sum();
    estimate_encoding_time(total, speed_factor)
}
