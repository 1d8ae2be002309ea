//! Lookup of codecs and containers by user-facing name.
//!
//! Names are normalized (trimmed, lowercased) before matching, and several
//! spellings map to the same variant. Unknown names yield `None`.

use crate::audio::{AudioCodec, AudioEncoder};
use crate::container::{Container, HlsOptions};
use crate::subtitle::{SubtitleCodec, SubtitleEncoder};
use crate::video::{VideoCodec, VideoEncoder};

fn normalize(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

pub fn video_encoder(name: &str) -> Option<VideoEncoder> {
    let encoder = match normalize(name).as_str() {
        "h264" | "avc" | "x264" | "libx264" => VideoEncoder::X264,
        "h265" | "hevc" | "x265" | "libx265" => VideoEncoder::X265,
        "av1" | "aom" | "libaom" | "libaom-av1" => VideoEncoder::LibAom,
        "svt-av1" | "svtav1" | "libsvtav1" => VideoEncoder::SvtAv1,
        "vp9" | "libvpx" | "libvpx-vp9" => VideoEncoder::Vp9,
        "h264_nvenc" | "nvenc" | "nvenc_h264" => VideoEncoder::H264Nvenc,
        "hevc_nvenc" | "h265_nvenc" | "nvenc_hevc" => VideoEncoder::HevcNvenc,
        "av1_nvenc" => VideoEncoder::Av1Nvenc,
        "h264_qsv" | "qsv" => VideoEncoder::H264Qsv,
        "hevc_qsv" | "h265_qsv" => VideoEncoder::HevcQsv,
        "h264_vaapi" | "vaapi" => VideoEncoder::H264Vaapi,
        "hevc_vaapi" | "h265_vaapi" => VideoEncoder::HevcVaapi,
        "h264_videotoolbox" | "videotoolbox" => VideoEncoder::H264VideoToolbox,
        "hevc_videotoolbox" | "h265_videotoolbox" => VideoEncoder::HevcVideoToolbox,
        "copy" => VideoEncoder::Copy,
        _ => return None,
    };
    Some(encoder)
}

pub fn audio_encoder(name: &str) -> Option<AudioEncoder> {
    let encoder = match normalize(name).as_str() {
        "aac" | "libfdk_aac" => AudioEncoder::Aac,
        "opus" | "libopus" => AudioEncoder::Opus,
        "ac3" | "ac-3" => AudioEncoder::Ac3,
        "eac3" | "e-ac3" | "e-ac-3" => AudioEncoder::Eac3,
        "flac" => AudioEncoder::Flac,
        "mp3" | "libmp3lame" => AudioEncoder::Mp3,
        "vorbis" | "libvorbis" => AudioEncoder::Vorbis,
        "copy" => AudioEncoder::Copy,
        _ => return None,
    };
    Some(encoder)
}

pub fn subtitle_encoder(name: &str) -> Option<SubtitleEncoder> {
    let encoder = match normalize(name).as_str() {
        "webvtt" | "vtt" => SubtitleEncoder::WebVtt,
        "srt" | "subrip" => SubtitleEncoder::Srt,
        "ass" | "ssa" => SubtitleEncoder::Ass,
        "mov_text" | "tx3g" => SubtitleEncoder::MovText,
        "copy" => SubtitleEncoder::Copy,
        _ => return None,
    };
    Some(encoder)
}

/// Untuned video codec for `name`.
pub fn video_codec(name: &str) -> Option<VideoCodec> {
    video_encoder(name).map(VideoCodec::new)
}

pub fn audio_codec(name: &str) -> Option<AudioCodec> {
    audio_encoder(name).map(AudioCodec::new)
}

pub fn subtitle_codec(name: &str) -> Option<SubtitleCodec> {
    subtitle_encoder(name).map(SubtitleCodec::new)
}

/// Container with default muxer settings for `name`.
pub fn container(name: &str) -> Option<Container> {
    let container = match normalize(name).as_str() {
        "mp4" | "m4v" | "mov" => Container::Mp4 { faststart: true },
        "mkv" | "matroska" => Container::Matroska,
        "webm" => Container::WebM,
        "hls" | "m3u8" => Container::Hls(HlsOptions::default()),
        _ => return None,
    };
    Some(container)
}
