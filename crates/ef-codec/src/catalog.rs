//! The read-only system profiles shipped with every installation.

use chrono::{DateTime, Utc};
use ef_core::{PresetTier, ProfileId, ScaleMode};

use crate::audio::{AudioCodec, AudioEncoder};
use crate::container::{Container, HlsOptions, SegmentType};
use crate::profile::{
    AudioOutputConfig, EncodingProfile, ProfileOptions, SubtitleOutputConfig, ThumbnailConfig,
    VideoOutputConfig,
};
use crate::subtitle::{SubtitleCodec, SubtitleEncoder};
use crate::video::{VideoCodec, VideoEncoder};

pub const HLS_ADAPTIVE: ProfileId = ProfileId::from_u128(0x5f1d_0000_0000_4000_8000_0000_0000_0001);
pub const HLS_HEVC: ProfileId = ProfileId::from_u128(0x5f1d_0000_0000_4000_8000_0000_0000_0002);
pub const HLS_4K: ProfileId = ProfileId::from_u128(0x5f1d_0000_0000_4000_8000_0000_0000_0003);
pub const WEB_MP4: ProfileId = ProfileId::from_u128(0x5f1d_0000_0000_4000_8000_0000_0000_0004);
pub const ARCHIVAL_MKV: ProfileId = ProfileId::from_u128(0x5f1d_0000_0000_4000_8000_0000_0000_0005);
pub const AUDIO_OPUS: ProfileId = ProfileId::from_u128(0x5f1d_0000_0000_4000_8000_0000_0000_0006);

/// 2024-01-01T00:00:00Z; system profiles never change at runtime.
fn catalog_timestamp() -> DateTime<Utc> {
    DateTime::from_timestamp(1_704_067_200, 0).unwrap_or_default()
}

fn system(id: ProfileId, name: &str, description: &str, container: Container) -> EncodingProfile {
    let ts = catalog_timestamp();
    EncodingProfile {
        id,
        name: name.into(),
        description: Some(description.into()),
        version: 1,
        container,
        video_outputs: Vec::new(),
        audio_outputs: Vec::new(),
        subtitle_outputs: Vec::new(),
        thumbnails: None,
        options: ProfileOptions::default(),
        is_system: true,
        is_default: false,
        created_at: ts,
        updated_at: ts,
    }
}

fn rendition(name: &str, codec: &VideoCodec, width: u32, height: u32, kbps: u32) -> VideoOutputConfig {
    VideoOutputConfig::new(name, codec.clone())
        .with_size(width, height)
        .with_bitrate(kbps)
        .tone_mapped()
        .without_upscaling()
}

fn hls_adaptive() -> EncodingProfile {
    let mut p = system(
        HLS_ADAPTIVE,
        "hls-adaptive",
        "Adaptive H.264 HLS ladder (1080p/720p/480p) with AAC stereo",
        Container::Hls(HlsOptions::default()),
    );
    let h264 = VideoCodec::from_tier(VideoEncoder::X264, PresetTier::Balanced)
        .with_profile("high")
        .with_pixel_format("yuv420p");
    p.video_outputs = vec![
        rendition("1080p", &h264, 1920, 1080, 5000),
        rendition("720p", &h264, 1280, 720, 2800),
        rendition("480p", &h264, 854, 480, 1400),
    ];
    p.audio_outputs = vec![AudioOutputConfig::new(
        AudioCodec::new(AudioEncoder::Aac).with_bitrate(128).with_channels(2),
    )];
    p.thumbnails = Some(ThumbnailConfig::default());
    p.is_default = true;
    p
}

fn hls_hevc() -> EncodingProfile {
    let mut p = system(
        HLS_HEVC,
        "hls-hevc",
        "HEVC HLS in fMP4 segments (1080p/720p), tone-mapped to SDR",
        Container::Hls(HlsOptions {
            segment_type: SegmentType::Fmp4,
            ..Default::default()
        }),
    );
    let hevc = VideoCodec::from_tier(VideoEncoder::X265, PresetTier::Balanced)
        .with_pixel_format("yuv420p");
    p.video_outputs = vec![
        rendition("1080p", &hevc, 1920, 1080, 3500),
        rendition("720p", &hevc, 1280, 720, 1800),
    ];
    p.audio_outputs = vec![AudioOutputConfig::new(
        AudioCodec::new(AudioEncoder::Aac).with_bitrate(160).with_channels(2),
    )];
    p.thumbnails = Some(ThumbnailConfig::default());
    p
}

fn hls_4k() -> EncodingProfile {
    let mut p = system(
        HLS_4K,
        "hls-4k",
        "10-bit HEVC HLS (2160p/1080p) preserving HDR, with surround AAC",
        Container::Hls(HlsOptions {
            segment_type: SegmentType::Fmp4,
            ..Default::default()
        }),
    );
    let hevc10 = VideoCodec::from_tier(VideoEncoder::X265, PresetTier::HighQuality)
        .with_profile("main10")
        .with_pixel_format("yuv420p10le");
    p.video_outputs = vec![
        VideoOutputConfig::new("2160p", hevc10.clone())
            .with_size(3840, 2160)
            .with_bitrate(16000)
            .without_upscaling(),
        VideoOutputConfig::new("1080p", hevc10)
            .with_size(1920, 1080)
            .with_bitrate(6000)
            .without_upscaling(),
    ];
    p.audio_outputs = vec![AudioOutputConfig::new(
        AudioCodec::new(AudioEncoder::Aac).with_bitrate(384).with_channels(6),
    )];
    p.thumbnails = Some(ThumbnailConfig::default());
    p
}

fn web_mp4() -> EncodingProfile {
    let mut p = system(
        WEB_MP4,
        "web-mp4",
        "Progressive-download H.264 MP4 capped at 1080p",
        Container::Mp4 { faststart: true },
    );
    p.video_outputs = vec![VideoOutputConfig::new(
        "1080p",
        VideoCodec::from_tier(VideoEncoder::X264, PresetTier::Balanced)
            .with_profile("high")
            .with_pixel_format("yuv420p"),
    )
    .with_size(1920, 1080)
    .with_scale_mode(ScaleMode::DownscaleOnly)
    .tone_mapped()];
    p.audio_outputs = vec![AudioOutputConfig::new(
        AudioCodec::new(AudioEncoder::Aac).with_bitrate(160).with_channels(2),
    )];
    p.subtitle_outputs = vec![SubtitleOutputConfig::new(SubtitleCodec::new(SubtitleEncoder::MovText))];
    p
}

fn archival_mkv() -> EncodingProfile {
    let mut p = system(
        ARCHIVAL_MKV,
        "archival-mkv",
        "Near-lossless 10-bit HEVC Matroska at source resolution with FLAC audio",
        Container::Matroska,
    );
    p.video_outputs = vec![VideoOutputConfig::new(
        "source",
        VideoCodec::new(VideoEncoder::X265)
            .with_preset("slow")
            .with_crf(18)
            .with_pixel_format("yuv420p10le"),
    )];
    p.audio_outputs = vec![AudioOutputConfig::new(AudioCodec::new(AudioEncoder::Flac))];
    p.subtitle_outputs = vec![SubtitleOutputConfig::new(SubtitleCodec::new(SubtitleEncoder::Copy))];
    p
}

fn audio_opus() -> EncodingProfile {
    let mut p = system(
        AUDIO_OPUS,
        "audio-opus",
        "Audio-only Opus in WebM",
        Container::WebM,
    );
    p.audio_outputs = vec![AudioOutputConfig::new(
        AudioCodec::new(AudioEncoder::Opus)
            .with_bitrate(128)
            .with_sample_rate(48000),
    )];
    p.options.copy_chapters = false;
    p
}

/// Every system profile, default first.
pub fn system_profiles() -> Vec<EncodingProfile> {
    vec![
        hls_adaptive(),
        hls_hevc(),
        hls_4k(),
        web_mp4(),
        archival_mkv(),
        audio_opus(),
    ]
}

pub fn system_profile(id: ProfileId) -> Option<EncodingProfile> {
    system_profiles().into_iter().find(|p| p.id == id)
}

pub fn system_profile_by_name(name: &str) -> Option<EncodingProfile> {
    system_profiles()
        .into_iter()
        .find(|p| p.name.eq_ignore_ascii_case(name))
}

pub fn is_system_id(id: ProfileId) -> bool {
    [HLS_ADAPTIVE, HLS_HEVC, HLS_4K, WEB_MP4, ARCHIVAL_MKV, AUDIO_OPUS].contains(&id)
}
