//! Video encoders and their parameter ranges.

use std::fmt;

use ef_core::{PresetTier, StreamType};
use serde::{Deserialize, Serialize};

use crate::codec::{Arg, Codec, VideoFamily};
use crate::preset;

// ---------------------------------------------------------------------------
// VideoEncoder
// ---------------------------------------------------------------------------

/// A concrete video encoder, serialized as its ffmpeg name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VideoEncoder {
    #[serde(rename = "libx264")]
    X264,
    #[serde(rename = "libx265")]
    X265,
    #[serde(rename = "libaom-av1")]
    LibAom,
    #[serde(rename = "libsvtav1")]
    SvtAv1,
    #[serde(rename = "libvpx-vp9")]
    Vp9,
    #[serde(rename = "h264_nvenc")]
    H264Nvenc,
    #[serde(rename = "hevc_nvenc")]
    HevcNvenc,
    #[serde(rename = "av1_nvenc")]
    Av1Nvenc,
    #[serde(rename = "h264_qsv")]
    H264Qsv,
    #[serde(rename = "hevc_qsv")]
    HevcQsv,
    #[serde(rename = "h264_vaapi")]
    H264Vaapi,
    #[serde(rename = "hevc_vaapi")]
    HevcVaapi,
    #[serde(rename = "h264_videotoolbox")]
    H264VideoToolbox,
    #[serde(rename = "hevc_videotoolbox")]
    HevcVideoToolbox,
    #[serde(rename = "copy")]
    Copy,
}

/// How an encoder is told its quality target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum QualityControl {
    Crf { max: u32 },
    NvencCq,
    QsvGlobal,
    VaapiQp,
    ToolboxQ,
    None,
}

impl VideoEncoder {
    pub const ALL: [VideoEncoder; 15] = [
        Self::X264,
        Self::X265,
        Self::LibAom,
        Self::SvtAv1,
        Self::Vp9,
        Self::H264Nvenc,
        Self::HevcNvenc,
        Self::Av1Nvenc,
        Self::H264Qsv,
        Self::HevcQsv,
        Self::H264Vaapi,
        Self::HevcVaapi,
        Self::H264VideoToolbox,
        Self::HevcVideoToolbox,
        Self::Copy,
    ];

    pub fn ffmpeg_name(&self) -> &'static str {
        match self {
            Self::X264 => "libx264",
            Self::X265 => "libx265",
            Self::LibAom => "libaom-av1",
            Self::SvtAv1 => "libsvtav1",
            Self::Vp9 => "libvpx-vp9",
            Self::H264Nvenc => "h264_nvenc",
            Self::HevcNvenc => "hevc_nvenc",
            Self::Av1Nvenc => "av1_nvenc",
            Self::H264Qsv => "h264_qsv",
            Self::HevcQsv => "hevc_qsv",
            Self::H264Vaapi => "h264_vaapi",
            Self::HevcVaapi => "hevc_vaapi",
            Self::H264VideoToolbox => "h264_videotoolbox",
            Self::HevcVideoToolbox => "hevc_videotoolbox",
            Self::Copy => "copy",
        }
    }

    /// Bitstream family produced; `None` for stream copy.
    pub fn family(&self) -> Option<VideoFamily> {
        match self {
            Self::X264 | Self::H264Nvenc | Self::H264Qsv | Self::H264Vaapi | Self::H264VideoToolbox => {
                Some(VideoFamily::H264)
            }
            Self::X265 | Self::HevcNvenc | Self::HevcQsv | Self::HevcVaapi | Self::HevcVideoToolbox => {
                Some(VideoFamily::Hevc)
            }
            Self::LibAom | Self::SvtAv1 | Self::Av1Nvenc => Some(VideoFamily::Av1),
            Self::Vp9 => Some(VideoFamily::Vp9),
            Self::Copy => None,
        }
    }

    pub fn is_hardware(&self) -> bool {
        matches!(
            self,
            Self::H264Nvenc
                | Self::HevcNvenc
                | Self::Av1Nvenc
                | Self::H264Qsv
                | Self::HevcQsv
                | Self::H264Vaapi
                | Self::HevcVaapi
                | Self::H264VideoToolbox
                | Self::HevcVideoToolbox
        )
    }

    /// The hwaccel method (`-hwaccel` value) this encoder runs on.
    pub fn accelerator(&self) -> Option<&'static str> {
        match self {
            Self::H264Nvenc | Self::HevcNvenc | Self::Av1Nvenc => Some("cuda"),
            Self::H264Qsv | Self::HevcQsv => Some("qsv"),
            Self::H264Vaapi | Self::HevcVaapi => Some("vaapi"),
            Self::H264VideoToolbox | Self::HevcVideoToolbox => Some("videotoolbox"),
            _ => None,
        }
    }

    pub(crate) fn quality_control(&self) -> QualityControl {
        match self {
            Self::X264 | Self::X265 => QualityControl::Crf { max: 51 },
            Self::LibAom | Self::SvtAv1 | Self::Vp9 => QualityControl::Crf { max: 63 },
            Self::H264Nvenc | Self::HevcNvenc | Self::Av1Nvenc => QualityControl::NvencCq,
            Self::H264Qsv | Self::HevcQsv => QualityControl::QsvGlobal,
            Self::H264Vaapi | Self::HevcVaapi => QualityControl::VaapiQp,
            Self::H264VideoToolbox | Self::HevcVideoToolbox => QualityControl::ToolboxQ,
            Self::Copy => QualityControl::None,
        }
    }
}

impl fmt::Display for VideoEncoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ffmpeg_name())
    }
}

// ---------------------------------------------------------------------------
// VideoCodec
// ---------------------------------------------------------------------------

/// A video encoder plus its tuning parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoCodec {
    pub encoder: VideoEncoder,
    /// Encoder speed preset. Its vocabulary depends on the encoder
    /// (x264 names, SVT-AV1 numbers, NVENC `p1`..`p7`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
    /// Constant-quality target: CRF for software encoders, CQ/QP/global
    /// quality for hardware ones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crf: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pixel_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tune: Option<String>,
    /// Maximum keyframe interval in frames.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gop_size: Option<u32>,
}

impl VideoCodec {
    /// An encoder with no tuning; the tool's defaults apply.
    pub fn new(encoder: VideoEncoder) -> Self {
        Self {
            encoder,
            preset: None,
            crf: None,
            profile: None,
            level: None,
            pixel_format: None,
            tune: None,
            gop_size: None,
        }
    }

    /// An encoder tuned for a coarse speed/quality tier.
    pub fn from_tier(encoder: VideoEncoder, tier: PresetTier) -> Self {
        let settings = preset::tier_settings(encoder, tier);
        Self {
            preset: settings.preset.map(str::to_string),
            crf: settings.quality,
            ..Self::new(encoder)
        }
    }

    pub fn with_preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = Some(preset.into());
        self
    }

    pub fn with_crf(mut self, crf: u32) -> Self {
        self.crf = Some(crf);
        self
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    pub fn with_pixel_format(mut self, pixel_format: impl Into<String>) -> Self {
        self.pixel_format = Some(pixel_format.into());
        self
    }

    pub fn with_gop_size(mut self, gop_size: u32) -> Self {
        self.gop_size = Some(gop_size);
        self
    }

    pub fn family(&self) -> Option<VideoFamily> {
        self.encoder.family()
    }

    fn preset_flag(&self) -> Option<&'static str> {
        match self.encoder {
            VideoEncoder::LibAom => Some("-cpu-used"),
            VideoEncoder::Vp9 => Some("-deadline"),
            VideoEncoder::H264Vaapi
            | VideoEncoder::HevcVaapi
            | VideoEncoder::H264VideoToolbox
            | VideoEncoder::HevcVideoToolbox
            | VideoEncoder::Copy => None,
            _ => Some("-preset"),
        }
    }

    fn validate_preset(&self, preset: &str, errors: &mut Vec<String>) {
        let name = self.encoder.ffmpeg_name();
        let ok = match self.encoder {
            VideoEncoder::X264 | VideoEncoder::X265 => preset::X264_PRESETS.contains(&preset),
            VideoEncoder::SvtAv1 => preset.parse::<u32>().is_ok_and(|p| p <= 13),
            VideoEncoder::LibAom => preset.parse::<u32>().is_ok_and(|p| p <= 8),
            VideoEncoder::Vp9 => matches!(preset, "good" | "best" | "realtime"),
            VideoEncoder::H264Nvenc | VideoEncoder::HevcNvenc | VideoEncoder::Av1Nvenc => {
                matches!(preset, "p1" | "p2" | "p3" | "p4" | "p5" | "p6" | "p7")
            }
            VideoEncoder::H264Qsv | VideoEncoder::HevcQsv => matches!(
                preset,
                "veryfast" | "faster" | "fast" | "medium" | "slow" | "slower" | "veryslow"
            ),
            _ => {
                errors.push(format!("{name} does not accept a preset"));
                return;
            }
        };
        if !ok {
            errors.push(format!("{name}: unknown preset '{preset}'"));
        }
    }
}

impl Codec for VideoCodec {
    fn name(&self) -> &'static str {
        self.encoder.ffmpeg_name()
    }

    fn stream_type(&self) -> StreamType {
        StreamType::Video
    }

    fn build_arguments(&self) -> Vec<Arg> {
        let mut args = vec![Arg::new("-c:v", self.encoder.ffmpeg_name())];
        if self.is_copy() {
            return args;
        }

        if let (Some(flag), Some(preset)) = (self.preset_flag(), self.preset.as_ref()) {
            args.push(Arg::new(flag, preset));
        }

        if let Some(quality) = self.crf {
            match self.encoder.quality_control() {
                QualityControl::Crf { .. } => {
                    args.push(Arg::new("-crf", quality));
                    // libvpx only honours CRF as constant quality with a zero bitrate.
                    if self.encoder == VideoEncoder::Vp9 {
                        args.push(Arg::new("-b:v", 0));
                    }
                }
                QualityControl::NvencCq => {
                    args.push(Arg::new("-rc", "vbr"));
                    args.push(Arg::new("-cq", quality));
                }
                QualityControl::QsvGlobal => args.push(Arg::new("-global_quality", quality)),
                QualityControl::VaapiQp => args.push(Arg::new("-qp", quality)),
                QualityControl::ToolboxQ => args.push(Arg::new("-q:v", quality)),
                QualityControl::None => {}
            }
        }

        if let Some(ref tune) = self.tune {
            args.push(Arg::new("-tune", tune));
        }
        if let Some(ref profile) = self.profile {
            args.push(Arg::new("-profile:v", profile));
        }
        if let Some(ref level) = self.level {
            args.push(Arg::new("-level", level));
        }
        if let Some(ref pix_fmt) = self.pixel_format {
            args.push(Arg::new("-pix_fmt", pix_fmt));
        }
        if let Some(gop) = self.gop_size {
            args.push(Arg::new("-g", gop));
        }

        args
    }

    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.is_copy() {
            return errors;
        }
        let name = self.encoder.ffmpeg_name();

        if let Some(ref preset) = self.preset {
            self.validate_preset(preset, &mut errors);
        }

        if let Some(quality) = self.crf {
            let range = match self.encoder.quality_control() {
                QualityControl::Crf { max } => Some((0, max)),
                QualityControl::NvencCq | QualityControl::VaapiQp => Some((0, 51)),
                QualityControl::QsvGlobal => Some((1, 51)),
                QualityControl::ToolboxQ => Some((1, 100)),
                QualityControl::None => None,
            };
            if let Some((min, max)) = range {
                if quality < min || quality > max {
                    errors.push(format!(
                        "{name}: quality {quality} outside [{min}, {max}]"
                    ));
                }
            }
        }

        if let Some(ref tune) = self.tune {
            if !matches!(self.encoder, VideoEncoder::X264 | VideoEncoder::X265) {
                errors.push(format!("{name} does not accept tune '{tune}'"));
            }
        }

        if self.gop_size == Some(0) {
            errors.push(format!("{name}: gop_size must be positive"));
        }

        errors
    }

    fn is_copy(&self) -> bool {
        self.encoder == VideoEncoder::Copy
    }
}
