//! Encoding profiles: named, versioned output specifications.

use std::fmt;

use chrono::{DateTime, Utc};
use ef_core::{ProfileId, Result, ScaleMode};
use serde::{Deserialize, Serialize};

use crate::audio::AudioCodec;
use crate::codec::Codec;
use crate::container::Container;
use crate::subtitle::SubtitleCodec;
use crate::video::VideoCodec;

// ---------------------------------------------------------------------------
// Output configs
// ---------------------------------------------------------------------------

/// One video rendition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoOutputConfig {
    /// Rendition label (e.g. "1080p"), used in logs and variant names.
    pub name: String,
    /// `None` is representable so that validation can reject it.
    pub codec: Option<VideoCodec>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    /// Target average bitrate; constant-quality when unset.
    #[serde(default)]
    pub bitrate_kbps: Option<u32>,
    #[serde(default)]
    pub scale_mode: ScaleMode,
    /// Extra filter expressions appended after scaling and tone-mapping.
    #[serde(default)]
    pub filters: Vec<String>,
    /// Convert HDR sources to SDR.
    #[serde(default)]
    pub tone_map: bool,
    /// Drop this rendition entirely when the source is smaller than the
    /// target.
    #[serde(default)]
    pub avoid_upscaling: bool,
}

impl VideoOutputConfig {
    pub fn new(name: impl Into<String>, codec: VideoCodec) -> Self {
        Self {
            name: name.into(),
            codec: Some(codec),
            width: None,
            height: None,
            bitrate_kbps: None,
            scale_mode: ScaleMode::Fit,
            filters: Vec::new(),
            tone_map: false,
            avoid_upscaling: false,
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn with_bitrate(mut self, kbps: u32) -> Self {
        self.bitrate_kbps = Some(kbps);
        self
    }

    pub fn with_scale_mode(mut self, mode: ScaleMode) -> Self {
        self.scale_mode = mode;
        self
    }

    pub fn tone_mapped(mut self) -> Self {
        self.tone_map = true;
        self
    }

    pub fn without_upscaling(mut self) -> Self {
        self.avoid_upscaling = true;
        self
    }
}

/// One audio output stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioOutputConfig {
    pub codec: Option<AudioCodec>,
    /// Extra `-af` filter expressions.
    #[serde(default)]
    pub filters: Vec<String>,
    /// Preferred source language; the primary audio stream otherwise.
    #[serde(default)]
    pub language: Option<String>,
}

impl AudioOutputConfig {
    pub fn new(codec: AudioCodec) -> Self {
        Self {
            codec: Some(codec),
            filters: Vec::new(),
            language: None,
        }
    }
}

/// One subtitle output stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleOutputConfig {
    pub codec: Option<SubtitleCodec>,
    #[serde(default)]
    pub language: Option<String>,
}

impl SubtitleOutputConfig {
    pub fn new(codec: SubtitleCodec) -> Self {
        Self {
            codec: Some(codec),
            language: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThumbnailFormat {
    #[default]
    Jpeg,
    Png,
    Webp,
}

impl ThumbnailFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Webp => "webp",
        }
    }
}

impl fmt::Display for ThumbnailFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Periodic thumbnail extraction.
///
/// Width and quality are signed so out-of-range input survives
/// deserialization and is reported by validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThumbnailConfig {
    pub interval_secs: f64,
    pub width: i32,
    /// 0..=100, higher is better.
    pub quality: i32,
    #[serde(default)]
    pub format: ThumbnailFormat,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10.0,
            width: 320,
            quality: 75,
            format: ThumbnailFormat::Jpeg,
        }
    }
}

/// Process-level switches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileOptions {
    pub overwrite: bool,
    /// Encoder thread count; the tool decides when unset.
    pub threads: Option<u32>,
    pub hardware_acceleration: bool,
    /// Preferred hwaccel method (e.g. "cuda") when several are available.
    pub preferred_accelerator: Option<String>,
    pub copy_metadata: bool,
    pub copy_chapters: bool,
}

impl Default for ProfileOptions {
    fn default() -> Self {
        Self {
            overwrite: true,
            threads: None,
            hardware_acceleration: false,
            preferred_accelerator: None,
            copy_metadata: true,
            copy_chapters: true,
        }
    }
}

// ---------------------------------------------------------------------------
// EncodingProfile
// ---------------------------------------------------------------------------

/// Outcome of [`EncodingProfile::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl ValidationResult {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }

    /// Convert into a `Result`, joining all problems into one message.
    pub fn into_result(self) -> Result<()> {
        if self.is_valid {
            Ok(())
        } else {
            Err(ef_core::Error::Validation(self.errors.join("; ")))
        }
    }
}

/// A named, reusable specification of desired outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodingProfile {
    pub id: ProfileId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub version: u32,
    pub container: Container,
    #[serde(default)]
    pub video_outputs: Vec<VideoOutputConfig>,
    #[serde(default)]
    pub audio_outputs: Vec<AudioOutputConfig>,
    #[serde(default)]
    pub subtitle_outputs: Vec<SubtitleOutputConfig>,
    #[serde(default)]
    pub thumbnails: Option<ThumbnailConfig>,
    #[serde(default)]
    pub options: ProfileOptions,
    #[serde(default)]
    pub is_system: bool,
    #[serde(default)]
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EncodingProfile {
    /// An empty user profile.
    pub fn new(name: impl Into<String>, container: Container) -> Self {
        let now = Utc::now();
        Self {
            id: ProfileId::new(),
            name: name.into(),
            description: None,
            version: 1,
            container,
            video_outputs: Vec::new(),
            audio_outputs: Vec::new(),
            subtitle_outputs: Vec::new(),
            thumbnails: None,
            options: ProfileOptions::default(),
            is_system: false,
            is_default: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn video_codecs(&self) -> impl Iterator<Item = &VideoCodec> {
        self.video_outputs.iter().filter_map(|o| o.codec.as_ref())
    }

    pub fn audio_codecs(&self) -> impl Iterator<Item = &AudioCodec> {
        self.audio_outputs.iter().filter_map(|o| o.codec.as_ref())
    }

    pub fn subtitle_codecs(&self) -> impl Iterator<Item = &SubtitleCodec> {
        self.subtitle_outputs.iter().filter_map(|o| o.codec.as_ref())
    }

    /// Check the profile without failing.
    ///
    /// Invalid exactly when an output has no codec, a codec rejects its own
    /// parameters, the container rejects a codec, or the thumbnail config
    /// has a non-positive interval or width or a quality outside `[0, 100]`.
    pub fn validate(&self) -> ValidationResult {
        let mut errors = Vec::new();

        for (i, output) in self.video_outputs.iter().enumerate() {
            match output.codec {
                Some(ref codec) => errors.extend(
                    codec
                        .validate()
                        .into_iter()
                        .map(|e| format!("video_outputs[{i}] ({}): {e}", output.name)),
                ),
                None => errors.push(format!("video_outputs[{i}] ({}) has no codec", output.name)),
            }
        }
        for (i, output) in self.audio_outputs.iter().enumerate() {
            match output.codec {
                Some(ref codec) => errors.extend(
                    codec
                        .validate()
                        .into_iter()
                        .map(|e| format!("audio_outputs[{i}]: {e}")),
                ),
                None => errors.push(format!("audio_outputs[{i}] has no codec")),
            }
        }
        for (i, output) in self.subtitle_outputs.iter().enumerate() {
            match output.codec {
                Some(ref codec) => errors.extend(
                    codec
                        .validate()
                        .into_iter()
                        .map(|e| format!("subtitle_outputs[{i}]: {e}")),
                ),
                None => errors.push(format!("subtitle_outputs[{i}] has no codec")),
            }
        }

        let compat = self.container.validate_codecs(
            self.video_codecs(),
            self.audio_codecs(),
            self.subtitle_codecs(),
        );
        errors.extend(compat.errors);

        if let Some(ref thumbs) = self.thumbnails {
            if thumbs.interval_secs.is_nan() || thumbs.interval_secs <= 0.0 {
                errors.push(format!(
                    "thumbnails.interval_secs must be positive (got {})",
                    thumbs.interval_secs
                ));
            }
            if thumbs.width <= 0 {
                errors.push(format!("thumbnails.width must be positive (got {})", thumbs.width));
            }
            if !(0..=100).contains(&thumbs.quality) {
                errors.push(format!(
                    "thumbnails.quality must be within [0, 100] (got {})",
                    thumbs.quality
                ));
            }
        }

        ValidationResult::from_errors(errors)
    }

    /// Freeze this profile into the JSON snapshot stored on a job.
    pub fn to_snapshot(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Restore a profile from a job's snapshot.
    pub fn from_snapshot(snapshot: &str) -> Result<Self> {
        Ok(serde_json::from_str(snapshot)?)
    }
}
