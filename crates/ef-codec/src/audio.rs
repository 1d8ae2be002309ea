//! Audio encoders.

use std::fmt;

use ef_core::StreamType;
use serde::{Deserialize, Serialize};

use crate::codec::{Arg, Codec};

/// A concrete audio encoder, serialized as its ffmpeg name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AudioEncoder {
    #[serde(rename = "aac")]
    Aac,
    #[serde(rename = "libopus")]
    Opus,
    #[serde(rename = "ac3")]
    Ac3,
    #[serde(rename = "eac3")]
    Eac3,
    #[serde(rename = "flac")]
    Flac,
    #[serde(rename = "libmp3lame")]
    Mp3,
    #[serde(rename = "libvorbis")]
    Vorbis,
    #[serde(rename = "copy")]
    Copy,
}

impl AudioEncoder {
    pub fn ffmpeg_name(&self) -> &'static str {
        match self {
            Self::Aac => "aac",
            Self::Opus => "libopus",
            Self::Ac3 => "ac3",
            Self::Eac3 => "eac3",
            Self::Flac => "flac",
            Self::Mp3 => "libmp3lame",
            Self::Vorbis => "libvorbis",
            Self::Copy => "copy",
        }
    }

    /// Accepted bitrate range in kbit/s; `None` for lossless or copy.
    fn bitrate_range(&self) -> Option<(u32, u32)> {
        match self {
            Self::Aac => Some((16, 512)),
            Self::Opus => Some((6, 510)),
            Self::Ac3 => Some((32, 640)),
            Self::Eac3 => Some((32, 6144)),
            Self::Mp3 => Some((8, 320)),
            Self::Vorbis => Some((45, 500)),
            Self::Flac | Self::Copy => None,
        }
    }

    fn max_channels(&self) -> u32 {
        match self {
            Self::Ac3 => 6,
            Self::Mp3 => 2,
            _ => 8,
        }
    }
}

impl fmt::Display for AudioEncoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ffmpeg_name())
    }
}

/// Opus only runs at these sample rates.
const OPUS_SAMPLE_RATES: [u32; 5] = [8000, 12000, 16000, 24000, 48000];

/// An audio encoder plus its output parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioCodec {
    pub encoder: AudioEncoder,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitrate_kbps: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,
}

impl AudioCodec {
    pub fn new(encoder: AudioEncoder) -> Self {
        Self {
            encoder,
            bitrate_kbps: None,
            channels: None,
            sample_rate: None,
        }
    }

    pub fn with_bitrate(mut self, kbps: u32) -> Self {
        self.bitrate_kbps = Some(kbps);
        self
    }

    pub fn with_channels(mut self, channels: u32) -> Self {
        self.channels = Some(channels);
        self
    }

    pub fn with_sample_rate(mut self, hz: u32) -> Self {
        self.sample_rate = Some(hz);
        self
    }
}

impl Codec for AudioCodec {
    fn name(&self) -> &'static str {
        self.encoder.ffmpeg_name()
    }

    fn stream_type(&self) -> StreamType {
        StreamType::Audio
    }

    fn build_arguments(&self) -> Vec<Arg> {
        let mut args = vec![Arg::new("-c:a", self.encoder.ffmpeg_name())];
        if self.is_copy() {
            return args;
        }
        if let Some(kbps) = self.bitrate_kbps {
            args.push(Arg::new("-b:a", format!("{kbps}k")));
        }
        if let Some(channels) = self.channels {
            args.push(Arg::new("-ac", channels));
        }
        if let Some(rate) = self.sample_rate {
            args.push(Arg::new("-ar", rate));
        }
        args
    }

    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.is_copy() {
            return errors;
        }
        let name = self.encoder.ffmpeg_name();

        if let Some(kbps) = self.bitrate_kbps {
            match self.encoder.bitrate_range() {
                Some((min, max)) if kbps < min || kbps > max => {
                    errors.push(format!("{name}: bitrate {kbps}k outside [{min}k, {max}k]"));
                }
                None => errors.push(format!("{name} is lossless and takes no bitrate")),
                _ => {}
            }
        }

        if let Some(channels) = self.channels {
            let max = self.encoder.max_channels();
            if channels == 0 || channels > max {
                errors.push(format!("{name}: {channels} channels outside [1, {max}]"));
            }
        }

        if let Some(rate) = self.sample_rate {
            if self.encoder == AudioEncoder::Opus {
                if !OPUS_SAMPLE_RATES.contains(&rate) {
                    errors.push(format!("{name}: unsupported sample rate {rate}"));
                }
            } else if !(8000..=192_000).contains(&rate) {
                errors.push(format!("{name}: sample rate {rate} outside [8000, 192000]"));
            }
        }

        errors
    }

    fn is_copy(&self) -> bool {
        self.encoder == AudioEncoder::Copy
    }
}
