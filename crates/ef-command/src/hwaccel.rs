//! Hardware-accelerated decoding arguments.

use ef_codec::EncodingProfile;

/// An available acceleration method and the input arguments enabling it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwareAccelerator {
    /// ffmpeg hwaccel name: "cuda", "qsv", "vaapi", "videotoolbox", ...
    pub kind: String,
    pub input_args: Vec<String>,
}

impl HardwareAccelerator {
    pub fn for_kind(kind: impl Into<String>) -> Self {
        let kind = kind.into();
        let input_args = vec!["-hwaccel".to_string(), kind.clone()];
        Self { kind, input_args }
    }
}

/// Pick the accelerator a profile should decode with.
///
/// Nothing unless the profile enables hardware acceleration. Otherwise the
/// profile's preferred method, then the method matching its first hardware
/// encoder, then the first available one.
pub fn select<'a>(
    profile: &EncodingProfile,
    available: &'a [HardwareAccelerator],
) -> Option<&'a HardwareAccelerator> {
    if !profile.options.hardware_acceleration || available.is_empty() {
        return None;
    }
    let by_kind = |kind: &str| available.iter().find(|a| a.kind.eq_ignore_ascii_case(kind));

    if let Some(ref preferred) = profile.options.preferred_accelerator {
        if let Some(found) = by_kind(preferred.as_str()) {
            return Some(found);
        }
    }
    profile
        .video_codecs()
        .find_map(|c| c.encoder.accelerator())
        .and_then(by_kind)
        .or_else(|| available.first())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ef_codec::{Container, VideoCodec, VideoEncoder, VideoOutputConfig};

    fn available() -> Vec<HardwareAccelerator> {
        ["vaapi", "cuda"]
            .into_iter()
            .map(HardwareAccelerator::for_kind)
            .collect()
    }

    fn profile(encoder: VideoEncoder, enabled: bool) -> EncodingProfile {
        let mut p = EncodingProfile::new("hw", Container::Matroska);
        p.video_outputs
            .push(VideoOutputConfig::new("out", VideoCodec::new(encoder)));
        p.options.hardware_acceleration = enabled;
        p
    }

    #[test]
    fn disabled_profile_gets_nothing() {
        assert!(select(&profile(VideoEncoder::H264Nvenc, false), &available()).is_none());
        assert!(select(&profile(VideoEncoder::H264Nvenc, true), &[]).is_none());
    }

    #[test]
    fn encoder_accelerator_wins_over_order() {
        let hw = available();
        let chosen = select(&profile(VideoEncoder::H264Nvenc, true), &hw).unwrap();
        assert_eq!(chosen.kind, "cuda");
        assert_eq!(chosen.input_args, vec!["-hwaccel", "cuda"]);
    }

    #[test]
    fn preferred_wins_over_encoder() {
        let hw = available();
        let mut p = profile(VideoEncoder::H264Nvenc, true);
        p.options.preferred_accelerator = Some("VAAPI".into());
        assert_eq!(select(&p, &hw).unwrap().kind, "vaapi");
    }

    #[test]
    fn software_encoder_falls_back_to_first() {
        let hw = available();
        assert_eq!(select(&profile(VideoEncoder::X264, true), &hw).unwrap().kind, "vaapi");
    }
}
