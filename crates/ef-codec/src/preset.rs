//! Coarse preset tiers resolved per encoder.

use ef_core::PresetTier;

use crate::video::VideoEncoder;

/// x264/x265 preset names, fastest first.
pub const X264_PRESETS: [&str; 10] = [
    "ultrafast",
    "superfast",
    "veryfast",
    "faster",
    "fast",
    "medium",
    "slow",
    "slower",
    "veryslow",
    "placebo",
];

/// Concrete settings a tier resolves to for one encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierSettings {
    pub preset: Option<&'static str>,
    pub quality: Option<u32>,
}

const fn settings(preset: Option<&'static str>, quality: u32) -> TierSettings {
    TierSettings {
        preset,
        quality: Some(quality),
    }
}

pub fn tier_settings(encoder: VideoEncoder, tier: PresetTier) -> TierSettings {
    use PresetTier::*;
    use VideoEncoder::*;

    match (encoder, tier) {
        (X264, Fast) => settings(Some("veryfast"), 23),
        (X264, Balanced) => settings(Some("medium"), 21),
        (X264, HighQuality) => settings(Some("slow"), 18),

        (X265, Fast) => settings(Some("fast"), 26),
        (X265, Balanced) => settings(Some("medium"), 24),
        (X265, HighQuality) => settings(Some("slow"), 20),

        (SvtAv1, Fast) => settings(Some("10"), 35),
        (SvtAv1, Balanced) => settings(Some("8"), 30),
        (SvtAv1, HighQuality) => settings(Some("4"), 24),

        (LibAom, Fast) => settings(Some("6"), 34),
        (LibAom, Balanced) => settings(Some("4"), 30),
        (LibAom, HighQuality) => settings(Some("2"), 24),

        (Vp9, Fast) => settings(Some("realtime"), 36),
        (Vp9, Balanced) => settings(Some("good"), 32),
        (Vp9, HighQuality) => settings(Some("best"), 28),

        (H264Nvenc | HevcNvenc | Av1Nvenc, Fast) => settings(Some("p2"), 28),
        (H264Nvenc | HevcNvenc | Av1Nvenc, Balanced) => settings(Some("p4"), 24),
        (H264Nvenc | HevcNvenc | Av1Nvenc, HighQuality) => settings(Some("p7"), 19),

        (H264Qsv | HevcQsv, Fast) => settings(Some("veryfast"), 27),
        (H264Qsv | HevcQsv, Balanced) => settings(Some("medium"), 23),
        (H264Qsv | HevcQsv, HighQuality) => settings(Some("veryslow"), 19),

        (H264Vaapi | HevcVaapi, Fast) => settings(None, 27),
        (H264Vaapi | HevcVaapi, Balanced) => settings(None, 24),
        (H264Vaapi | HevcVaapi, HighQuality) => settings(None, 20),

        // VideoToolbox quality runs the other way: higher is better.
        (H264VideoToolbox | HevcVideoToolbox, Fast) => settings(None, 55),
        (H264VideoToolbox | HevcVideoToolbox, Balanced) => settings(None, 65),
        (H264VideoToolbox | HevcVideoToolbox, HighQuality) => settings(None, 75),

        (Copy, _) => TierSettings {
            preset: None,
            quality: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Codec;
    use crate::video::VideoCodec;

    #[test]
    fn x264_tiers() {
        assert_eq!(
            tier_settings(VideoEncoder::X264, PresetTier::Fast),
            settings(Some("veryfast"), 23)
        );
        assert_eq!(
            tier_settings(VideoEncoder::X264, PresetTier::HighQuality),
            settings(Some("slow"), 18)
        );
    }

    #[test]
    fn higher_tier_means_better_quality_for_crf_encoders() {
        for encoder in [
            VideoEncoder::X264,
            VideoEncoder::X265,
            VideoEncoder::SvtAv1,
            VideoEncoder::LibAom,
            VideoEncoder::Vp9,
        ] {
            let fast = tier_settings(encoder, PresetTier::Fast).quality.unwrap();
            let hq = tier_settings(encoder, PresetTier::HighQuality).quality.unwrap();
            assert!(hq < fast, "{encoder}: {hq} !< {fast}");
        }
    }

    #[test]
    fn every_tier_validates() {
        for encoder in VideoEncoder::ALL {
            for tier in [PresetTier::Fast, PresetTier::Balanced, PresetTier::HighQuality] {
                let codec = VideoCodec::from_tier(encoder, tier);
                assert!(
                    codec.validate().is_empty(),
                    "{encoder}/{tier}: {:?}",
                    codec.validate()
                );
            }
        }
    }
}
