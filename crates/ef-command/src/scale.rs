//! Scaling policy and scale filter synthesis.
//!
//! Policy: an output never exceeds the source dimensions. The target box is
//! clamped to the source, and scaling only happens when the clamped box
//! shrinks the picture to 95% or less of the source; otherwise the source
//! resolution passes through untouched. With `avoid_upscaling`, an output
//! whose target box is larger than the source in both dimensions is
//! skipped instead.

use ef_codec::VideoOutputConfig;
use ef_core::ScaleMode;

/// Ratio at or below which a clamped target is worth scaling to.
pub const DOWNSCALE_THRESHOLD: f64 = 0.95;

/// Filter that rounds odd dimensions up to the next even number.
pub const EVEN_PAD: &str = "pad=ceil(iw/2)*2:ceil(ih/2)*2";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleDecision {
    /// Drop the output.
    Skip,
    /// Keep the source resolution.
    PassThrough,
    /// Scale into this box using the output's mode.
    Scale { width: u32, height: u32 },
}

/// Whether fitting `target` into `source` would enlarge the picture.
pub fn exceeds_source(target: (u32, u32), source: (u32, u32)) -> bool {
    target.0 > source.0 && target.1 > source.1
}

pub fn decide(output: &VideoOutputConfig, source: Option<(u32, u32)>) -> ScaleDecision {
    let target = match (output.width, output.height, source) {
        (Some(w), Some(h), _) => (w, h),
        // One dimension given: derive the other from the source aspect.
        (Some(w), None, Some((sw, sh))) if sw > 0 => (w, scaled_even(sh, w, sw)),
        (None, Some(h), Some((sw, sh))) if sh > 0 => (scaled_even(sw, h, sh), h),
        (None, None, _) => return ScaleDecision::PassThrough,
        (Some(w), None, _) => (w, 0),
        (None, Some(h), _) => (0, h),
    };

    let Some((sw, sh)) = source.filter(|(w, h)| *w > 0 && *h > 0) else {
        // Unknown source: nothing to clamp against.
        return if target.0 > 0 && target.1 > 0 {
            ScaleDecision::Scale {
                width: target.0,
                height: target.1,
            }
        } else {
            ScaleDecision::PassThrough
        };
    };

    if output.avoid_upscaling && exceeds_source(target, (sw, sh)) {
        return ScaleDecision::Skip;
    }

    let width = target.0.min(sw);
    let height = target.1.min(sh);
    let ratio = (width as f64 / sw as f64).min(height as f64 / sh as f64);
    if ratio > DOWNSCALE_THRESHOLD {
        ScaleDecision::PassThrough
    } else {
        ScaleDecision::Scale { width, height }
    }
}

/// `value * num / den`, rounded to an even number.
fn scaled_even(value: u32, num: u32, den: u32) -> u32 {
    let exact = value as f64 * num as f64 / den as f64;
    ((exact / 2.0).round() as u32) * 2
}

/// Filters for `decision` in `mode`. Every non-skipped result ends with
/// [`EVEN_PAD`].
pub fn scale_filters(mode: ScaleMode, decision: ScaleDecision) -> Vec<String> {
    let mut filters = Vec::new();
    match decision {
        ScaleDecision::Skip => return filters,
        ScaleDecision::PassThrough => {}
        ScaleDecision::Scale { width: w, height: h } => match mode {
            ScaleMode::Fit => {
                filters.push(format!("scale={w}:{h}:force_original_aspect_ratio=decrease"));
                filters.push(format!("pad={w}:{h}:(ow-iw)/2:(oh-ih)/2"));
            }
            ScaleMode::Fill => {
                filters.push(format!("scale={w}:{h}:force_original_aspect_ratio=increase"));
                filters.push(format!("crop={w}:{h}"));
            }
            ScaleMode::Stretch => filters.push(format!("scale={w}:{h}")),
            ScaleMode::DownscaleOnly => filters.push(format!(
                "scale='min({w},iw)':'min({h},ih)':force_original_aspect_ratio=decrease"
            )),
        },
    }
    filters.push(EVEN_PAD.to_string());
    filters
}

#[cfg(test)]
mod tests {
    use super::*;
    use ef_codec::{VideoCodec, VideoEncoder};

    fn output(w: u32, h: u32) -> VideoOutputConfig {
        VideoOutputConfig::new("t", VideoCodec::new(VideoEncoder::X264)).with_size(w, h)
    }

    #[test]
    fn downscales_when_well_below_source() {
        assert_eq!(
            decide(&output(1280, 720), Some((1920, 1080))),
            ScaleDecision::Scale {
                width: 1280,
                height: 720
            }
        );
    }

    #[test]
    fn passes_through_within_five_percent() {
        // 1840/1920 = 0.958
        assert_eq!(
            decide(&output(1840, 1036), Some((1920, 1080))),
            ScaleDecision::PassThrough
        );
        assert_eq!(
            decide(&output(1920, 1080), Some((1920, 1080))),
            ScaleDecision::PassThrough
        );
    }

    #[test]
    fn never_exceeds_source() {
        // Wider target, narrower source: clamp to the source box.
        match decide(&output(3840, 2160), Some((1920, 800))) {
            ScaleDecision::PassThrough => {}
            other => panic!("expected pass-through, got {other:?}"),
        }
        match decide(&output(1280, 2000), Some((1920, 1080))) {
            ScaleDecision::Scale { width, height } => {
                assert_eq!((width, height), (1280, 1080));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn avoid_upscaling_skips() {
        let out = output(1920, 1080).without_upscaling();
        assert_eq!(decide(&out, Some((1280, 720))), ScaleDecision::Skip);
        // Equal width: fitting does not enlarge, so keep it.
        assert_ne!(decide(&out, Some((1920, 800))), ScaleDecision::Skip);
    }

    #[test]
    fn no_target_passes_through() {
        let mut out = output(1, 1);
        out.width = None;
        out.height = None;
        assert_eq!(decide(&out, Some((1920, 1080))), ScaleDecision::PassThrough);
    }

    #[test]
    fn single_dimension_follows_source_aspect() {
        let mut out = output(0, 720);
        out.width = None;
        assert_eq!(
            decide(&out, Some((1920, 1080))),
            ScaleDecision::Scale {
                width: 1280,
                height: 720
            }
        );
    }

    #[test]
    fn filters_per_mode() {
        let d = ScaleDecision::Scale {
            width: 1280,
            height: 720,
        };
        assert_eq!(
            scale_filters(ScaleMode::Fit, d),
            vec![
                "scale=1280:720:force_original_aspect_ratio=decrease",
                "pad=1280:720:(ow-iw)/2:(oh-ih)/2",
                EVEN_PAD
            ]
        );
        assert_eq!(
            scale_filters(ScaleMode::Fill, d),
            vec![
                "scale=1280:720:force_original_aspect_ratio=increase",
                "crop=1280:720",
                EVEN_PAD
            ]
        );
        assert_eq!(scale_filters(ScaleMode::Stretch, d), vec!["scale=1280:720", EVEN_PAD]);
        assert_eq!(
            scale_filters(ScaleMode::DownscaleOnly, d),
            vec![
                "scale='min(1280,iw)':'min(720,ih)':force_original_aspect_ratio=decrease",
                EVEN_PAD
            ]
        );
        assert_eq!(scale_filters(ScaleMode::Fit, ScaleDecision::PassThrough), vec![EVEN_PAD]);
        assert!(scale_filters(ScaleMode::Fit, ScaleDecision::Skip).is_empty());
    }

    #[test]
    fn downscale_only_never_wider_than_source() {
        for (sw, sh) in [(640, 360), (1280, 720), (1920, 1080), (3840, 2160), (720, 576)] {
            for (tw, th) in [(3840, 2160), (1920, 1080), (1280, 720), (854, 480)] {
                let out = output(tw, th).with_scale_mode(ScaleMode::DownscaleOnly);
                if let ScaleDecision::Scale { width, height } = decide(&out, Some((sw, sh))) {
                    assert!(width <= sw && height <= sh, "{tw}x{th} on {sw}x{sh}");
                }
            }
        }
    }
}
