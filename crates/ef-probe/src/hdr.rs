//! Best-effort HDR classification from stream colour metadata.
//!
//! This is a heuristic over whatever tags the analyzer reports, not a
//! bitstream inspection. Checks run in this order and the first match wins:
//!
//! 1. A Dolby Vision configuration record in the side data → `DolbyVision`.
//! 2. Transfer `smpte2084` (PQ) → `Hdr10`.
//! 3. Transfer `arib-std-b67` → `Hlg`.
//! 4. Colour space or primaries `bt2020nc`, `bt2020c` or `bt2020`, unless
//!    the pixel format is known to be 8-bit → `Hdr10`.
//! 5. A 10/12-bit pixel format (`p10`, `p12` or `p010` substring) with no
//!    colour primaries reported at all → `Hdr10`.
//!
//! Anything else is `Sdr`. Rule 5 catches untagged HDR rips at the cost of
//! misclassifying untagged 10-bit SDR encodes, which then get tone-mapped.

use ef_core::HdrFormat;

/// Colour-related tags of a video stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct ColorTags<'a> {
    pub pixel_format: Option<&'a str>,
    pub color_transfer: Option<&'a str>,
    pub color_primaries: Option<&'a str>,
    pub color_space: Option<&'a str>,
    pub has_dovi_record: bool,
}

const BT2020_TAGS: [&str; 3] = ["bt2020nc", "bt2020c", "bt2020"];
const HIGH_DEPTH_MARKERS: [&str; 3] = ["p10", "p12", "p010"];

pub fn classify_hdr(tags: &ColorTags<'_>) -> HdrFormat {
    if tags.has_dovi_record {
        return HdrFormat::DolbyVision;
    }

    match tags.color_transfer {
        Some("smpte2084") => return HdrFormat::Hdr10,
        Some("arib-std-b67") => return HdrFormat::Hlg,
        _ => {}
    }

    let high_bit_depth = tags
        .pixel_format
        .map(|p| HIGH_DEPTH_MARKERS.iter().any(|m| p.contains(m)));

    // An unreported pixel format does not rule out HDR.
    let is_bt2020 = |tag: Option<&str>| tag.is_some_and(|t| BT2020_TAGS.contains(&t));
    let wide_gamut = is_bt2020(tags.color_space) || is_bt2020(tags.color_primaries);
    if wide_gamut && high_bit_depth != Some(false) {
        return HdrFormat::Hdr10;
    }

    let high_bit_depth = high_bit_depth.unwrap_or(false);
    let untagged = tags
        .color_primaries
        .map_or(true, |p| p.is_empty() || p == "unknown");
    if high_bit_depth && untagged {
        return HdrFormat::Hdr10;
    }

    HdrFormat::Sdr
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_sdr() {
        let tags = ColorTags {
            pixel_format: Some("yuv420p"),
            color_transfer: Some("bt709"),
            color_primaries: Some("bt709"),
            color_space: Some("bt709"),
            has_dovi_record: false,
        };
        assert_eq!(classify_hdr(&tags), HdrFormat::Sdr);
        assert_eq!(classify_hdr(&ColorTags::default()), HdrFormat::Sdr);
    }

    #[test]
    fn dolby_vision_wins() {
        let tags = ColorTags {
            color_transfer: Some("smpte2084"),
            has_dovi_record: true,
            ..Default::default()
        };
        assert_eq!(classify_hdr(&tags), HdrFormat::DolbyVision);
    }

    #[test]
    fn transfer_characteristics() {
        let pq = ColorTags {
            color_transfer: Some("smpte2084"),
            ..Default::default()
        };
        assert_eq!(classify_hdr(&pq), HdrFormat::Hdr10);

        let hlg = ColorTags {
            color_transfer: Some("arib-std-b67"),
            color_primaries: Some("bt2020"),
            ..Default::default()
        };
        assert_eq!(classify_hdr(&hlg), HdrFormat::Hlg);
    }

    #[test]
    fn bt2020_colour_space() {
        let tags = ColorTags {
            color_space: Some("bt2020nc"),
            color_transfer: Some("bt709"),
            ..Default::default()
        };
        assert_eq!(classify_hdr(&tags), HdrFormat::Hdr10);
    }

    #[test]
    fn bt2020_needs_more_than_eight_bits() {
        let eight_bit = ColorTags {
            pixel_format: Some("yuv420p"),
            color_primaries: Some("bt2020"),
            color_space: Some("bt2020nc"),
            ..Default::default()
        };
        assert_eq!(classify_hdr(&eight_bit), HdrFormat::Sdr);

        let ten_bit = ColorTags {
            pixel_format: Some("yuv420p10le"),
            ..eight_bit
        };
        assert_eq!(classify_hdr(&ten_bit), HdrFormat::Hdr10);

        let hardware = ColorTags {
            pixel_format: Some("p010le"),
            ..eight_bit
        };
        assert_eq!(classify_hdr(&hardware), HdrFormat::Hdr10);
    }

    #[test]
    fn untagged_ten_bit() {
        let untagged = ColorTags {
            pixel_format: Some("yuv420p10le"),
            ..Default::default()
        };
        assert_eq!(classify_hdr(&untagged), HdrFormat::Hdr10);

        let tagged_sdr = ColorTags {
            pixel_format: Some("yuv420p10le"),
            color_primaries: Some("bt709"),
            ..Default::default()
        };
        assert_eq!(classify_hdr(&tagged_sdr), HdrFormat::Sdr);
    }
}
