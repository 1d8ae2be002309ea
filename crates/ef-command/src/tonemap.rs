//! HDR to SDR tone-mapping.

use ef_probe::StreamAnalysis;

/// Pixel format the chain ends in when the codec does not name one.
pub const DEFAULT_SDR_PIXEL_FORMAT: &str = "yuv420p";

/// The tone-mapping chain, ending in `pixel_format`.
///
/// Linearise at 100 nits, convert to float RGB, move to bt709 primaries,
/// apply hable without desaturation, then re-encode with bt709
/// transfer/matrix in TV range.
pub fn tonemap_filters(pixel_format: Option<&str>) -> Vec<String> {
    vec![
        "zscale=t=linear:npl=100".to_string(),
        "format=gbrpf32le".to_string(),
        "zscale=p=bt709".to_string(),
        "tonemap=tonemap=hable:desat=0".to_string(),
        "zscale=t=bt709:m=bt709:r=tv".to_string(),
        format!(
            "format={}",
            pixel_format.unwrap_or(DEFAULT_SDR_PIXEL_FORMAT)
        ),
    ]
}

/// Whether an output asking for tone-mapping needs it for this source.
pub fn needs_tonemap(requested: bool, analysis: Option<&StreamAnalysis>) -> bool {
    requested && analysis.is_some_and(|a| a.is_hdr)
}
