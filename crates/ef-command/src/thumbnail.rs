//! Periodic thumbnail extraction commands.

use std::path::Path;

use ef_codec::{ThumbnailConfig, ThumbnailFormat};
use ef_core::{Error, Result};

use crate::builder::CommandBuilder;

/// Name pattern of extracted frames inside the output directory.
pub fn thumbnail_pattern(config: &ThumbnailConfig) -> String {
    format!("thumb_%05d.{}", config.format.extension())
}

/// Map 0..=100 (higher is better) onto the mjpeg `-q:v` scale 31..=2.
pub fn jpeg_qscale(quality: i32) -> i32 {
    let q = quality.clamp(0, 100) as f64;
    31 - (q * 29.0 / 100.0).round() as i32
}

/// Synthesise the command extracting one frame every `interval_secs`,
/// scaled to `width` with the height following the source aspect.
pub fn thumbnail_command(input: &Path, output_dir: &Path, config: &ThumbnailConfig) -> Result<String> {
    if config.interval_secs.is_nan() || config.interval_secs <= 0.0 || config.width <= 0 {
        return Err(Error::Validation(format!(
            "invalid thumbnail config: interval {} width {}",
            config.interval_secs, config.width
        )));
    }

    let mut builder = CommandBuilder::new();
    builder
        .global_option("-y")
        .input(input.to_string_lossy())
        .filter(format!("fps=1/{}", config.interval_secs))
        .filter(format!("scale={}:-2", config.width));

    match config.format {
        ThumbnailFormat::Jpeg => {
            builder.output_args(["-q:v".to_string(), jpeg_qscale(config.quality).to_string()]);
        }
        ThumbnailFormat::Webp => {
            builder.output_args(["-quality".to_string(), config.quality.to_string()]);
        }
        ThumbnailFormat::Png => {}
    }

    builder
        .output_args(["-f", "image2"])
        .output(output_dir.join(thumbnail_pattern(config)).to_string_lossy())
        .build()
}
