use std::fs;
use std::time::Duration;

use anyhow::{Context, Result};
use image::{GrayImage, ImageFormat};
use renderer::{program, BeamUniforms, PixelSize};

use crate::cli::StillArgs;

/// Renders one frame of the animation on the CPU and writes it as a PNG.
pub fn export(args: &StillArgs) -> Result<()> {
    let (width, height) = args.size;
    let mut uniforms = BeamUniforms::new(PixelSize::new(width, height));
    let timestamp = Duration::try_from_secs_f64(args.time)
        .with_context(|| format!("still time {} is out of range", args.time))?;
    uniforms.set_timestamp(timestamp);

    let pixels = program::render_luminance(&uniforms);
    let image = GrayImage::from_raw(width, height, pixels)
        .context("rendered frame does not match the requested size")?;

    if let Some(parent) = args.out.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    image
        .save_with_format(&args.out, ImageFormat::Png)
        .with_context(|| format!("failed to write still frame to {}", args.out.display()))?;

    tracing::info!(
        path = %args.out.display(),
        width,
        height,
        time = uniforms.time,
        "still frame written"
    );
    Ok(())
}
