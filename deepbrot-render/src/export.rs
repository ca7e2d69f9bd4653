//! PNG export with embedded metadata (tEXt chunks).

use std::io::BufWriter;
use std::path::Path;

use tracing::debug;

use deepbrot_core::iteration::INSIDE_SENTINEL;
use deepbrot_core::{IterationParams, Viewport};

use crate::error::RenderError;
use crate::raster::LevelRaster;

/// Metadata to embed in an exported PNG as tEXt chunks.
#[derive(Debug, Clone)]
pub struct ExportMetadata {
    pub center_re: String,
    pub center_im: String,
    pub zoom: String,
    pub precision: u32,
    pub strategy: String,
    pub max_iterations: u32,
    pub smooth: bool,
    pub width: u32,
    pub height: u32,
}

impl ExportMetadata {
    pub fn new(viewport: &Viewport, params: &IterationParams) -> Self {
        Self {
            center_re: viewport.center().re.to_decimal_string(),
            center_im: viewport.center().im.to_decimal_string(),
            zoom: viewport.zoom_label(),
            precision: viewport.precision(),
            strategy: viewport.strategy().label().to_string(),
            max_iterations: params.max_iterations,
            smooth: params.smooth,
            width: viewport.width(),
            height: viewport.height(),
        }
    }
}

/// Grey level of one pixel: black inside, a repeating ramp outside.
///
/// Stand-in for a real palette, which lives outside this crate.
pub fn grey_level(value: i32, smooth: u8) -> u8 {
    if value == INSIDE_SENTINEL {
        return 0;
    }
    let ramp = (value.max(0) as u32 * 256 + smooth as u32) / 32;
    48 + (ramp % 208) as u8
}

/// Expand `raster` to `width × height` grey pixels, repeating each level
/// pixel over the canvas pixels it covers.
pub fn grey_canvas(raster: &LevelRaster, width: u32, height: u32) -> Vec<u8> {
    let ps = raster.pixel_size.max(1);
    let mut pixels = Vec::with_capacity(width as usize * height as usize);
    for y in 0..height {
        let ry = (y / ps).min(raster.height.saturating_sub(1));
        for x in 0..width {
            let rx = (x / ps).min(raster.width.saturating_sub(1));
            pixels.push(grey_level(raster.value_at(rx, ry), raster.smooth_at(rx, ry)));
        }
    }
    pixels
}

/// Write `raster` as an 8-bit greyscale PNG of the canvas size recorded in
/// `metadata`.
///
/// Uses the `png` crate directly to inject custom tEXt chunks readable by
/// exiftool and most image viewers.
pub fn export_png(
    raster: &LevelRaster,
    path: &Path,
    metadata: &ExportMetadata,
) -> Result<(), RenderError> {
    let (width, height) = (metadata.width, metadata.height);
    if width == 0 || height == 0 || raster.width == 0 || raster.height == 0 {
        return Err(RenderError::InvalidDimensions { width, height });
    }
    let pixels = grey_canvas(raster, width, height);

    let file = std::fs::File::create(path)?;
    let writer = BufWriter::new(file);

    let mut encoder = png::Encoder::new(writer, width, height);
    encoder.set_color(png::ColorType::Grayscale);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_compression(png::Compression::Default);

    encoder.add_text_chunk("Software".to_string(), "DeepBrot".to_string())?;
    encoder.add_text_chunk("Description".to_string(), build_description(metadata))?;
    for (key, value) in build_metadata_pairs(metadata) {
        encoder.add_text_chunk(key, value)?;
    }

    let mut png_writer = encoder.write_header()?;
    png_writer.write_image_data(&pixels)?;

    debug!("Exported PNG {}x{} to {}", width, height, path.display());
    Ok(())
}

fn build_description(meta: &ExportMetadata) -> String {
    format!(
        "Mandelbrot - Center: {} {}i, Zoom: {}, Iterations: {}",
        meta.center_re, meta.center_im, meta.zoom, meta.max_iterations,
    )
}

fn build_metadata_pairs(meta: &ExportMetadata) -> Vec<(String, String)> {
    vec![
        ("DeepBrot.CenterRe".into(), meta.center_re.clone()),
        ("DeepBrot.CenterIm".into(), meta.center_im.clone()),
        ("DeepBrot.Zoom".into(), meta.zoom.clone()),
        ("DeepBrot.Precision".into(), meta.precision.to_string()),
        ("DeepBrot.Strategy".into(), meta.strategy.clone()),
        ("DeepBrot.MaxIterations".into(), meta.max_iterations.to_string()),
        ("DeepBrot.Smooth".into(), meta.smooth.to_string()),
        ("DeepBrot.Resolution".into(), format!("{}x{}", meta.width, meta.height)),
    ]
}
