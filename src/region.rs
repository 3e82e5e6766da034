use image::{DynamicImage, GenericImageView};

use crate::config::RegionBounds;
use crate::error::RegionError;

/// Pixel rows `[top, bottom)` covered by `bounds` on a document `height` px tall.
///
/// Both edges are rounded to the nearest row and clamped to the image.
pub fn row_span(bounds: RegionBounds, height: u32) -> (u32, u32) {
    let edge = |fraction: f64| (fraction * height as f64).round().clamp(0.0, height as f64) as u32;
    (edge(bounds.start), edge(bounds.end))
}

/// Crop the full-width band described by `bounds`.
pub fn extract(document: &DynamicImage, bounds: RegionBounds) -> Result<DynamicImage, RegionError> {
    let (width, height) = document.dimensions();
    let (top, bottom) = row_span(bounds, height);
    if bottom <= top || width == 0 {
        return Err(RegionError::Empty {
            start: bounds.start,
            end: bounds.end,
            width,
            height,
        });
    }
    Ok(document.crop_imm(0, top, width, bottom - top))
}
