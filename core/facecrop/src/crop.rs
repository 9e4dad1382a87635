use image::RgbImage;

use crate::error::FaceCropError;
use crate::face_detector::BoundingBox;

/// Padding, in pixels, added on every side of the detected face.
pub const PADDING: u32 = 50;

/// Grow `face` by `padding` on every side, clamped to a `width` × `height` image.
pub fn expand_box(face: &BoundingBox, padding: u32, width: u32, height: u32) -> BoundingBox {
    BoundingBox {
        top: face.top.saturating_sub(padding),
        right: face.right.saturating_add(padding).min(width),
        bottom: face.bottom.saturating_add(padding).min(height),
        left: face.left.saturating_sub(padding),
    }
}

/// Copy the pixels inside `region` out of `image`.
///
/// The result is exactly `region.width()` × `region.height()`.
pub fn crop_region(image: &RgbImage, region: &BoundingBox) -> Result<RgbImage, FaceCropError> {
    let region = region.clamp_to(image.width(), image.height());
    if region.is_empty() {
        return Err(FaceCropError::EmptyCrop(region));
    }
    Ok(image::imageops::crop_imm(
        image,
        region.left,
        region.top,
        region.width(),
        region.height(),
    )
    .to_image())
}
