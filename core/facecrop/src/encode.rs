use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::{ImageEncoder, RgbImage};

use crate::error::FaceCropError;

/// JPEG quality used for both saved crops.
pub const JPEG_QUALITY: u8 = 75;

/// Encode an RGB image as JPEG at `quality` (1-100).
pub(crate) fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, FaceCropError> {
    let mut buffer = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
    encoder
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(|e| FaceCropError::EncodeError(e.to_string()))?;
    Ok(buffer)
}

/// Encode `image` as JPEG and write it to `path`, replacing any existing file.
pub(crate) fn save_jpeg(image: &RgbImage, path: &Path, quality: u8) -> Result<(), FaceCropError> {
    let data = encode_jpeg(image, quality)?;
    std::fs::write(path, data).map_err(|e| FaceCropError::WriteError {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}
