use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, RgbImage, RgbaImage};

use crate::error::FaceCropError;

/// Longest allowed image edge before face location.
pub const MAX_DIMENSION: u32 = 1600;

/// Decode input bytes into a `DynamicImage`.
pub(crate) fn decode_image(input: &[u8]) -> Result<DynamicImage, FaceCropError> {
    let image =
        image::load_from_memory(input).map_err(|e| FaceCropError::DecodeError(e.to_string()))?;
    if image.width() == 0 || image.height() == 0 {
        return Err(FaceCropError::ZeroDimensions);
    }
    Ok(image)
}

/// Convert to 8-bit RGB, compositing any alpha channel onto white.
pub(crate) fn flatten_alpha(image: &DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }

    let rgba: RgbaImage = image.to_rgba8();
    let (width, height) = (rgba.width(), rgba.height());
    let mut rgb = RgbImage::new(width, height);

    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = a as f32 / 255.0;
        let inv_alpha = 1.0 - alpha;
        let out_r = (r as f32 * alpha + 255.0 * inv_alpha).round() as u8;
        let out_g = (g as f32 * alpha + 255.0 * inv_alpha).round() as u8;
        let out_b = (b as f32 * alpha + 255.0 * inv_alpha).round() as u8;
        rgb.put_pixel(x, y, image::Rgb([out_r, out_g, out_b]));
    }

    rgb
}

/// Read the EXIF `Orientation` tag from an encoded image.
///
/// Returns `Ok(None)` when the container carries no EXIF block or the block
/// has no orientation field.
pub fn read_orientation(input: &[u8]) -> Result<Option<u32>, FaceCropError> {
    let mut cursor = Cursor::new(input);
    match exif::Reader::new().read_from_container(&mut cursor) {
        Ok(exif) => Ok(exif
            .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
            .and_then(|field| field.value.get_uint(0))),
        Err(exif::Error::NotFound(_)) => Ok(None),
        Err(e) => Err(FaceCropError::MetadataError(e.to_string())),
    }
}

/// Rotate an image upright according to an EXIF orientation value.
///
/// Only the pure rotations are honoured: 3 turns the image 180°, 6 turns it
/// 90° clockwise and 8 turns it 90° counter-clockwise. Every other value
/// (including the mirrored ones) leaves the image as decoded.
pub fn apply_orientation(image: RgbImage, orientation: u32) -> RgbImage {
    match orientation {
        3 => image::imageops::rotate180(&image),
        6 => image::imageops::rotate90(&image),
        8 => image::imageops::rotate270(&image),
        _ => image,
    }
}

/// Dimensions after shrinking so the longer side equals `max_dimension`, or
/// `None` when the image already fits.
///
/// Scaled sides are truncated, never below one pixel.
pub fn scaled_dimensions(width: u32, height: u32, max_dimension: u32) -> Option<(u32, u32)> {
    let longest = width.max(height);
    if longest <= max_dimension {
        return None;
    }
    // Integer math keeps the longer side exactly at max_dimension.
    let scale = |side: u32| ((side as u64 * max_dimension as u64 / longest as u64) as u32).max(1);
    Some((scale(width), scale(height)))
}

/// Shrink the image so the longer side is at most `max_dimension`,
/// preserving the aspect ratio.
pub fn resize_to_max_dimension(image: RgbImage, max_dimension: u32) -> RgbImage {
    match scaled_dimensions(image.width(), image.height(), max_dimension) {
        Some((new_w, new_h)) => image::imageops::resize(&image, new_w, new_h, FilterType::Triangle),
        None => image,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_test_rgb(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([
                (x * 255 / width.max(1)) as u8,
                (y * 255 / height.max(1)) as u8,
                128,
            ])
        })
    }

    #[test]
    fn flatten_alpha_composites_over_white() {
        let mut rgba = RgbaImage::new(1, 1);
        rgba.put_pixel(0, 0, image::Rgba([255, 0, 0, 0]));
        let rgb = flatten_alpha(&DynamicImage::ImageRgba8(rgba));
        assert_eq!(rgb.get_pixel(0, 0), &image::Rgb([255, 255, 255]));
    }

    #[test]
    fn flatten_alpha_preserves_opaque() {
        let mut rgba = RgbaImage::new(1, 1);
        rgba.put_pixel(0, 0, image::Rgba([100, 150, 200, 255]));
        let rgb = flatten_alpha(&DynamicImage::ImageRgba8(rgba));
        assert_eq!(rgb.get_pixel(0, 0), &image::Rgb([100, 150, 200]));
    }

    #[test]
    fn flatten_promotes_grayscale() {
        let gray = image::GrayImage::from_pixel(2, 2, image::Luma([90]));
        let rgb = flatten_alpha(&DynamicImage::ImageLuma8(gray));
        assert_eq!(rgb.get_pixel(1, 1), &image::Rgb([90, 90, 90]));
    }

    #[test]
    fn orientation_3_rotates_180() {
        let img = make_test_rgb(4, 2);
        let rotated = apply_orientation(img.clone(), 3);
        assert_eq!(rotated.dimensions(), (4, 2));
        assert_eq!(rotated.get_pixel(0, 0), img.get_pixel(3, 1));
    }

    #[test]
    fn orientation_6_turns_clockwise() {
        let img = make_test_rgb(4, 2);
        let rotated = apply_orientation(img.clone(), 6);
        assert_eq!(rotated.dimensions(), (2, 4));
        // clockwise: the bottom-left source pixel lands top-left
        assert_eq!(rotated.get_pixel(0, 0), img.get_pixel(0, 1));
    }

    #[test]
    fn orientation_8_turns_counter_clockwise() {
        let img = make_test_rgb(4, 2);
        let rotated = apply_orientation(img.clone(), 8);
        assert_eq!(rotated.dimensions(), (2, 4));
        // counter-clockwise: the top-right source pixel lands top-left
        assert_eq!(rotated.get_pixel(0, 0), img.get_pixel(3, 0));
    }

    #[test]
    fn other_orientations_are_untouched() {
        let img = make_test_rgb(4, 2);
        for orientation in [0, 1, 2, 4, 5, 7, 9, 42] {
            assert_eq!(apply_orientation(img.clone(), orientation), img);
        }
    }

    #[test]
    fn png_without_exif_has_no_orientation() {
        use image::ImageEncoder;
        let img = make_test_rgb(8, 8);
        let mut buffer = Vec::new();
        image::codecs::png::PngEncoder::new(&mut buffer)
            .write_image(img.as_raw(), 8, 8, image::ExtendedColorType::Rgb8)
            .unwrap();
        assert_eq!(read_orientation(&buffer).unwrap(), None);
    }

    #[test]
    fn small_images_are_not_resized() {
        assert_eq!(scaled_dimensions(1600, 1200, MAX_DIMENSION), None);
        let img = make_test_rgb(300, 200);
        assert_eq!(resize_to_max_dimension(img, MAX_DIMENSION).dimensions(), (300, 200));
    }

    #[test]
    fn landscape_constrained_to_max_width() {
        assert_eq!(scaled_dimensions(2000, 1500, MAX_DIMENSION), Some((1600, 1200)));
    }

    #[test]
    fn portrait_constrained_to_max_height() {
        assert_eq!(scaled_dimensions(1000, 3000, MAX_DIMENSION), Some((533, 1600)));
    }

    #[test]
    fn resize_preserves_aspect_ratio() {
        for (w, h) in [(1601, 900), (4032, 3024), (2000, 2000), (1700, 17), (123, 5000)] {
            let (nw, nh) = scaled_dimensions(w, h, MAX_DIMENSION).unwrap();
            assert_eq!(nw.max(nh), MAX_DIMENSION, "{w}x{h}");
            let scale = MAX_DIMENSION as f64 / w.max(h) as f64;
            assert!((nw as f64 - w as f64 * scale).abs() <= 1.0, "{w}x{h} -> {nw}x{nh}");
            assert!((nh as f64 - h as f64 * scale).abs() <= 1.0, "{w}x{h} -> {nw}x{nh}");
        }
    }

    #[test]
    fn resize_produces_scaled_buffer() {
        let img = make_test_rgb(1800, 900);
        let resized = resize_to_max_dimension(img, MAX_DIMENSION);
        assert_eq!(resized.dimensions(), (1600, 800));
    }
}
