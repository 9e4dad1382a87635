//! Photometric normalization of a cropped face.
//!
//! Three passes, each feeding the next: a median blur, histogram equalization
//! of the luma plane, and an edge-preserving bilateral filter.

use image::{GrayImage, Luma, Rgb, RgbImage};

/// Median blur kernel edge. A 1×1 kernel leaves the image unchanged.
pub const MEDIAN_KERNEL: u32 = 1;

/// Bilateral filter neighbourhood diameter, in pixels.
pub const BILATERAL_DIAMETER: u32 = 9;

/// Bilateral filter colour sigma.
pub const BILATERAL_SIGMA_COLOR: f32 = 75.0;

/// Bilateral filter spatial sigma.
pub const BILATERAL_SIGMA_SPACE: f32 = 75.0;

/// Run the full normalization chain with the default parameters.
pub fn normalize_face(face: &RgbImage) -> RgbImage {
    let blurred = median_blur(face, MEDIAN_KERNEL);
    let equalized = equalize_luma(&blurred);
    bilateral_filter(
        &equalized,
        BILATERAL_DIAMETER,
        BILATERAL_SIGMA_COLOR,
        BILATERAL_SIGMA_SPACE,
    )
}

/// Median blur over a `kernel` × `kernel` window.
pub fn median_blur(image: &RgbImage, kernel: u32) -> RgbImage {
    let radius = kernel / 2;
    imageproc::filter::median_filter(image, radius, radius)
}

/// Split an RGB image into Y, U and V planes (BT.601, chroma offset 128).
pub fn rgb_to_yuv(image: &RgbImage) -> (GrayImage, GrayImage, GrayImage) {
    let (width, height) = image.dimensions();
    let mut y_plane = GrayImage::new(width, height);
    let mut u_plane = GrayImage::new(width, height);
    let mut v_plane = GrayImage::new(width, height);

    for (x, y, pixel) in image.enumerate_pixels() {
        let [r, g, b] = pixel.0.map(f32::from);
        let luma = 0.299 * r + 0.587 * g + 0.114 * b;
        let u = (b - luma) * 0.492 + 128.0;
        let v = (r - luma) * 0.877 + 128.0;
        y_plane.put_pixel(x, y, Luma([to_u8(luma)]));
        u_plane.put_pixel(x, y, Luma([to_u8(u)]));
        v_plane.put_pixel(x, y, Luma([to_u8(v)]));
    }

    (y_plane, u_plane, v_plane)
}

/// Recombine Y, U and V planes into an RGB image.
pub fn yuv_to_rgb(y_plane: &GrayImage, u_plane: &GrayImage, v_plane: &GrayImage) -> RgbImage {
    RgbImage::from_fn(y_plane.width(), y_plane.height(), |x, y| {
        let luma = f32::from(y_plane.get_pixel(x, y).0[0]);
        let u = f32::from(u_plane.get_pixel(x, y).0[0]) - 128.0;
        let v = f32::from(v_plane.get_pixel(x, y).0[0]) - 128.0;
        Rgb([
            to_u8(luma + 1.140 * v),
            to_u8(luma - 0.395 * u - 0.581 * v),
            to_u8(luma + 2.032 * u),
        ])
    })
}

/// Equalize the brightness histogram while leaving chroma alone.
pub fn equalize_luma(image: &RgbImage) -> RgbImage {
    let (y_plane, u_plane, v_plane) = rgb_to_yuv(image);
    let y_plane = equalize_histogram(&y_plane);
    yuv_to_rgb(&y_plane, &u_plane, &v_plane)
}

/// Histogram equalization of a single plane.
///
/// The darkest occupied level maps to 0 and the brightest to 255, with
/// `lut[i] = round((cdf[i] - cdf_min) * 255 / (N - cdf_min))` in between.
/// A plane holding a single level is returned unchanged.
pub fn equalize_histogram(plane: &GrayImage) -> GrayImage {
    let cdf = imageproc::stats::cumulative_histogram(plane).channels[0];
    let total = cdf[255];
    let Some(darkest) = cdf.iter().position(|&count| count > 0) else {
        return plane.clone();
    };
    let cdf_min = cdf[darkest];
    if cdf_min == total {
        return plane.clone();
    }

    let scale = 255.0 / (total - cdf_min) as f32;
    let mut lut = [0u8; 256];
    for (level, &count) in cdf.iter().enumerate().skip(darkest) {
        lut[level] = to_u8((count - cdf_min) as f32 * scale);
    }

    let mut out = plane.clone();
    for pixel in out.pixels_mut() {
        pixel.0[0] = lut[pixel.0[0] as usize];
    }
    out
}

/// Edge-preserving smoothing.
///
/// Each output pixel is the average of the neighbours within a circle of
/// diameter `diameter`, weighted by a Gaussian of their distance (`sigma_space`)
/// and a Gaussian of the L1 colour difference to the centre (`sigma_color`).
/// Neighbours outside the image are skipped.
pub fn bilateral_filter(
    image: &RgbImage,
    diameter: u32,
    sigma_color: f32,
    sigma_space: f32,
) -> RgbImage {
    let (width, height) = image.dimensions();
    let radius = (diameter / 2) as i64;

    let space_coeff = -0.5 / (sigma_space * sigma_space);
    let mut window = Vec::new();
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let r2 = (dx * dx + dy * dy) as f32;
            if r2 > (radius * radius) as f32 {
                continue;
            }
            window.push((dx, dy, (r2 * space_coeff).exp()));
        }
    }

    // L1 distance over three channels tops out at 3 * 255.
    let color_coeff = -0.5 / (sigma_color * sigma_color);
    let color_weight: Vec<f32> = (0..=3 * 255)
        .map(|d| ((d * d) as f32 * color_coeff).exp())
        .collect();

    let mut output = RgbImage::new(width, height);
    for (x, y, center) in image.enumerate_pixels() {
        let mut sum = [0.0f32; 3];
        let mut weight_sum = 0.0f32;

        for &(dx, dy, space_weight) in &window {
            let nx = x as i64 + dx;
            let ny = y as i64 + dy;
            if nx < 0 || ny < 0 || nx >= width as i64 || ny >= height as i64 {
                continue;
            }
            let neighbor = image.get_pixel(nx as u32, ny as u32);
            let diff: usize = (0..3)
                .map(|c| (neighbor.0[c] as i32 - center.0[c] as i32).unsigned_abs() as usize)
                .sum();
            let weight = space_weight * color_weight[diff];
            for c in 0..3 {
                sum[c] += neighbor.0[c] as f32 * weight;
            }
            weight_sum += weight;
        }

        // The centre always contributes with weight 1.
        output.put_pixel(x, y, Rgb(sum.map(|s| to_u8(s / weight_sum))));
    }

    output
}

fn to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
