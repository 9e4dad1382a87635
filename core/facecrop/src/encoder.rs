use image::imageops::FilterType;
use image::RgbImage;

use crate::face_detector::{BoundingBox, Embedding, FaceEncoder};

/// Model-free fallback encoder: a normalized thumbnail of the face's luma plane.
///
/// The face box is shrunk to `width` × `height` (16 × 8 by default, so 128
/// components), centred on its mean and scaled to unit length. It needs no
/// model file, which makes it the default for tests and for runs without an
/// ArcFace model. It is insensitive to global brightness but not to small
/// shifts, and carries no identity features, so use `ArcFaceEncoder` (feature
/// `arcface`) when embeddings are compared across photos.
#[derive(Debug, Clone, Copy)]
pub struct PixelEncoder {
    width: u32,
    height: u32,
}

impl PixelEncoder {
    /// Create an encoder with the default 16 × 8 thumbnail.
    pub fn new() -> Self {
        Self {
            width: 16,
            height: 8,
        }
    }

    /// Set the thumbnail size. The embedding length is `width * height`.
    pub fn thumbnail_size(mut self, width: u32, height: u32) -> Self {
        self.width = width.max(1);
        self.height = height.max(1);
        self
    }

    /// Length of the embeddings this encoder produces.
    pub fn embedding_len(&self) -> usize {
        (self.width * self.height) as usize
    }
}

impl Default for PixelEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FaceEncoder for PixelEncoder {
    fn encode(&self, image: &RgbImage, face: &BoundingBox) -> Option<Embedding> {
        let face = face.clamp_to(image.width(), image.height());
        if face.is_empty() {
            return None;
        }

        let region = image::imageops::crop_imm(image, face.left, face.top, face.width(), face.height())
            .to_image();
        let gray = image::imageops::grayscale(&region);
        let thumb = image::imageops::resize(&gray, self.width, self.height, FilterType::Triangle);

        let values: Vec<f32> = thumb.pixels().map(|p| p.0[0] as f32 / 255.0).collect();
        let mean = values.iter().sum::<f32>() / values.len() as f32;
        let centred: Vec<f32> = values.iter().map(|v| v - mean).collect();
        let norm = centred.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm <= f32::EPSILON {
            log::debug!("face region is flat, no embedding");
            return None;
        }

        Some(Embedding(centred.into_iter().map(|v| v / norm).collect()))
    }
}
