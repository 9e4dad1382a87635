use std::path::Path;
use std::sync::{Mutex, PoisonError};

use image::imageops::FilterType;
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;

use crate::error::FaceCropError;
use crate::face_detector::{BoundingBox, Embedding, FaceEncoder};

/// Edge of the square face crop the network expects.
pub const ARCFACE_INPUT_SIZE: u32 = 112;

const PIXEL_MEAN: f32 = 127.5;
const PIXEL_STD: f32 = 127.5;

/// Face encoder backed by an ArcFace ONNX model (for example insightface's
/// `w600k_r50.onnx`), run through ONNX Runtime.
///
/// The face box is resized to 112 × 112 and fed as an NCHW RGB tensor. The
/// network output is L2-normalized, so embeddings of the same person sit close
/// together on the unit sphere.
pub struct ArcFaceEncoder {
    session: Mutex<Session>,
}

impl ArcFaceEncoder {
    /// Load the ONNX model at `path`.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, FaceCropError> {
        let path = path.as_ref();
        let model_load_error = |reason: String| FaceCropError::ModelLoad {
            path: path.display().to_string(),
            reason,
        };
        if !path.exists() {
            return Err(model_load_error("file not found".to_string()));
        }
        let session = load_session(path).map_err(|e| model_load_error(e.to_string()))?;
        log::debug!("loaded ArcFace model from {}", path.display());
        Ok(Self {
            session: Mutex::new(session),
        })
    }

    fn infer(&self, input: &Array4<f32>) -> ort::Result<Vec<f32>> {
        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        let outputs = session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;
        let (_, data) = outputs[0].try_extract_tensor::<f32>()?;
        Ok(data.to_vec())
    }
}

fn load_session(path: &Path) -> ort::Result<Session> {
    Ok(Session::builder()?
        .with_intra_threads(2)?
        .commit_from_file(path)?)
}

impl FaceEncoder for ArcFaceEncoder {
    fn encode(&self, image: &RgbImage, face: &BoundingBox) -> Option<Embedding> {
        let input = face_tensor(image, face)?;
        match self.infer(&input) {
            Ok(raw) => unit_length(raw),
            Err(e) => {
                log::warn!("ArcFace inference failed: {e}");
                None
            }
        }
    }
}

/// Crop `face` out of `image` and lay it out as a normalized
/// `[1, 3, 112, 112]` tensor. `None` when the box misses the image.
pub(crate) fn face_tensor(image: &RgbImage, face: &BoundingBox) -> Option<Array4<f32>> {
    let face = face.clamp_to(image.width(), image.height());
    if face.is_empty() {
        return None;
    }

    let region =
        image::imageops::crop_imm(image, face.left, face.top, face.width(), face.height()).to_image();
    let resized = image::imageops::resize(
        &region,
        ARCFACE_INPUT_SIZE,
        ARCFACE_INPUT_SIZE,
        FilterType::Triangle,
    );

    let size = ARCFACE_INPUT_SIZE as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = (pixel.0[c] as f32 - PIXEL_MEAN) / PIXEL_STD;
        }
    }
    Some(tensor)
}

fn unit_length(raw: Vec<f32>) -> Option<Embedding> {
    let norm = raw.iter().map(|v| v * v).sum::<f32>().sqrt();
    if raw.is_empty() || norm <= f32::EPSILON {
        log::debug!("degenerate ArcFace output, no embedding");
        return None;
    }
    Some(Embedding(raw.into_iter().map(|v| v / norm).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tensor_shape_is_nchw() {
        let img = RgbImage::from_pixel(300, 200, image::Rgb([10, 20, 30]));
        let tensor = face_tensor(&img, &BoundingBox::new(20, 180, 160, 40)).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 112, 112]);
    }

    #[test]
    fn tensor_keeps_channel_order_and_scaling() {
        let img = RgbImage::from_pixel(64, 64, image::Rgb([255, 128, 0]));
        let tensor = face_tensor(&img, &BoundingBox::new(0, 64, 64, 0)).unwrap();
        assert!((tensor[[0, 0, 5, 5]] - 1.0).abs() < 1e-6);
        assert!((tensor[[0, 1, 5, 5]] - (0.5 / 127.5)).abs() < 1e-6);
        assert!((tensor[[0, 2, 5, 5]] + 1.0).abs() < 1e-6);
    }

    #[test]
    fn box_outside_image_has_no_tensor() {
        let img = RgbImage::new(32, 32);
        assert!(face_tensor(&img, &BoundingBox::new(40, 80, 80, 40)).is_none());
    }

    #[test]
    fn output_is_scaled_to_unit_length() {
        let embedding = unit_length(vec![3.0, 0.0, 4.0]).unwrap();
        assert_eq!(embedding.as_slice(), &[0.6, 0.0, 0.8]);
        assert!(unit_length(vec![0.0; 512]).is_none());
        assert!(unit_length(Vec::new()).is_none());
    }

    #[test]
    fn missing_model_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = ArcFaceEncoder::from_path(dir.path().join("w600k_r50.onnx"));
        assert!(matches!(result, Err(FaceCropError::ModelLoad { .. })));
    }
}
