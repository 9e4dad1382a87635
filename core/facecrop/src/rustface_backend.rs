use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use image::RgbImage;

use crate::error::FaceCropError;
use crate::face_detector::{BoundingBox, FaceLocator};

/// Face locator backed by the `rustface` crate (SeetaFace engine).
///
/// Loads a SeetaFace frontal model from disk on construction. Faces are
/// returned highest detection score first.
pub struct RustfaceLocator {
    model: rustface::Model,
    min_face_size: u32,
}

impl RustfaceLocator {
    /// Load the SeetaFace model at `path`.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, FaceCropError> {
        let path = path.as_ref();
        let model_load_error = |reason: String| FaceCropError::ModelLoad {
            path: path.display().to_string(),
            reason,
        };
        let file = File::open(path).map_err(|e| model_load_error(e.to_string()))?;
        let model = rustface::read_model(BufReader::new(file))
            .map_err(|e| model_load_error(e.to_string()))?;
        log::debug!("loaded SeetaFace model from {}", path.display());
        Ok(Self {
            model,
            min_face_size: 20,
        })
    }

    /// Smallest face edge, in pixels, the detector searches for (default: 20).
    pub fn min_face_size(mut self, size: u32) -> Self {
        self.min_face_size = size;
        self
    }
}

impl FaceLocator for RustfaceLocator {
    fn locate(&self, image: &RgbImage) -> Vec<BoundingBox> {
        let gray = image::imageops::grayscale(image);
        let (width, height) = (gray.width(), gray.height());

        let mut detector = rustface::create_detector_with_model(self.model.clone());
        detector.set_min_face_size(self.min_face_size);
        detector.set_score_thresh(2.0);
        detector.set_pyramid_scale_factor(0.8);
        detector.set_slide_window_step(4, 4);

        let detections = detector
            .detect(&rustface::ImageData::new(gray.as_raw(), width, height))
            .iter()
            .map(|face| {
                let bbox = face.bbox();
                Detection {
                    score: face.score(),
                    x: bbox.x(),
                    y: bbox.y(),
                    width: bbox.width(),
                    height: bbox.height(),
                }
            })
            .collect();
        rank_detections(detections, width, height)
    }
}

/// Raw detector output: score plus an (x, y, width, height) box that may
/// reach past the image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Detection {
    pub score: f64,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Order detections highest score first and convert them to boxes clamped to
/// a `width` × `height` image. Boxes left with no area are dropped.
pub(crate) fn rank_detections(
    mut detections: Vec<Detection>,
    width: u32,
    height: u32,
) -> Vec<BoundingBox> {
    detections.sort_by(|a, b| b.score.total_cmp(&a.score));
    detections
        .iter()
        .filter_map(|d| {
            let left = d.x.max(0) as u32;
            let top = d.y.max(0) as u32;
            let right = (d.x as i64 + d.width as i64).max(0) as u32;
            let bottom = (d.y as i64 + d.height as i64).max(0) as u32;
            let clamped = BoundingBox::new(top, right, bottom, left).clamp_to(width, height);
            (!clamped.is_empty()).then_some(clamped)
        })
        .collect()
}
