use std::fmt;

use image::RgbImage;

/// Bounding box of a detected face, in pixel coordinates.
///
/// Stored in (top, right, bottom, left) order. `right` and `bottom` are
/// exclusive, so a box covering the whole image is `(0, width, height, 0)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    /// First row of the box.
    pub top: u32,
    /// One past the last column of the box.
    pub right: u32,
    /// One past the last row of the box.
    pub bottom: u32,
    /// First column of the box.
    pub left: u32,
}

impl BoundingBox {
    /// Build a box from (top, right, bottom, left).
    pub fn new(top: u32, right: u32, bottom: u32, left: u32) -> Self {
        Self {
            top,
            right,
            bottom,
            left,
        }
    }

    /// Width of the box in pixels (zero for an inverted box).
    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    /// Height of the box in pixels (zero for an inverted box).
    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }

    /// Area of the box in pixels.
    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    /// `true` if the box covers no pixels.
    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Clamp the box to a `width` × `height` image.
    pub fn clamp_to(&self, width: u32, height: u32) -> Self {
        Self {
            top: self.top.min(height),
            right: self.right.min(width),
            bottom: self.bottom.min(height),
            left: self.left.min(width),
        }
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.top, self.right, self.bottom, self.left
        )
    }
}

/// Fixed-length face descriptor produced by a [`FaceEncoder`].
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding(pub Vec<f32>);

impl Embedding {
    /// Number of components.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `true` if the embedding has no components.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The raw components.
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Euclidean distance to another embedding of the same length.
    pub fn distance(&self, other: &Embedding) -> Option<f32> {
        if self.len() != other.len() {
            return None;
        }
        let sum: f32 = self
            .0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum();
        Some(sum.sqrt())
    }
}

impl fmt::Display for Embedding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{value}")?;
        }
        f.write_str("]")
    }
}

/// Pluggable face location backend.
///
/// Implement this trait to provide a custom face locator (ONNX, dlib, etc.)
/// and pass it to [`crate::FaceCropper::new`].
pub trait FaceLocator: Send + Sync {
    /// Locate faces in an RGB image.
    ///
    /// Boxes must lie inside the image. The pipeline only uses the first box,
    /// so implementations decide which face wins by their ordering.
    fn locate(&self, image: &RgbImage) -> Vec<BoundingBox>;
}

/// Pluggable face encoding backend.
pub trait FaceEncoder: Send + Sync {
    /// Compute a descriptor for the face inside `face`, or `None` if the
    /// region does not yield one.
    fn encode(&self, image: &RgbImage, face: &BoundingBox) -> Option<Embedding>;
}
