//! Face crop pipeline: locate a face, crop it with padding, normalize the
//! crop photometrically and compute an embedding for each saved crop.
//!
//! Face location and face encoding are pluggable. The `rustface` feature
//! provides [`RustfaceLocator`]; the `arcface` feature provides
//! `ArcFaceEncoder`, a learned identity embedding run on ONNX Runtime.
//! Without it the pipeline falls back to [`PixelEncoder`].
//!
//! # Example
//!
//! ```no_run
//! use facecrop::{FaceCropper, RustfaceLocator};
//!
//! let locator = RustfaceLocator::from_path("seeta_fd_frontal_v1.0.bin").unwrap();
//! let report = FaceCropper::new(Box::new(locator)).run("photo.jpg");
//! std::process::exit(report.exit_code());
//! ```
#![warn(missing_docs)]

#[cfg(feature = "arcface")]
/// ArcFace face encoder backend on ONNX Runtime.
pub mod arcface_backend;
/// Padded face cropping.
pub mod crop;
mod encode;
mod encoder;
mod error;
/// Face location and encoding traits and data types.
pub mod face_detector;
/// Photometric normalization filters.
pub mod normalize;
mod outcome;
/// Image loading, EXIF orientation and resizing.
pub mod preprocess;
mod report;
#[cfg(feature = "rustface")]
/// Built-in SeetaFace-based face locator backend.
pub mod rustface_backend;

use std::path::{Path, PathBuf};

use image::RgbImage;

#[cfg(feature = "arcface")]
/// Learned face encoder that loads an ArcFace ONNX model.
pub use arcface_backend::ArcFaceEncoder;
pub use encode::JPEG_QUALITY;
/// Fallback pixel-thumbnail face encoder.
pub use encoder::PixelEncoder;
/// Error type returned by facecrop operations.
pub use error::FaceCropError;
/// Face location / encoding traits and their data types.
pub use face_detector::{BoundingBox, Embedding, FaceEncoder, FaceLocator};
/// Stage result type.
pub use outcome::Outcome;
/// Progress line sinks.
pub use report::{MemoryReporter, Reporter, StdoutReporter};
#[cfg(feature = "rustface")]
/// Built-in locator that loads a SeetaFace model file.
pub use rustface_backend::RustfaceLocator;

/// File name of the padded crop, written next to the input image.
pub const ORIGINAL_FACE_FILE: &str = "expanded_cropped_face.jpg";

/// File name of the normalized crop, written next to the input image.
pub const PROCESSED_FACE_FILE: &str = "processed_face.jpg";

/// The two files written by [`FaceCropper::crop_face`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CropPaths {
    /// Padded crop of the located face.
    pub original: PathBuf,

    /// The same crop after photometric normalization.
    pub processed: PathBuf,
}

/// Everything one [`FaceCropper::run`] invocation produced.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    /// Saved crops, or `None` if no face was cropped.
    pub paths: Option<CropPaths>,

    /// Embedding of the padded crop. `Absent` when no crop was made.
    pub original_embedding: Outcome<Embedding>,

    /// Embedding of the normalized crop. `Absent` when no crop was made.
    pub processed_embedding: Outcome<Embedding>,
}

impl PipelineReport {
    /// Process exit status: 0 once both crops were saved, 1 otherwise.
    ///
    /// Missing embeddings do not affect the status.
    pub fn exit_code(&self) -> i32 {
        if self.paths.is_some() {
            0
        } else {
            1
        }
    }
}

/// Single-image face crop pipeline.
///
/// Holds the face locator and encoder collaborators, the sink for progress
/// lines and the crop parameters. Every stage recovers from its own failures
/// and reports them as [`Outcome`] values instead of errors.
pub struct FaceCropper {
    locator: Box<dyn FaceLocator>,
    encoder: Box<dyn FaceEncoder>,
    reporter: Box<dyn Reporter>,
    padding: u32,
    max_dimension: u32,
    jpeg_quality: u8,
}

impl FaceCropper {
    /// Create a pipeline around `locator`, with the fallback [`PixelEncoder`],
    /// progress on stdout and the default crop parameters.
    ///
    /// Use [`FaceCropper::face_encoder`] to install a learned encoder.
    pub fn new(locator: Box<dyn FaceLocator>) -> Self {
        Self {
            locator,
            encoder: Box::new(PixelEncoder::new()),
            reporter: Box::new(StdoutReporter),
            padding: crop::PADDING,
            max_dimension: preprocess::MAX_DIMENSION,
            jpeg_quality: JPEG_QUALITY,
        }
    }

    /// Provide a custom face encoder implementation.
    pub fn face_encoder(mut self, encoder: Box<dyn FaceEncoder>) -> Self {
        self.encoder = encoder;
        self
    }

    /// Send progress lines to `reporter` instead of stdout.
    pub fn reporter(mut self, reporter: Box<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Set the padding added around the located face (default: 50 px).
    pub fn padding(mut self, padding: u32) -> Self {
        self.padding = padding;
        self
    }

    /// Set the longest edge allowed before face location (default: 1600 px).
    pub fn max_dimension(mut self, dimension: u32) -> Self {
        self.max_dimension = dimension.max(1);
        self
    }

    /// Set the JPEG quality for the saved crops, 1-100 (default: 75).
    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    fn report(&self, line: impl AsRef<str>) {
        self.reporter.report(line.as_ref());
    }

    /// Load an image, rotate it upright per its EXIF orientation and shrink
    /// it to the configured maximum dimension.
    ///
    /// Orientation metadata problems are reported and otherwise ignored.
    pub fn preprocess(&self, path: impl AsRef<Path>) -> Result<RgbImage, FaceCropError> {
        let path = path.as_ref();
        let input = read_input(path)?;
        let decoded = preprocess::decode_image(&input)?;
        let mut image = preprocess::flatten_alpha(&decoded);

        match preprocess::read_orientation(&input) {
            Ok(Some(orientation)) => {
                log::debug!("exif orientation {orientation} for {}", path.display());
                image = preprocess::apply_orientation(image, orientation);
            }
            Ok(None) => {}
            Err(e) => {
                log::warn!("orientation of {} left as decoded: {e}", path.display());
                self.report(format!("Error correcting orientation: {e}"));
            }
        }

        if let Some((width, height)) =
            preprocess::scaled_dimensions(image.width(), image.height(), self.max_dimension)
        {
            image = preprocess::resize_to_max_dimension(image, self.max_dimension);
            self.report(format!("Resized image to ({width}, {height})"));
        }

        Ok(image)
    }

    /// Locate the first face in the image at `path`, save its padded crop and
    /// its normalized crop next to the input.
    ///
    /// Returns `Absent` when no face is found and `Failed` on any unexpected
    /// error. Nothing is written in either case, unless the failure happens
    /// between the two writes.
    pub fn crop_face(&self, path: impl AsRef<Path>) -> Outcome<CropPaths> {
        let path = path.as_ref();
        self.report(format!("Processing image: {}", path.display()));
        match self.try_crop_face(path) {
            Ok(paths) => paths.into(),
            Err(e) => {
                log::warn!("crop of {} failed: {e}", path.display());
                self.report(format!("Error processing image: {e}"));
                Outcome::Failed(e.to_string())
            }
        }
    }

    fn try_crop_face(&self, path: &Path) -> Result<Option<CropPaths>, FaceCropError> {
        self.report("Loading and preprocessing image...");
        let image = self.preprocess(path)?;
        let (width, height) = image.dimensions();
        self.report(format!(
            "Current dimensions of input image: {width}x{height}"
        ));

        self.report("Detecting face locations...");
        let faces = self.locator.locate(&image);
        self.report(format!("Face locations detected: {}", format_boxes(&faces)));

        let Some(face) = faces.first() else {
            self.report("No face detected! Skipping...");
            return Ok(None);
        };
        self.report(format!(
            "Original face coordinates: top={}, right={}, bottom={}, left={}",
            face.top, face.right, face.bottom, face.left
        ));

        self.report(format!("Applying padding: {}px", self.padding));
        self.report(format!(
            "Image dimensions: width={width}, height={height}"
        ));
        let region = crop::expand_box(face, self.padding, width, height);
        self.report(format!(
            "Expanded face coordinates: top={}, right={}, bottom={}, left={}",
            region.top, region.right, region.bottom, region.left
        ));

        let cropped = crop::crop_region(&image, &region)?;
        self.report("Cropped expanded face region.");

        let output_dir = path.parent().unwrap_or_else(|| Path::new(""));
        let original = output_dir.join(ORIGINAL_FACE_FILE);
        encode::save_jpeg(&cropped, &original, self.jpeg_quality)?;
        self.report(format!(
            "Expanded cropped face saved to: {}",
            original.display()
        ));

        self.report("Processing face image (applying filters)...");
        let normalized = normalize::normalize_face(&cropped);
        let processed = output_dir.join(PROCESSED_FACE_FILE);
        encode::save_jpeg(&normalized, &processed, self.jpeg_quality)?;
        self.report(format!("Processed face saved to: {}", processed.display()));

        Ok(Some(CropPaths {
            original,
            processed,
        }))
    }

    /// Compute the embedding of the first face found in the image at `path`.
    ///
    /// Face location runs again on the decoded file; no earlier detection is
    /// reused. Returns `Absent` when no face is found or the encoder yields
    /// nothing, and `Failed` when the file cannot be read or decoded.
    pub fn generate_embedding(&self, path: impl AsRef<Path>) -> Outcome<Embedding> {
        let path = path.as_ref();
        self.report(format!("Generating embedding for image: {}", path.display()));
        match self.try_generate_embedding(path) {
            Ok(embedding) => embedding.into(),
            Err(e) => {
                log::warn!("embedding of {} failed: {e}", path.display());
                self.report(format!(
                    "Error generating embedding for {}: {e}",
                    path.display()
                ));
                Outcome::Failed(e.to_string())
            }
        }
    }

    fn try_generate_embedding(&self, path: &Path) -> Result<Option<Embedding>, FaceCropError> {
        self.report("Loading image for embedding...");
        let input = read_input(path)?;
        let image = preprocess::flatten_alpha(&preprocess::decode_image(&input)?);
        self.report("Image loaded successfully.");

        self.report("Detecting face locations for embedding...");
        let faces = self.locator.locate(&image);
        self.report(format!(
            "Face locations for embedding: {}",
            format_boxes(&faces)
        ));

        let Some(face) = faces.first() else {
            self.report("No face detected! Skipping embedding generation.");
            return Ok(None);
        };

        self.report("Generating face encoding...");
        match self.encoder.encode(&image, face) {
            Some(embedding) => {
                self.report("Face encoding generated successfully.");
                Ok(Some(embedding))
            }
            None => {
                self.report("No encoding found for the face.");
                Ok(None)
            }
        }
    }

    /// Run the whole pipeline on `path`: crop, normalize, then embed both
    /// saved crops independently and report the results.
    pub fn run(&self, path: impl AsRef<Path>) -> PipelineReport {
        let path = path.as_ref();
        self.report(format!(
            "Starting face detection and processing for: {}",
            path.display()
        ));

        let Outcome::Ok(paths) = self.crop_face(path) else {
            self.report("Face not detected or error occurred during processing.");
            return PipelineReport {
                paths: None,
                original_embedding: Outcome::Absent,
                processed_embedding: Outcome::Absent,
            };
        };

        self.report("Generating embeddings for detected faces...");
        let original_embedding = self.generate_embedding(&paths.original);
        let processed_embedding = self.generate_embedding(&paths.processed);

        self.report(format!(
            "Original embedding: {}",
            format_embedding(&original_embedding)
        ));
        self.report(format!(
            "Processed embedding: {}",
            format_embedding(&processed_embedding)
        ));
        self.report(format!("Original path: {}", paths.original.display()));
        self.report(format!("Processed path: {}", paths.processed.display()));

        PipelineReport {
            paths: Some(paths),
            original_embedding,
            processed_embedding,
        }
    }
}

fn read_input(path: &Path) -> Result<Vec<u8>, FaceCropError> {
    std::fs::read(path).map_err(|e| FaceCropError::ReadError {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

fn format_boxes(faces: &[BoundingBox]) -> String {
    let boxes: Vec<String> = faces.iter().map(ToString::to_string).collect();
    format!("[{}]", boxes.join(", "))
}

fn format_embedding(embedding: &Outcome<Embedding>) -> String {
    match embedding {
        Outcome::Ok(embedding) => embedding.to_string(),
        Outcome::Absent | Outcome::Failed(_) => "None".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct FixedLocator(Vec<BoundingBox>);

    impl FaceLocator for FixedLocator {
        fn locate(&self, _image: &RgbImage) -> Vec<BoundingBox> {
            self.0.clone()
        }
    }

    fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
        let img = RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 251) as u8, (y % 241) as u8, ((x + y) % 256) as u8])
        });
        let path = dir.join(name);
        img.save(&path).unwrap();
        path
    }

    fn cropper(faces: Vec<BoundingBox>) -> (FaceCropper, Arc<MemoryReporter>) {
        let reporter = Arc::new(MemoryReporter::new());
        let cropper = FaceCropper::new(Box::new(FixedLocator(faces)))
            .reporter(Box::new(reporter.clone()));
        (cropper, reporter)
    }

    #[test]
    fn format_helpers() {
        assert_eq!(format_boxes(&[]), "[]");
        assert_eq!(
            format_boxes(&[BoundingBox::new(1, 2, 3, 0), BoundingBox::new(4, 5, 6, 1)]),
            "[(1, 2, 3, 0), (4, 5, 6, 1)]"
        );
        assert_eq!(format_embedding(&Outcome::Absent), "None");
        assert_eq!(format_embedding(&Outcome::Failed("x".into())), "None");
    }

    #[test]
    fn exit_code_follows_paths() {
        let failed = PipelineReport {
            paths: None,
            original_embedding: Outcome::Absent,
            processed_embedding: Outcome::Absent,
        };
        assert_eq!(failed.exit_code(), 1);

        let ok = PipelineReport {
            paths: Some(CropPaths {
                original: PathBuf::from("a.jpg"),
                processed: PathBuf::from("b.jpg"),
            }),
            ..failed
        };
        assert_eq!(ok.exit_code(), 0);
    }

    #[test]
    fn builder_clamps_parameters() {
        let (cropper, _) = cropper(vec![]);
        let cropper = cropper.jpeg_quality(0).max_dimension(0).padding(7);
        assert_eq!(cropper.jpeg_quality, 1);
        assert_eq!(cropper.max_dimension, 1);
        assert_eq!(cropper.padding, 7);
    }

    #[test]
    fn preprocess_reports_resize() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "big.png", 400, 200);
        let (cropper, reporter) = cropper(vec![]);
        let image = cropper.max_dimension(100).preprocess(&path).unwrap();
        assert_eq!(image.dimensions(), (100, 50));
        assert!(reporter.contains("Resized image to (100, 50)"));
    }

    #[test]
    fn crop_writes_expected_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "in.png", 300, 200);
        let (cropper, reporter) = cropper(vec![BoundingBox::new(20, 180, 120, 80)]);

        let paths = cropper.crop_face(&path).ok().unwrap();
        assert_eq!(paths.original, dir.path().join(ORIGINAL_FACE_FILE));
        assert_eq!(paths.processed, dir.path().join(PROCESSED_FACE_FILE));

        // top 20-50 clamps to 0, bottom 120+50=170, left 30, right 230
        let original = image::open(&paths.original).unwrap();
        assert_eq!((original.width(), original.height()), (200, 170));
        let processed = image::open(&paths.processed).unwrap();
        assert_eq!((processed.width(), processed.height()), (200, 170));
        assert!(reporter.contains("Expanded face coordinates: top=0, right=230, bottom=170, left=30"));
    }

    #[test]
    fn no_face_is_absent_and_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "in.png", 64, 64);
        let (cropper, reporter) = cropper(vec![]);

        assert!(cropper.crop_face(&path).is_absent());
        assert!(reporter.contains("No face detected! Skipping..."));
        assert!(!dir.path().join(ORIGINAL_FACE_FILE).exists());
        assert!(!dir.path().join(PROCESSED_FACE_FILE).exists());
    }

    #[test]
    fn unreadable_input_fails_without_panicking() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.jpg");
        std::fs::write(&path, b"not an image").unwrap();
        let (cropper, reporter) = cropper(vec![BoundingBox::new(0, 10, 10, 0)]);

        assert!(cropper.crop_face(&path).is_failed());
        assert!(reporter.contains("Error processing image:"));
    }

    #[test]
    fn embedding_of_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let (cropper, reporter) = cropper(vec![BoundingBox::new(0, 10, 10, 0)]);
        let outcome = cropper.generate_embedding(dir.path().join("nope.jpg"));
        assert!(outcome.is_failed());
        assert!(reporter.contains("Error generating embedding for"));
    }

    #[test]
    fn missing_input_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let (cropper, reporter) = cropper(vec![]);
        let result = cropper.preprocess(dir.path().join("absent.png"));
        assert!(matches!(result, Err(FaceCropError::ReadError { .. })));

        let outcome = cropper.crop_face(dir.path().join("absent.png"));
        assert!(matches!(outcome, Outcome::Failed(ref reason) if reason.starts_with("failed to read")));
        assert!(reporter.contains("Error processing image: failed to read"));
    }
}
