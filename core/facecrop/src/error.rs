use thiserror::Error;

#[derive(Debug, Error)]
pub enum FaceCropError {
    #[error("failed to decode image: {0}")]
    DecodeError(String),

    #[error("image dimensions are zero")]
    ZeroDimensions,

    #[error("failed to encode image: {0}")]
    EncodeError(String),

    #[error("failed to read exif metadata: {0}")]
    MetadataError(String),

    #[error("failed to read {path}: {reason}")]
    ReadError { path: String, reason: String },

    #[error("failed to write {path}: {reason}")]
    WriteError { path: String, reason: String },

    #[error("expanded face box is empty: {0:?}")]
    EmptyCrop(crate::BoundingBox),

    #[error("failed to load face detector model {path}: {reason}")]
    ModelLoad { path: String, reason: String },
}
