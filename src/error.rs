//! Error types shared across the toolkit.

use thiserror::Error;

/// Result type for pcbset operations.
pub type Result<T> = std::result::Result<T, DatasetError>;

/// Error types that can occur while converting, reconciling or evaluating
/// a dataset.
///
/// Per-item variants (unknown labels, unsupported shapes, missing pairs,
/// reconciliation misses) are counted and summarized by the callers rather
/// than aborting a batch; only `EmptyInput` is fatal to a whole run.
#[derive(Error, Debug)]
pub enum DatasetError {
    /// Error during JSON parsing or serialization.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error during I/O operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error while decoding or encoding a raster image.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// Invalid glob pattern built from an input path.
    #[error("glob pattern error: {0}")]
    Pattern(#[from] glob::PatternError),

    /// Wrong point or coordinate count for the declared conversion.
    #[error("invalid shape: {0}")]
    InvalidShape(String),

    /// Annotation label absent from the class table.
    #[error("unknown label '{label}'")]
    UnknownLabel { label: String },

    /// Point count outside the supported set {2, 4}.
    #[error("unsupported shape '{label}' with {points} points")]
    UnsupportedShape { label: String, points: usize },

    /// Image without a label file, or label without an image.
    #[error("no paired file for '{0}'")]
    MissingPairedFile(String),

    /// Zero-sized image; normalization is undefined.
    #[error("invalid image dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// Prediction references an external name absent from the ground truth.
    #[error("prediction references '{0}', which is absent from ground truth")]
    ReconciliationMiss(String),

    /// Category ids disagree between multi-class ground truth and predictions.
    #[error("category mismatch: {0}")]
    CategoryMismatch(String),

    /// No input files found at all; the run cannot proceed.
    #[error("no input files found in {0}")]
    EmptyInput(String),
}
