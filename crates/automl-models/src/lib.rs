//! Shared data models for the AutoML object detection workflow.
//!
//! This crate provides Serde-serializable types for:
//! - Annotation manifest rows and per-image grouping
//! - Normalized bounding boxes and their pixel projection
//! - Dataset splits and training inputs
//! - Prediction records and their decoding into labelled rectangles
//! - Evaluation metrics

pub mod annotation;
pub mod bbox;
pub mod evaluation;
pub mod image_format;
pub mod manifest;
pub mod prediction;
pub mod split;
pub mod training;

// Re-export common types
pub use annotation::{AnnotationError, AnnotationRecord, LabeledBox};
pub use bbox::{BoxError, NormalizedBox, PixelRect};
pub use evaluation::{BoundingBoxMetrics, ImageObjectDetectionMetrics, MapLookup};
pub use image_format::{ImageFormat, MAX_IMAGE_BYTES};
pub use manifest::{ImageAnnotations, Manifest, ManifestError, ManifestResult, ManifestStats};
pub use prediction::{
    detection_label, Detection, PredictionError, PredictionRecord, PredictionResult,
};
pub use split::{DataSplit, FractionSplit, FractionSplitError};
pub use training::{ModelType, ObjectDetectionTaskInputs, TrainingBudget};
