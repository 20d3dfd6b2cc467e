//! Pipeline error types.

use std::path::PathBuf;

use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Unsupported image {0}: expected JPEG, PNG, GIF, BMP or ICO")]
    UnsupportedImage(PathBuf),

    #[error("Image {path} is {size} bytes, limit is {max}")]
    ImageTooLarge { path: PathBuf, size: u64, max: u64 },

    #[error("Missing resource: {0}")]
    MissingResource(String),

    #[error("Manifest error: {0}")]
    Manifest(#[from] automl_models::ManifestError),

    #[error("Prediction error: {0}")]
    Prediction(#[from] automl_models::PredictionError),

    #[error("Vertex AI error: {0}")]
    Vertex(#[from] automl_client::VertexError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn missing_resource(msg: impl Into<String>) -> Self {
        Self::MissingResource(msg.into())
    }
}
