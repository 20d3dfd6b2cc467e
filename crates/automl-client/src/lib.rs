//! Vertex AI REST API client for AutoML image object detection.
//!
//! This crate provides:
//! - Image dataset creation and bounding-box annotation import
//! - AutoML training pipelines and model evaluations
//! - Endpoint creation, model deployment and online prediction
//! - Long-running operation polling
//! - Application default credentials via gcp_auth, retries and metrics

pub mod client;
pub mod datasets;
pub mod endpoints;
pub mod error;
pub mod evaluations;
pub mod metrics;
pub mod operations;
pub mod retry;
pub mod token_cache;
pub mod training;
pub mod types;

#[cfg(test)]
mod client_tests;

pub use client::{VertexClient, VertexConfig};
pub use error::{VertexError, VertexResult};
pub use retry::RetryConfig;
pub use token_cache::{TokenSource, CLOUD_PLATFORM_SCOPE};
pub use training::{trained_model_name, ObjectDetectionTrainingJob};
pub use types::{
    AutomaticResources, Dataset, Endpoint, ImageInstance, ModelEvaluation, Operation,
    PipelineState, PredictResponse, PredictionParameters, TrainingPipeline,
    BOUNDING_BOX_IMPORT_SCHEMA, IMAGE_METADATA_SCHEMA, OBJECT_DETECTION_TRAINING_DEFINITION,
};
