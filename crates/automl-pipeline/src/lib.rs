//! AutoML image object detection workflow.
//!
//! This crate provides:
//! - Environment-driven pipeline configuration
//! - The sequential dataset, training, evaluation, deployment and prediction run
//! - Local image payloads for online prediction
//! - Structured step logging and a JSON run report

pub mod config;
pub mod error;
pub mod logging;
pub mod payload;
pub mod pipeline;
pub mod report;

pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult};
pub use logging::{init_tracing, StepLogger};
pub use payload::ImagePayload;
pub use pipeline::{Pipeline, PipelineStep};
pub use report::{EvaluationSummary, PipelineReport, StepStatus, StepTiming};
