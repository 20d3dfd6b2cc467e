//! Run report.

use std::path::Path;

use automl_models::{Detection, ManifestStats, MapLookup};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PipelineResult;
use crate::pipeline::PipelineStep;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Completed,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepTiming {
    pub step: PipelineStep,
    pub status: StepStatus,
    pub elapsed_ms: u64,
}

/// Evaluation figures read back from the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSummary {
    pub evaluation: String,
    pub mean_average_precision: Option<f64>,
    pub at_iou: MapLookup,
    pub evaluated_bounding_box_count: Option<u64>,
    pub iou_thresholds: Vec<f64>,
}

/// Everything a run created, measured and predicted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub run: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub dataset: Option<String>,
    pub model: Option<String>,
    pub endpoint: Option<String>,
    pub deployed_model_id: Option<String>,
    pub manifest: Option<ManifestStats>,
    pub evaluation: Option<EvaluationSummary>,
    pub detections: Vec<Detection>,
    pub steps: Vec<StepTiming>,
    pub error: Option<String>,
}

impl PipelineReport {
    pub fn new(run: impl Into<String>) -> Self {
        Self {
            run: run.into(),
            started_at: Utc::now(),
            finished_at: None,
            dataset: None,
            model: None,
            endpoint: None,
            deployed_model_id: None,
            manifest: None,
            evaluation: None,
            detections: Vec::new(),
            steps: Vec::new(),
            error: None,
        }
    }

    pub fn record_step(&mut self, step: PipelineStep, status: StepStatus, elapsed_ms: u64) {
        self.steps.push(StepTiming {
            step,
            status,
            elapsed_ms,
        });
    }

    pub fn step_status(&self, step: PipelineStep) -> Option<StepStatus> {
        self.steps.iter().find(|t| t.step == step).map(|t| t.status)
    }

    /// Write the report as pretty JSON, creating parent directories.
    pub async fn write_to(&self, path: impl AsRef<Path>) -> PipelineResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let json = serde_json::to_vec_pretty(self)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }
}
