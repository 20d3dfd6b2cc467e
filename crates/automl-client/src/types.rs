//! Vertex AI REST API types.
//!
//! Only the fields this client reads or writes are modelled; unknown fields
//! are ignored on deserialization.

use std::collections::BTreeMap;

use automl_models::{FractionSplit, PredictionRecord};
use serde::{Deserialize, Serialize};

/// Metadata schema for image datasets.
pub const IMAGE_METADATA_SCHEMA: &str =
    "gs://google-cloud-aiplatform/schema/dataset/metadata/image_1.0.0.yaml";

/// Import schema for bounding-box annotation manifests (CSV or JSONL).
pub const BOUNDING_BOX_IMPORT_SCHEMA: &str =
    "gs://google-cloud-aiplatform/schema/dataset/ioformat/image_bounding_box_io_format_1.0.0.yaml";

/// Training task definition for AutoML image object detection.
pub const OBJECT_DETECTION_TRAINING_DEFINITION: &str =
    "gs://google-cloud-aiplatform/schema/trainingjob/definition/automl_image_object_detection_1.0.0.yaml";

/// Last path segment of a resource name, e.g. the dataset id of
/// `projects/p/locations/l/datasets/123`.
pub fn resource_id(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

// ============================================================================
// Long-running operations
// ============================================================================

/// `google.rpc.Status`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

/// `google.longrunning.Operation`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub name: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

// ============================================================================
// Datasets
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub display_name: String,
    pub metadata_schema_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
    /// int64 encoded as a string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_item_count: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GcsSource {
    pub uris: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportDataConfig {
    pub gcs_source: GcsSource,
    pub import_schema_uri: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportDataRequest {
    pub import_configs: Vec<ImportDataConfig>,
}

// ============================================================================
// Training pipelines
// ============================================================================

/// Training pipeline state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PipelineState {
    #[serde(rename = "PIPELINE_STATE_QUEUED")]
    Queued,
    #[serde(rename = "PIPELINE_STATE_PENDING")]
    Pending,
    #[serde(rename = "PIPELINE_STATE_RUNNING")]
    Running,
    #[serde(rename = "PIPELINE_STATE_SUCCEEDED")]
    Succeeded,
    #[serde(rename = "PIPELINE_STATE_FAILED")]
    Failed,
    #[serde(rename = "PIPELINE_STATE_CANCELLING")]
    Cancelling,
    #[serde(rename = "PIPELINE_STATE_CANCELLED")]
    Cancelled,
    #[serde(rename = "PIPELINE_STATE_PAUSED")]
    Paused,
    /// Also used for states this client does not know about.
    #[default]
    #[serde(rename = "PIPELINE_STATE_UNSPECIFIED")]
    #[serde(other)]
    Unspecified,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Unspecified => "PIPELINE_STATE_UNSPECIFIED",
            PipelineState::Queued => "PIPELINE_STATE_QUEUED",
            PipelineState::Pending => "PIPELINE_STATE_PENDING",
            PipelineState::Running => "PIPELINE_STATE_RUNNING",
            PipelineState::Succeeded => "PIPELINE_STATE_SUCCEEDED",
            PipelineState::Failed => "PIPELINE_STATE_FAILED",
            PipelineState::Cancelling => "PIPELINE_STATE_CANCELLING",
            PipelineState::Cancelled => "PIPELINE_STATE_CANCELLED",
            PipelineState::Paused => "PIPELINE_STATE_PAUSED",
        }
    }

    /// True once the pipeline can no longer change state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineState::Succeeded | PipelineState::Failed | PipelineState::Cancelled
        )
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputDataConfig {
    pub dataset_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fraction_split: Option<FractionSplit>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingPipeline {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub display_name: String,
    #[serde(default)]
    pub training_task_definition: String,
    #[serde(default)]
    pub training_task_inputs: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_data_config: Option<InputDataConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_to_upload: Option<Model>,
    #[serde(default, skip_serializing)]
    pub state: PipelineState,
    #[serde(default, skip_serializing)]
    pub error: Option<Status>,
    #[serde(default, skip_serializing)]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing)]
    pub end_time: Option<String>,
}

// ============================================================================
// Model evaluations
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelEvaluation {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub metrics_schema_uri: String,
    #[serde(default)]
    pub metrics: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListModelEvaluationsResponse {
    #[serde(default)]
    pub model_evaluations: Vec<ModelEvaluation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

// ============================================================================
// Endpoints and serving
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub display_name: String,
    #[serde(default, skip_serializing)]
    pub deployed_models: Vec<DeployedModel>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomaticResources {
    pub min_replica_count: u32,
    pub max_replica_count: u32,
}

impl Default for AutomaticResources {
    fn default() -> Self {
        Self {
            min_replica_count: 1,
            max_replica_count: 1,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployedModel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub model: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub automatic_resources: Option<AutomaticResources>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployModelRequest {
    pub deployed_model: DeployedModel,
    /// Deployed model id -> percentage; "0" addresses the model being deployed.
    pub traffic_split: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployModelResponse {
    #[serde(default)]
    pub deployed_model: DeployedModel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UndeployModelRequest {
    pub deployed_model_id: String,
}

/// One image to run detection on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageInstance {
    /// Base64-encoded image bytes.
    pub content: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionParameters {
    pub confidence_threshold: f64,
    pub max_predictions: u32,
}

impl Default for PredictionParameters {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            max_predictions: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictRequest {
    pub instances: Vec<ImageInstance>,
    pub parameters: PredictionParameters,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictResponse {
    #[serde(default)]
    pub predictions: Vec<PredictionRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployed_model_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resource_id() {
        assert_eq!(resource_id("projects/p/locations/us-central1/datasets/123"), "123");
        assert_eq!(resource_id("456"), "456");
    }

    #[test]
    fn test_pipeline_state_parsing() {
        let pipeline: TrainingPipeline = serde_json::from_value(json!({
            "name": "projects/p/locations/l/trainingPipelines/9",
            "displayName": "salads",
            "state": "PIPELINE_STATE_RUNNING"
        }))
        .unwrap();
        assert_eq!(pipeline.state, PipelineState::Running);
        assert!(!pipeline.state.is_terminal());

        let unknown: TrainingPipeline = serde_json::from_value(json!({
            "displayName": "salads",
            "state": "PIPELINE_STATE_SOMETHING_NEW"
        }))
        .unwrap();
        assert_eq!(unknown.state, PipelineState::Unspecified);

        let unspecified: PipelineState =
            serde_json::from_value(json!("PIPELINE_STATE_UNSPECIFIED")).unwrap();
        assert_eq!(unspecified, PipelineState::Unspecified);
        let paused: PipelineState = serde_json::from_value(json!("PIPELINE_STATE_PAUSED")).unwrap();
        assert_eq!(paused, PipelineState::Paused);
        assert_eq!(TrainingPipeline::default().state, PipelineState::Unspecified);

        assert!(PipelineState::Succeeded.is_terminal());
        assert!(PipelineState::Failed.is_terminal());
        assert!(PipelineState::Cancelled.is_terminal());
        assert!(!PipelineState::Cancelling.is_terminal());
    }

    #[test]
    fn test_training_pipeline_omits_output_fields() {
        let pipeline = TrainingPipeline {
            display_name: "salads".into(),
            state: PipelineState::Running,
            ..Default::default()
        };
        let json = serde_json::to_value(&pipeline).unwrap();
        assert!(json.get("state").is_none());
        assert!(json.get("name").is_none());
        assert_eq!(json["displayName"], "salads");
    }

    #[test]
    fn test_predict_request_wire_format() {
        let request = PredictRequest {
            instances: vec![ImageInstance {
                content: "aGVsbG8=".into(),
            }],
            parameters: PredictionParameters::default(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["instances"][0]["content"], "aGVsbG8=");
        assert_eq!(json["parameters"]["confidenceThreshold"], 0.5);
        assert_eq!(json["parameters"]["maxPredictions"], 5);
    }
}
