//! AutoML object detection training pipelines.

use std::time::Instant;

use automl_models::{FractionSplit, ObjectDetectionTaskInputs};
use tracing::{debug, info};

use crate::client::VertexClient;
use crate::error::{VertexError, VertexResult};
use crate::metrics::record_poll;
use crate::types::{
    resource_id, InputDataConfig, Model, PipelineState, TrainingPipeline,
    OBJECT_DETECTION_TRAINING_DEFINITION,
};

/// Parameters of an object detection training run.
#[derive(Debug, Clone)]
pub struct ObjectDetectionTrainingJob {
    pub display_name: String,
    pub model_display_name: String,
    /// Dataset id or full resource name.
    pub dataset: String,
    pub fraction_split: FractionSplit,
    pub task_inputs: ObjectDetectionTaskInputs,
}

impl ObjectDetectionTrainingJob {
    fn to_pipeline(&self) -> VertexResult<TrainingPipeline> {
        self.fraction_split
            .validate()
            .map_err(|e| VertexError::InvalidArgument(e.to_string()))?;

        Ok(TrainingPipeline {
            display_name: self.display_name.clone(),
            training_task_definition: OBJECT_DETECTION_TRAINING_DEFINITION.to_string(),
            training_task_inputs: serde_json::to_value(&self.task_inputs)?,
            input_data_config: Some(InputDataConfig {
                dataset_id: resource_id(&self.dataset).to_string(),
                fraction_split: Some(self.fraction_split),
            }),
            model_to_upload: Some(Model {
                name: None,
                display_name: self.model_display_name.clone(),
            }),
            ..Default::default()
        })
    }
}

impl VertexClient {
    /// Submit a training pipeline. Returns immediately with the queued pipeline.
    pub async fn create_training_pipeline(
        &self,
        job: &ObjectDetectionTrainingJob,
    ) -> VertexResult<TrainingPipeline> {
        let path = format!("{}/trainingPipelines", self.config().parent());
        let body = job.to_pipeline()?;

        info!(
            display_name = %job.display_name,
            dataset = %job.dataset,
            budget_milli_node_hours = job.task_inputs.budget_milli_node_hours,
            model_type = %job.task_inputs.model_type,
            "Creating training pipeline"
        );
        self.post("create_training_pipeline", &path, &body).await
    }

    pub async fn get_training_pipeline(&self, pipeline: &str) -> VertexResult<TrainingPipeline> {
        let name = self.resource_name("trainingPipelines", pipeline);
        self.get("get_training_pipeline", &name).await
    }

    /// Poll a training pipeline until it reaches a terminal state.
    ///
    /// Returns the pipeline on success and [`VertexError::TrainingFailed`]
    /// when it failed or was cancelled.
    pub async fn wait_for_training_pipeline(&self, pipeline: &str) -> VertexResult<TrainingPipeline> {
        let name = self.resource_name("trainingPipelines", pipeline);
        let started = Instant::now();
        let mut last_state = None;

        loop {
            let current = self.get_training_pipeline(&name).await?;

            if last_state != Some(current.state) {
                info!(pipeline = %name, state = %current.state, "Training pipeline state");
                last_state = Some(current.state);
            }

            match current.state {
                PipelineState::Succeeded => return Ok(current),
                PipelineState::Failed | PipelineState::Cancelled => {
                    return Err(VertexError::TrainingFailed {
                        name,
                        state: current.state.to_string(),
                        message: current
                            .error
                            .map(|e| e.message)
                            .unwrap_or_else(|| "no error details".to_string()),
                    });
                }
                _ => {}
            }

            if started.elapsed() >= self.config().operation_timeout {
                return Err(VertexError::Timeout(name));
            }

            debug!(pipeline = %name, "Training still in progress");
            tokio::time::sleep(self.config().poll_interval).await;
            record_poll("training_pipeline");
        }
    }

    /// Submit a training pipeline, wait for it, and return the trained
    /// model's resource name.
    pub async fn train_object_detection_model(
        &self,
        job: &ObjectDetectionTrainingJob,
    ) -> VertexResult<String> {
        let created = self.create_training_pipeline(job).await?;
        let name = created
            .name
            .ok_or_else(|| VertexError::invalid_response("Training pipeline has no name"))?;

        let finished = self.wait_for_training_pipeline(&name).await?;
        trained_model_name(&finished)
    }
}

/// Resource name of the model uploaded by a succeeded pipeline.
pub fn trained_model_name(pipeline: &TrainingPipeline) -> VertexResult<String> {
    pipeline
        .model_to_upload
        .as_ref()
        .and_then(|m| m.name.clone())
        .ok_or_else(|| {
            VertexError::invalid_response(format!(
                "Training pipeline {} has no uploaded model",
                pipeline.name.as_deref().unwrap_or("<unnamed>")
            ))
        })
}
