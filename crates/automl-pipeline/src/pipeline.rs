//! Sequential object detection workflow.
//!
//! Steps run strictly one after another, each awaiting its remote call and
//! any polling before the next starts:
//! create dataset, import annotations, train, evaluate, deploy, predict and
//! an optional cleanup of everything the run created.

use std::fmt;
use std::future::Future;
use std::time::Instant;

use automl_client::{
    trained_model_name, ObjectDetectionTrainingJob, VertexClient, BOUNDING_BOX_IMPORT_SCHEMA,
};
use automl_models::{Manifest, MapLookup};
use serde::{Deserialize, Serialize};
use tracing::{info, warn, Instrument};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::logging::StepLogger;
use crate::payload::ImagePayload;
use crate::report::{EvaluationSummary, PipelineReport, StepStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStep {
    CreateDataset,
    ImportData,
    TrainModel,
    Evaluate,
    Deploy,
    Predict,
    Cleanup,
}

impl PipelineStep {
    pub const ALL: &'static [PipelineStep] = &[
        PipelineStep::CreateDataset,
        PipelineStep::ImportData,
        PipelineStep::TrainModel,
        PipelineStep::Evaluate,
        PipelineStep::Deploy,
        PipelineStep::Predict,
        PipelineStep::Cleanup,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStep::CreateDataset => "create_dataset",
            PipelineStep::ImportData => "import_data",
            PipelineStep::TrainModel => "train_model",
            PipelineStep::Evaluate => "evaluate",
            PipelineStep::Deploy => "deploy",
            PipelineStep::Predict => "predict",
            PipelineStep::Cleanup => "cleanup",
        }
    }
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resources created by this run, as opposed to ones supplied up front.
#[derive(Debug, Default)]
struct Created {
    dataset: Option<String>,
    model: Option<String>,
    endpoint: Option<String>,
    deployed_model_id: Option<String>,
}

/// Runs the workflow against Vertex AI.
pub struct Pipeline {
    client: VertexClient,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(client: VertexClient, config: PipelineConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every step and return the report.
    ///
    /// Cleanup runs after a failed step as well; the step error is what gets
    /// returned. The report is written to the configured path either way.
    pub async fn run(&self) -> PipelineResult<PipelineReport> {
        let mut report = PipelineReport::new(&self.config.display_name);
        let mut created = Created::default();

        let steps = self.run_steps(&mut report, &mut created).await;
        let cleanup = if self.config.cleanup {
            self.timed(PipelineStep::Cleanup, &mut report, |logger| {
                self.cleanup(&created, logger)
            })
            .await
        } else {
            StepLogger::new(&self.config.display_name, PipelineStep::Cleanup)
                .log_skipped("AUTOML_CLEANUP not set");
            report.record_step(PipelineStep::Cleanup, StepStatus::Skipped, 0);
            Ok(())
        };

        let result = match (steps, cleanup) {
            (Ok(()), cleanup) => cleanup,
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(cleanup_err)) => {
                warn!(error = %cleanup_err, "Cleanup after failed step also failed");
                Err(e)
            }
        };

        report.finished_at = Some(chrono::Utc::now());
        if let Err(e) = &result {
            report.error = Some(e.to_string());
        }

        if let Some(path) = &self.config.report_path {
            match report.write_to(path).await {
                Ok(()) => info!(path = %path.display(), "Wrote pipeline report"),
                Err(write_err) if result.is_err() => {
                    warn!(
                        path = %path.display(),
                        error = %write_err,
                        "Failed to write pipeline report"
                    );
                }
                Err(write_err) => return Err(write_err),
            }
        }

        result.map(|_| report)
    }

    async fn run_steps(
        &self,
        report: &mut PipelineReport,
        created: &mut Created,
    ) -> PipelineResult<()> {
        if let Some(path) = &self.config.local_manifest {
            let manifest = Manifest::from_path(path)?;
            let stats = manifest.stats();
            info!(
                images = stats.images,
                annotations = stats.annotations,
                empty_images = stats.empty_images,
                labels = stats.labels.len(),
                "Manifest pre-flight passed"
            );
            report.manifest = Some(stats);
        }

        let model = match &self.config.model_id {
            Some(model) => {
                for step in [
                    PipelineStep::CreateDataset,
                    PipelineStep::ImportData,
                    PipelineStep::TrainModel,
                ] {
                    self.skip(step, "AUTOML_MODEL_ID supplied", report);
                }
                self.client.resource_name("models", model)
            }
            None => {
                let dataset = self.dataset_steps(report, created).await?;
                report.dataset = Some(dataset.clone());

                let model = self
                    .timed(PipelineStep::TrainModel, report, |logger| {
                        self.train(&dataset, logger)
                    })
                    .await?;
                created.model = Some(model.clone());
                model
            }
        };
        report.model = Some(model.clone());

        let evaluation = self
            .timed(PipelineStep::Evaluate, report, |logger| {
                self.evaluate(&model, logger)
            })
            .await?;
        report.evaluation = evaluation;

        let endpoint = match &self.config.endpoint_id {
            Some(endpoint) => {
                self.skip(PipelineStep::Deploy, "AUTOML_ENDPOINT_ID supplied", report);
                self.client.resource_name("endpoints", endpoint)
            }
            None => {
                let (endpoint, deployed_model_id) = self
                    .timed(PipelineStep::Deploy, report, |logger| {
                        self.deploy(&model, logger)
                    })
                    .await?;
                created.endpoint = Some(endpoint.clone());
                created.deployed_model_id = Some(deployed_model_id.clone());
                report.deployed_model_id = Some(deployed_model_id);
                endpoint
            }
        };
        report.endpoint = Some(endpoint.clone());

        match &self.config.predict_image {
            Some(image) => {
                let detections = self
                    .timed(PipelineStep::Predict, report, |logger| {
                        self.predict(&endpoint, image, logger)
                    })
                    .await?;
                report.detections = detections;
            }
            None => self.skip(PipelineStep::Predict, "AUTOML_PREDICT_IMAGE not set", report),
        }

        Ok(())
    }

    async fn dataset_steps(
        &self,
        report: &mut PipelineReport,
        created: &mut Created,
    ) -> PipelineResult<String> {
        let dataset = match &self.config.dataset_id {
            Some(dataset) => {
                self.skip(PipelineStep::CreateDataset, "AUTOML_DATASET_ID supplied", report);
                self.client.resource_name("datasets", dataset)
            }
            None => {
                let dataset = self
                    .timed(PipelineStep::CreateDataset, report, |logger| {
                        self.create_dataset(logger)
                    })
                    .await?;
                created.dataset = Some(dataset.clone());
                dataset
            }
        };

        match &self.config.manifest_uri {
            Some(uri) => {
                self.timed(PipelineStep::ImportData, report, |logger| {
                    self.import(&dataset, uri, logger)
                })
                .await?;
            }
            None => self.skip(PipelineStep::ImportData, "AUTOML_MANIFEST_URI not set", report),
        }

        Ok(dataset)
    }

    async fn create_dataset(&self, logger: StepLogger) -> PipelineResult<String> {
        let dataset = self
            .client
            .create_dataset_and_wait(&self.config.dataset_display_name())
            .await?;
        let name = dataset
            .name
            .ok_or_else(|| PipelineError::missing_resource("Created dataset has no name"))?;
        logger.log_completion(&format!("dataset {}", name));
        Ok(name)
    }

    async fn import(&self, dataset: &str, uri: &str, logger: StepLogger) -> PipelineResult<()> {
        logger.log_progress(&format!("importing {} into {}", uri, dataset));
        self.client
            .import_data_and_wait(dataset, &[uri.to_string()], BOUNDING_BOX_IMPORT_SCHEMA)
            .await?;
        logger.log_completion("annotations imported");
        Ok(())
    }

    async fn train(&self, dataset: &str, logger: StepLogger) -> PipelineResult<String> {
        let job = ObjectDetectionTrainingJob {
            display_name: self.config.training_display_name(),
            model_display_name: self.config.model_display_name(),
            dataset: dataset.to_string(),
            fraction_split: self.config.fraction_split,
            task_inputs: self.config.task_inputs.clone(),
        };

        let pipeline = self.client.create_training_pipeline(&job).await?;
        let pipeline_name = pipeline
            .name
            .ok_or_else(|| PipelineError::missing_resource("Training pipeline has no name"))?;
        logger.log_progress(&format!(
            "training pipeline {} submitted, budget {} milli node hours",
            pipeline_name, job.task_inputs.budget_milli_node_hours
        ));

        let finished = self.client.wait_for_training_pipeline(&pipeline_name).await?;
        let model = trained_model_name(&finished)?;
        logger.log_completion(&format!("model {}", model));
        Ok(model)
    }

    async fn evaluate(
        &self,
        model: &str,
        logger: StepLogger,
    ) -> PipelineResult<Option<EvaluationSummary>> {
        let evaluations = self.client.list_model_evaluations(model).await?;
        let Some(evaluation) = evaluations.first() else {
            logger.log_warning("model has no evaluations");
            return Ok(None);
        };

        let metrics = evaluation.object_detection_metrics()?;
        let at_iou = metrics.mean_average_precision_at(self.config.iou_threshold);

        match at_iou {
            MapLookup::Found {
                iou_threshold,
                mean_average_precision,
            } => logger.log_progress(&format!(
                "mean average precision at IoU {}: {:.3}",
                iou_threshold, mean_average_precision
            )),
            MapLookup::Missing { iou_threshold } => logger.log_progress(&format!(
                "no mean average precision at IoU {}; the threshold is too strict for this model",
                iou_threshold
            )),
            MapLookup::NotEvaluated { iou_threshold } => logger.log_progress(&format!(
                "IoU {} was not evaluated; available thresholds: {:?}",
                iou_threshold,
                metrics.iou_thresholds()
            )),
        }

        if let Some(map) = metrics.bounding_box_mean_average_precision {
            logger.log_completion(&format!("overall mean average precision {:.3}", map));
        } else {
            logger.log_completion("no overall mean average precision reported");
        }

        Ok(Some(EvaluationSummary {
            evaluation: evaluation.name.clone(),
            mean_average_precision: metrics.bounding_box_mean_average_precision,
            at_iou,
            evaluated_bounding_box_count: metrics.evaluated_bounding_box_count,
            iou_thresholds: metrics.iou_thresholds(),
        }))
    }

    async fn deploy(&self, model: &str, logger: StepLogger) -> PipelineResult<(String, String)> {
        let endpoint = self
            .client
            .create_endpoint_and_wait(&self.config.endpoint_display_name())
            .await?;
        let endpoint = endpoint
            .name
            .ok_or_else(|| PipelineError::missing_resource("Created endpoint has no name"))?;
        logger.log_progress(&format!("endpoint {} created", endpoint));

        let deployed_model_id = self
            .client
            .deploy_model_and_wait(
                &endpoint,
                model,
                &self.config.deployed_model_display_name(),
                self.config.resources,
            )
            .await?;
        logger.log_completion(&format!(
            "model deployed to {} as {}",
            endpoint, deployed_model_id
        ));
        Ok((endpoint, deployed_model_id))
    }

    async fn predict(
        &self,
        endpoint: &str,
        image: &std::path::Path,
        logger: StepLogger,
    ) -> PipelineResult<Vec<automl_models::Detection>> {
        let payload = ImagePayload::from_path(image).await?;
        logger.log_progress(&format!(
            "sending {} ({}x{}, {} bytes, {})",
            payload.path.display(),
            payload.width,
            payload.height,
            payload.size_bytes(),
            payload.format
        ));

        let response = self
            .client
            .predict(endpoint, vec![payload.to_instance()], self.config.prediction)
            .await?;

        let mut detections = Vec::new();
        for record in &response.predictions {
            detections.extend(record.decode(payload.width, payload.height)?);
        }

        for detection in &detections {
            logger.log_progress(&format!(
                "{} at ({:.1}, {:.1}) size {:.1}x{:.1}",
                detection.label,
                detection.rect.x,
                detection.rect.y,
                detection.rect.width,
                detection.rect.height
            ));
        }
        logger.log_completion(&format!("{} detections", detections.len()));
        Ok(detections)
    }

    /// Tear down only what this run created, serving resources first.
    async fn cleanup(&self, created: &Created, logger: StepLogger) -> PipelineResult<()> {
        if let Some(endpoint) = &created.endpoint {
            if let Some(id) = &created.deployed_model_id {
                self.client.undeploy_model_and_wait(endpoint, id).await?;
            }
            self.client.delete_endpoint(endpoint).await?;
            logger.log_progress(&format!("deleted endpoint {}", endpoint));
        }
        if let Some(model) = &created.model {
            self.client.delete_model(model).await?;
            logger.log_progress(&format!("deleted model {}", model));
        }
        if let Some(dataset) = &created.dataset {
            self.client.delete_dataset(dataset).await?;
            logger.log_progress(&format!("deleted dataset {}", dataset));
        }
        logger.log_completion("created resources removed");
        Ok(())
    }

    fn skip(&self, step: PipelineStep, reason: &str, report: &mut PipelineReport) {
        StepLogger::new(&self.config.display_name, step).log_skipped(reason);
        report.record_step(step, StepStatus::Skipped, 0);
    }

    /// Run one step inside its span and record how long it took.
    async fn timed<T, F, Fut>(
        &self,
        step: PipelineStep,
        report: &mut PipelineReport,
        f: F,
    ) -> PipelineResult<T>
    where
        F: FnOnce(StepLogger) -> Fut,
        Fut: Future<Output = PipelineResult<T>>,
    {
        let logger = StepLogger::new(&self.config.display_name, step);
        let span = logger.create_span();
        logger.log_start(step.as_str());

        let started = Instant::now();
        let result = f(logger.clone()).instrument(span).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(_) => report.record_step(step, StepStatus::Completed, elapsed_ms),
            Err(e) => {
                logger.log_error(&e.to_string());
                report.record_step(step, StepStatus::Failed, elapsed_ms);
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_names() {
        let names: Vec<_> = PipelineStep::ALL.iter().map(|s| s.to_string()).collect();
        assert_eq!(
            names,
            [
                "create_dataset",
                "import_data",
                "train_model",
                "evaluate",
                "deploy",
                "predict",
                "cleanup"
            ]
        );
        assert_eq!(
            serde_json::to_value(PipelineStep::TrainModel).unwrap(),
            "train_model"
        );
    }
}
