//! Pipeline configuration.

use std::path::PathBuf;
use std::str::FromStr;

use automl_client::{AutomaticResources, PredictionParameters};
use automl_models::{FractionSplit, ModelType, ObjectDetectionTaskInputs, TrainingBudget};

use crate::error::{PipelineError, PipelineResult};

/// Workflow configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Prefix for the display names of every created resource
    pub display_name: String,
    /// Annotation manifest in Cloud Storage
    pub manifest_uri: Option<String>,
    /// Local copy of the manifest, parsed before import when set
    pub local_manifest: Option<PathBuf>,
    /// Existing dataset; skips dataset creation
    pub dataset_id: Option<String>,
    /// Existing model; skips dataset creation, import and training
    pub model_id: Option<String>,
    /// Existing endpoint serving the model; skips deployment
    pub endpoint_id: Option<String>,
    pub fraction_split: FractionSplit,
    pub task_inputs: ObjectDetectionTaskInputs,
    /// IoU threshold whose mAP is reported
    pub iou_threshold: f64,
    /// Local image sent to the endpoint; no prediction when unset
    pub predict_image: Option<PathBuf>,
    pub prediction: PredictionParameters,
    pub resources: AutomaticResources,
    /// Delete the resources this run created once it finishes
    pub cleanup: bool,
    /// Where the JSON run report is written
    pub report_path: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            display_name: "automl-object-detection".to_string(),
            manifest_uri: None,
            local_manifest: None,
            dataset_id: None,
            model_id: None,
            endpoint_id: None,
            fraction_split: FractionSplit::default(),
            task_inputs: ObjectDetectionTaskInputs::default(),
            iou_threshold: 0.5,
            predict_image: None,
            prediction: PredictionParameters::default(),
            resources: AutomaticResources::default(),
            cleanup: false,
            report_path: None,
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> PipelineResult<Self> {
        let defaults = Self::default();

        let model_type = match env_opt("AUTOML_MODEL_TYPE") {
            Some(s) => ModelType::from_str(&s).map_err(|e| PipelineError::config_error(e.to_string()))?,
            None => defaults.task_inputs.model_type,
        };
        let budget = TrainingBudget(env_parse(
            "AUTOML_BUDGET_MILLI_NODE_HOURS",
            TrainingBudget::DEFAULT.milli_node_hours(),
        ));

        let fraction_split = FractionSplit::new(
            env_parse("AUTOML_TRAINING_FRACTION", defaults.fraction_split.training_fraction),
            env_parse("AUTOML_VALIDATION_FRACTION", defaults.fraction_split.validation_fraction),
            env_parse("AUTOML_TEST_FRACTION", defaults.fraction_split.test_fraction),
        )
        .map_err(|e| PipelineError::config_error(e.to_string()))?;

        let config = Self {
            display_name: env_opt("AUTOML_DISPLAY_NAME").unwrap_or(defaults.display_name),
            manifest_uri: env_opt("AUTOML_MANIFEST_URI"),
            local_manifest: env_opt("AUTOML_LOCAL_MANIFEST").map(PathBuf::from),
            dataset_id: env_opt("AUTOML_DATASET_ID"),
            model_id: env_opt("AUTOML_MODEL_ID"),
            endpoint_id: env_opt("AUTOML_ENDPOINT_ID"),
            fraction_split,
            task_inputs: ObjectDetectionTaskInputs::new(
                model_type,
                budget,
                env_bool("AUTOML_DISABLE_EARLY_STOPPING", false),
            ),
            iou_threshold: env_parse("AUTOML_IOU_THRESHOLD", defaults.iou_threshold),
            predict_image: env_opt("AUTOML_PREDICT_IMAGE").map(PathBuf::from),
            prediction: PredictionParameters {
                confidence_threshold: env_parse(
                    "AUTOML_CONFIDENCE_THRESHOLD",
                    defaults.prediction.confidence_threshold,
                ),
                max_predictions: env_parse(
                    "AUTOML_MAX_PREDICTIONS",
                    defaults.prediction.max_predictions,
                ),
            },
            resources: AutomaticResources {
                min_replica_count: env_parse(
                    "AUTOML_MIN_REPLICAS",
                    defaults.resources.min_replica_count,
                ),
                max_replica_count: env_parse(
                    "AUTOML_MAX_REPLICAS",
                    defaults.resources.max_replica_count,
                ),
            },
            cleanup: env_bool("AUTOML_CLEANUP", false),
            report_path: env_opt("AUTOML_REPORT_PATH").map(PathBuf::from),
        };

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> PipelineResult<()> {
        if self.display_name.trim().is_empty() {
            return Err(PipelineError::config_error("AUTOML_DISPLAY_NAME cannot be empty"));
        }

        if self.model_id.is_none() && self.dataset_id.is_none() && self.manifest_uri.is_none() {
            return Err(PipelineError::config_error(
                "AUTOML_MANIFEST_URI is required unless AUTOML_DATASET_ID or AUTOML_MODEL_ID is set",
            ));
        }

        if let Some(uri) = &self.manifest_uri {
            if !uri.starts_with("gs://") {
                return Err(PipelineError::config_error(format!(
                    "AUTOML_MANIFEST_URI must be a gs:// URI, got {}",
                    uri
                )));
            }
        }

        if !(0.0..=1.0).contains(&self.iou_threshold) {
            return Err(PipelineError::config_error(format!(
                "AUTOML_IOU_THRESHOLD must be in [0, 1], got {}",
                self.iou_threshold
            )));
        }

        if !(0.0..=1.0).contains(&self.prediction.confidence_threshold) {
            return Err(PipelineError::config_error(format!(
                "AUTOML_CONFIDENCE_THRESHOLD must be in [0, 1], got {}",
                self.prediction.confidence_threshold
            )));
        }

        if self.prediction.max_predictions == 0 {
            return Err(PipelineError::config_error("AUTOML_MAX_PREDICTIONS must be positive"));
        }

        if self.resources.min_replica_count == 0
            || self.resources.max_replica_count < self.resources.min_replica_count
        {
            return Err(PipelineError::config_error(format!(
                "Invalid replica counts: min={} max={}",
                self.resources.min_replica_count, self.resources.max_replica_count
            )));
        }

        Ok(())
    }

    pub fn dataset_display_name(&self) -> String {
        format!("{}-dataset", self.display_name)
    }

    pub fn training_display_name(&self) -> String {
        format!("{}-training", self.display_name)
    }

    pub fn model_display_name(&self) -> String {
        format!("{}-model", self.display_name)
    }

    pub fn endpoint_display_name(&self) -> String {
        format!("{}-endpoint", self.display_name)
    }

    pub fn deployed_model_display_name(&self) -> String {
        format!("{}-deployed", self.display_name)
    }
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T: FromStr>(name: &str, default: T) -> T {
    env_opt(name).and_then(|s| s.parse().ok()).unwrap_or(default)
}

fn env_bool(name: &str, default: bool) -> bool {
    env_opt(name)
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "AUTOML_DISPLAY_NAME",
        "AUTOML_MANIFEST_URI",
        "AUTOML_LOCAL_MANIFEST",
        "AUTOML_DATASET_ID",
        "AUTOML_MODEL_ID",
        "AUTOML_ENDPOINT_ID",
        "AUTOML_MODEL_TYPE",
        "AUTOML_BUDGET_MILLI_NODE_HOURS",
        "AUTOML_TRAINING_FRACTION",
        "AUTOML_VALIDATION_FRACTION",
        "AUTOML_TEST_FRACTION",
        "AUTOML_DISABLE_EARLY_STOPPING",
        "AUTOML_IOU_THRESHOLD",
        "AUTOML_PREDICT_IMAGE",
        "AUTOML_CONFIDENCE_THRESHOLD",
        "AUTOML_MAX_PREDICTIONS",
        "AUTOML_MIN_REPLICAS",
        "AUTOML_MAX_REPLICAS",
        "AUTOML_CLEANUP",
        "AUTOML_REPORT_PATH",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_requires_a_data_source() {
        clear_env();
        assert!(matches!(
            PipelineConfig::from_env(),
            Err(PipelineError::ConfigError(_))
        ));

        std::env::set_var("AUTOML_MODEL_ID", "7");
        assert!(PipelineConfig::from_env().is_ok());
        clear_env();
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();
        std::env::set_var("AUTOML_MANIFEST_URI", "gs://bucket/salads.csv");
        let config = PipelineConfig::from_env().unwrap();

        assert_eq!(config.fraction_split, FractionSplit::default());
        assert_eq!(config.task_inputs.budget_milli_node_hours, 20_000);
        assert_eq!(config.task_inputs.model_type, ModelType::Cloud);
        assert!(!config.task_inputs.disable_early_stopping);
        assert_eq!(config.prediction.confidence_threshold, 0.5);
        assert_eq!(config.iou_threshold, 0.5);
        assert!(!config.cleanup);
        assert_eq!(config.model_display_name(), "automl-object-detection-model");
        clear_env();
    }

    #[test]
    #[serial]
    fn test_overrides_and_fallbacks() {
        clear_env();
        std::env::set_var("AUTOML_MANIFEST_URI", "gs://bucket/salads.csv");
        std::env::set_var("AUTOML_MODEL_TYPE", "cloud_high_accuracy_1");
        std::env::set_var("AUTOML_BUDGET_MILLI_NODE_HOURS", "not-a-number");
        std::env::set_var("AUTOML_DISABLE_EARLY_STOPPING", "true");
        std::env::set_var("AUTOML_CLEANUP", "1");
        std::env::set_var("AUTOML_MAX_PREDICTIONS", "10");

        let config = PipelineConfig::from_env().unwrap();
        assert_eq!(config.task_inputs.model_type, ModelType::CloudHighAccuracy);
        assert_eq!(config.task_inputs.budget_milli_node_hours, 20_000);
        assert!(config.task_inputs.disable_early_stopping);
        assert!(config.cleanup);
        assert_eq!(config.prediction.max_predictions, 10);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_rejects_invalid_values() {
        clear_env();
        std::env::set_var("AUTOML_MANIFEST_URI", "https://bucket/salads.csv");
        assert!(PipelineConfig::from_env().is_err());

        std::env::set_var("AUTOML_MANIFEST_URI", "gs://bucket/salads.csv");
        std::env::set_var("AUTOML_TRAINING_FRACTION", "0.9");
        assert!(PipelineConfig::from_env().is_err());
        std::env::remove_var("AUTOML_TRAINING_FRACTION");

        std::env::set_var("AUTOML_CONFIDENCE_THRESHOLD", "1.5");
        assert!(PipelineConfig::from_env().is_err());
        std::env::remove_var("AUTOML_CONFIDENCE_THRESHOLD");

        std::env::set_var("AUTOML_MODEL_TYPE", "gigantic");
        assert!(PipelineConfig::from_env().is_err());
        clear_env();
    }

    #[test]
    fn test_replica_bounds() {
        let mut config = PipelineConfig {
            manifest_uri: Some("gs://bucket/salads.csv".into()),
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        config.resources = AutomaticResources {
            min_replica_count: 3,
            max_replica_count: 2,
        };
        assert!(config.validate().is_err());
    }
}
