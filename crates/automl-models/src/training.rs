//! Training job inputs for AutoML image object detection.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Model variant to train.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModelType {
    /// Hosted model, default accuracy/latency trade-off.
    #[default]
    Cloud,
    #[serde(rename = "CLOUD_HIGH_ACCURACY_1")]
    CloudHighAccuracy,
    #[serde(rename = "CLOUD_LOW_LATENCY_1")]
    CloudLowLatency,
    /// Exportable edge models.
    #[serde(rename = "MOBILE_TF_LOW_LATENCY_1")]
    MobileLowLatency,
    #[serde(rename = "MOBILE_TF_VERSATILE_1")]
    MobileVersatile,
    #[serde(rename = "MOBILE_TF_HIGH_ACCURACY_1")]
    MobileHighAccuracy,
}

impl ModelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::Cloud => "CLOUD",
            ModelType::CloudHighAccuracy => "CLOUD_HIGH_ACCURACY_1",
            ModelType::CloudLowLatency => "CLOUD_LOW_LATENCY_1",
            ModelType::MobileLowLatency => "MOBILE_TF_LOW_LATENCY_1",
            ModelType::MobileVersatile => "MOBILE_TF_VERSATILE_1",
            ModelType::MobileHighAccuracy => "MOBILE_TF_HIGH_ACCURACY_1",
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ModelType {
    type Err = ModelTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "CLOUD" => Ok(ModelType::Cloud),
            "CLOUD_HIGH_ACCURACY_1" => Ok(ModelType::CloudHighAccuracy),
            "CLOUD_LOW_LATENCY_1" => Ok(ModelType::CloudLowLatency),
            "MOBILE_TF_LOW_LATENCY_1" => Ok(ModelType::MobileLowLatency),
            "MOBILE_TF_VERSATILE_1" => Ok(ModelType::MobileVersatile),
            "MOBILE_TF_HIGH_ACCURACY_1" => Ok(ModelType::MobileHighAccuracy),
            _ => Err(ModelTypeParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown model type: {0}")]
pub struct ModelTypeParseError(String);

/// Compute budget in milli node hours (1000 = one node hour).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct TrainingBudget(pub u64);

impl TrainingBudget {
    /// 20 node hours.
    pub const DEFAULT: TrainingBudget = TrainingBudget(20_000);

    pub fn from_node_hours(hours: u64) -> Self {
        Self(hours.saturating_mul(1000))
    }

    pub fn milli_node_hours(&self) -> u64 {
        self.0
    }
}

impl Default for TrainingBudget {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// `trainingTaskInputs` of an AutoML image object detection pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ObjectDetectionTaskInputs {
    pub model_type: ModelType,
    /// Encoded as a string, as the API expects for int64.
    #[serde(with = "int64_string")]
    #[schemars(with = "String")]
    pub budget_milli_node_hours: u64,
    pub disable_early_stopping: bool,
}

impl ObjectDetectionTaskInputs {
    pub fn new(model_type: ModelType, budget: TrainingBudget, disable_early_stopping: bool) -> Self {
        Self {
            model_type,
            budget_milli_node_hours: budget.milli_node_hours(),
            disable_early_stopping,
        }
    }
}

impl Default for ObjectDetectionTaskInputs {
    fn default() -> Self {
        Self::new(ModelType::default(), TrainingBudget::default(), false)
    }
}

mod int64_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(n),
            Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}
