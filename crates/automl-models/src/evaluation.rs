//! Object detection evaluation metrics as reported by the service.
//!
//! Metrics are computed remotely; this module only reads them.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// IoU thresholds closer than this are considered equal.
const IOU_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImageObjectDetectionMetrics {
    #[serde(default)]
    pub bounding_box_metrics: Vec<BoundingBoxMetrics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_box_mean_average_precision: Option<f64>,
    /// int64 fields arrive as JSON strings; plain numbers are accepted too.
    #[serde(
        default,
        deserialize_with = "de_int64",
        skip_serializing_if = "Option::is_none"
    )]
    pub evaluated_bounding_box_count: Option<u64>,
}

fn de_int64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Int64 {
        Number(u64),
        Text(String),
    }

    match Option::<Int64>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Int64::Number(n)) => Ok(Some(n)),
        Some(Int64::Text(s)) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

/// Metrics at one IoU threshold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBoxMetrics {
    #[serde(default)]
    pub iou_threshold: f64,
    /// Absent when no prediction reached the IoU threshold.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean_average_precision: Option<f64>,
    #[serde(default)]
    pub confidence_metrics: Vec<ConfidenceMetrics>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceMetrics {
    #[serde(default)]
    pub confidence_threshold: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recall: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub f1_score: Option<f64>,
}

/// Outcome of looking up mAP at one IoU threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MapLookup {
    Found { iou_threshold: f64, mean_average_precision: f64 },
    /// The threshold was evaluated but produced no mAP (threshold too strict).
    Missing { iou_threshold: f64 },
    /// The threshold is not among the evaluated ones.
    NotEvaluated { iou_threshold: f64 },
}

impl ImageObjectDetectionMetrics {
    /// Parse the free-form `metrics` object of a model evaluation.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value.clone())
    }

    /// Metrics entry for the given IoU threshold.
    pub fn at_iou(&self, iou_threshold: f64) -> Option<&BoundingBoxMetrics> {
        self.bounding_box_metrics
            .iter()
            .find(|m| (m.iou_threshold - iou_threshold).abs() < IOU_EPSILON)
    }

    pub fn mean_average_precision_at(&self, iou_threshold: f64) -> MapLookup {
        match self.at_iou(iou_threshold) {
            Some(BoundingBoxMetrics {
                mean_average_precision: Some(map),
                ..
            }) => MapLookup::Found {
                iou_threshold,
                mean_average_precision: *map,
            },
            Some(_) => MapLookup::Missing { iou_threshold },
            None => MapLookup::NotEvaluated { iou_threshold },
        }
    }

    /// Evaluated IoU thresholds in report order.
    pub fn iou_thresholds(&self) -> Vec<f64> {
        self.bounding_box_metrics
            .iter()
            .map(|m| m.iou_threshold)
            .collect()
    }
}
