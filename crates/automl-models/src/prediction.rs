//! Object detection prediction records and their decoding into labelled
//! pixel rectangles.
//!
//! The service returns one record per instance, with index-aligned
//! sequences: entry `i` of `bboxes`, `displayNames` and `confidences`
//! together describe one detected object. Each box is ordered
//! `[x_min, x_max, y_min, y_max]` in normalized coordinates.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bbox::PixelRect;

pub type PredictionResult<T> = Result<T, PredictionError>;

#[derive(Debug, Error, PartialEq)]
pub enum PredictionError {
    #[error(
        "Prediction sequences differ in length: {bboxes} bboxes, {names} displayNames, {confidences} confidences"
    )]
    LengthMismatch {
        bboxes: usize,
        names: usize,
        confidences: usize,
    },

    #[error("Bounding box {index} has {len} values, expected 4")]
    MalformedBox { index: usize, len: usize },

    #[error("Image dimensions must be non-zero, got {width}x{height}")]
    EmptyImage { width: u32, height: u32 },
}

/// Raw prediction for one image instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PredictionRecord {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ids: Vec<String>,
    #[serde(default)]
    pub display_names: Vec<String>,
    #[serde(default)]
    pub confidences: Vec<f64>,
    #[serde(default)]
    pub bboxes: Vec<Vec<f64>>,
}

/// A decoded detection, positioned on the source image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Detection {
    pub display_name: String,
    pub confidence: f64,
    /// Box as returned by the service.
    pub normalized: NormalizedCorners,
    pub rect: PixelRect,
    /// `"{display_name}: {confidence:.3}"`
    pub label: String,
}

/// Normalized corners exactly as returned, without range validation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NormalizedCorners {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl NormalizedCorners {
    fn to_pixels(self, width: u32, height: u32) -> PixelRect {
        let w = f64::from(width);
        let h = f64::from(height);
        PixelRect {
            x: self.x_min * w,
            y: self.y_min * h,
            width: (self.x_max - self.x_min) * w,
            height: (self.y_max - self.y_min) * h,
        }
    }
}

/// Caption drawn next to a detection.
pub fn detection_label(display_name: &str, confidence: f64) -> String {
    format!("{}: {:.3}", display_name, confidence)
}

impl PredictionRecord {
    pub fn len(&self) -> usize {
        self.bboxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bboxes.is_empty()
    }

    /// Decode every detection onto an image of `width` x `height` pixels.
    ///
    /// Output order matches the response order.
    pub fn decode(&self, width: u32, height: u32) -> PredictionResult<Vec<Detection>> {
        if width == 0 || height == 0 {
            return Err(PredictionError::EmptyImage { width, height });
        }

        let (bboxes, names, confidences) = (
            self.bboxes.len(),
            self.display_names.len(),
            self.confidences.len(),
        );
        if bboxes != names || bboxes != confidences {
            return Err(PredictionError::LengthMismatch {
                bboxes,
                names,
                confidences,
            });
        }

        self.bboxes
            .iter()
            .zip(&self.display_names)
            .zip(&self.confidences)
            .enumerate()
            .map(|(index, ((bbox, name), &confidence))| {
                let corners = match bbox.as_slice() {
                    &[x_min, x_max, y_min, y_max] => NormalizedCorners {
                        x_min,
                        x_max,
                        y_min,
                        y_max,
                    },
                    other => {
                        return Err(PredictionError::MalformedBox {
                            index,
                            len: other.len(),
                        })
                    }
                };

                Ok(Detection {
                    display_name: name.clone(),
                    confidence,
                    normalized: corners,
                    rect: corners.to_pixels(width, height),
                    label: detection_label(name, confidence),
                })
            })
            .collect()
    }
}
