//! Annotation manifests grouped per image.
//!
//! A manifest lists one row per bounding box. Rows sharing an image URI are
//! folded into a single [`ImageAnnotations`] entry, in the order the image
//! first appears.

use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::path::Path;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::annotation::{AnnotationError, AnnotationRecord, LabeledBox};
use crate::split::DataSplit;

/// Data item label carrying the split in the JSONL import format.
pub const ML_USE_LABEL: &str = "aiplatform.googleapis.com/ml_use";

pub type ManifestResult<T> = Result<T, ManifestError>;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Line {line}: {source}")]
    InvalidRow {
        line: u64,
        #[source]
        source: AnnotationError,
    },

    #[error("Line {line}: image {uri} already assigned to a different split")]
    ConflictingSplit { line: u64, uri: String },

    #[error("Manifest contains no rows")]
    Empty,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// All annotations of one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ImageAnnotations {
    pub image_uri: String,
    pub split: Option<DataSplit>,
    pub objects: Vec<LabeledBox>,
}

/// A parsed manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Manifest {
    pub images: Vec<ImageAnnotations>,
}

/// Summary counts for a manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ManifestStats {
    pub images: usize,
    pub annotations: usize,
    pub empty_images: usize,
    pub labels: BTreeMap<String, usize>,
    /// Images per split; images without a split are counted under "DEFAULT".
    pub splits: BTreeMap<String, usize>,
}

impl Manifest {
    /// Parse a CSV manifest. Headers are not expected.
    pub fn from_reader<R: Read>(reader: R) -> ManifestResult<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut manifest = Manifest::default();
        let mut index: HashMap<String, usize> = HashMap::new();

        for result in csv_reader.records() {
            let record = result?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);

            let row = AnnotationRecord::from_csv_record(&record)
                .map_err(|source| ManifestError::InvalidRow { line, source })?;

            manifest.push_row(row, line, &mut index)?;
        }

        if manifest.images.is_empty() {
            return Err(ManifestError::Empty);
        }
        Ok(manifest)
    }

    /// Parse a CSV manifest from a local file.
    pub fn from_path(path: impl AsRef<Path>) -> ManifestResult<Self> {
        let file = std::fs::File::open(path).map_err(csv::Error::from)?;
        Self::from_reader(file)
    }

    fn push_row(
        &mut self,
        row: AnnotationRecord,
        line: u64,
        index: &mut HashMap<String, usize>,
    ) -> ManifestResult<()> {
        let AnnotationRecord {
            split,
            image_uri,
            object,
        } = row;

        match index.get(&image_uri) {
            Some(&pos) => {
                let image = &mut self.images[pos];
                match (image.split, split) {
                    (Some(existing), Some(new)) if existing != new => {
                        return Err(ManifestError::ConflictingSplit {
                            line,
                            uri: image_uri,
                        });
                    }
                    (None, Some(new)) => image.split = Some(new),
                    _ => {}
                }
                image.objects.extend(object);
            }
            None => {
                index.insert(image_uri.clone(), self.images.len());
                self.images.push(ImageAnnotations {
                    image_uri,
                    split,
                    objects: object.into_iter().collect(),
                });
            }
        }
        Ok(())
    }

    /// Look up an image by URI.
    pub fn image(&self, uri: &str) -> Option<&ImageAnnotations> {
        self.images.iter().find(|image| image.image_uri == uri)
    }

    pub fn stats(&self) -> ManifestStats {
        let mut stats = ManifestStats {
            images: self.images.len(),
            ..Default::default()
        };

        for image in &self.images {
            if image.objects.is_empty() {
                stats.empty_images += 1;
            }
            stats.annotations += image.objects.len();
            for object in &image.objects {
                *stats.labels.entry(object.label.clone()).or_default() += 1;
            }
            let split = image
                .split
                .map(|s| s.as_str().to_string())
                .unwrap_or_else(|| "DEFAULT".to_string());
            *stats.splits.entry(split).or_default() += 1;
        }
        stats
    }

    /// Render the manifest in the service's JSONL import format, one image
    /// per line.
    pub fn to_jsonl(&self) -> ManifestResult<String> {
        let mut out = String::new();
        for image in &self.images {
            let line = JsonlImage::from(image);
            out.push_str(&serde_json::to_string(&line)?);
            out.push('\n');
        }
        Ok(out)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonlImage<'a> {
    image_gcs_uri: &'a str,
    bounding_box_annotations: Vec<JsonlBox<'a>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    data_item_resource_labels: BTreeMap<&'static str, &'static str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonlBox<'a> {
    display_name: &'a str,
    x_min: f64,
    y_min: f64,
    x_max: f64,
    y_max: f64,
}

impl<'a> From<&'a ImageAnnotations> for JsonlImage<'a> {
    fn from(image: &'a ImageAnnotations) -> Self {
        let mut labels = BTreeMap::new();
        if let Some(ml_use) = image.split.and_then(|s| s.ml_use()) {
            labels.insert(ML_USE_LABEL, ml_use);
        }

        Self {
            image_gcs_uri: &image.image_uri,
            bounding_box_annotations: image
                .objects
                .iter()
                .map(|o| JsonlBox {
                    display_name: &o.label,
                    x_min: o.bbox.x_min,
                    y_min: o.bbox.y_min,
                    x_max: o.bbox.x_max,
                    y_max: o.bbox.y_max,
                })
                .collect(),
            data_item_resource_labels: labels,
        }
    }
}
