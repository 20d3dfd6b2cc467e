//! One row of a bounding-box annotation manifest.
//!
//! Row layout:
//!
//! ```text
//! [SPLIT,]IMAGE_URI,[LABEL],X1,Y1,[X2],[Y2],X3,Y3,[X4],[Y4]
//! ```
//!
//! The split column may be empty or omitted entirely. An image without any
//! objects is listed once with the label and all coordinates empty.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::bbox::{BoxError, NormalizedBox};
use crate::image_format::ImageFormat;
use crate::split::DataSplit;

const COORDINATE_COLUMNS: usize = 8;

/// A parsed manifest row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnnotationRecord {
    pub split: Option<DataSplit>,
    pub image_uri: String,
    /// Object class and its box. `None` marks an image with no objects.
    pub object: Option<LabeledBox>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LabeledBox {
    pub label: String,
    pub bbox: NormalizedBox,
}

impl AnnotationRecord {
    /// Parse a row from its raw fields.
    pub fn from_fields<'a, I>(fields: I) -> Result<Self, AnnotationError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let fields: Vec<&str> = fields.into_iter().map(str::trim).collect();
        let first = fields.first().copied().unwrap_or_default();

        // Rows may start directly with the URI when no split column is present.
        let (split_field, rest) = if first.contains("://") {
            (None, &fields[..])
        } else {
            (Some(first), fields.get(1..).unwrap_or_default())
        };

        let max_columns = 2 + COORDINATE_COLUMNS;
        if rest.len() > max_columns {
            let split_columns = fields.len() - rest.len();
            return Err(AnnotationError::TooManyColumns {
                found: fields.len(),
                max: split_columns + max_columns,
            });
        }

        let split = match split_field {
            Some(s) if !s.is_empty() => Some(
                s.parse::<DataSplit>()
                    .map_err(|_| AnnotationError::InvalidSplit(s.to_string()))?,
            ),
            _ => None,
        };

        let image_uri = rest.first().copied().unwrap_or_default();
        validate_image_uri(image_uri)?;

        let label = rest.get(1).copied().unwrap_or_default();

        let mut coords = [None; COORDINATE_COLUMNS];
        for (i, slot) in coords.iter_mut().enumerate() {
            let raw = rest.get(2 + i).copied().unwrap_or_default();
            if raw.is_empty() {
                continue;
            }
            let value = raw.parse::<f64>().map_err(|_| AnnotationError::InvalidCoordinate {
                column: i,
                value: raw.to_string(),
            })?;
            *slot = Some(value);
        }

        let has_coords = coords.iter().any(Option::is_some);
        let object = match (label.is_empty(), has_coords) {
            (true, false) => None,
            (false, true) => Some(LabeledBox {
                label: label.to_string(),
                bbox: NormalizedBox::from_vertices(&coords)?,
            }),
            (false, false) => return Err(AnnotationError::LabelWithoutBox(label.to_string())),
            (true, true) => return Err(AnnotationError::BoxWithoutLabel),
        };

        Ok(Self {
            split,
            image_uri: image_uri.to_string(),
            object,
        })
    }

    /// Parse a row read by the `csv` crate.
    pub fn from_csv_record(record: &csv::StringRecord) -> Result<Self, AnnotationError> {
        Self::from_fields(record.iter())
    }

    /// True for the placeholder row of an image with no objects.
    pub fn is_empty_image(&self) -> bool {
        self.object.is_none()
    }
}

fn validate_image_uri(uri: &str) -> Result<(), AnnotationError> {
    if uri.is_empty() {
        return Err(AnnotationError::MissingUri);
    }
    Url::parse(uri).map_err(|e| AnnotationError::InvalidUri(format!("{}: {}", uri, e)))?;
    if ImageFormat::from_path(uri).is_none() {
        return Err(AnnotationError::UnsupportedFormat(uri.to_string()));
    }
    Ok(())
}

#[derive(Debug, Error, PartialEq)]
pub enum AnnotationError {
    #[error("Image URI is missing")]
    MissingUri,

    #[error("Invalid image URI: {0}")]
    InvalidUri(String),

    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid split value: {0}")]
    InvalidSplit(String),

    #[error("Invalid coordinate in column {column}: {value}")]
    InvalidCoordinate { column: usize, value: String },

    #[error("Invalid bounding box: {0}")]
    Box(#[from] BoxError),

    #[error("Label {0:?} has no bounding box")]
    LabelWithoutBox(String),

    #[error("Bounding box has no label")]
    BoxWithoutLabel,

    #[error("Row has {found} columns, expected at most {max}")]
    TooManyColumns { found: usize, max: usize },
}
