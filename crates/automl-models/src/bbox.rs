//! Normalized bounding boxes and their pixel-space projection.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An axis-aligned box with coordinates as fractions (0.0 to 1.0) of the
/// image width and height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedBox {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

impl NormalizedBox {
    /// Create a box, checking that every coordinate is in [0, 1] and that
    /// the box has a positive extent on both axes.
    pub fn new(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Result<Self, BoxError> {
        for value in [x_min, y_min, x_max, y_max] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(BoxError::OutOfRange(value));
            }
        }
        if x_min >= x_max {
            return Err(BoxError::Degenerate { axis: 'x', min: x_min, max: x_max });
        }
        if y_min >= y_max {
            return Err(BoxError::Degenerate { axis: 'y', min: y_min, max: y_max });
        }
        Ok(Self { x_min, y_min, x_max, y_max })
    }

    /// Build a box from the eight manifest coordinate columns.
    ///
    /// Two layouts are accepted:
    /// - diagonal corners: `x_min,y_min,,,x_max,y_max,,`
    /// - all four corners: `x1,y1,x2,y2,x3,y3,x4,y4`, reduced to their hull
    pub fn from_vertices(coords: &[Option<f64>; 8]) -> Result<Self, BoxError> {
        match coords {
            [Some(x1), Some(y1), None, None, Some(x3), Some(y3), None, None] => {
                Self::new(*x1, *y1, *x3, *y3)
            }
            [Some(x1), Some(y1), Some(x2), Some(y2), Some(x3), Some(y3), Some(x4), Some(y4)] => {
                let xs = [*x1, *x2, *x3, *x4];
                let ys = [*y1, *y2, *y3, *y4];
                Self::new(
                    xs.iter().copied().fold(f64::INFINITY, f64::min),
                    ys.iter().copied().fold(f64::INFINITY, f64::min),
                    xs.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                    ys.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                )
            }
            _ => Err(BoxError::VertexLayout),
        }
    }

    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }

    /// Project onto an image of the given pixel size.
    pub fn to_pixels(&self, image_width: u32, image_height: u32) -> PixelRect {
        let w = f64::from(image_width);
        let h = f64::from(image_height);
        PixelRect {
            x: self.x_min * w,
            y: self.y_min * h,
            width: self.width() * w,
            height: self.height() * h,
        }
    }
}

/// A rectangle in pixel space: top-left origin plus extent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PixelRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Error, PartialEq)]
pub enum BoxError {
    #[error("Coordinate {0} is outside [0, 1]")]
    OutOfRange(f64),

    #[error("Box has no extent on {axis} axis ({min} >= {max})")]
    Degenerate { axis: char, min: f64, max: f64 },

    #[error("Expected either 2 diagonal vertices or 4 vertices")]
    VertexLayout,
}
