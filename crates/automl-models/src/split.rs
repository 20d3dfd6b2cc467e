//! Dataset split assignment.
//!
//! Each annotation row may pin its image to one of the dataset splits. Rows
//! without a split leave the assignment to the service, which then applies
//! the fractions configured on the training job (80/10/10 by default).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Split an image is assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataSplit {
    /// Used to fit the model.
    Train,
    /// Used for hyperparameter tuning and early stopping.
    Validate,
    /// Held out for evaluation.
    Test,
    /// Explicitly left for the service to assign.
    Unassigned,
}

impl DataSplit {
    /// All split values.
    pub const ALL: &'static [DataSplit] = &[
        DataSplit::Train,
        DataSplit::Validate,
        DataSplit::Test,
        DataSplit::Unassigned,
    ];

    /// Returns the manifest spelling of the split.
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSplit::Train => "TRAIN",
            DataSplit::Validate => "VALIDATE",
            DataSplit::Test => "TEST",
            DataSplit::Unassigned => "UNASSIGNED",
        }
    }

    /// Value of the `aiplatform.googleapis.com/ml_use` data item label.
    ///
    /// `Unassigned` has no label; the service assigns those images itself.
    pub fn ml_use(&self) -> Option<&'static str> {
        match self {
            DataSplit::Train => Some("training"),
            DataSplit::Validate => Some("validation"),
            DataSplit::Test => Some("test"),
            DataSplit::Unassigned => None,
        }
    }
}

impl fmt::Display for DataSplit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DataSplit {
    type Err = DataSplitParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "train" | "training" => Ok(DataSplit::Train),
            "validate" | "validation" => Ok(DataSplit::Validate),
            "test" => Ok(DataSplit::Test),
            "unassigned" => Ok(DataSplit::Unassigned),
            _ => Err(DataSplitParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown data split: {0}")]
pub struct DataSplitParseError(String);

/// Fractions used by the service to split images that carry no explicit split.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FractionSplit {
    pub training_fraction: f64,
    pub validation_fraction: f64,
    pub test_fraction: f64,
}

impl Default for FractionSplit {
    fn default() -> Self {
        Self {
            training_fraction: 0.8,
            validation_fraction: 0.1,
            test_fraction: 0.1,
        }
    }
}

impl FractionSplit {
    const SUM_EPSILON: f64 = 1e-6;

    pub fn new(training: f64, validation: f64, test: f64) -> Result<Self, FractionSplitError> {
        let split = Self {
            training_fraction: training,
            validation_fraction: validation,
            test_fraction: test,
        };
        split.validate()?;
        Ok(split)
    }

    /// Check every fraction lies in [0, 1] and that they sum to 1.
    pub fn validate(&self) -> Result<(), FractionSplitError> {
        for value in [
            self.training_fraction,
            self.validation_fraction,
            self.test_fraction,
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(FractionSplitError::OutOfRange(value));
            }
        }

        let sum = self.training_fraction + self.validation_fraction + self.test_fraction;
        if (sum - 1.0).abs() > Self::SUM_EPSILON {
            return Err(FractionSplitError::BadSum(sum));
        }
        Ok(())
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum FractionSplitError {
    #[error("Split fraction {0} is outside [0, 1]")]
    OutOfRange(f64),

    #[error("Split fractions sum to {0}, expected 1.0")]
    BadSum(f64),
}
