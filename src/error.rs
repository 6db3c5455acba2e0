use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to open dataset {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("label column {column} is out of range for a record with {width} fields")]
    LabelColumn { column: usize, width: usize },

    #[error("row {row} has {found} features, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("{features} feature rows but {labels} labels")]
    LengthMismatch { features: usize, labels: usize },

    #[error("no complete rows left after dropping missing values")]
    Empty,
}

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("invalid hyperparameter: {0}")]
    InvalidHyperparameter(String),

    #[error("cannot fit on an empty training set")]
    EmptyTrainingSet,

    #[error("expected {expected} features per sample, got {found}")]
    FeatureMismatch { expected: usize, found: usize },

    #[error("model has not been fitted")]
    NotFitted,

    #[error("training diverged at epoch {epoch}: loss is not finite")]
    Diverged { epoch: usize },
}

#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("cannot split {samples} samples into {folds} folds")]
    InvalidFolds { folds: usize, samples: usize },

    #[error("test fraction {0} must lie strictly between 0 and 1")]
    InvalidTestFraction(f64),

    #[error("split of {samples} samples leaves an empty partition")]
    EmptyPartition { samples: usize },

    #[error("{actual} true labels but {predicted} predictions")]
    PredictionCount { actual: usize, predicted: usize },

    #[error(transparent)]
    Training(#[from] TrainingError),
}

#[derive(Debug, Error)]
pub enum PlotError {
    #[error("cannot plot an empty confusion matrix")]
    EmptyMatrix,

    #[error("failed to draw {path}: {reason}")]
    Draw { path: PathBuf, reason: String },
}

#[derive(Debug, Error)]
pub enum DisplayError {
    #[error("image {path} is unavailable: {source}")]
    Unavailable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("image {0} is empty")]
    EmptyImage(PathBuf),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
