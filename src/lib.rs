//! Evaluation of a small multi-layer perceptron classifier on a tabular
//! dataset: train-on-everything, 5- and 10-fold cross-validation and
//! repeated 66/34 random splits, each reported as an accuracy and a
//! confusion-matrix plot.

pub mod config;
pub mod dataset;
pub mod error;
pub mod evaluation;
pub mod logging;
pub mod metrics;
pub mod mlp;
pub mod plot;
pub mod presenter;
pub mod procedure;
pub mod resampling;
pub mod shell;

pub use dataset::Dataset;
pub use evaluation::{EvaluationResult, EvaluationSettings, Evaluator};
pub use metrics::ConfusionMatrix;
pub use mlp::{Classifier, MlpFactory, ModelConfig, ModelFactory, MultiLayerPerceptron};
pub use procedure::Procedure;
pub use resampling::Strategy;
