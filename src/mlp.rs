use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use crate::dataset::Dataset;
use crate::error::TrainingError;

const L2_PENALTY: f64 = 1e-4;
const MAX_BATCH_SIZE: usize = 200;
const TOLERANCE: f64 = 1e-4;
const EPOCHS_WITHOUT_IMPROVEMENT: usize = 10;
const BETA_1: f64 = 0.9;
const BETA_2: f64 = 0.999;
const EPSILON: f64 = 1e-8;
const PROBABILITY_CLIP: f64 = 1e-10;

/// Hyperparameters of one classifier instance.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    /// Width of every hidden layer, input side first.
    pub hidden_layers: Vec<usize>,
    /// Epoch cap.
    pub max_iter: usize,
    pub learning_rate: f64,
    /// Seed for weight initialisation and batch shuffling; `None` draws from
    /// OS entropy.
    pub seed: Option<u64>,
}

impl ModelConfig {
    pub fn new(hidden_layers: &[usize], max_iter: usize, learning_rate: f64) -> Self {
        Self {
            hidden_layers: hidden_layers.to_vec(),
            max_iter,
            learning_rate,
            seed: None,
        }
    }

    #[must_use]
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }
}

/// A trainable classifier over string class labels.
pub trait Classifier {
    fn fit(&mut self, dataset: &Dataset) -> Result<(), TrainingError>;

    fn predict(&self, features: &DMatrix<f64>) -> Result<Vec<String>, TrainingError>;

    /// Class ordering discovered by the last `fit`: sorted distinct labels.
    fn classes(&self) -> &[String];
}

/// Builds untrained classifiers from a [`ModelConfig`].
pub trait ModelFactory {
    type Model: Classifier;

    fn create_model(&self, config: &ModelConfig) -> Self::Model;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MlpFactory;

impl ModelFactory for MlpFactory {
    type Model = MultiLayerPerceptron;

    fn create_model(&self, config: &ModelConfig) -> MultiLayerPerceptron {
        MultiLayerPerceptron::new(config.clone())
    }
}

#[derive(Debug, Clone)]
struct Layer {
    /// `outputs x inputs`
    weights: DMatrix<f64>,
    bias: DVector<f64>,
}

impl Layer {
    fn glorot(inputs: usize, outputs: usize, factor: f64, rng: &mut StdRng) -> Self {
        let bound = (factor / (inputs + outputs) as f64).sqrt();

        Self {
            weights: DMatrix::from_fn(outputs, inputs, |_, _| rng.gen_range(-bound..bound)),
            bias: DVector::from_fn(outputs, |_, _| rng.gen_range(-bound..bound)),
        }
    }

    /// `inputs` is `batch x inputs`; returns the `batch x outputs` pre-activation.
    fn affine(&self, inputs: &DMatrix<f64>) -> DMatrix<f64> {
        let mut output = inputs * self.weights.transpose();
        for (mut column, bias) in output.column_iter_mut().zip(self.bias.iter()) {
            column.add_scalar_mut(*bias);
        }
        output
    }
}

/// First and second moment estimates for one layer.
#[derive(Debug, Clone)]
struct Moments {
    weights: (DMatrix<f64>, DMatrix<f64>),
    bias: (DVector<f64>, DVector<f64>),
}

impl Moments {
    fn zeros_like(layer: &Layer) -> Self {
        let (rows, cols) = layer.weights.shape();

        Self {
            weights: (DMatrix::zeros(rows, cols), DMatrix::zeros(rows, cols)),
            bias: (DVector::zeros(rows), DVector::zeros(rows)),
        }
    }
}

fn adam_update(params: &mut [f64], grads: &[f64], first: &mut [f64], second: &mut [f64], step: f64) {
    for (((param, &grad), m), v) in params
        .iter_mut()
        .zip(grads)
        .zip(first.iter_mut())
        .zip(second.iter_mut())
    {
        *m = BETA_1 * *m + (1.0 - BETA_1) * grad;
        *v = BETA_2 * *v + (1.0 - BETA_2) * grad * grad;
        *param -= step * *m / (v.sqrt() + EPSILON);
    }
}

/// Feed-forward network with ReLU hidden layers, trained with Adam on
/// cross-entropy. Two classes share a single logistic output unit; three or
/// more use a softmax output layer.
#[derive(Debug, Clone)]
pub struct MultiLayerPerceptron {
    pub config: ModelConfig,
    classes: Vec<String>,
    layers: Vec<Layer>,
    n_features: usize,
    /// Epochs run by the last `fit`.
    pub epochs_run: usize,
    pub final_loss: f64,
}

impl MultiLayerPerceptron {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            classes: Vec::new(),
            layers: Vec::new(),
            n_features: 0,
            epochs_run: 0,
            final_loss: f64::NAN,
        }
    }

    fn validate(&self) -> Result<(), TrainingError> {
        if self.config.max_iter == 0 {
            return Err(TrainingError::InvalidHyperparameter(
                "max_iter must be positive".to_string(),
            ));
        }
        if !(self.config.learning_rate > 0.0 && self.config.learning_rate.is_finite()) {
            return Err(TrainingError::InvalidHyperparameter(format!(
                "learning_rate must be positive, got {}",
                self.config.learning_rate
            )));
        }
        if self.config.hidden_layers.contains(&0) {
            return Err(TrainingError::InvalidHyperparameter(format!(
                "hidden layer widths must be positive, got {:?}",
                self.config.hidden_layers
            )));
        }
        Ok(())
    }

    fn binary_output(&self) -> bool {
        self.classes.len() <= 2
    }

    fn output_width(&self) -> usize {
        if self.binary_output() {
            1
        } else {
            self.classes.len()
        }
    }

    fn initialize(&mut self, rng: &mut StdRng) {
        let output_width = self.output_width();
        let mut widths = vec![self.n_features];
        widths.extend(&self.config.hidden_layers);
        widths.push(output_width);

        let binary = self.binary_output();
        let last = widths.len() - 2;

        self.layers = widths
            .windows(2)
            .enumerate()
            .map(|(i, pair)| {
                let factor = if i == last && binary { 2.0 } else { 6.0 };
                Layer::glorot(pair[0], pair[1], factor, rng)
            })
            .collect();
    }

    /// Activations of every layer, input first.
    fn forward(&self, inputs: &DMatrix<f64>) -> Vec<DMatrix<f64>> {
        let mut activations = Vec::with_capacity(self.layers.len() + 1);
        activations.push(inputs.clone());

        for (i, layer) in self.layers.iter().enumerate() {
            let z = layer.affine(&activations[i]);
            let a = if i + 1 < self.layers.len() {
                z.map(|v| v.max(0.0))
            } else if self.binary_output() {
                z.map(|v| 1.0 / (1.0 + (-v).exp()))
            } else {
                softmax_rows(z)
            };
            activations.push(a);
        }

        activations
    }

    /// One-hot targets, or a single 0/1 column for the logistic output.
    fn encode_targets(&self, labels: &[String]) -> DMatrix<f64> {
        let width = self.output_width();
        let mut targets = DMatrix::zeros(labels.len(), width);

        for (row, label) in labels.iter().enumerate() {
            let class = self.class_index(label);
            if width == 1 {
                targets[(row, 0)] = class as f64;
            } else {
                targets[(row, class)] = 1.0;
            }
        }

        targets
    }

    fn class_index(&self, label: &str) -> usize {
        self.classes
            .binary_search_by(|class| class.as_str().cmp(label))
            .unwrap_or(0)
    }

    fn loss(&self, output: &DMatrix<f64>, targets: &DMatrix<f64>) -> f64 {
        let samples = output.nrows() as f64;

        let data_loss = if self.binary_output() {
            output
                .iter()
                .zip(targets.iter())
                .map(|(&p, &y)| {
                    let p = p.clamp(PROBABILITY_CLIP, 1.0 - PROBABILITY_CLIP);
                    -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
                })
                .sum::<f64>()
        } else {
            output
                .iter()
                .zip(targets.iter())
                .map(|(&p, &y)| -y * p.clamp(PROBABILITY_CLIP, 1.0).ln())
                .sum::<f64>()
        };

        let penalty = self
            .layers
            .iter()
            .map(|layer| layer.weights.norm_squared())
            .sum::<f64>();

        (data_loss + 0.5 * L2_PENALTY * penalty) / samples
    }

    /// Runs one mini-batch through forward and backward passes and applies
    /// an Adam step. Returns the batch loss.
    fn step(
        &mut self,
        inputs: &DMatrix<f64>,
        targets: &DMatrix<f64>,
        moments: &mut [Moments],
        iteration: i32,
    ) -> f64 {
        let samples = inputs.nrows() as f64;
        let activations = self.forward(inputs);
        let loss = self.loss(&activations[self.layers.len()], targets);

        let step = self.config.learning_rate * (1.0 - BETA_2.powi(iteration)).sqrt()
            / (1.0 - BETA_1.powi(iteration));

        // logistic + binary log-loss and softmax + cross-entropy share this delta
        let mut delta = &activations[self.layers.len()] - targets;

        for i in (0..self.layers.len()).rev() {
            let previous = &activations[i];
            let layer = &self.layers[i];

            let weight_grad =
                (delta.transpose() * previous + &layer.weights * L2_PENALTY) / samples;
            let bias_grad = delta.row_sum().transpose() / samples;

            if i > 0 {
                delta = (&delta * &layer.weights).zip_map(previous, |d, a| {
                    if a > 0.0 {
                        d
                    } else {
                        0.0
                    }
                });
            }

            let layer = &mut self.layers[i];
            let Moments { weights, bias } = &mut moments[i];
            adam_update(
                layer.weights.as_mut_slice(),
                weight_grad.as_slice(),
                weights.0.as_mut_slice(),
                weights.1.as_mut_slice(),
                step,
            );
            adam_update(
                layer.bias.as_mut_slice(),
                bias_grad.as_slice(),
                bias.0.as_mut_slice(),
                bias.1.as_mut_slice(),
                step,
            );
        }

        loss
    }

    fn check_width(&self, features: &DMatrix<f64>) -> Result<(), TrainingError> {
        if features.ncols() == self.n_features {
            Ok(())
        } else {
            Err(TrainingError::FeatureMismatch {
                expected: self.n_features,
                found: features.ncols(),
            })
        }
    }

    /// Class probabilities, one row per sample and one column per class.
    pub fn predict_proba(&self, features: &DMatrix<f64>) -> Result<DMatrix<f64>, TrainingError> {
        if self.layers.is_empty() {
            return Err(TrainingError::NotFitted);
        }
        self.check_width(features)?;

        let output = self
            .forward(features)
            .pop()
            .ok_or(TrainingError::NotFitted)?;

        if self.binary_output() {
            Ok(DMatrix::from_fn(output.nrows(), 2, |row, col| {
                if col == 1 {
                    output[(row, 0)]
                } else {
                    1.0 - output[(row, 0)]
                }
            }))
        } else {
            Ok(output)
        }
    }
}

impl Classifier for MultiLayerPerceptron {
    fn fit(&mut self, dataset: &Dataset) -> Result<(), TrainingError> {
        self.validate()?;
        if dataset.is_empty() {
            return Err(TrainingError::EmptyTrainingSet);
        }

        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        self.classes = dataset.classes();
        self.n_features = dataset.n_features();
        self.initialize(&mut rng);

        let features = dataset.features();
        let targets = self.encode_targets(dataset.labels());
        let mut moments: Vec<Moments> = self.layers.iter().map(Moments::zeros_like).collect();

        let batch_size = dataset.len().min(MAX_BATCH_SIZE);
        let mut order: Vec<usize> = (0..dataset.len()).collect();
        let mut best_loss = f64::INFINITY;
        let mut stale_epochs = 0;
        let mut iteration = 0_i32;
        self.epochs_run = 0;

        for epoch in 1..=self.config.max_iter {
            order.shuffle(&mut rng);
            let mut accumulated = 0.0;

            for batch in order.chunks(batch_size) {
                let inputs = features.select_rows(batch);
                let batch_targets = targets.select_rows(batch);
                iteration = iteration.saturating_add(1);
                accumulated +=
                    self.step(&inputs, &batch_targets, &mut moments, iteration) * batch.len() as f64;
            }

            let epoch_loss = accumulated / dataset.len() as f64;
            self.epochs_run = epoch;
            self.final_loss = epoch_loss;

            if !epoch_loss.is_finite() {
                return Err(TrainingError::Diverged { epoch });
            }

            if epoch_loss > best_loss - TOLERANCE {
                stale_epochs += 1;
            } else {
                stale_epochs = 0;
            }
            best_loss = best_loss.min(epoch_loss);

            if stale_epochs > EPOCHS_WITHOUT_IMPROVEMENT {
                debug!(epoch, loss = epoch_loss, "training converged");
                return Ok(());
            }
        }

        warn!(
            max_iter = self.config.max_iter,
            loss = self.final_loss,
            "maximum iterations reached before convergence"
        );
        Ok(())
    }

    fn predict(&self, features: &DMatrix<f64>) -> Result<Vec<String>, TrainingError> {
        let probabilities = self.predict_proba(features)?;

        Ok(probabilities
            .row_iter()
            .map(|row| {
                let class = if self.classes.len() == 1 {
                    0
                } else {
                    row.iter()
                        .enumerate()
                        .min_by(|a, b| b.1.total_cmp(a.1))
                        .map_or(0, |(i, _)| i)
                };
                self.classes[class].clone()
            })
            .collect())
    }

    fn classes(&self) -> &[String] {
        &self.classes
    }
}

fn softmax_rows(mut logits: DMatrix<f64>) -> DMatrix<f64> {
    for mut row in logits.row_iter_mut() {
        let max = row.max();
        row.apply(|v| *v = (*v - max).exp());
        let sum = row.sum();
        row /= sum;
    }
    logits
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blobs() -> Dataset {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..40 {
            let offset = f64::from(i % 5) * 0.1;
            rows.push(vec![-2.0 + offset, -1.5 - offset]);
            labels.push("benign".to_string());
            rows.push(vec![2.0 - offset, 1.5 + offset]);
            labels.push("malignant".to_string());
        }
        Dataset::from_rows(&rows, labels).unwrap()
    }

    fn three_blobs() -> Dataset {
        let centres = [(-3.0, 0.0, "a"), (3.0, 0.0, "b"), (0.0, 4.0, "c")];
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..30 {
            let jitter = f64::from(i % 6) * 0.1 - 0.25;
            for (x, y, label) in centres {
                rows.push(vec![x + jitter, y - jitter]);
                labels.push(label.to_string());
            }
        }
        Dataset::from_rows(&rows, labels).unwrap()
    }

    fn config(hidden: &[usize]) -> ModelConfig {
        ModelConfig::new(hidden, 500, 0.01).with_seed(Some(7))
    }

    #[test]
    fn separates_two_blobs() {
        let dataset = blobs();
        let mut model = MlpFactory.create_model(&config(&[5]));

        model.fit(&dataset).unwrap();
        let predictions = model.predict(dataset.features()).unwrap();

        assert_eq!(model.classes(), ["benign", "malignant"]);
        assert_eq!(predictions, dataset.labels());
        assert!(model.final_loss < 0.3);
    }

    #[test]
    fn separates_three_blobs_with_softmax_output() {
        let dataset = three_blobs();
        let mut model = MultiLayerPerceptron::new(config(&[10, 5]));

        model.fit(&dataset).unwrap();
        let predictions = model.predict(dataset.features()).unwrap();
        let probabilities = model.predict_proba(dataset.features()).unwrap();

        assert_eq!(probabilities.ncols(), 3);
        for row in probabilities.row_iter() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
        let correct = predictions
            .iter()
            .zip(dataset.labels())
            .filter(|(p, t)| p == t)
            .count();
        assert!(correct >= 80, "only {correct} of 90 correct");
    }

    #[test]
    fn same_seed_gives_same_model() {
        let dataset = blobs();
        let mut first = MultiLayerPerceptron::new(config(&[3]));
        let mut second = MultiLayerPerceptron::new(config(&[3]));

        first.fit(&dataset).unwrap();
        second.fit(&dataset).unwrap();

        assert_eq!(
            first.predict_proba(dataset.features()).unwrap(),
            second.predict_proba(dataset.features()).unwrap()
        );
        assert_eq!(first.epochs_run, second.epochs_run);
    }

    #[test]
    fn single_class_always_predicts_it() {
        let dataset = Dataset::from_rows(
            &[vec![1.0], vec![2.0], vec![3.0]],
            vec!["only".to_string(); 3],
        )
        .unwrap();
        let mut model = MultiLayerPerceptron::new(config(&[2]));

        model.fit(&dataset).unwrap();

        assert_eq!(model.predict(dataset.features()).unwrap(), ["only"; 3]);
    }

    #[test]
    fn zero_iterations_fail_at_fit_time() {
        let mut model = MlpFactory.create_model(&ModelConfig::new(&[3], 0, 0.001));

        let result = model.fit(&blobs());

        assert!(matches!(result, Err(TrainingError::InvalidHyperparameter(_))));
    }

    #[test]
    fn rejects_bad_learning_rate_and_layer_width() {
        let mut negative = MultiLayerPerceptron::new(ModelConfig::new(&[3], 10, -1.0));
        let mut empty_layer = MultiLayerPerceptron::new(ModelConfig::new(&[3, 0], 10, 0.01));

        assert!(negative.fit(&blobs()).is_err());
        assert!(empty_layer.fit(&blobs()).is_err());
    }

    #[test]
    fn predict_before_fit_is_an_error() {
        let model = MultiLayerPerceptron::new(config(&[3]));

        let result = model.predict(blobs().features());

        assert!(matches!(result, Err(TrainingError::NotFitted)));
    }

    #[test]
    fn predict_checks_feature_width() {
        let mut model = MultiLayerPerceptron::new(config(&[3]));
        model.fit(&blobs()).unwrap();

        let result = model.predict(&DMatrix::zeros(4, 3));

        assert!(matches!(
            result,
            Err(TrainingError::FeatureMismatch {
                expected: 2,
                found: 3
            })
        ));
    }

    #[test]
    fn empty_training_set_is_rejected() {
        let dataset = Dataset::from_rows(&[], Vec::new()).unwrap();
        let mut model = MultiLayerPerceptron::new(config(&[3]));

        assert!(matches!(
            model.fit(&dataset),
            Err(TrainingError::EmptyTrainingSet)
        ));
    }
}
