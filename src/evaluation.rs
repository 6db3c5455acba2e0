use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::dataset::Dataset;
use crate::error::EvaluationError;
use crate::metrics::ConfusionMatrix;
use crate::mlp::{Classifier, ModelConfig, ModelFactory};
use crate::plot::PlotRenderer;
use crate::presenter::Presenter;
use crate::procedure::Procedure;
use crate::resampling::{self, Strategy};

/// Accuracy and confusion matrix of one scored partition.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationResult {
    pub accuracy: f64,
    pub confusion: ConfusionMatrix,
}

impl EvaluationResult {
    pub fn from_predictions(
        classes: &[String],
        actual: &[String],
        predicted: &[String],
    ) -> Result<Self, EvaluationError> {
        let confusion = ConfusionMatrix::from_predictions(classes, actual, predicted)?;

        Ok(Self {
            accuracy: confusion.accuracy(),
            confusion,
        })
    }
}

/// Fits a fresh model on `train` and scores it on `test`.
fn fit_and_score<F: ModelFactory>(
    factory: &F,
    config: &ModelConfig,
    train: &Dataset,
    test: &Dataset,
) -> Result<EvaluationResult, EvaluationError> {
    let mut model = factory.create_model(config);
    model.fit(train)?;
    let predicted = model.predict(test.features())?;

    EvaluationResult::from_predictions(model.classes(), test.labels(), &predicted)
}

/// Train and score on the whole dataset. Measures fit quality only.
pub fn evaluate_identity<F: ModelFactory>(
    dataset: &Dataset,
    factory: &F,
    config: &ModelConfig,
) -> Result<EvaluationResult, EvaluationError> {
    fit_and_score(factory, config, dataset, dataset)
}

/// Shuffled k-fold cross-validation. Held-out predictions of every fold are
/// pooled into a single result over the dataset's sorted class labels.
pub fn evaluate_k_fold<F: ModelFactory>(
    dataset: &Dataset,
    factory: &F,
    config: &ModelConfig,
    folds: usize,
    shuffle_seed: Option<u64>,
) -> Result<EvaluationResult, EvaluationError> {
    let splits = resampling::k_fold(dataset.len(), folds, &mut resampling::rng_from(shuffle_seed))?;

    let mut predicted = vec![String::new(); dataset.len()];
    for (fold, split) in splits.iter().enumerate() {
        let mut model = factory.create_model(config);
        model.fit(&dataset.select(&split.train))?;
        let fold_predictions = model.predict(dataset.select(&split.test).features())?;

        debug!(fold, held_out = split.test.len(), "fold scored");
        for (&row, prediction) in split.test.iter().zip(fold_predictions) {
            predicted[row] = prediction;
        }
    }

    EvaluationResult::from_predictions(&dataset.classes(), dataset.labels(), &predicted)
}

/// `repeats` train/test splits, split `i` shuffled with seed `i`. Each
/// result is handed to `on_result` as soon as it is computed, so results
/// delivered before a failure are kept.
pub fn evaluate_random_splits<F: ModelFactory>(
    dataset: &Dataset,
    factory: &F,
    config: &ModelConfig,
    repeats: usize,
    test_fraction: f64,
    mut on_result: impl FnMut(usize, EvaluationResult),
) -> Result<(), EvaluationError> {
    let splits = (0..repeats as u64)
        .map(|seed| resampling::train_test_split(dataset.len(), test_fraction, seed))
        .collect::<Result<Vec<_>, _>>()?;

    for (index, split) in splits.iter().enumerate() {
        let result = fit_and_score(
            factory,
            config,
            &dataset.select(&split.train),
            &dataset.select(&split.test),
        )?;
        on_result(index, result);
    }

    Ok(())
}

/// Runs `strategy`, passing every result to `on_result` in order.
pub fn run_strategy<F: ModelFactory>(
    strategy: Strategy,
    dataset: &Dataset,
    factory: &F,
    config: &ModelConfig,
    kfold_seed: Option<u64>,
    mut on_result: impl FnMut(usize, EvaluationResult),
) -> Result<(), EvaluationError> {
    match strategy {
        Strategy::Identity => {
            on_result(0, evaluate_identity(dataset, factory, config)?);
            Ok(())
        }
        Strategy::KFold { folds } => {
            on_result(0, evaluate_k_fold(dataset, factory, config, folds, kfold_seed)?);
            Ok(())
        }
        Strategy::RandomSplits {
            repeats,
            test_fraction,
        } => evaluate_random_splits(dataset, factory, config, repeats, test_fraction, on_result),
    }
}

/// Session-wide knobs that are not part of a procedure's fixed literals.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationSettings {
    pub plot_path: PathBuf,
    /// Fixes k-fold shuffling; `None` shuffles differently every run.
    pub kfold_seed: Option<u64>,
    pub model_seed: Option<u64>,
}

impl Default for EvaluationSettings {
    fn default() -> Self {
        Self {
            plot_path: PathBuf::from("output_plot.png"),
            kfold_seed: None,
            model_seed: None,
        }
    }
}

/// Runs procedures against a dataset and presents their results.
pub struct Evaluator<F> {
    factory: F,
    settings: EvaluationSettings,
}

impl<F: ModelFactory> Evaluator<F> {
    pub fn new(factory: F, settings: EvaluationSettings) -> Self {
        Self { factory, settings }
    }

    pub fn settings(&self) -> &EvaluationSettings {
        &self.settings
    }

    /// Runs `procedure` and presents each result as it is produced. A
    /// training failure aborts the remaining work; results already
    /// presented stay presented.
    pub fn run(
        &self,
        procedure: Procedure,
        dataset: &Dataset,
        presenter: &mut dyn Presenter,
        renderer: &dyn PlotRenderer,
    ) -> Result<Vec<EvaluationResult>, EvaluationError> {
        let config = procedure.model_config().with_seed(self.settings.model_seed);
        info!(
            %procedure,
            samples = dataset.len(),
            hidden_layers = ?config.hidden_layers,
            "evaluation started"
        );

        let mut results = Vec::new();
        run_strategy(
            procedure.strategy(),
            dataset,
            &self.factory,
            &config,
            self.settings.kfold_seed,
            |index, result| {
                self.present(procedure, index, &result, presenter, renderer);
                results.push(result);
            },
        )?;

        info!(%procedure, results = results.len(), "evaluation finished");
        Ok(results)
    }

    fn present(
        &self,
        procedure: Procedure,
        index: usize,
        result: &EvaluationResult,
        presenter: &mut dyn Presenter,
        renderer: &dyn PlotRenderer,
    ) {
        info!(%procedure, index, accuracy = result.accuracy, "result ready");
        debug!("confusion matrix\n{}", result.confusion);
        presenter.show_message(
            &procedure.message_title(index),
            &procedure.message_body(result.accuracy),
        );

        let path = &self.settings.plot_path;
        if let Err(error) = renderer.render(&result.confusion, &procedure.plot_title(index), path) {
            warn!(%error, "plot not saved");
            presenter.show_message("Error", &format!("Plot Save Error: {error}"));
            return;
        }

        if let Err(error) = presenter.show_image(path) {
            warn!(%error, "plot not displayed");
            presenter.show_message("Error", &format!("Image Display Error: {error}"));
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::path::Path;

    use nalgebra::DMatrix;

    use crate::dataset::Dataset;
    use crate::error::{PlotError, TrainingError};
    use crate::metrics::ConfusionMatrix;
    use crate::mlp::{Classifier, ModelConfig, ModelFactory};
    use crate::plot::PlotRenderer;

    pub struct NoopRenderer;

    impl PlotRenderer for NoopRenderer {
        fn render(&self, _: &ConfusionMatrix, _: &str, _: &Path) -> Result<(), PlotError> {
            Ok(())
        }
    }

    pub struct FailingRenderer;

    impl PlotRenderer for FailingRenderer {
        fn render(&self, _: &ConfusionMatrix, _: &str, path: &Path) -> Result<(), PlotError> {
            Err(PlotError::Draw {
                path: path.to_path_buf(),
                reason: "disk full".to_string(),
            })
        }
    }

    /// Always predicts one label; learns the class list like a real model.
    pub struct ConstantClassifier {
        pub answer: String,
        classes: Vec<String>,
    }

    impl Classifier for ConstantClassifier {
        fn fit(&mut self, dataset: &Dataset) -> Result<(), TrainingError> {
            if dataset.is_empty() {
                return Err(TrainingError::EmptyTrainingSet);
            }
            self.classes = dataset.classes();
            Ok(())
        }

        fn predict(&self, features: &DMatrix<f64>) -> Result<Vec<String>, TrainingError> {
            Ok(vec![self.answer.clone(); features.nrows()])
        }

        fn classes(&self) -> &[String] {
            &self.classes
        }
    }

    pub struct ConstantFactory(pub &'static str);

    impl ModelFactory for ConstantFactory {
        type Model = ConstantClassifier;

        fn create_model(&self, _config: &ModelConfig) -> ConstantClassifier {
            ConstantClassifier {
                answer: self.0.to_string(),
                classes: Vec::new(),
            }
        }
    }

    /// Predicts the first feature rounded to a class index.
    pub struct IndexClassifier {
        classes: Vec<String>,
        fail: bool,
    }

    impl Classifier for IndexClassifier {
        fn fit(&mut self, dataset: &Dataset) -> Result<(), TrainingError> {
            if self.fail {
                return Err(TrainingError::Diverged { epoch: 1 });
            }
            self.classes = dataset.classes();
            Ok(())
        }

        #[allow(clippy::cast_possible_truncation)]
        #[allow(clippy::cast_sign_loss)]
        fn predict(&self, features: &DMatrix<f64>) -> Result<Vec<String>, TrainingError> {
            Ok(features
                .column(0)
                .iter()
                .map(|&v| v.round() as usize)
                .map(|i| self.classes.get(i).cloned().unwrap_or_default())
                .collect())
        }

        fn classes(&self) -> &[String] {
            &self.classes
        }
    }

    /// Models created after the first `fail_after` refuse to fit.
    pub struct IndexFactory {
        pub fail_after: usize,
        pub created: std::cell::Cell<usize>,
    }

    impl IndexFactory {
        pub fn new(fail_after: usize) -> Self {
            Self {
                fail_after,
                created: std::cell::Cell::new(0),
            }
        }
    }

    impl ModelFactory for IndexFactory {
        type Model = IndexClassifier;

        fn create_model(&self, _config: &ModelConfig) -> IndexClassifier {
            let created = self.created.get();
            self.created.set(created + 1);
            IndexClassifier {
                classes: Vec::new(),
                fail: created >= self.fail_after,
            }
        }
    }

    /// `benign` rows carry 0.0, `malignant` rows 1.0, alternating.
    pub fn benign_malignant(samples: usize) -> Dataset {
        let rows: Vec<Vec<f64>> = (0..samples).map(|i| vec![(i % 2) as f64]).collect();
        let labels = (0..samples)
            .map(|i| if i % 2 == 0 { "benign" } else { "malignant" }.to_string())
            .collect();
        Dataset::from_rows(&rows, labels).unwrap()
    }
}
