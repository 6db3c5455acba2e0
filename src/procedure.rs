use std::fmt;

use clap::ValueEnum;

use crate::mlp::ModelConfig;
use crate::resampling::Strategy;

const MAX_ITER: usize = 3000;
const RANDOM_SPLITS: usize = 5;
const TEST_FRACTION: f64 = 0.34;

/// The four fixed evaluation procedures a user can trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum Procedure {
    /// Train and score on the full dataset.
    TrainTest,
    /// 5-fold cross-validation.
    FiveFold,
    /// 10-fold cross-validation.
    TenFold,
    /// Five seeded 66/34 train/test splits.
    RandomSplits,
}

impl Procedure {
    pub const ALL: [Procedure; 4] = [
        Procedure::TrainTest,
        Procedure::FiveFold,
        Procedure::TenFold,
        Procedure::RandomSplits,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Procedure::TrainTest => "Train and Test (Same Data)",
            Procedure::FiveFold => "5-Fold Cross Validation",
            Procedure::TenFold => "10-Fold Cross Validation",
            Procedure::RandomSplits => "Random Splits (66-34)",
        }
    }

    pub fn strategy(self) -> Strategy {
        match self {
            Procedure::TrainTest => Strategy::Identity,
            Procedure::FiveFold => Strategy::KFold { folds: 5 },
            Procedure::TenFold => Strategy::KFold { folds: 10 },
            Procedure::RandomSplits => Strategy::RandomSplits {
                repeats: RANDOM_SPLITS,
                test_fraction: TEST_FRACTION,
            },
        }
    }

    pub fn model_config(self) -> ModelConfig {
        match self {
            Procedure::TrainTest => ModelConfig::new(&[3], MAX_ITER, 0.001),
            Procedure::FiveFold => ModelConfig::new(&[10], MAX_ITER, 0.01),
            Procedure::TenFold => ModelConfig::new(&[10, 5], MAX_ITER, 0.01),
            Procedure::RandomSplits => ModelConfig::new(&[5, 10], MAX_ITER, 0.001),
        }
    }

    /// Title of the accuracy message for the `index`-th result.
    pub fn message_title(self, index: usize) -> String {
        match self {
            Procedure::TrainTest => "Training Results".to_string(),
            Procedure::FiveFold => "5-Fold CV Results".to_string(),
            Procedure::TenFold => "10-Fold CV Results".to_string(),
            Procedure::RandomSplits => format!("Random Split {}", index + 1),
        }
    }

    pub fn message_body(self, accuracy: f64) -> String {
        let percent = accuracy * 100.0;
        match self {
            Procedure::TrainTest => format!("Accuracy (Training as Test): {percent:.2}%"),
            _ => format!("Accuracy: {percent:.2}%"),
        }
    }

    pub fn plot_title(self, index: usize) -> String {
        match self {
            Procedure::TrainTest => "Confusion Matrix (Training as Test)".to_string(),
            Procedure::FiveFold => "Confusion Matrix (5-Fold Cross Validation)".to_string(),
            Procedure::TenFold => "Confusion Matrix (10-Fold Cross Validation)".to_string(),
            Procedure::RandomSplits => format!("Confusion Matrix (Random Split {})", index + 1),
        }
    }
}

impl fmt::Display for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hyperparameters_match_each_procedure() {
        assert_eq!(Procedure::TrainTest.model_config().hidden_layers, [3]);
        assert_eq!(Procedure::TenFold.model_config().hidden_layers, [10, 5]);
        assert_eq!(Procedure::RandomSplits.model_config().hidden_layers, [5, 10]);
        assert!(Procedure::ALL
            .iter()
            .all(|p| p.model_config().max_iter == MAX_ITER && p.model_config().seed.is_none()));
        assert!((Procedure::FiveFold.model_config().learning_rate - 0.01).abs() < f64::EPSILON);
    }

    #[test]
    fn random_split_titles_count_from_one() {
        assert_eq!(Procedure::RandomSplits.message_title(0), "Random Split 1");
        assert_eq!(
            Procedure::RandomSplits.plot_title(4),
            "Confusion Matrix (Random Split 5)"
        );
    }

    #[test]
    fn messages_format_accuracy_as_percent() {
        assert_eq!(
            Procedure::TrainTest.message_body(0.97123),
            "Accuracy (Training as Test): 97.12%"
        );
        assert_eq!(Procedure::TenFold.message_body(0.5), "Accuracy: 50.00%");
    }

    #[test]
    fn value_names_are_kebab_case() {
        let names: Vec<String> = Procedure::value_variants()
            .iter()
            .filter_map(|p| p.to_possible_value().map(|v| v.get_name().to_string()))
            .collect();

        assert_eq!(names, ["train-test", "five-fold", "ten-fold", "random-splits"]);
    }
}
