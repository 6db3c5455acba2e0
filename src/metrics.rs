use std::collections::{BTreeSet, HashMap};
use std::fmt;

use ndarray::Array2;

use crate::error::EvaluationError;

/// Counts of (true label, predicted label) pairs. Rows are true labels and
/// columns are predictions, both in `labels` order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfusionMatrix {
    labels: Vec<String>,
    counts: Array2<usize>,
}

impl ConfusionMatrix {
    /// Builds the matrix over `labels`. Labels seen in `actual` or
    /// `predicted` but missing from `labels` are appended in sorted order.
    pub fn from_predictions(
        labels: &[String],
        actual: &[String],
        predicted: &[String],
    ) -> Result<Self, EvaluationError> {
        if actual.len() != predicted.len() {
            return Err(EvaluationError::PredictionCount {
                actual: actual.len(),
                predicted: predicted.len(),
            });
        }

        let mut labels = labels.to_vec();
        let unseen: BTreeSet<&String> = actual
            .iter()
            .chain(predicted)
            .filter(|label| !labels.contains(*label))
            .collect();
        labels.extend(unseen.into_iter().cloned());

        let index: HashMap<&str, usize> = labels
            .iter()
            .enumerate()
            .map(|(i, label)| (label.as_str(), i))
            .collect();

        let mut counts = Array2::zeros((labels.len(), labels.len()));
        for (truth, guess) in actual.iter().zip(predicted) {
            counts[(index[truth.as_str()], index[guess.as_str()])] += 1;
        }

        Ok(Self { labels, counts })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn counts(&self) -> &Array2<usize> {
        &self.counts
    }

    pub fn total(&self) -> usize {
        self.counts.sum()
    }

    pub fn correct(&self) -> usize {
        self.counts.diag().sum()
    }

    /// Fraction of samples on the diagonal; zero for an empty matrix.
    pub fn accuracy(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.correct() as f64 / total as f64,
        }
    }

    pub fn max_count(&self) -> usize {
        self.counts.iter().copied().max().unwrap_or(0)
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .labels
            .iter()
            .map(String::len)
            .chain(std::iter::once(self.max_count().to_string().len()))
            .max()
            .unwrap_or(1);

        write!(f, "{:>width$}", "")?;
        for label in &self.labels {
            write!(f, " {label:>width$}")?;
        }

        for (label, row) in self.labels.iter().zip(self.counts.rows()) {
            write!(f, "\n{label:>width$}")?;
            for count in row {
                write!(f, " {count:>width$}")?;
            }
        }

        Ok(())
    }
}
