use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::EvaluationError;

/// How the dataset is divided into fitting and scoring partitions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Strategy {
    /// Fit and score on every sample.
    Identity,
    /// Shuffled k-fold cross-validation; every sample is held out once.
    KFold { folds: usize },
    /// `repeats` independent splits, split `i` shuffled with seed `i`.
    RandomSplits { repeats: usize, test_fraction: f64 },
}

/// Row indices of one train/test partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

pub(crate) fn rng_from(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Shuffles `0..samples` and cuts it into `folds` contiguous folds; the
/// first `samples % folds` folds hold one extra sample.
pub fn k_fold(samples: usize, folds: usize, rng: &mut StdRng) -> Result<Vec<Split>, EvaluationError> {
    if folds < 2 || folds > samples {
        return Err(EvaluationError::InvalidFolds { folds, samples });
    }

    let mut order: Vec<usize> = (0..samples).collect();
    order.shuffle(rng);

    let base = samples / folds;
    let remainder = samples % folds;
    let mut start = 0;

    Ok((0..folds)
        .map(|fold| {
            let size = base + usize::from(fold < remainder);
            let end = start + size;
            let split = Split {
                test: order[start..end].to_vec(),
                train: order[..start].iter().chain(&order[end..]).copied().collect(),
            };
            start = end;
            split
        })
        .collect())
}

/// Number of held-out samples: `ceil(test_fraction * samples)`.
#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
pub fn test_size(samples: usize, test_fraction: f64) -> usize {
    (test_fraction * samples as f64).ceil() as usize
}

/// Shuffles `0..samples` with a generator seeded by `seed`; the first
/// `test_size` shuffled indices are held out.
pub fn train_test_split(samples: usize, test_fraction: f64, seed: u64) -> Result<Split, EvaluationError> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(EvaluationError::InvalidTestFraction(test_fraction));
    }

    let held_out = test_size(samples, test_fraction);
    if held_out == 0 || held_out >= samples {
        return Err(EvaluationError::EmptyPartition { samples });
    }

    let mut order: Vec<usize> = (0..samples).collect();
    order.shuffle(&mut StdRng::seed_from_u64(seed));
    let train = order.split_off(held_out);

    Ok(Split { train, test: order })
}
