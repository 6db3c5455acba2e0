use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use csv::{ReaderBuilder, Trim};
use nalgebra::DMatrix;
use tracing::debug;

use crate::error::DatasetError;

/// Column layout of the CSV file the dataset is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOptions {
    pub has_headers: bool,
    /// Columns ignored entirely, e.g. a sample id.
    pub skip_columns: Vec<usize>,
    /// Class column; `None` means the last field of each record.
    pub label_column: Option<usize>,
    pub standardize: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            has_headers: false,
            skip_columns: vec![0],
            label_column: None,
            standardize: false,
        }
    }
}

/// Feature matrix (one row per sample) with the class label of every row.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    features: DMatrix<f64>,
    labels: Vec<String>,
}

impl Dataset {
    pub fn new(features: DMatrix<f64>, labels: Vec<String>) -> Result<Self, DatasetError> {
        if features.nrows() != labels.len() {
            return Err(DatasetError::LengthMismatch {
                features: features.nrows(),
                labels: labels.len(),
            });
        }

        Ok(Self { features, labels })
    }

    pub fn from_rows(rows: &[Vec<f64>], labels: Vec<String>) -> Result<Self, DatasetError> {
        let width = rows.first().map_or(0, Vec::len);

        if let Some((row, values)) = rows
            .iter()
            .enumerate()
            .find(|(_, values)| values.len() != width)
        {
            return Err(DatasetError::RaggedRow {
                row,
                expected: width,
                found: values.len(),
            });
        }

        let data: Vec<f64> = rows.iter().flatten().copied().collect();

        Self::new(DMatrix::from_row_slice(rows.len(), width, &data), labels)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    pub fn features(&self) -> &DMatrix<f64> {
        &self.features
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Sorted distinct class labels.
    pub fn classes(&self) -> Vec<String> {
        distinct_sorted(&self.labels)
    }

    /// Rows at `indices`, in the given order.
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            features: self.features.select_rows(indices),
            labels: indices.iter().map(|&i| self.labels[i].clone()).collect(),
        }
    }

    fn standardize(&mut self) {
        for mut column in self.features.column_iter_mut() {
            let values: Vec<f64> = column.iter().copied().collect();

            for (value, normalized) in column.iter_mut().zip(z_score_normalize(&values)) {
                *value = normalized;
            }
        }
    }
}

pub(crate) fn distinct_sorted(labels: &[String]) -> Vec<String> {
    labels
        .iter()
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub fn z_score_normalize(data: &[f64]) -> Vec<f64> {
    let mean = data.iter().copied().sum::<f64>() / data.len() as f64;
    let variance = data.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / data.len() as f64;
    let std_dev = variance.sqrt();

    if std_dev > 0.0 {
        data.iter().map(|&x| (x - mean) / std_dev).collect()
    } else {
        data.iter().map(|&x| x - mean).collect()
    }
}

pub fn load(path: &Path, options: &LoadOptions) -> Result<Dataset, DatasetError> {
    let file = File::open(path).map_err(|source| DatasetError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    load_from_reader(BufReader::new(file), options)
}

/// Reads CSV records, dropping every row with a missing or non-numeric
/// feature so labels stay aligned with the surviving feature rows.
pub fn load_from_reader<R: Read>(reader: R, options: &LoadOptions) -> Result<Dataset, DatasetError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(options.has_headers)
        .trim(Trim::All)
        .from_reader(reader);

    let mut rows = Vec::new();
    let mut labels = Vec::new();
    let mut dropped = 0_usize;

    for result in reader.records() {
        let record = result?;

        let label_column = options
            .label_column
            .unwrap_or_else(|| record.len().saturating_sub(1));
        let label = record.get(label_column).ok_or(DatasetError::LabelColumn {
            column: label_column,
            width: record.len(),
        })?;

        let values: Option<Vec<f64>> = record
            .iter()
            .enumerate()
            .filter(|(index, _)| *index != label_column && !options.skip_columns.contains(index))
            .map(|(_, value)| value.parse::<f64>().ok().filter(|v| v.is_finite()))
            .collect();

        match values {
            Some(values) if !label.is_empty() => {
                rows.push(values);
                labels.push(label.to_string());
            }
            _ => dropped += 1,
        }
    }

    debug!(kept = rows.len(), dropped, "parsed dataset records");

    if rows.is_empty() {
        return Err(DatasetError::Empty);
    }

    let mut dataset = Dataset::from_rows(&rows, labels)?;
    if options.standardize {
        dataset.standardize();
    }

    Ok(dataset)
}
