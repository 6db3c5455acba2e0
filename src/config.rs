use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::dataset::LoadOptions;
use crate::error::ConfigError;
use crate::evaluation::EvaluationSettings;

pub const DEFAULT_DATA_PATH: &str = "data/breast-cancer-wisconsin.data";
pub const DEFAULT_PLOT_PATH: &str = "output_plot.png";

/// Application settings as read from a YAML file or the command line.
/// Every field may be omitted; omitted fields fall back to defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// CSV file holding the samples
    pub data: Option<PathBuf>,
    /// Where each confusion-matrix plot is written
    pub plot_path: Option<PathBuf>,
    pub has_headers: Option<bool>,
    /// Columns that carry neither features nor the label
    pub skip_columns: Option<Vec<usize>>,
    /// Column holding the class; the last column when omitted
    pub label_column: Option<usize>,
    /// Z-score each feature column after loading
    pub standardize: Option<bool>,
    /// Fixed seed for k-fold shuffling
    pub kfold_seed: Option<u64>,
    /// Fixed seed for weight initialisation and batch order
    pub model_seed: Option<u64>,
}

impl AppConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_yaml(&text)
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    // merge configs where the second overwrites the first
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            data: other.data.or(self.data),
            plot_path: other.plot_path.or(self.plot_path),
            has_headers: other.has_headers.or(self.has_headers),
            skip_columns: other.skip_columns.or(self.skip_columns),
            label_column: other.label_column.or(self.label_column),
            standardize: other.standardize.or(self.standardize),
            kfold_seed: other.kfold_seed.or(self.kfold_seed),
            model_seed: other.model_seed.or(self.model_seed),
        }
    }

    pub fn data_path(&self) -> PathBuf {
        self.data
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_PATH))
    }

    pub fn load_options(&self) -> LoadOptions {
        let defaults = LoadOptions::default();

        LoadOptions {
            has_headers: self.has_headers.unwrap_or(defaults.has_headers),
            skip_columns: self.skip_columns.clone().unwrap_or(defaults.skip_columns),
            label_column: self.label_column.or(defaults.label_column),
            standardize: self.standardize.unwrap_or(defaults.standardize),
        }
    }

    pub fn evaluation_settings(&self) -> EvaluationSettings {
        EvaluationSettings {
            plot_path: self
                .plot_path
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PLOT_PATH)),
            kfold_seed: self.kfold_seed,
            model_seed: self.model_seed,
        }
    }
}
