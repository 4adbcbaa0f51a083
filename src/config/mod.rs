//! Analysis configuration
//!
//! A run is described by an [`AnalysisConfig`]: which analysis to perform,
//! how the columns of the raw table are typed, where inputs and outputs live,
//! and the hyperparameters of every model the run may touch. The record is
//! immutable once resolved and is passed by reference through every stage.

mod presets;
mod resolver;

pub use resolver::{parse_marker, ConfigResolver, DEFAULT_MARKER_FILE};

use crate::error::{MedflowError, Result};
use crate::training::{DistanceMetric, ReductionMethod, WeightScheme};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// The analysis performed by a run. One kind per invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    Knn,
    NaiveBayes,
    Linear,
    Logistic,
    #[serde(alias = "pca")]
    PcaAnalysis,
}

impl AnalysisKind {
    pub const ALL: [AnalysisKind; 5] = [
        AnalysisKind::Knn,
        AnalysisKind::NaiveBayes,
        AnalysisKind::Linear,
        AnalysisKind::Logistic,
        AnalysisKind::PcaAnalysis,
    ];

    /// Name used in marker files and settings file names
    pub fn slug(&self) -> &'static str {
        match self {
            AnalysisKind::Knn => "knn",
            AnalysisKind::NaiveBayes => "naive_bayes",
            AnalysisKind::Linear => "linear",
            AnalysisKind::Logistic => "logistic",
            AnalysisKind::PcaAnalysis => "pca_analysis",
        }
    }

    /// File name of the settings file for this kind
    pub fn settings_file_name(&self) -> String {
        format!("config_{}.json", self.slug())
    }

    /// Whether the analysis ends in a classifier evaluation
    pub fn is_classification(&self) -> bool {
        !matches!(self, AnalysisKind::Linear)
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for AnalysisKind {
    type Err = MedflowError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "knn" => Ok(AnalysisKind::Knn),
            "naive_bayes" => Ok(AnalysisKind::NaiveBayes),
            "linear" => Ok(AnalysisKind::Linear),
            "logistic" => Ok(AnalysisKind::Logistic),
            "pca_analysis" | "pca" => Ok(AnalysisKind::PcaAnalysis),
            other => Err(MedflowError::UnknownAnalysis(other.to_string())),
        }
    }
}

/// How a configured column is typed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Continuous,
    Categorical,
}

/// A configured column of the raw table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: ColumnKind,
}

impl ColumnSpec {
    pub fn continuous(name: impl Into<String>) -> Self {
        Self { name: name.into(), kind: ColumnKind::Continuous }
    }

    pub fn categorical(name: impl Into<String>) -> Self {
        Self { name: name.into(), kind: ColumnKind::Categorical }
    }
}

/// Fill policy for missing categorical values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoricalFill {
    /// Most frequent level (ties go to the smallest level)
    #[default]
    Mode,
    /// The literal level `"Unknown"`
    Unknown,
}

/// Cleaning stage settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
    pub categorical_fill: CategoricalFill,
    /// Multiplier applied to the IQR when building outlier fences
    pub iqr_factor: f64,
    pub handle_outliers: bool,
    pub drop_duplicates: bool,
    /// Standard-scale continuous columns after cleaning
    pub scale_continuous: bool,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            categorical_fill: CategoricalFill::Mode,
            iqr_factor: 1.5,
            handle_outliers: true,
            drop_duplicates: false,
            scale_continuous: false,
        }
    }
}

/// K-nearest-neighbors settings, shared by the KNN and PCA analyses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnnSettings {
    pub n_neighbors: usize,
    pub weights: WeightScheme,
    pub metric: DistanceMetric,
    /// Number of folds for cross-validated accuracy; disabled when absent
    pub cross_val_folds: Option<usize>,
    pub elbow_sweep: bool,
    pub elbow_max_k: usize,
    /// Screen predictors with the VIF filter (`regression.vif_threshold`) before fitting
    pub vif_filter: bool,
}

impl Default for KnnSettings {
    fn default() -> Self {
        Self {
            n_neighbors: 5,
            weights: WeightScheme::Uniform,
            metric: DistanceMetric::Euclidean,
            cross_val_folds: None,
            elbow_sweep: true,
            elbow_max_k: 10,
            vif_filter: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PcaSettings {
    pub components_retained: usize,
}

impl Default for PcaSettings {
    fn default() -> Self {
        Self { components_retained: 3 }
    }
}

/// Regression and multicollinearity settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegressionSettings {
    pub vif_threshold: f64,
    pub reduction_methods: Vec<ReductionMethod>,
    pub lasso_alpha: f64,
    /// p-value above which backward elimination removes a predictor
    pub significance_level: f64,
    pub logistic_alpha: f64,
    pub logistic_max_iter: usize,
    pub logistic_learning_rate: f64,
}

impl Default for RegressionSettings {
    fn default() -> Self {
        Self {
            vif_threshold: 10.0,
            reduction_methods: vec![ReductionMethod::Lasso, ReductionMethod::BackwardElimination],
            lasso_alpha: 1.0,
            significance_level: 0.05,
            logistic_alpha: 0.0,
            logistic_max_iter: 2000,
            logistic_learning_rate: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NaiveBayesSettings {
    pub var_smoothing: f64,
}

impl Default for NaiveBayesSettings {
    fn default() -> Self {
        Self { var_smoothing: 1e-9 }
    }
}

fn default_prepared_file() -> String {
    "prepared_data.csv".to_string()
}

fn default_test_size() -> f64 {
    0.2
}

fn default_random_state() -> u64 {
    42
}

/// Full settings record for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub config_type: AnalysisKind,
    /// Raw column name, encoded indicator name, or continuous column
    pub target_column: String,
    /// Label-to-number mapping for a raw string target that is not a configured column
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_mapping: Option<BTreeMap<String, f64>>,
    pub columns: Vec<ColumnSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub independent_variables: Option<Vec<String>>,
    #[serde(default)]
    pub excluded_columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_labels: Option<Vec<String>>,
    pub raw_data_path: PathBuf,
    pub prepared_data_dir: PathBuf,
    #[serde(default = "default_prepared_file")]
    pub prepared_data_file: String,
    pub results_dir: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visuals_dir: Option<PathBuf>,
    #[serde(default = "default_test_size")]
    pub test_size: f64,
    #[serde(default = "default_random_state")]
    pub random_state: u64,
    #[serde(default)]
    pub cleaning: CleaningConfig,
    #[serde(default)]
    pub knn: KnnSettings,
    #[serde(default)]
    pub pca: PcaSettings,
    #[serde(default)]
    pub regression: RegressionSettings,
    #[serde(default)]
    pub naive_bayes: NaiveBayesSettings,
}

impl AnalysisConfig {
    /// Create a config with default paths under `data/`, `prepared/<kind>` and `results/<kind>`
    pub fn new(kind: AnalysisKind, target: impl Into<String>, columns: Vec<ColumnSpec>) -> Self {
        Self {
            config_type: kind,
            target_column: target.into(),
            target_mapping: None,
            columns,
            independent_variables: None,
            excluded_columns: Vec::new(),
            class_labels: None,
            raw_data_path: PathBuf::from("rawdata/medical_clean.csv"),
            prepared_data_dir: PathBuf::from(format!("prepared/{}", kind.slug())),
            prepared_data_file: default_prepared_file(),
            results_dir: PathBuf::from(format!("results/{}", kind.slug())),
            visuals_dir: None,
            test_size: default_test_size(),
            random_state: default_random_state(),
            cleaning: CleaningConfig::default(),
            knn: KnnSettings::default(),
            pca: PcaSettings::default(),
            regression: RegressionSettings::default(),
            naive_bayes: NaiveBayesSettings::default(),
        }
    }

    pub fn with_target_mapping(mut self, mapping: BTreeMap<String, f64>) -> Self {
        self.target_mapping = Some(mapping);
        self
    }

    pub fn with_independent_variables(mut self, vars: Vec<String>) -> Self {
        self.independent_variables = Some(vars);
        self
    }

    pub fn with_excluded_columns(mut self, cols: Vec<String>) -> Self {
        self.excluded_columns = cols;
        self
    }

    pub fn with_class_labels(mut self, labels: Vec<String>) -> Self {
        self.class_labels = Some(labels);
        self
    }

    /// Point the raw input and both output directories somewhere else
    pub fn with_paths(
        mut self,
        raw_data_path: impl Into<PathBuf>,
        prepared_data_dir: impl Into<PathBuf>,
        results_dir: impl Into<PathBuf>,
    ) -> Self {
        self.raw_data_path = raw_data_path.into();
        self.prepared_data_dir = prepared_data_dir.into();
        self.results_dir = results_dir.into();
        self
    }

    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn with_cleaning(mut self, cleaning: CleaningConfig) -> Self {
        self.cleaning = cleaning;
        self
    }

    pub fn with_knn(mut self, knn: KnnSettings) -> Self {
        self.knn = knn;
        self
    }

    pub fn with_regression(mut self, regression: RegressionSettings) -> Self {
        self.regression = regression;
        self
    }

    /// Visuals directory, defaulting to `<results_dir>/visuals`
    pub fn visuals_dir(&self) -> PathBuf {
        self.visuals_dir
            .clone()
            .unwrap_or_else(|| self.results_dir.join("visuals"))
    }

    pub fn prepared_data_path(&self) -> PathBuf {
        self.prepared_data_dir.join(&self.prepared_data_file)
    }

    /// Whether a column takes part in the run
    pub fn is_active(&self, name: &str) -> bool {
        !self.excluded_columns.iter().any(|c| c == name)
    }

    pub fn column_kind(&self, name: &str) -> Option<ColumnKind> {
        self.columns
            .iter()
            .find(|c| c.name == name && self.is_active(&c.name))
            .map(|c| c.kind)
    }

    fn columns_of(&self, kind: ColumnKind) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.kind == kind && self.is_active(&c.name))
            .map(|c| c.name.clone())
            .collect()
    }

    pub fn continuous_columns(&self) -> Vec<String> {
        self.columns_of(ColumnKind::Continuous)
    }

    pub fn categorical_columns(&self) -> Vec<String> {
        self.columns_of(ColumnKind::Categorical)
    }

    /// Display names for `n` classes; falls back to the class values
    pub fn class_names(&self, classes: &[i64]) -> Vec<String> {
        match &self.class_labels {
            Some(labels) if labels.len() == classes.len() => labels.clone(),
            _ => classes.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// Check required fields and parameter ranges
    pub fn validate(&self) -> Result<()> {
        if self.target_column.trim().is_empty() {
            return Err(MedflowError::ConfigError(
                "target_column must not be empty".to_string(),
            ));
        }
        if self.columns.is_empty() {
            return Err(MedflowError::ConfigError(
                "at least one column must be configured".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for col in &self.columns {
            if !seen.insert(col.name.as_str()) {
                return Err(MedflowError::ConfigError(format!(
                    "column '{}' is configured more than once",
                    col.name
                )));
            }
        }

        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(invalid("test_size", self.test_size, "must be in (0, 1)"));
        }
        if self.knn.n_neighbors == 0 {
            return Err(invalid("knn.n_neighbors", 0, "must be at least 1"));
        }
        if self.knn.elbow_max_k == 0 {
            return Err(invalid("knn.elbow_max_k", 0, "must be at least 1"));
        }
        if let Some(folds) = self.knn.cross_val_folds {
            if folds < 2 {
                return Err(invalid("knn.cross_val_folds", folds, "must be at least 2"));
            }
        }
        if let DistanceMetric::Minkowski(p) = self.knn.metric {
            if p < 1.0 {
                return Err(invalid("knn.metric.minkowski", p, "p must be >= 1"));
            }
        }
        if self.pca.components_retained == 0 {
            return Err(invalid("pca.components_retained", 0, "must be at least 1"));
        }
        if !(self.regression.vif_threshold > 0.0) {
            return Err(invalid(
                "regression.vif_threshold",
                self.regression.vif_threshold,
                "must be positive",
            ));
        }
        if self.regression.lasso_alpha < 0.0 {
            return Err(invalid(
                "regression.lasso_alpha",
                self.regression.lasso_alpha,
                "must be non-negative",
            ));
        }
        if !(self.regression.significance_level > 0.0 && self.regression.significance_level < 1.0) {
            return Err(invalid(
                "regression.significance_level",
                self.regression.significance_level,
                "must be in (0, 1)",
            ));
        }
        if self.cleaning.iqr_factor < 0.0 {
            return Err(invalid(
                "cleaning.iqr_factor",
                self.cleaning.iqr_factor,
                "must be non-negative",
            ));
        }
        if self.naive_bayes.var_smoothing < 0.0 {
            return Err(invalid(
                "naive_bayes.var_smoothing",
                self.naive_bayes.var_smoothing,
                "must be non-negative",
            ));
        }

        Ok(())
    }

    /// Make relative paths relative to `base`
    pub fn resolve_paths(&mut self, base: &Path) {
        fn rebase(base: &Path, path: &mut PathBuf) {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }

        rebase(base, &mut self.raw_data_path);
        rebase(base, &mut self.prepared_data_dir);
        rebase(base, &mut self.results_dir);
        if let Some(visuals) = self.visuals_dir.as_mut() {
            rebase(base, visuals);
        }
    }
}

fn invalid(name: &str, value: impl fmt::Display, reason: &str) -> MedflowError {
    MedflowError::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
