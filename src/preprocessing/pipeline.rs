//! Preparation of the raw dataset for modelling
//!
//! Projection, target handling, cleaning, dummy encoding and predictor
//! resolution, producing a fully numeric frame.

use super::cleaner::{CleaningReport, DataCleaner};
use super::encoder::{binary_indicator, DummyEncoder};
use super::scaler::StandardScaler;
use crate::config::{AnalysisConfig, ColumnKind};
use crate::error::{MedflowError, Result};
use crate::utils::frame::{column_names, is_numeric, string_values, to_matrix, to_vector};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use tracing::{debug, info, warn};

/// Output of [`DataPreparer::prepare`]
#[derive(Debug, Clone)]
pub struct PreparedData {
    /// Fully numeric frame holding the target and every predictor
    pub frame: DataFrame,
    /// Resolved target column (raw name or its indicator form)
    pub target: String,
    pub predictors: Vec<String>,
    /// Continuous columns among the predictors
    pub continuous: Vec<String>,
    /// Indicator columns produced by dummy encoding
    pub indicators: Vec<String>,
    pub cleaning: CleaningReport,
}

impl PreparedData {
    pub fn n_rows(&self) -> usize {
        self.frame.height()
    }

    /// Predictor matrix in predictor order
    pub fn x(&self) -> Result<Array2<f64>> {
        to_matrix(&self.frame, &self.predictors)
    }

    pub fn y(&self) -> Result<Array1<f64>> {
        to_vector(&self.frame, &self.target)
    }

    /// Target plus predictors, the layout written as the prepared CSV
    pub fn model_frame(&self) -> Result<DataFrame> {
        let mut columns = vec![self.target.clone()];
        columns.extend(self.predictors.iter().cloned());
        Ok(self.frame.select(columns)?)
    }
}

/// Turns the raw table into [`PreparedData`] according to an [`AnalysisConfig`]
pub struct DataPreparer<'a> {
    config: &'a AnalysisConfig,
}

impl<'a> DataPreparer<'a> {
    pub fn new(config: &'a AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn prepare(&self, raw: &DataFrame) -> Result<PreparedData> {
        let config = self.config;
        let target = config.target_column.as_str();
        let raw_columns = column_names(raw);
        let target_in_raw = raw_columns.iter().any(|c| c == target);
        let target_kind = config.column_kind(target);

        // Step 1: projection
        let mut selected: Vec<String> = config
            .columns
            .iter()
            .filter(|c| config.is_active(&c.name))
            .map(|c| c.name.clone())
            .collect();
        for name in &selected {
            if !raw_columns.contains(name) {
                return Err(MedflowError::FeatureNotFound(name.clone()));
            }
        }
        if target_in_raw && target_kind.is_none() {
            selected.push(target.to_string());
        }
        let mut frame = raw.select(selected)?;
        info!(rows = frame.height(), columns = frame.width(), target, "projected raw data");

        // Step 2: rows without a target carry nothing to learn from
        if target_in_raw {
            let mask = frame.column(target)?.is_not_null();
            let before = frame.height();
            frame = frame.filter(&mask)?;
            if frame.height() < before {
                warn!(dropped = before - frame.height(), "dropped rows with missing target");
            }
        }
        if frame.height() == 0 {
            return Err(MedflowError::EmptyData(format!(
                "no rows left after removing missing '{}' values",
                target
            )));
        }

        // Step 3: an unconfigured string target goes through the label mapping
        if target_in_raw && target_kind.is_none() {
            self.map_target(&mut frame)?;
        }

        // Step 4: clean, then encode
        let continuous = config.continuous_columns();
        let categorical = config.categorical_columns();
        let cleaner = DataCleaner::new(config.cleaning.clone());
        let (mut frame, cleaning) = cleaner.clean(&frame, &continuous, &categorical)?;

        let mut resolved_target = target.to_string();
        if target_kind == Some(ColumnKind::Categorical) {
            let (name, column) = binary_indicator(&frame, target)?;
            frame = frame.drop(target)?;
            frame.with_column(column)?;
            debug!(indicator = %name, "categorical target encoded");
            resolved_target = name;
        }

        let to_encode: Vec<String> = categorical.into_iter().filter(|c| c != target).collect();
        let mut encoder = DummyEncoder::new();
        let mut frame = encoder.fit_transform(&frame, &to_encode)?;
        let indicators = encoder.indicator_names();

        if frame.column(&resolved_target).is_err() {
            return Err(MedflowError::MissingTarget(target.to_string()));
        }

        // Step 5: predictors
        let names = column_names(&frame);
        let predictors: Vec<String> = match &config.independent_variables {
            Some(vars) => {
                let mut chosen = Vec::with_capacity(vars.len());
                for var in vars {
                    if *var == resolved_target || var == target {
                        warn!(variable = %var, "target listed as a predictor; ignoring it");
                        continue;
                    }
                    if !names.contains(var) {
                        return Err(MedflowError::FeatureNotFound(var.clone()));
                    }
                    chosen.push(var.clone());
                }
                chosen
            }
            None => names.into_iter().filter(|n| *n != resolved_target).collect(),
        };
        if predictors.is_empty() {
            return Err(MedflowError::DataError("no predictors left after preparation".to_string()));
        }
        let continuous: Vec<String> = continuous
            .into_iter()
            .filter(|c| predictors.contains(c))
            .collect();

        // Step 6: optional scaling of continuous predictors
        if config.cleaning.scale_continuous && !continuous.is_empty() {
            frame = StandardScaler::new().fit_transform(&frame, &continuous)?;
            debug!(columns = continuous.len(), "scaled continuous predictors");
        }

        // Step 7: every column numeric, nothing missing
        for column in frame.get_columns() {
            if !is_numeric(column.dtype()) {
                return Err(MedflowError::NonNumeric(format!(
                    "column '{}' is {} after encoding",
                    column.name(),
                    column.dtype()
                )));
            }
            if column.null_count() > 0 {
                return Err(MedflowError::DataError(format!(
                    "column '{}' still has missing values",
                    column.name()
                )));
            }
        }

        info!(
            rows = frame.height(),
            predictors = predictors.len(),
            indicators = indicators.len(),
            target = %resolved_target,
            "data prepared"
        );

        Ok(PreparedData {
            frame,
            target: resolved_target,
            predictors,
            continuous,
            indicators,
            cleaning,
        })
    }

    fn map_target(&self, frame: &mut DataFrame) -> Result<()> {
        let target = self.config.target_column.as_str();
        let dtype = frame.column(target)?.dtype().clone();
        if is_numeric(&dtype) {
            let cast = frame.column(target)?.cast(&DataType::Float64)?;
            frame.with_column(cast)?;
            return Ok(());
        }

        let mapping = self.config.target_mapping.as_ref().ok_or_else(|| {
            MedflowError::ConfigError(format!(
                "target '{}' holds labels but no target_mapping is configured",
                target
            ))
        })?;
        let mapped = string_values(frame, target)?
            .into_iter()
            .flatten()
            .map(|label| {
                mapping.get(label.trim()).copied().ok_or_else(|| {
                    MedflowError::DataError(format!(
                        "target label '{}' has no entry in target_mapping",
                        label
                    ))
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        frame.with_column(Column::new(target.into(), mapped))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AnalysisKind, ColumnSpec};
    use std::collections::BTreeMap;

    fn raw() -> DataFrame {
        df!(
            "Age" => &[Some(30.0), None, Some(50.0), Some(40.0), Some(35.0)],
            "Stroke" => &["No", "Yes", "No", "No", "Yes"],
            "Overweight" => &["Yes", "No", "Yes", "No", "Yes"],
            "HighBlood" => &[Some("Yes"), Some("No"), None, Some("No"), Some("Yes")]
        )
        .unwrap()
    }

    #[test]
    fn test_categorical_target_becomes_indicator() {
        let config = AnalysisConfig::new(
            AnalysisKind::Knn,
            "Overweight",
            vec![
                ColumnSpec::continuous("Age"),
                ColumnSpec::categorical("Stroke"),
                ColumnSpec::categorical("Overweight"),
            ],
        );
        let prepared = DataPreparer::new(&config).prepare(&raw()).unwrap();

        assert_eq!(prepared.target, "Overweight_Yes");
        assert_eq!(prepared.predictors, vec!["Age", "Stroke_Yes"]);
        assert_eq!(prepared.indicators, vec!["Stroke_Yes"]);
        let y = prepared.y().unwrap();
        assert!(y.iter().all(|v| *v == 0.0 || *v == 1.0));
        assert_eq!(prepared.x().unwrap()[[1, 0]], 37.5);
    }

    #[test]
    fn test_mapped_target_drops_missing_rows() {
        let config = AnalysisConfig::new(
            AnalysisKind::Knn,
            "HighBlood",
            vec![ColumnSpec::continuous("Age"), ColumnSpec::categorical("Stroke")],
        )
        .with_target_mapping(BTreeMap::from([("Yes".to_string(), 1.0), ("No".to_string(), 0.0)]));
        let prepared = DataPreparer::new(&config).prepare(&raw()).unwrap();

        assert_eq!(prepared.n_rows(), 4);
        assert_eq!(prepared.target, "HighBlood");
        assert_eq!(prepared.y().unwrap().to_vec(), vec![1.0, 0.0, 0.0, 1.0]);
        assert_eq!(prepared.model_frame().unwrap().width(), 3);
    }

    #[test]
    fn test_label_target_without_mapping_is_config_error() {
        let config = AnalysisConfig::new(
            AnalysisKind::Knn,
            "HighBlood",
            vec![ColumnSpec::continuous("Age")],
        );
        let err = DataPreparer::new(&config).prepare(&raw()).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_missing_target_and_unknown_predictor() {
        let config = AnalysisConfig::new(
            AnalysisKind::Knn,
            "Diabetes",
            vec![ColumnSpec::continuous("Age")],
        );
        assert!(matches!(
            DataPreparer::new(&config).prepare(&raw()),
            Err(MedflowError::MissingTarget(_))
        ));

        let config = AnalysisConfig::new(
            AnalysisKind::Knn,
            "Overweight",
            vec![ColumnSpec::continuous("Age"), ColumnSpec::categorical("Overweight")],
        )
        .with_independent_variables(vec!["Age".to_string(), "Stroke_Yes".to_string()]);
        assert!(matches!(
            DataPreparer::new(&config).prepare(&raw()),
            Err(MedflowError::FeatureNotFound(_))
        ));
    }

    #[test]
    fn test_independent_variables_skip_target() {
        let config = AnalysisConfig::new(
            AnalysisKind::Knn,
            "Overweight",
            vec![
                ColumnSpec::continuous("Age"),
                ColumnSpec::categorical("Stroke"),
                ColumnSpec::categorical("Overweight"),
            ],
        )
        .with_independent_variables(vec!["Stroke_Yes".to_string(), "Overweight_Yes".to_string()]);
        let prepared = DataPreparer::new(&config).prepare(&raw()).unwrap();
        assert_eq!(prepared.predictors, vec!["Stroke_Yes"]);
        assert!(prepared.continuous.is_empty());
    }
}
