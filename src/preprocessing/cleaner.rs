//! Cleaning stage: impute, null out IQR outliers, re-impute

use super::imputer::{ImputeStrategy, Imputer};
use super::outlier::OutlierCapper;
use crate::config::{CategoricalFill, CleaningConfig};
use crate::error::{MedflowError, Result};
use crate::utils::frame::{is_numeric, string_values};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// What the cleaner changed, per column
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleaningReport {
    pub rows_in: usize,
    pub duplicates_removed: usize,
    pub imputed: BTreeMap<String, usize>,
    pub outliers_replaced: BTreeMap<String, usize>,
}

impl CleaningReport {
    pub fn total_imputed(&self) -> usize {
        self.imputed.values().sum()
    }

    pub fn total_outliers(&self) -> usize {
        self.outliers_replaced.values().sum()
    }
}

#[derive(Debug, Clone, Default)]
pub struct DataCleaner {
    config: CleaningConfig,
}

/// Turn a string column holding numbers into `Float64`; blanks become null
fn parse_numeric(df: &mut DataFrame, column: &str) -> Result<()> {
    let parsed = string_values(df, column)?
        .into_iter()
        .map(|v| match v.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) => s.parse::<f64>().map(Some).map_err(|_| {
                MedflowError::NonNumeric(format!("column '{}' holds non-numeric value '{}'", column, s))
            }),
        })
        .collect::<Result<Vec<Option<f64>>>>()?;
    df.with_column(Column::new(column.into(), parsed))?;
    Ok(())
}

fn null_count(df: &DataFrame, column: &str) -> Result<usize> {
    df.column(column)
        .map(|c| c.null_count())
        .map_err(|_| MedflowError::FeatureNotFound(column.to_string()))
}

impl DataCleaner {
    pub fn new(config: CleaningConfig) -> Self {
        Self { config }
    }

    /// Clean the configured columns of `df`; other columns pass through.
    pub fn clean(
        &self,
        df: &DataFrame,
        continuous: &[String],
        categorical: &[String],
    ) -> Result<(DataFrame, CleaningReport)> {
        let mut report = CleaningReport {
            rows_in: df.height(),
            ..Default::default()
        };

        let mut frame = if self.config.drop_duplicates {
            let deduped = df
                .clone()
                .lazy()
                .unique_stable(None, UniqueKeepStrategy::First)
                .collect()?;
            report.duplicates_removed = df.height() - deduped.height();
            if report.duplicates_removed > 0 {
                info!(removed = report.duplicates_removed, "dropped duplicate rows");
            }
            deduped
        } else {
            df.clone()
        };

        for name in continuous {
            let dtype = frame
                .column(name)
                .map_err(|_| MedflowError::FeatureNotFound(name.clone()))?
                .dtype()
                .clone();
            if !is_numeric(&dtype) {
                debug!(column = %name, dtype = %dtype, "parsing continuous column");
                parse_numeric(&mut frame, name)?;
            }
        }

        for name in continuous.iter().chain(categorical) {
            let missing = null_count(&frame, name)?;
            report.imputed.insert(name.clone(), missing);
        }

        if !continuous.is_empty() {
            frame = Imputer::new(ImputeStrategy::Median).fit_transform(&frame, continuous)?;
        }
        if !categorical.is_empty() {
            let strategy = match self.config.categorical_fill {
                CategoricalFill::Mode => ImputeStrategy::Mode,
                CategoricalFill::Unknown => ImputeStrategy::Unknown,
            };
            frame = Imputer::new(strategy).fit_transform(&frame, categorical)?;
        }

        if self.config.handle_outliers {
            let capper = OutlierCapper::new(self.config.iqr_factor);
            for name in continuous {
                let replaced = capper.apply(&mut frame, name)?;
                if replaced > 0 {
                    debug!(column = %name, replaced, "outliers re-imputed");
                }
                report.outliers_replaced.insert(name.clone(), replaced);
            }
        }

        info!(
            rows = frame.height(),
            imputed = report.total_imputed(),
            outliers = report.total_outliers(),
            "cleaning complete"
        );
        Ok((frame, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cleaner() -> DataCleaner {
        DataCleaner::new(CleaningConfig::default())
    }

    #[test]
    fn test_no_missing_after_cleaning() {
        let df = df!(
            "Age" => &[Some(30.0), None, Some(50.0), Some(40.0)],
            "Gender" => &[Some("F"), Some("M"), None, Some("F")]
        )
        .unwrap();
        let (out, report) = cleaner()
            .clean(&df, &["Age".to_string()], &["Gender".to_string()])
            .unwrap();

        assert_eq!(out.column("Age").unwrap().null_count(), 0);
        assert_eq!(out.column("Gender").unwrap().null_count(), 0);
        assert_eq!(out.column("Age").unwrap().f64().unwrap().get(1), Some(40.0));
        assert_eq!(out.column("Gender").unwrap().str().unwrap().get(2), Some("F"));
        assert_eq!(report.imputed["Age"], 1);
        assert_eq!(report.total_imputed(), 2);
    }

    #[test]
    fn test_outlier_replaced_by_median() {
        let values: Vec<f64> = (1..=9).map(f64::from).chain([100.0]).collect();
        let df = df!("Income" => &values).unwrap();
        let (out, report) = cleaner().clean(&df, &["Income".to_string()], &[]).unwrap();

        assert_eq!(out.column("Income").unwrap().f64().unwrap().get(9), Some(5.0));
        assert_eq!(report.outliers_replaced["Income"], 1);
    }

    #[test]
    fn test_outlier_pass_can_be_disabled() {
        let values: Vec<f64> = (1..=9).map(f64::from).chain([100.0]).collect();
        let df = df!("Income" => &values).unwrap();
        let config = CleaningConfig {
            handle_outliers: false,
            ..Default::default()
        };
        let (out, _) = DataCleaner::new(config)
            .clean(&df, &["Income".to_string()], &[])
            .unwrap();
        assert_eq!(out.column("Income").unwrap().f64().unwrap().get(9), Some(100.0));
    }

    #[test]
    fn test_string_continuous_column_parsed() {
        let df = df!("Vit" => &[Some("1.5"), Some(" 2.5 "), Some(""), None]).unwrap();
        let (out, report) = cleaner().clean(&df, &["Vit".to_string()], &[]).unwrap();
        assert_eq!(out.column("Vit").unwrap().dtype(), &DataType::Float64);
        assert_eq!(report.imputed["Vit"], 2);

        let bad = df!("Vit" => &["1.0", "abc"]).unwrap();
        let err = cleaner().clean(&bad, &["Vit".to_string()], &[]).unwrap_err();
        assert!(matches!(err, MedflowError::NonNumeric(_)));
        assert_eq!(
            err.to_string(),
            "Non-numeric data: column 'Vit' holds non-numeric value 'abc'"
        );
    }

    #[test]
    fn test_drop_duplicates() {
        let df = df!("a" => &[1.0, 1.0, 2.0], "b" => &["x", "x", "y"]).unwrap();
        let config = CleaningConfig {
            drop_duplicates: true,
            ..Default::default()
        };
        let (out, report) = DataCleaner::new(config)
            .clean(&df, &["a".to_string()], &["b".to_string()])
            .unwrap();
        assert_eq!(out.height(), 2);
        assert_eq!(report.duplicates_removed, 1);
    }

    #[test]
    fn test_unknown_fill() {
        let df = df!("Area" => &[Some("Urban"), None]).unwrap();
        let config = CleaningConfig {
            categorical_fill: CategoricalFill::Unknown,
            ..Default::default()
        };
        let (out, _) = DataCleaner::new(config).clean(&df, &[], &["Area".to_string()]).unwrap();
        assert_eq!(out.column("Area").unwrap().str().unwrap().get(1), Some("Unknown"));
    }
}
