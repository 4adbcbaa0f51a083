//! Missing value imputation

use crate::error::{MedflowError, Result};
use crate::training::stats::median;
use crate::utils::frame::{numeric_values, string_values};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Level used by [`ImputeStrategy::Unknown`]
pub const UNKNOWN_LEVEL: &str = "Unknown";

/// How missing values get filled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImputeStrategy {
    /// Median of the observed values (numeric columns)
    Median,
    /// Most frequent level (categorical columns)
    Mode,
    /// The literal level `"Unknown"` (categorical columns)
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FillValue {
    Number(f64),
    Label(String),
}

/// Column-wise imputer fitted on one frame and applied to the same or another
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Imputer {
    strategy: ImputeStrategy,
    fill_values: HashMap<String, FillValue>,
    columns: Vec<String>,
    is_fitted: bool,
}

/// Most frequent value; ties go to the smallest level
pub fn mode<'a, I>(values: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for v in values {
        *counts.entry(v).or_insert(0) += 1;
    }
    let mut best: Option<(&str, usize)> = None;
    for (level, count) in counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((level, count));
        }
    }
    best.map(|(level, _)| level.to_string())
}

impl Imputer {
    pub fn new(strategy: ImputeStrategy) -> Self {
        Self {
            strategy,
            fill_values: HashMap::new(),
            columns: Vec::new(),
            is_fitted: false,
        }
    }

    pub fn fill_value(&self, column: &str) -> Option<&FillValue> {
        self.fill_values.get(column)
    }

    /// Learn one fill value per column
    pub fn fit(&mut self, df: &DataFrame, columns: &[String]) -> Result<&mut Self> {
        self.fill_values.clear();
        for name in columns {
            let fill = match self.strategy {
                ImputeStrategy::Median => {
                    let observed: Vec<f64> =
                        numeric_values(df, name)?.into_iter().flatten().collect();
                    let m = median(&observed).ok_or_else(|| {
                        MedflowError::DataError(format!(
                            "column '{}' has no observed values to impute from",
                            name
                        ))
                    })?;
                    FillValue::Number(m)
                }
                ImputeStrategy::Mode => {
                    let values = string_values(df, name)?;
                    // An all-missing column falls back to the sentinel level
                    let level = mode(values.iter().flatten().map(|s| s.as_str()))
                        .unwrap_or_else(|| UNKNOWN_LEVEL.to_string());
                    FillValue::Label(level)
                }
                ImputeStrategy::Unknown => FillValue::Label(UNKNOWN_LEVEL.to_string()),
            };
            self.fill_values.insert(name.clone(), fill);
        }
        self.columns = columns.to_vec();
        self.is_fitted = true;
        Ok(self)
    }

    /// Replace missing entries. Numeric fills produce `Float64` columns,
    /// label fills produce `String` columns.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(MedflowError::ModelNotFitted);
        }

        let replacements = self
            .columns
            .iter()
            .filter_map(|name| self.fill_values.get(name).map(|fill| (name, fill)))
            .map(|(name, fill)| -> Result<Column> {
                match fill {
                    FillValue::Number(v) => {
                        let filled: Vec<f64> = numeric_values(df, name)?
                            .into_iter()
                            .map(|x| x.unwrap_or(*v))
                            .collect();
                        Ok(Column::new(name.as_str().into(), filled))
                    }
                    FillValue::Label(level) => {
                        let filled: Vec<String> = string_values(df, name)?
                            .into_iter()
                            .map(|x| x.unwrap_or_else(|| level.clone()))
                            .collect();
                        Ok(Column::new(name.as_str().into(), filled))
                    }
                }
            })
            .collect::<Result<Vec<_>>>()?;

        let mut result = df.clone();
        for column in replacements {
            result.with_column(column)?;
        }
        Ok(result)
    }

    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[String]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_tie_prefers_smallest() {
        assert_eq!(mode(["b", "a", "b", "a"]), Some("a".to_string()));
        assert_eq!(mode(["b", "b", "a"]), Some("b".to_string()));
        assert_eq!(mode(Vec::<&str>::new()), None);
    }

    #[test]
    fn test_median_imputation() {
        let df = df!("age" => &[Some(10.0), None, Some(30.0), Some(20.0)]).unwrap();
        let mut imputer = Imputer::new(ImputeStrategy::Median);
        let out = imputer.fit_transform(&df, &["age".to_string()]).unwrap();

        assert_eq!(imputer.fill_value("age"), Some(&FillValue::Number(20.0)));
        let col = out.column("age").unwrap().f64().unwrap();
        assert_eq!(col.null_count(), 0);
        assert_eq!(col.get(1), Some(20.0));
    }

    #[test]
    fn test_mode_and_unknown_imputation() {
        let df = df!("smoker" => &[Some("No"), None, Some("Yes"), Some("No")]).unwrap();
        let cols = ["smoker".to_string()];

        let out = Imputer::new(ImputeStrategy::Mode).fit_transform(&df, &cols).unwrap();
        assert_eq!(out.column("smoker").unwrap().str().unwrap().get(1), Some("No"));

        let out = Imputer::new(ImputeStrategy::Unknown).fit_transform(&df, &cols).unwrap();
        assert_eq!(out.column("smoker").unwrap().str().unwrap().get(1), Some("Unknown"));
    }

    #[test]
    fn test_all_missing_numeric_fails() {
        let df = df!("x" => &[None::<f64>, None]).unwrap();
        let result = Imputer::new(ImputeStrategy::Median).fit(&df, &["x".to_string()]).map(|_| ());
        assert!(matches!(result, Err(MedflowError::DataError(_))));
    }

    #[test]
    fn test_transform_before_fit() {
        let df = df!("x" => &[1.0]).unwrap();
        assert!(Imputer::new(ImputeStrategy::Median).transform(&df).is_err());
    }
}
