//! Dummy (indicator) encoding of categorical columns
//!
//! Levels are sorted, the first level is the reference and gets no column,
//! and every other level `L` of column `C` becomes an `Int32` column `C_L`.

use crate::error::{MedflowError, Result};
use crate::utils::frame::string_values;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use tracing::debug;

/// Sort levels numerically when they all parse as numbers, else lexicographically
pub fn sorted_levels<I>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut levels: Vec<String> = values.into_iter().collect::<BTreeSet<_>>().into_iter().collect();
    let numeric: Option<Vec<f64>> = levels.iter().map(|l| l.trim().parse::<f64>().ok()).collect();
    if let Some(nums) = numeric {
        let mut paired: Vec<(f64, String)> = nums.into_iter().zip(levels).collect();
        paired.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
        levels = paired.into_iter().map(|(_, l)| l).collect();
    }
    levels
}

pub fn indicator_name(column: &str, level: &str) -> String {
    format!("{}_{}", column, level)
}

/// Levels learned for one categorical column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedColumn {
    pub column: String,
    /// All levels, reference first
    pub levels: Vec<String>,
}

impl EncodedColumn {
    pub fn reference(&self) -> Option<&str> {
        self.levels.first().map(|s| s.as_str())
    }

    pub fn indicator_names(&self) -> Vec<String> {
        self.levels
            .iter()
            .skip(1)
            .map(|l| indicator_name(&self.column, l))
            .collect()
    }
}

/// Drop-first dummy encoder
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DummyEncoder {
    encoded: Vec<EncodedColumn>,
    is_fitted: bool,
}

fn observed(df: &DataFrame, column: &str) -> Result<Vec<String>> {
    string_values(df, column)?
        .into_iter()
        .map(|v| {
            v.ok_or_else(|| {
                MedflowError::DataError(format!(
                    "categorical column '{}' has missing values; clean before encoding",
                    column
                ))
            })
        })
        .collect()
}

fn indicator_column(name: &str, values: &[String], level: &str) -> Column {
    let flags: Vec<i32> = values.iter().map(|v| i32::from(v == level)).collect();
    Column::new(name.into(), flags)
}

impl DummyEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn encoded_columns(&self) -> &[EncodedColumn] {
        &self.encoded
    }

    /// Every indicator column the encoder produces, in output order
    pub fn indicator_names(&self) -> Vec<String> {
        self.encoded.iter().flat_map(|e| e.indicator_names()).collect()
    }

    pub fn fit(&mut self, df: &DataFrame, columns: &[String]) -> Result<&mut Self> {
        self.encoded = columns
            .iter()
            .map(|name| {
                let levels = sorted_levels(observed(df, name)?);
                if levels.len() < 2 {
                    debug!(column = %name, "single level, no indicator columns");
                }
                Ok(EncodedColumn {
                    column: name.clone(),
                    levels,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        self.is_fitted = true;
        Ok(self)
    }

    /// Replace the fitted categorical columns with their indicators, which
    /// are appended after the remaining columns.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(MedflowError::ModelNotFitted);
        }

        let mut indicators = Vec::new();
        for enc in &self.encoded {
            let values = observed(df, &enc.column)?;
            for level in enc.levels.iter().skip(1) {
                indicators.push(indicator_column(
                    &indicator_name(&enc.column, level),
                    &values,
                    level,
                ));
            }
        }

        let dropped: Vec<&str> = self.encoded.iter().map(|e| e.column.as_str()).collect();
        let mut result = df.drop_many(dropped);
        for column in indicators {
            if result.get_column_index(column.name().as_str()).is_some() {
                return Err(MedflowError::DataError(format!(
                    "indicator column '{}' collides with an existing column",
                    column.name()
                )));
            }
            result.with_column(column)?;
        }
        Ok(result)
    }

    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[String]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }
}

/// Encode a two-level categorical column as one indicator.
///
/// Returns the indicator name and its column; more than two levels is an error.
pub fn binary_indicator(df: &DataFrame, column: &str) -> Result<(String, Column)> {
    let values = observed(df, column)?;
    let levels = sorted_levels(values.iter().cloned());
    match levels.as_slice() {
        [_, positive] => {
            let name = indicator_name(column, positive);
            let col = indicator_column(&name, &values, positive);
            Ok((name, col))
        }
        [] | [_] => Err(MedflowError::DataError(format!(
            "target '{}' has a single level; nothing to predict",
            column
        ))),
        _ => Err(MedflowError::DataError(format!(
            "target '{}' has {} levels; a categorical target must be binary",
            column,
            levels.len()
        ))),
    }
}
