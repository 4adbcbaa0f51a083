//! IQR-based outlier handling
//!
//! Values outside `[Q1 - f·IQR, Q3 + f·IQR]` are treated as missing and
//! refilled with the median of the values that remain. Rows are never dropped.

use crate::error::{MedflowError, Result};
use crate::training::stats::{iqr_bounds, median};
use crate::utils::frame::numeric_values;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutlierBounds {
    pub lower: f64,
    pub upper: f64,
}

impl OutlierBounds {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutlierCapper {
    /// IQR multiplier, 1.5 for Tukey fences
    pub factor: f64,
}

impl Default for OutlierCapper {
    fn default() -> Self {
        Self { factor: 1.5 }
    }
}

impl OutlierCapper {
    pub fn new(factor: f64) -> Self {
        Self { factor }
    }

    pub fn bounds(&self, values: &[f64]) -> Option<OutlierBounds> {
        iqr_bounds(values, self.factor).map(|(lower, upper)| OutlierBounds { lower, upper })
    }

    /// Replace outliers in place; returns how many were replaced
    pub fn cap(&self, values: &mut [f64]) -> usize {
        let Some(bounds) = self.bounds(values) else {
            return 0;
        };
        let inliers: Vec<f64> = values.iter().copied().filter(|v| bounds.contains(*v)).collect();
        let Some(fill) = median(&inliers) else {
            return 0;
        };

        let mut replaced = 0;
        for v in values.iter_mut() {
            if !bounds.contains(*v) {
                *v = fill;
                replaced += 1;
            }
        }
        replaced
    }

    /// Cap one fully populated numeric column of `df`
    pub fn apply(&self, df: &mut DataFrame, column: &str) -> Result<usize> {
        let mut values = numeric_values(df, column)?
            .into_iter()
            .collect::<Option<Vec<f64>>>()
            .ok_or_else(|| {
                MedflowError::DataError(format!(
                    "column '{}' must be imputed before outlier handling",
                    column
                ))
            })?;
        let replaced = self.cap(&mut values);
        df.with_column(Column::new(column.into(), values))?;
        Ok(replaced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extreme_value_becomes_median() {
        let mut values: Vec<f64> = (1..=9).map(f64::from).chain([100.0]).collect();
        let capper = OutlierCapper::default();

        let bounds = capper.bounds(&values).unwrap();
        assert!((bounds.lower - (-3.5)).abs() < 1e-12);
        assert!((bounds.upper - 14.5).abs() < 1e-12);

        assert_eq!(capper.cap(&mut values), 1);
        assert_eq!(values[9], 5.0);
    }

    #[test]
    fn test_no_outliers_untouched() {
        let mut values = vec![1.0, 2.0, 3.0, 4.0];
        assert_eq!(OutlierCapper::default().cap(&mut values), 0);
        assert_eq!(values, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_apply_to_frame() {
        let mut df = df!("charge" => &[10.0, 11.0, 12.0, 13.0, 500.0]).unwrap();
        let replaced = OutlierCapper::default().apply(&mut df, "charge").unwrap();
        assert_eq!(replaced, 1);
        let col = df.column("charge").unwrap().f64().unwrap();
        assert_eq!(col.get(4), Some(11.5));
    }

    #[test]
    fn test_apply_requires_imputed_column() {
        let mut df = df!("x" => &[Some(1.0), None]).unwrap();
        assert!(OutlierCapper::default().apply(&mut df, "x").is_err());
    }
}
