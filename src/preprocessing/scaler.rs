//! Standard (z-score) scaling

use crate::error::{MedflowError, Result};
use crate::training::stats::{mean, std_dev};
use crate::utils::frame::numeric_values;
use ndarray::{Array1, Array2, Axis};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Fitted centre and scale for one feature
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalerParams {
    pub center: f64,
    pub scale: f64,
}

impl ScalerParams {
    /// Mean and population standard deviation; a constant feature keeps scale 1
    fn from_values(values: &[f64]) -> Self {
        let center = mean(values).unwrap_or(0.0);
        let std = std_dev(values, 0).unwrap_or(1.0);
        Self {
            center,
            scale: if std == 0.0 || !std.is_finite() { 1.0 } else { std },
        }
    }
}

/// `(x - mean) / std` with the population standard deviation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StandardScaler {
    columns: Vec<String>,
    params: Vec<ScalerParams>,
    is_fitted: bool,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn params(&self) -> &[ScalerParams] {
        &self.params
    }

    /// Fit on named frame columns
    pub fn fit(&mut self, df: &DataFrame, columns: &[String]) -> Result<&mut Self> {
        self.params = columns
            .iter()
            .map(|name| {
                let observed: Vec<f64> = numeric_values(df, name)?.into_iter().flatten().collect();
                Ok(ScalerParams::from_values(&observed))
            })
            .collect::<Result<Vec<_>>>()?;
        self.columns = columns.to_vec();
        self.is_fitted = true;
        Ok(self)
    }

    /// Scale the fitted columns; nulls stay null
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted || (self.columns.is_empty() && !self.params.is_empty()) {
            return Err(MedflowError::ModelNotFitted);
        }

        let replacements = self
            .columns
            .iter()
            .zip(&self.params)
            .map(|(name, p)| -> Result<Column> {
                let scaled: Vec<Option<f64>> = numeric_values(df, name)?
                    .into_iter()
                    .map(|v| v.map(|x| (x - p.center) / p.scale))
                    .collect();
                Ok(Column::new(name.as_str().into(), scaled))
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

    /// Fit on the columns of a dense matrix
    pub fn fit_array(&mut self, x: &Array2<f64>) -> &mut Self {
        self.params = x
            .axis_iter(Axis(1))
            .map(|col| ScalerParams::from_values(&col.to_vec()))
            .collect();
        self.columns.clear();
        self.is_fitted = true;
        self
    }

    pub fn transform_array(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(MedflowError::ModelNotFitted);
        }
        if x.ncols() != self.params.len() {
            return Err(MedflowError::ShapeError {
                expected: format!("{} features", self.params.len()),
                actual: format!("{} features", x.ncols()),
            });
        }
        let center: Array1<f64> = self.params.iter().map(|p| p.center).collect();
        let scale: Array1<f64> = self.params.iter().map(|p| p.scale).collect();
        Ok((x - &center.insert_axis(Axis(0))) / &scale.insert_axis(Axis(0)))
    }

    pub fn fit_transform_array(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit_array(x);
        self.transform_array(x)
    }
}
