//! Descriptive statistics written at the start of every run

use crate::error::{MedflowError, Result};
use crate::preprocessing::PreparedData;
use crate::results::{OutputDir, ResultWriter};
use crate::training::stats::{pearson, Describe};
use crate::utils::frame::numeric_values;
use ndarray::Array2;
use polars::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorCount {
    pub column: String,
    pub ones: usize,
    pub zeros: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryStatistics {
    pub target: String,
    pub target_stats: Describe,
    pub continuous: Vec<(String, Describe)>,
    pub indicators: Vec<IndicatorCount>,
    /// Columns of the correlation matrix: target first, then predictors
    pub columns: Vec<String>,
    pub correlation: Array2<f64>,
}

fn column_values(prepared: &PreparedData, name: &str) -> Result<Vec<f64>> {
    Ok(numeric_values(&prepared.frame, name)?.into_iter().flatten().collect())
}

fn describe(prepared: &PreparedData, name: &str) -> Result<Describe> {
    Describe::from_values(&column_values(prepared, name)?)
        .ok_or_else(|| MedflowError::EmptyData(format!("column '{}' has no values", name)))
}

impl SummaryStatistics {
    pub fn compute(prepared: &PreparedData) -> Result<Self> {
        let target_stats = describe(prepared, &prepared.target)?;
        let continuous = prepared
            .continuous
            .iter()
            .map(|c| Ok((c.clone(), describe(prepared, c)?)))
            .collect::<Result<Vec<_>>>()?;
        let indicators = prepared
            .indicators
            .iter()
            .filter(|c| prepared.predictors.contains(c))
            .map(|c| {
                let values = column_values(prepared, c)?;
                let ones = values.iter().filter(|v| **v >= 0.5).count();
                Ok(IndicatorCount {
                    column: c.clone(),
                    ones,
                    zeros: values.len() - ones,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut columns = vec![prepared.target.clone()];
        columns.extend(prepared.predictors.iter().cloned());
        let data = columns
            .iter()
            .map(|c| column_values(prepared, c))
            .collect::<Result<Vec<_>>>()?;

        let p = columns.len();
        let upper: Vec<(usize, usize, f64)> = (0..p)
            .into_par_iter()
            .flat_map_iter(|i| {
                let data = &data;
                (i..p).map(move |j| {
                    let r = if i == j { 1.0 } else { pearson(&data[i], &data[j]) };
                    (i, j, r)
                })
            })
            .collect();
        let mut correlation = Array2::zeros((p, p));
        for (i, j, r) in upper {
            correlation[[i, j]] = r;
            correlation[[j, i]] = r;
        }

        Ok(Self {
            target: prepared.target.clone(),
            target_stats,
            continuous,
            indicators,
            columns,
            correlation,
        })
    }

    pub fn correlation_frame(&self) -> Result<DataFrame> {
        let mut cols = vec![Column::new("variable".into(), self.columns.clone())];
        for (j, name) in self.columns.iter().enumerate() {
            cols.push(Column::new(name.as_str().into(), self.correlation.column(j).to_vec()));
        }
        Ok(DataFrame::new(cols)?)
    }

    pub fn to_text(&self) -> String {
        let header = format!(
            "{:<24} {:>8} {:>12} {:>12} {:>12} {:>12} {:>12} {:>12} {:>12}\n",
            "", "count", "mean", "std", "min", "25%", "50%", "75%", "max"
        );
        let row = |name: &str, d: &Describe| {
            format!(
                "{:<24} {:>8} {:>12.4} {:>12.4} {:>12.4} {:>12.4} {:>12.4} {:>12.4} {:>12.4}\n",
                name, d.count, d.mean, d.std, d.min, d.q25, d.median, d.q75, d.max
            )
        };

        let mut out = format!("Target: {}\n", self.target);
        out.push_str(&header);
        out.push_str(&row(&self.target, &self.target_stats));

        if !self.continuous.is_empty() {
            out.push_str("\nContinuous predictors:\n");
            out.push_str(&header);
            for (name, d) in &self.continuous {
                out.push_str(&row(name, d));
            }
        }

        if !self.indicators.is_empty() {
            out.push_str("\nIndicator counts:\n");
            for c in &self.indicators {
                let _ = writeln!(out, "{:<24} 1: {:>6}   0: {:>6}", c.column, c.ones, c.zeros);
            }
        }

        out.push_str("\nCorrelation with target:\n");
        for (j, name) in self.columns.iter().enumerate().skip(1) {
            let _ = writeln!(out, "{:<24} {:>8.4}", name, self.correlation[[0, j]]);
        }
        out
    }

    pub fn write(&self, writer: &ResultWriter) -> Result<()> {
        writer.write_text(OutputDir::Results, "summary_statistics.txt", &self.to_text())?;
        writer.write_frame(OutputDir::Visuals, "correlation_matrix.csv", &self.correlation_frame()?)?;
        Ok(())
    }
}
