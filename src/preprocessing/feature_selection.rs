//! Multicollinearity filtering by variance inflation factor
//!
//! VIF_j = 1 / (1 - R²_j), where R²_j comes from regressing predictor j on
//! every other predictor (with intercept). Filtering is stepwise: the worst
//! predictor above the threshold is removed and the rest are re-scored.

use crate::error::{MedflowError, Result};
use crate::training::linear_models::LinearRegression;
use crate::training::stats::variance;
use crate::utils::frame::to_matrix;
use ndarray::{Array2, Axis};
use polars::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// R² at or above this is treated as perfect collinearity
const PERFECT_FIT: f64 = 1.0 - 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VifEntry {
    pub feature: String,
    pub vif: f64,
}

/// Variance inflation factor of every column of `x`
pub fn compute_vif(x: &Array2<f64>, names: &[String]) -> Result<Vec<VifEntry>> {
    if x.ncols() != names.len() {
        return Err(MedflowError::ShapeError {
            expected: format!("{} feature names", x.ncols()),
            actual: format!("{} feature names", names.len()),
        });
    }
    let p = x.ncols();
    if p == 0 {
        return Ok(Vec::new());
    }
    if p == 1 {
        return Ok(vec![VifEntry {
            feature: names[0].clone(),
            vif: 1.0,
        }]);
    }

    let constant: Vec<bool> = (0..p)
        .map(|j| variance(&x.column(j).to_vec(), 0).map_or(true, |v| v <= f64::EPSILON * 1e3))
        .collect();

    (0..p)
        .into_par_iter()
        .map(|j| {
            let y = x.column(j).to_owned();
            // Constant regressors explain nothing and are left out
            let others: Vec<usize> = (0..p).filter(|&k| k != j && !constant[k]).collect();
            let vif = if constant[j] {
                f64::INFINITY
            } else if others.is_empty() {
                1.0
            } else {
                let mut model = LinearRegression::new();
                model.fit(&x.select(Axis(1), &others), &y)?;
                let r2 = model.inference()?.r_squared;
                if r2 >= PERFECT_FIT {
                    f64::INFINITY
                } else {
                    1.0 / (1.0 - r2)
                }
            };
            Ok(VifEntry {
                feature: names[j].clone(),
                vif,
            })
        })
        .collect()
}

/// Outcome of a VIF filtering pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VifReport {
    pub threshold: f64,
    /// Scores of every candidate before anything was removed
    pub table: Vec<VifEntry>,
    pub retained: Vec<String>,
    /// Removed predictors, in removal order
    pub dropped: Vec<String>,
    /// Scores of the retained predictors
    pub final_table: Vec<VifEntry>,
}

impl VifReport {
    /// Initial table as a two-column frame (`feature`, `VIF`)
    pub fn to_frame(&self) -> Result<DataFrame> {
        let features: Vec<String> = self.table.iter().map(|e| e.feature.clone()).collect();
        let vifs: Vec<f64> = self.table.iter().map(|e| e.vif).collect();
        let retained: Vec<bool> = features.iter().map(|f| self.retained.contains(f)).collect();
        Ok(DataFrame::new(vec![
            Column::new("feature".into(), features),
            Column::new("VIF".into(), vifs),
            Column::new("retained".into(), retained),
        ])?)
    }

    pub fn to_text(&self) -> String {
        let width = self.table.iter().map(|e| e.feature.len()).max().unwrap_or(7).max(7);
        let mut out = format!("{:<width$}  {:>12}\n", "feature", "VIF", width = width);
        for e in &self.table {
            let mark = if self.retained.contains(&e.feature) { "" } else { "  (dropped)" };
            out.push_str(&format!("{:<width$}  {:>12.4}{}\n", e.feature, e.vif, mark, width = width));
        }
        out
    }
}

/// Stepwise VIF filter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VifFilter {
    pub threshold: f64,
}

impl VifFilter {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Filter the numeric columns of a matrix
    pub fn filter_matrix(&self, x: &Array2<f64>, names: &[String]) -> Result<VifReport> {
        let table = compute_vif(x, names)?;
        let mut active: Vec<usize> = (0..names.len()).collect();
        let mut dropped = Vec::new();
        let mut current = table.clone();

        loop {
            // Largest VIF above the threshold; ties go to the later column
            let worst = current
                .iter()
                .enumerate()
                .filter(|(_, e)| e.vif > self.threshold)
                .fold(None::<(usize, f64)>, |best, (i, e)| match best {
                    Some((_, v)) if v > e.vif => best,
                    _ => Some((i, e.vif)),
                });
            let Some((pos, vif)) = worst else { break };

            let removed = active.remove(pos);
            debug!(feature = %names[removed], vif, "removed for multicollinearity");
            dropped.push(names[removed].clone());

            let sub_names: Vec<String> = active.iter().map(|&i| names[i].clone()).collect();
            current = compute_vif(&x.select(Axis(1), &active), &sub_names)?;
        }

        let retained: Vec<String> = active.iter().map(|&i| names[i].clone()).collect();
        info!(
            threshold = self.threshold,
            retained = retained.len(),
            dropped = dropped.len(),
            "VIF filter"
        );
        Ok(VifReport {
            threshold: self.threshold,
            table,
            retained,
            dropped,
            final_table: current,
        })
    }

    /// Filter `candidates` of `df`, first removing the target (raw or `_Yes` form)
    pub fn filter(&self, df: &DataFrame, candidates: &[String], target: &str) -> Result<VifReport> {
        let indicator = format!("{}_Yes", target);
        let predictors: Vec<String> = candidates
            .iter()
            .filter(|c| c.as_str() != target && **c != indicator)
            .cloned()
            .collect();
        if predictors.len() == candidates.len() {
            debug!(target, "target not among VIF candidates");
        } else {
            debug!(target, "target removed from VIF candidates");
        }
        if predictors.is_empty() {
            warn!("no predictors to score for VIF");
        }

        let x = to_matrix(df, &predictors)?;
        self.filter_matrix(&x, &predictors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn random_columns(n: usize, p: usize, seed: u64) -> Array2<f64> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        Array2::from_shape_fn((n, p), |_| rng.gen_range(0.0..10.0))
    }

    #[test]
    fn test_independent_columns_have_low_vif() {
        let x = random_columns(200, 3, 1);
        let vifs = compute_vif(&x, &names(&["a", "b", "c"])).unwrap();
        assert!(vifs.iter().all(|e| e.vif < 1.2));
    }

    #[test]
    fn test_single_and_constant_columns() {
        let x = random_columns(10, 1, 2);
        assert_eq!(compute_vif(&x, &names(&["a"])).unwrap()[0].vif, 1.0);

        let mut x = random_columns(10, 2, 3);
        x.column_mut(1).fill(4.0);
        let vifs = compute_vif(&x, &names(&["a", "k"])).unwrap();
        assert_eq!(vifs[0].vif, 1.0);
        assert!(vifs[1].vif.is_infinite());
    }

    #[test]
    fn test_constant_column_is_filtered_out() {
        let mut x = random_columns(50, 3, 5);
        x.column_mut(2).fill(5.0);
        let report = VifFilter::new(10.0)
            .filter_matrix(&x, &names(&["Age", "Income", "Doc_visits"]))
            .unwrap();

        assert!(report.table[0].vif < 2.0);
        assert_eq!(report.dropped, names(&["Doc_visits"]));
        assert_eq!(report.retained, names(&["Age", "Income"]));
    }

    #[test]
    fn test_collinear_twin_is_dropped() {
        let mut x = random_columns(100, 3, 4);
        let age = x.column(0).to_owned();
        x.column_mut(2).assign(&(&age * 2.0 + 1.0));
        let report = VifFilter::new(10.0)
            .filter_matrix(&x, &names(&["Age", "Income", "Age_twin"]))
            .unwrap();

        assert!(report.table[0].vif > 10.0);
        assert!(report.table[2].vif > 10.0);
        assert_eq!(report.dropped, names(&["Age_twin"]));
        assert_eq!(report.retained, names(&["Age", "Income"]));
        assert!(report.final_table.iter().all(|e| e.vif <= 10.0));
    }

    #[test]
    fn test_filter_excludes_target() {
        let df = df!(
            "Age" => &[30.0, 41.0, 52.0, 25.0, 60.0, 33.0],
            "Income" => &[10.0, 8.0, 30.0, 22.0, 15.0, 19.0],
            "Overweight_Yes" => &[0i32, 1, 1, 0, 1, 0]
        )
        .unwrap();
        let candidates = names(&["Age", "Income", "Overweight_Yes"]);
        let report = VifFilter::new(10.0).filter(&df, &candidates, "Overweight").unwrap();
        assert_eq!(report.table.len(), 2);
        assert!(!report.retained.contains(&"Overweight_Yes".to_string()));

        let frame = report.to_frame().unwrap();
        assert_eq!(frame.height(), 2);
    }
}
