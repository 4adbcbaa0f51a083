//! Predictor reduction for linear models
//!
//! Lasso keeps the predictors with a non-zero coefficient; backward
//! elimination repeatedly drops the least significant predictor.

use crate::error::{MedflowError, Result};
use crate::training::linear_models::{LassoRegression, LinearRegression};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Reduction strategy applied after the VIF filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReductionMethod {
    Lasso,
    BackwardElimination,
}

impl ReductionMethod {
    pub fn slug(&self) -> &'static str {
        match self {
            ReductionMethod::Lasso => "lasso",
            ReductionMethod::BackwardElimination => "backward_elimination",
        }
    }

    /// Column header used in the variable selection table
    pub fn title(&self) -> &'static str {
        match self {
            ReductionMethod::Lasso => "Lasso",
            ReductionMethod::BackwardElimination => "Backward Elimination",
        }
    }
}

impl fmt::Display for ReductionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

fn check_names(x: &Array2<f64>, names: &[String]) -> Result<()> {
    if x.ncols() != names.len() {
        return Err(MedflowError::ShapeError {
            expected: format!("{} feature names", x.ncols()),
            actual: format!("{} feature names", names.len()),
        });
    }
    Ok(())
}

/// Predictors with a non-zero Lasso coefficient at strength `alpha`
pub fn lasso_selection(
    x: &Array2<f64>,
    y: &Array1<f64>,
    names: &[String],
    alpha: f64,
) -> Result<Vec<String>> {
    check_names(x, names)?;
    let mut model = LassoRegression::new(alpha).with_max_iter(5000);
    model.fit(x, y)?;
    let selected: Vec<String> = model
        .selected_features()?
        .into_iter()
        .map(|i| names[i].clone())
        .collect();
    debug!(alpha, kept = selected.len(), total = names.len(), "lasso selection");
    Ok(selected)
}

/// Drop the predictor with the largest p-value while it exceeds `significance`
pub fn backward_elimination(
    x: &Array2<f64>,
    y: &Array1<f64>,
    names: &[String],
    significance: f64,
) -> Result<Vec<String>> {
    check_names(x, names)?;
    let mut active: Vec<usize> = (0..names.len()).collect();

    while !active.is_empty() {
        let sub = x.select(Axis(1), &active);
        let mut model = LinearRegression::new();
        model.fit(&sub, y)?;
        let p_values = &model.inference()?.p_values;

        // NaN p-values (no residual degrees of freedom) count as insignificant
        let worst = p_values
            .iter()
            .enumerate()
            .map(|(i, &p)| (i, if p.is_nan() { 1.0 } else { p }))
            .max_by(|a, b| a.1.total_cmp(&b.1));

        match worst {
            Some((pos, p)) if p > significance => {
                debug!(feature = %names[active[pos]], p_value = p, "eliminated");
                active.remove(pos);
            }
            _ => break,
        }
    }

    Ok(active.into_iter().map(|i| names[i].clone()).collect())
}

/// OLS refit on a subset of predictors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReducedModel {
    pub label: String,
    pub features: Vec<String>,
    pub r_squared: f64,
    pub adj_r_squared: f64,
    pub mse: f64,
    pub rse: f64,
}

impl ReducedModel {
    /// Refit OLS on `subset` (names drawn from `names`)
    pub fn refit(
        label: impl Into<String>,
        x: &Array2<f64>,
        y: &Array1<f64>,
        names: &[String],
        subset: &[String],
    ) -> Result<Self> {
        check_names(x, names)?;
        let idx = subset
            .iter()
            .map(|s| {
                names
                    .iter()
                    .position(|n| n == s)
                    .ok_or_else(|| MedflowError::FeatureNotFound(s.clone()))
            })
            .collect::<Result<Vec<usize>>>()?;

        let label = label.into();
        if idx.is_empty() {
            // Intercept-only model
            let n = y.len() as f64;
            let mean = y.mean().unwrap_or(0.0);
            let rss = y.mapv(|v| (v - mean).powi(2)).sum();
            return Ok(Self {
                label,
                features: Vec::new(),
                r_squared: 0.0,
                adj_r_squared: 0.0,
                mse: rss / n,
                rse: if n > 1.0 { (rss / (n - 1.0)).sqrt() } else { f64::NAN },
            });
        }

        let mut model = LinearRegression::new();
        model.fit(&x.select(Axis(1), &idx), y)?;
        let inf = model.inference()?;
        Ok(Self {
            label,
            features: subset.to_vec(),
            r_squared: inf.r_squared,
            adj_r_squared: inf.adj_r_squared,
            mse: inf.mse,
            rse: inf.rse,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn noisy_data() -> (Array2<f64>, Array1<f64>, Vec<String>) {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let n = 200;
        let mut x = Array2::zeros((n, 3));
        let mut y = Array1::zeros(n);
        for i in 0..n {
            let a: f64 = rng.gen_range(-3.0..3.0);
            let b: f64 = rng.gen_range(-3.0..3.0);
            let noise: f64 = rng.gen_range(-3.0..3.0);
            x[[i, 0]] = a;
            x[[i, 1]] = b;
            x[[i, 2]] = noise;
            y[i] = 4.0 * a - 3.0 * b + rng.gen_range(-0.1..0.1);
        }
        let names = vec!["a".to_string(), "b".to_string(), "noise".to_string()];
        (x, y, names)
    }

    #[test]
    fn test_method_serde_names() {
        let m: ReductionMethod = serde_json::from_str("\"backward_elimination\"").unwrap();
        assert_eq!(m, ReductionMethod::BackwardElimination);
        assert_eq!(ReductionMethod::Lasso.to_string(), "lasso");
    }

    #[test]
    fn test_lasso_selection_drops_noise() {
        let (x, y, names) = noisy_data();
        let kept = lasso_selection(&x, &y, &names, 0.5).unwrap();
        assert_eq!(kept, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_backward_elimination_drops_noise() {
        let (x, y, names) = noisy_data();
        let kept = backward_elimination(&x, &y, &names, 0.05).unwrap();
        assert!(kept.contains(&"a".to_string()));
        assert!(kept.contains(&"b".to_string()));
    }

    #[test]
    fn test_refit_subset() {
        let (x, y, names) = noisy_data();
        let full = ReducedModel::refit("initial", &x, &y, &names, &names).unwrap();
        let reduced = ReducedModel::refit("lasso", &x, &y, &names, &names[..2]).unwrap();
        assert!(full.r_squared > 0.99);
        assert!(full.r_squared - reduced.r_squared < 1e-3);

        let missing = ReducedModel::refit("x", &x, &y, &names, &["zzz".to_string()]);
        assert!(matches!(missing, Err(MedflowError::FeatureNotFound(_))));
    }
}
