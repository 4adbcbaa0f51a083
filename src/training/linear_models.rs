//! Linear model implementations
//!
//! Ordinary least squares with classical inference, Lasso via coordinate
//! descent, and gradient-descent logistic regression.

use crate::error::{MedflowError, Result};
use crate::training::linalg::{inverse_spd, solve_spd};
use crate::training::stats::{f_survival, t_two_sided_p};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

fn check_shapes(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(MedflowError::ShapeError {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }
    if x.nrows() == 0 {
        return Err(MedflowError::EmptyData("no samples to fit".to_string()));
    }
    Ok(())
}

/// Column means and the centered copy of `x`
fn center(x: &Array2<f64>) -> (Array2<f64>, Array1<f64>) {
    let means = x
        .mean_axis(Axis(0))
        .unwrap_or_else(|| Array1::zeros(x.ncols()));
    let centered = x - &means.view().insert_axis(Axis(0));
    (centered, means)
}

/// Indices of centered columns with non-negligible spread
fn varying_columns(x_c: &Array2<f64>, means: &Array1<f64>) -> Vec<usize> {
    let n = x_c.nrows().max(1) as f64;
    (0..x_c.ncols())
        .filter(|&j| {
            let scale = means[j].abs().max(1.0);
            let ss = x_c.column(j).mapv(|v| v * v).sum();
            ss > n * (1e-10 * scale).powi(2)
        })
        .collect()
}

fn r_squared(y: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let y_mean = y.mean().unwrap_or(0.0);
    let ss_res = (y_pred - y).mapv(|v| v * v).sum();
    let ss_tot = y.mapv(|v| (v - y_mean).powi(2)).sum();
    if ss_tot == 0.0 {
        if ss_res == 0.0 { 1.0 } else { 0.0 }
    } else {
        1.0 - ss_res / ss_tot
    }
}

/// Classical OLS inference for a fitted model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OlsInference {
    pub n_samples: usize,
    pub n_features: usize,
    pub df_resid: usize,
    pub intercept_se: f64,
    pub intercept_t: f64,
    pub intercept_p: f64,
    pub std_errors: Array1<f64>,
    pub t_values: Array1<f64>,
    pub p_values: Array1<f64>,
    pub r_squared: f64,
    pub adj_r_squared: f64,
    pub f_statistic: f64,
    pub f_p_value: f64,
    /// Residual sum of squares
    pub rss: f64,
    /// RSS / n
    pub mse: f64,
    /// Residual standard error, sqrt(RSS / (n - p - 1))
    pub rse: f64,
    pub residuals: Array1<f64>,
}

/// Ordinary least squares with intercept
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinearRegression {
    pub coefficients: Option<Array1<f64>>,
    pub intercept: Option<f64>,
    pub inference: Option<OlsInference>,
    pub is_fitted: bool,
}

impl LinearRegression {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fit by solving the centered normal equations.
    ///
    /// Zero-variance columns carry no information once centered: they get a
    /// zero coefficient and a NaN standard error, and the system is solved on
    /// the remaining columns.
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_shapes(x, y)?;
        let n = x.nrows();
        let p = x.ncols();

        let (x_c, x_mean) = center(x);
        let y_mean = y.mean().unwrap_or(0.0);
        let y_c = y - y_mean;

        let varying = varying_columns(&x_c, &x_mean);
        let rank = varying.len();
        let x_v = x_c.select(Axis(1), &varying);
        let mean_v = x_mean.select(Axis(0), &varying);

        let xtx = x_v.t().dot(&x_v);
        let xty = x_v.t().dot(&y_c);
        let solved = solve_spd(&xtx, &xty).ok_or_else(|| {
            MedflowError::ComputationError("cannot solve least squares system".to_string())
        })?;
        let mut coefficients = Array1::zeros(p);
        for (k, &j) in varying.iter().enumerate() {
            coefficients[j] = solved[k];
        }
        let intercept = y_mean - coefficients.dot(&x_mean);

        let fitted = x.dot(&coefficients) + intercept;
        let residuals = y - &fitted;
        let rss = residuals.mapv(|v| v * v).sum();
        let tss = y_c.mapv(|v| v * v).sum();
        let r2 = r_squared(y, &fitted);

        let df_resid = n.saturating_sub(rank + 1);
        let (sigma2, adj_r2, f_stat) = if df_resid > 0 {
            let sigma2 = rss / df_resid as f64;
            let adj = 1.0 - (1.0 - r2) * (n as f64 - 1.0) / df_resid as f64;
            let f = if rank == 0 {
                f64::NAN
            } else if rss > 0.0 {
                ((tss - rss) / rank as f64) / sigma2
            } else {
                f64::INFINITY
            };
            (sigma2, adj, f)
        } else {
            (f64::NAN, f64::NAN, f64::NAN)
        };

        let mut std_errors = Array1::from_elem(p, f64::NAN);
        let intercept_se = match inverse_spd(&xtx) {
            Some(inv) => {
                for (k, &j) in varying.iter().enumerate() {
                    std_errors[j] = (sigma2 * inv[[k, k]].max(0.0)).sqrt();
                }
                let quad = mean_v.dot(&inv.dot(&mean_v));
                (sigma2 * (1.0 / n as f64 + quad.max(0.0))).sqrt()
            }
            None => f64::NAN,
        };

        let t_values = &coefficients / &std_errors;
        let p_values = t_values.mapv(|t| t_two_sided_p(t, df_resid as f64));
        let intercept_t = intercept / intercept_se;

        self.inference = Some(OlsInference {
            n_samples: n,
            n_features: p,
            df_resid,
            intercept_se,
            intercept_t,
            intercept_p: t_two_sided_p(intercept_t, df_resid as f64),
            std_errors,
            t_values,
            p_values,
            r_squared: r2,
            adj_r_squared: adj_r2,
            f_statistic: f_stat,
            f_p_value: f_survival(f_stat, rank as f64, df_resid as f64),
            rss,
            mse: rss / n as f64,
            rse: sigma2.sqrt(),
            residuals,
        });
        self.coefficients = Some(coefficients);
        self.intercept = Some(intercept);
        self.is_fitted = true;

        Ok(self)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match (&self.coefficients, self.intercept) {
            (Some(coef), Some(intercept)) if self.is_fitted => Ok(x.dot(coef) + intercept),
            _ => Err(MedflowError::ModelNotFitted),
        }
    }

    /// R² on the given data
    pub fn score(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<f64> {
        let y_pred = self.predict(x)?;
        Ok(r_squared(y, &y_pred))
    }

    pub fn inference(&self) -> Result<&OlsInference> {
        self.inference.as_ref().ok_or(MedflowError::ModelNotFitted)
    }
}

/// Logistic regression for binary classification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub coefficients: Option<Array1<f64>>,
    pub intercept: Option<f64>,
    /// Regularization strength (L2)
    pub alpha: f64,
    pub max_iter: usize,
    /// Gradient-norm convergence tolerance
    pub tol: f64,
    pub learning_rate: f64,
    /// Iterations used by the last fit
    pub n_iter: usize,
    pub is_fitted: bool,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegression {
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercept: None,
            alpha: 0.0,
            max_iter: 1000,
            tol: 1e-6,
            learning_rate: 0.1,
            n_iter: 0,
            is_fitted: false,
        }
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    fn sigmoid(z: &Array1<f64>) -> Array1<f64> {
        z.mapv(|v| 1.0 / (1.0 + (-v).exp()))
    }

    /// Fit by batch gradient descent; labels must be 0 or 1
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_shapes(x, y)?;
        if y.iter().any(|&v| v != 0.0 && v != 1.0) {
            return Err(MedflowError::DataError(
                "logistic regression needs a 0/1 target".to_string(),
            ));
        }

        let n_samples = x.nrows() as f64;
        let mut weights = Array1::zeros(x.ncols());
        let mut bias = 0.0;
        let lr = self.learning_rate;
        self.n_iter = self.max_iter;

        for iter in 0..self.max_iter {
            let predictions = Self::sigmoid(&(x.dot(&weights) + bias));

            let errors = &predictions - y;
            let dw = (x.t().dot(&errors) / n_samples) + (self.alpha * &weights);
            let db = errors.mean().unwrap_or(0.0);

            let grad_norm = (dw.mapv(|v| v * v).sum() + db * db).sqrt();
            if grad_norm < self.tol {
                self.n_iter = iter;
                break;
            }

            weights = weights - lr * dw;
            bias -= lr * db;
        }

        self.coefficients = Some(weights);
        self.intercept = Some(bias);
        self.is_fitted = true;

        Ok(self)
    }

    /// Probability of the positive class
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match (&self.coefficients, self.intercept) {
            (Some(coef), Some(intercept)) if self.is_fitted => {
                Ok(Self::sigmoid(&(x.dot(coef) + intercept)))
            }
            _ => Err(MedflowError::ModelNotFitted),
        }
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(proba.mapv(|p| if p >= 0.5 { 1.0 } else { 0.0 }))
    }

    /// Bernoulli log-likelihood of `y` under the fitted model
    pub fn log_likelihood(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<f64> {
        let proba = self.predict_proba(x)?;
        Ok(bernoulli_log_likelihood(&proba, y))
    }

    /// McFadden pseudo-R² against the intercept-only model
    pub fn pseudo_r_squared(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<f64> {
        let ll_model = self.log_likelihood(x, y)?;
        let rate = y.mean().unwrap_or(0.0);
        let ll_null = bernoulli_log_likelihood(&Array1::from_elem(y.len(), rate), y);
        if ll_null == 0.0 {
            return Ok(f64::NAN);
        }
        Ok(1.0 - ll_model / ll_null)
    }
}

fn bernoulli_log_likelihood(proba: &Array1<f64>, y: &Array1<f64>) -> f64 {
    proba
        .iter()
        .zip(y.iter())
        .map(|(&p, &t)| {
            let p = p.clamp(1e-15, 1.0 - 1e-15);
            t * p.ln() + (1.0 - t) * (1.0 - p).ln()
        })
        .sum()
}

/// Lasso Regression (L1-regularized via coordinate descent)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LassoRegression {
    pub coefficients: Option<Array1<f64>>,
    pub intercept: Option<f64>,
    /// L1 regularization strength
    pub alpha: f64,
    pub max_iter: usize,
    pub tol: f64,
    pub is_fitted: bool,
}

impl Default for LassoRegression {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl LassoRegression {
    pub fn new(alpha: f64) -> Self {
        Self {
            coefficients: None,
            intercept: None,
            alpha,
            max_iter: 1000,
            tol: 1e-6,
            is_fitted: false,
        }
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Soft-threshold operator for L1 proximal step
    fn soft_threshold(val: f64, threshold: f64) -> f64 {
        if val > threshold {
            val - threshold
        } else if val < -threshold {
            val + threshold
        } else {
            0.0
        }
    }

    /// Minimizes `1/(2n) ||y - Xw - b||² + alpha ||w||₁`
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_shapes(x, y)?;
        let n_samples = x.nrows();
        let n_features = x.ncols();

        let (x_c, x_mean) = center(x);
        let y_mean = y.mean().unwrap_or(0.0);
        let y_c = y - y_mean;

        let col_norms: Vec<f64> = (0..n_features)
            .map(|j| x_c.column(j).mapv(|v| v * v).sum())
            .collect();

        let mut w = Array1::zeros(n_features);
        let lambda = self.alpha * n_samples as f64;

        for _iter in 0..self.max_iter {
            let w_old = w.clone();
            let mut r = &y_c - &x_c.dot(&w);

            for j in 0..n_features {
                if col_norms[j] < 1e-15 {
                    w[j] = 0.0;
                    continue;
                }
                let rho = x_c.column(j).dot(&r) + col_norms[j] * w[j];
                let old_wj = w[j];
                w[j] = Self::soft_threshold(rho, lambda) / col_norms[j];
                if old_wj != w[j] {
                    r = r + &(&x_c.column(j) * (old_wj - w[j]));
                }
            }

            let diff = (&w - &w_old).mapv(|v| v.abs()).sum();
            if diff < self.tol {
                break;
            }
        }

        self.intercept = Some(y_mean - w.dot(&x_mean));
        self.coefficients = Some(w);
        self.is_fitted = true;
        Ok(self)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match (&self.coefficients, self.intercept) {
            (Some(coef), Some(intercept)) if self.is_fitted => Ok(x.dot(coef) + intercept),
            _ => Err(MedflowError::ModelNotFitted),
        }
    }

    pub fn score(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<f64> {
        let p = self.predict(x)?;
        Ok(r_squared(y, &p))
    }

    /// Indices of features with a non-zero coefficient
    pub fn selected_features(&self) -> Result<Vec<usize>> {
        let coef = self.coefficients.as_ref().ok_or(MedflowError::ModelNotFitted)?;
        Ok(coef
            .iter()
            .enumerate()
            .filter(|(_, c)| c.abs() > 1e-12)
            .map(|(i, _)| i)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_linear_regression_simple() {
        let x = array![
            [1.0, 1.0],
            [2.0, 1.0],
            [1.0, 2.0],
            [2.0, 2.0],
            [3.0, 1.0],
        ];
        // y = 2*x1 + 3*x2 + 1
        let y = array![6.0, 8.0, 9.0, 11.0, 10.0];

        let mut model = LinearRegression::new();
        model.fit(&x, &y).unwrap();

        let coef = model.coefficients.as_ref().unwrap();
        assert!((coef[0] - 2.0).abs() < 1e-8);
        assert!((coef[1] - 3.0).abs() < 1e-8);
        assert!((model.intercept.unwrap() - 1.0).abs() < 1e-8);
        assert!(model.score(&x, &y).unwrap() > 0.999);
    }

    #[test]
    fn test_ols_inference_matches_textbook() {
        // Simple regression with known closed form
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![2.0, 4.0, 5.0, 4.0, 5.0];

        let mut model = LinearRegression::new();
        model.fit(&x, &y).unwrap();
        let inf = model.inference().unwrap();

        // slope = 0.6, intercept = 2.2, RSS = 2.4, Sxx = 10
        assert!((model.coefficients.as_ref().unwrap()[0] - 0.6).abs() < 1e-10);
        assert!((model.intercept.unwrap() - 2.2).abs() < 1e-10);
        assert!((inf.rss - 2.4).abs() < 1e-10);
        assert_eq!(inf.df_resid, 3);
        let se = (0.8f64 / 10.0).sqrt();
        assert!((inf.std_errors[0] - se).abs() < 1e-10);
        assert!((inf.r_squared - 0.6).abs() < 1e-10);
        assert!((inf.mse - 0.48).abs() < 1e-10);
        assert!(inf.p_values[0] > 0.05 && inf.p_values[0] < 0.2);
        // F equals t² with one predictor
        assert!((inf.f_statistic - inf.t_values[0].powi(2)).abs() < 1e-8);
    }

    #[test]
    fn test_collinear_columns_do_not_fail() {
        let x = array![[1.0, 2.0], [2.0, 4.0], [3.0, 6.0], [4.0, 8.0], [5.0, 10.0]];
        let y = array![1.0, 2.1, 2.9, 4.2, 5.0];

        let mut model = LinearRegression::new();
        model.fit(&x, &y).unwrap();
        assert!(model.score(&x, &y).unwrap() > 0.95);
    }

    #[test]
    fn test_constant_columns_get_zero_coefficient() {
        let x = array![[1.0, 5.0], [2.0, 5.0], [3.0, 5.0], [4.0, 5.0], [5.0, 5.0]];
        let y = array![2.1, 3.9, 6.2, 7.8, 10.1];

        let mut model = LinearRegression::new();
        model.fit(&x, &y).unwrap();
        let coef = model.coefficients.as_ref().unwrap();
        assert!((coef[0] - 2.0).abs() < 0.1);
        assert_eq!(coef[1], 0.0);

        let inf = model.inference().unwrap();
        assert!(inf.std_errors[1].is_nan());
        assert!(inf.std_errors[0].is_finite());
        assert_eq!(inf.df_resid, 3);

        // Nothing varies: intercept-only fit
        let flat = array![[5.0], [5.0], [5.0], [5.0]];
        let y = array![1.0, 2.0, 3.0, 4.0];
        model.fit(&flat, &y).unwrap();
        assert!((model.intercept.unwrap() - 2.5).abs() < 1e-12);
        assert_eq!(model.inference().unwrap().r_squared, 0.0);
    }

    #[test]
    fn test_logistic_regression() {
        let x = array![[-2.5], [-2.0], [-1.5], [-0.2], [0.4], [1.5], [2.0], [2.5]];
        let y = array![0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 1.0];

        let mut model = LogisticRegression::new()
            .with_max_iter(2000)
            .with_learning_rate(0.5);
        model.fit(&x, &y).unwrap();

        let pred = model.predict(&x).unwrap();
        let correct = pred.iter().zip(y.iter()).filter(|(p, t)| p == t).count();
        assert!(correct >= 6, "correct = {}", correct);
        assert!(model.coefficients.as_ref().unwrap()[0] > 0.0);
        assert!(model.pseudo_r_squared(&x, &y).unwrap() > 0.3);
    }

    #[test]
    fn test_logistic_rejects_non_binary() {
        let x = array![[1.0], [2.0]];
        let y = array![0.0, 2.0];
        assert!(LogisticRegression::new().fit(&x, &y).is_err());
    }

    #[test]
    fn test_lasso_zeroes_noise_feature() {
        let x = array![
            [1.0, 0.3],
            [2.0, -0.2],
            [3.0, 0.1],
            [4.0, -0.3],
            [5.0, 0.2],
            [6.0, -0.1],
        ];
        let y = array![2.0, 4.0, 6.0, 8.0, 10.0, 12.0];

        let mut model = LassoRegression::new(0.5);
        model.fit(&x, &y).unwrap();

        assert_eq!(model.selected_features().unwrap(), vec![0]);
        assert!(model.score(&x, &y).unwrap() > 0.9);
    }
}
