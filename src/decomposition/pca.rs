//! PCA - Principal Component Analysis
//!
//! Eigen-decomposition of the sample covariance matrix by power iteration
//! with deflation. Input is expected to be standardized already.

use crate::error::{MedflowError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// PCA configuration parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PcaConfig {
    /// Requested number of components; capped at min(n_features, n_samples)
    pub n_components: usize,
    pub max_iter: usize,
    pub tol: f64,
    /// Seed for the power iteration start vectors
    pub random_state: u64,
}

impl Default for PcaConfig {
    fn default() -> Self {
        Self {
            n_components: 2,
            max_iter: 1000,
            tol: 1e-10,
            random_state: 42,
        }
    }
}

/// Fitted PCA model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pca {
    config: PcaConfig,
    mean: Option<Array1<f64>>,
    /// n_components x n_features, one principal axis per row
    components: Option<Array2<f64>>,
    eigenvalues: Vec<f64>,
    total_variance: f64,
}

/// `v` made orthogonal to the first `count` rows of `basis` and normalized.
/// Falls back to the first unit vector that is not already spanned.
fn orthonormal_to(v: Array1<f64>, basis: &Array2<f64>, count: usize) -> Array1<f64> {
    let project_out = |mut v: Array1<f64>| {
        let before = v.dot(&v).sqrt();
        for row in basis.outer_iter().take(count) {
            let overlap = v.dot(&row);
            v.scaled_add(-overlap, &row);
        }
        let norm = v.dot(&v).sqrt();
        (norm > 1e-8 * before && norm > 0.0).then(|| v / norm)
    };

    let d = v.len();
    project_out(v)
        .or_else(|| {
            (0..d).find_map(|i| {
                let mut e = Array1::zeros(d);
                e[i] = 1.0;
                project_out(e)
            })
        })
        .unwrap_or_else(|| Array1::zeros(d))
}

impl Pca {
    pub fn new(config: PcaConfig) -> Self {
        Self {
            config,
            mean: None,
            components: None,
            eigenvalues: Vec::new(),
            total_variance: 0.0,
        }
    }

    pub fn with_components(n_components: usize) -> Self {
        Self::new(PcaConfig {
            n_components,
            ..PcaConfig::default()
        })
    }

    pub fn n_components(&self) -> usize {
        self.eigenvalues.len()
    }

    /// Principal axes, one per row
    pub fn components(&self) -> Result<&Array2<f64>> {
        self.components.as_ref().ok_or(MedflowError::ModelNotFitted)
    }

    /// Variance captured by each component
    pub fn explained_variance(&self) -> &[f64] {
        &self.eigenvalues
    }

    /// Fraction of the total variance captured by each component
    pub fn explained_variance_ratio(&self) -> Vec<f64> {
        if self.total_variance <= 0.0 {
            return vec![0.0; self.eigenvalues.len()];
        }
        self.eigenvalues
            .iter()
            .map(|ev| (ev / self.total_variance).max(0.0))
            .collect()
    }

    pub fn cumulative_variance_ratio(&self) -> Vec<f64> {
        self.explained_variance_ratio()
            .into_iter()
            .scan(0.0, |acc, r| {
                *acc += r;
                Some(*acc)
            })
            .collect()
    }

    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        let (n, d) = x.dim();
        if n < 2 {
            return Err(MedflowError::DataError(
                "PCA requires at least 2 samples".to_string(),
            ));
        }
        if d == 0 {
            return Err(MedflowError::DataError(
                "PCA requires at least 1 feature".to_string(),
            ));
        }
        if self.config.n_components == 0 {
            return Err(MedflowError::InvalidParameter {
                name: "n_components".to_string(),
                value: "0".to_string(),
                reason: "at least one component must be retained".to_string(),
            });
        }
        let k = self.config.n_components.min(d).min(n);

        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| MedflowError::ComputationError("empty input".to_string()))?;
        let centered = x - &mean.view().insert_axis(Axis(0));
        let cov = centered.t().dot(&centered) / (n as f64 - 1.0);
        self.total_variance = cov.diag().sum();

        let (eigenvalues, components) = self.power_iteration(&cov, k);
        self.eigenvalues = eigenvalues;
        self.components = Some(components);
        self.mean = Some(mean);
        Ok(self)
    }

    /// Project onto the principal axes
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (mean, components) = match (&self.mean, &self.components) {
            (Some(m), Some(c)) => (m, c),
            _ => return Err(MedflowError::ModelNotFitted),
        };
        if x.ncols() != mean.len() {
            return Err(MedflowError::ShapeError {
                expected: format!("{} features", mean.len()),
                actual: format!("{} features", x.ncols()),
            });
        }
        let centered = x - &mean.view().insert_axis(Axis(0));
        Ok(centered.dot(&components.t()))
    }

    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }

    fn power_iteration(&self, cov: &Array2<f64>, k: usize) -> (Vec<f64>, Array2<f64>) {
        let d = cov.nrows();
        let mut work = cov.clone();
        let mut eigenvalues = Vec::with_capacity(k);
        let mut components = Array2::zeros((k, d));
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.random_state);
        let scale = cov.diag().sum().abs().max(f64::MIN_POSITIVE);

        for c in 0..k {
            let start: Array1<f64> = (0..d).map(|_| rng.gen_range(-1.0..1.0)).collect();
            let mut v = orthonormal_to(start, &components, c);

            let mut eigenvalue = 0.0f64;
            for _ in 0..self.config.max_iter {
                let w = work.dot(&v);
                let new_eigenvalue = v.dot(&w);
                let w_norm = w.dot(&w).sqrt();
                if w_norm < 1e-10 * scale {
                    // Remaining variance is zero; any direction orthogonal to the rest will do
                    eigenvalue = 0.0;
                    v = orthonormal_to(v, &components, c);
                    break;
                }
                let new_v = orthonormal_to(w, &components, c);
                let diff = (&new_v - &v).mapv(|a| a * a).sum().sqrt();
                v = new_v;
                eigenvalue = new_eigenvalue;
                if diff < self.config.tol {
                    break;
                }
            }
            eigenvalue = eigenvalue.max(0.0);

            // Sign convention: largest-magnitude loading is positive
            let pivot = v
                .iter()
                .copied()
                .fold(0.0f64, |acc, a| if a.abs() > acc.abs() { a } else { acc });
            if pivot < 0.0 {
                v.mapv_inplace(|a| -a);
            }

            // Deflate: A = A - lambda v v^T
            let outer = v
                .view()
                .insert_axis(Axis(1))
                .dot(&v.view().insert_axis(Axis(0)));
            work = work - outer * eigenvalue;

            eigenvalues.push(eigenvalue);
            components.row_mut(c).assign(&v);
        }

        (eigenvalues, components)
    }
}
