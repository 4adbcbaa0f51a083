//! Gaussian Naive Bayes for continuous features

use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f64::consts::PI;

use crate::error::{MedflowError, Result};

/// Gaussian Naive Bayes Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaussianNaiveBayes {
    /// Mean of each feature for each class
    means: BTreeMap<i64, Vec<f64>>,
    /// Variance of each feature for each class
    variances: BTreeMap<i64, Vec<f64>>,
    /// Prior probability of each class
    priors: BTreeMap<i64, f64>,
    classes: Vec<i64>,
    /// Fraction of the largest feature variance added to every variance
    var_smoothing: f64,
}

impl Default for GaussianNaiveBayes {
    fn default() -> Self {
        Self::new()
    }
}

impl GaussianNaiveBayes {
    pub fn new() -> Self {
        Self {
            means: BTreeMap::new(),
            variances: BTreeMap::new(),
            priors: BTreeMap::new(),
            classes: Vec::new(),
            var_smoothing: 1e-9,
        }
    }

    pub fn with_var_smoothing(mut self, smoothing: f64) -> Self {
        self.var_smoothing = smoothing;
        self
    }

    pub fn classes(&self) -> &[i64] {
        &self.classes
    }

    /// Get class priors
    pub fn class_priors(&self) -> &BTreeMap<i64, f64> {
        &self.priors
    }

    /// Fit the classifier
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n_samples = x.nrows();
        let n_features = x.ncols();
        if n_samples != y.len() {
            return Err(MedflowError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(MedflowError::EmptyData("Naive Bayes training set is empty".to_string()));
        }

        let epsilon = self.var_smoothing
            * x.var_axis(Axis(0), 0.0)
                .iter()
                .cloned()
                .fold(0.0f64, f64::max);

        let mut members: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (i, &label) in y.iter().enumerate() {
            members.entry(label.round() as i64).or_default().push(i);
        }

        self.means.clear();
        self.variances.clear();
        self.priors.clear();
        self.classes = members.keys().cloned().collect();

        for (&class, indices) in &members {
            self.priors.insert(class, indices.len() as f64 / n_samples as f64);

            // Single-pass Welford's algorithm for mean and variance
            let mut feature_means = vec![0.0; n_features];
            let mut feature_m2 = vec![0.0; n_features];
            for (count, &idx) in indices.iter().enumerate() {
                let count = (count + 1) as f64;
                for (j, &val) in x.row(idx).iter().enumerate() {
                    let delta = val - feature_means[j];
                    feature_means[j] += delta / count;
                    let delta2 = val - feature_means[j];
                    feature_m2[j] += delta * delta2;
                }
            }
            let n_class = indices.len() as f64;
            let feature_vars: Vec<f64> = feature_m2
                .iter()
                .map(|&m2| (m2 / n_class + epsilon).max(f64::MIN_POSITIVE))
                .collect();

            self.means.insert(class, feature_means);
            self.variances.insert(class, feature_vars);
        }

        Ok(())
    }

    /// Normalized log probabilities, one column per class
    pub fn predict_log_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.classes.is_empty() {
            return Err(MedflowError::ModelNotFitted);
        }
        let n_samples = x.nrows();
        let n_classes = self.classes.len();
        let mut log_probs = Array2::zeros((n_samples, n_classes));

        for (i, row) in x.rows().into_iter().enumerate() {
            for (j, class) in self.classes.iter().enumerate() {
                let log_prior = self.priors[class].ln();
                log_probs[[i, j]] = log_prior + self.log_likelihood(row, *class);
            }
        }

        // log-sum-exp normalization
        for mut row in log_probs.rows_mut() {
            let max_val = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let log_sum: f64 = row.iter().map(|&v| (v - max_val).exp()).sum::<f64>().ln();
            for val in row.iter_mut() {
                *val = *val - max_val - log_sum;
            }
        }

        Ok(log_probs)
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        Ok(self.predict_log_proba(x)?.mapv(f64::exp))
    }

    /// Predict class labels
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let log_probs = self.predict_log_proba(x)?;
        Ok(log_probs
            .rows()
            .into_iter()
            .map(|row| {
                let best = row
                    .iter()
                    .enumerate()
                    .max_by(|(_, a), (_, b)| a.total_cmp(b))
                    .map(|(i, _)| i)
                    .unwrap_or(0);
                self.classes[best] as f64
            })
            .collect())
    }

    fn log_likelihood(&self, x: ArrayView1<f64>, class: i64) -> f64 {
        let means = &self.means[&class];
        let vars = &self.variances[&class];

        x.iter()
            .zip(means.iter())
            .zip(vars.iter())
            .map(|((&xi, &mean), &var)| -0.5 * ((xi - mean).powi(2) / var + var.ln() + (2.0 * PI).ln()))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn two_blobs() -> (Array2<f64>, Array1<f64>) {
        let x = array![
            [1.0, 2.0],
            [1.2, 1.8],
            [0.8, 2.2],
            [1.1, 2.1],
            [6.0, 7.0],
            [6.2, 6.8],
            [5.8, 7.2],
            [6.1, 7.1],
        ];
        let y = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    #[test]
    fn test_gaussian_naive_bayes() {
        let (x, y) = two_blobs();
        let mut nb = GaussianNaiveBayes::new();
        nb.fit(&x, &y).unwrap();

        let predictions = nb.predict(&x).unwrap();
        assert_eq!(predictions, y);
    }

    #[test]
    fn test_gaussian_proba() {
        let (x, y) = two_blobs();
        let mut nb = GaussianNaiveBayes::new();
        nb.fit(&x, &y).unwrap();

        let proba = nb.predict_proba(&array![[1.0, 2.0], [6.0, 7.0]]).unwrap();
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
        assert!(proba[[0, 0]] > 0.99);
        assert!(proba[[1, 1]] > 0.99);
    }

    #[test]
    fn test_class_priors() {
        let x = array![[0.0], [0.1], [0.2], [5.0]];
        let y = array![0.0, 0.0, 0.0, 1.0];
        let mut nb = GaussianNaiveBayes::new();
        nb.fit(&x, &y).unwrap();

        assert!((nb.class_priors()[&0] - 0.75).abs() < 1e-12);
        assert!((nb.class_priors()[&1] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_unfitted() {
        let nb = GaussianNaiveBayes::new();
        assert!(matches!(nb.predict(&array![[1.0]]), Err(MedflowError::ModelNotFitted)));
    }
}
