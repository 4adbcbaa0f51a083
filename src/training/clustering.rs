//! K-Means clustering and the elbow sweep
//!
//! The sweep only feeds a diagnostic table; it never chooses the neighbor
//! count of the classifier.

use crate::error::{MedflowError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::RngCore;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// K-Means clustering with k-means++ initialization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KMeans {
    pub n_clusters: usize,
    pub max_iter: usize,
    /// Independent k-means++ restarts; the lowest inertia wins
    pub n_init: usize,
    pub tol: f64,
    pub random_state: u64,
    centroids: Option<Array2<f64>>,
    pub labels: Option<Array1<usize>>,
    /// Sum of squared distances to the nearest centroid
    pub inertia: Option<f64>,
}

impl Default for KMeans {
    fn default() -> Self {
        Self::new(3)
    }
}

impl KMeans {
    pub fn new(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            max_iter: 300,
            n_init: 10,
            tol: 1e-4,
            random_state: 42,
            centroids: None,
            labels: None,
            inertia: None,
        }
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init.max(1);
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn centroids(&self) -> Option<&Array2<f64>> {
        self.centroids.as_ref()
    }

    fn uniform(rng: &mut ChaCha8Rng) -> f64 {
        rng.next_u64() as f64 / u64::MAX as f64
    }

    /// K-means++ initialization: pick centroids spread apart
    fn kmeans_pp_init(x: &Array2<f64>, k: usize, rng: &mut ChaCha8Rng) -> Array2<f64> {
        let n_samples = x.nrows();
        let mut centroids = Array2::zeros((k, x.ncols()));

        let first = (rng.next_u64() as usize) % n_samples;
        centroids.row_mut(0).assign(&x.row(first));

        for c in 1..k {
            let dists: Vec<f64> = (0..n_samples)
                .map(|i| {
                    (0..c)
                        .map(|j| euclidean_sq(x.row(i), centroids.row(j)))
                        .fold(f64::MAX, f64::min)
                })
                .collect();

            // Weighted random selection proportional to D²
            let total: f64 = dists.iter().sum();
            if total <= 0.0 {
                let idx = (rng.next_u64() as usize) % n_samples;
                centroids.row_mut(c).assign(&x.row(idx));
                continue;
            }

            let r = Self::uniform(rng) * total;
            let mut cumulative = 0.0;
            let mut chosen = n_samples - 1;
            for (i, &d) in dists.iter().enumerate() {
                cumulative += d;
                if cumulative >= r {
                    chosen = i;
                    break;
                }
            }
            centroids.row_mut(c).assign(&x.row(chosen));
        }

        centroids
    }

    fn assign(x: &Array2<f64>, centroids: &Array2<f64>) -> Vec<(usize, f64)> {
        (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let mut best = (0, f64::MAX);
                for c in 0..centroids.nrows() {
                    let d = euclidean_sq(x.row(i), centroids.row(c));
                    if d < best.1 {
                        best = (c, d);
                    }
                }
                best
            })
            .collect()
    }

    /// One Lloyd run from a fresh k-means++ seed
    fn single_run(&self, x: &Array2<f64>, rng: &mut ChaCha8Rng) -> (Array2<f64>, Vec<usize>, f64) {
        let n_samples = x.nrows();
        let mut centroids = Self::kmeans_pp_init(x, self.n_clusters, rng);
        let mut assignment = Self::assign(x, &centroids);

        for _iter in 0..self.max_iter {
            let mut new_centroids = Array2::zeros(centroids.dim());
            let mut counts = vec![0usize; self.n_clusters];
            for (i, &(c, _)) in assignment.iter().enumerate() {
                counts[c] += 1;
                let mut row = new_centroids.row_mut(c);
                row += &x.row(i);
            }

            for c in 0..self.n_clusters {
                if counts[c] > 0 {
                    new_centroids.row_mut(c).mapv_inplace(|v| v / counts[c] as f64);
                } else {
                    // Empty cluster: reseed from a random sample
                    let idx = (rng.next_u64() as usize) % n_samples;
                    new_centroids.row_mut(c).assign(&x.row(idx));
                }
            }

            let shift: f64 = centroids
                .iter()
                .zip(new_centroids.iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum();

            centroids = new_centroids;
            let new_assignment = Self::assign(x, &centroids);
            let changed = new_assignment
                .iter()
                .zip(assignment.iter())
                .any(|(a, b)| a.0 != b.0);
            assignment = new_assignment;

            if !changed || shift < self.tol * self.tol {
                break;
            }
        }

        let inertia = assignment.iter().map(|(_, d)| d).sum();
        let labels = assignment.into_iter().map(|(c, _)| c).collect();
        (centroids, labels, inertia)
    }

    /// Fit the model (unsupervised, no labels)
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        if self.n_clusters == 0 || n_samples < self.n_clusters {
            return Err(MedflowError::InvalidParameter {
                name: "n_clusters".to_string(),
                value: self.n_clusters.to_string(),
                reason: format!("must be between 1 and n_samples ({})", n_samples),
            });
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        let mut best: Option<(Array2<f64>, Vec<usize>, f64)> = None;
        for _ in 0..self.n_init.max(1) {
            let run = self.single_run(x, &mut rng);
            if best.as_ref().map_or(true, |b| run.2 < b.2) {
                best = Some(run);
            }
        }

        if let Some((centroids, labels, inertia)) = best {
            self.centroids = Some(centroids);
            self.labels = Some(Array1::from_vec(labels));
            self.inertia = Some(inertia);
        }
        Ok(self)
    }

    /// Nearest-centroid labels for new data
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<usize>> {
        let centroids = self.centroids.as_ref().ok_or(MedflowError::ModelNotFitted)?;
        Ok(Self::assign(x, centroids).into_iter().map(|(c, _)| c).collect())
    }
}

fn euclidean_sq(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Within-cluster sum of squares for one k of the elbow sweep
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElbowPoint {
    pub k: usize,
    pub wcss: f64,
}

/// WCSS for k = 1..=max_k, stopping early when k exceeds the sample count
pub fn elbow_sweep(x: &Array2<f64>, max_k: usize, random_state: u64) -> Result<Vec<ElbowPoint>> {
    let upper = max_k.min(x.nrows());
    if upper == 0 {
        return Err(MedflowError::EmptyData("no samples for the elbow sweep".to_string()));
    }

    let mut points = Vec::with_capacity(upper);
    for k in 1..=upper {
        let mut model = KMeans::new(k).with_random_state(random_state);
        model.fit(x)?;
        let wcss = model.inertia.unwrap_or(f64::NAN);
        debug!(k, wcss, "elbow sweep");
        points.push(ElbowPoint { k, wcss });
    }
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn blobs() -> Array2<f64> {
        array![
            [0.0, 0.0],
            [0.1, 0.2],
            [0.2, 0.1],
            [10.0, 10.0],
            [10.1, 10.2],
            [10.2, 10.1],
        ]
    }

    #[test]
    fn test_kmeans_separates_blobs() {
        let x = blobs();
        let mut model = KMeans::new(2);
        model.fit(&x).unwrap();

        let labels = model.labels.clone().unwrap();
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[1], labels[2]);
        assert_eq!(labels[3], labels[4]);
        assert_ne!(labels[0], labels[3]);
        assert!(model.inertia.unwrap() < 0.2);

        let pred = model.predict(&array![[0.05, 0.05]]).unwrap();
        assert_eq!(pred[0], labels[0]);
    }

    #[test]
    fn test_kmeans_rejects_too_many_clusters() {
        let x = array![[1.0], [2.0]];
        assert!(KMeans::new(3).fit(&x).is_err());
    }

    #[test]
    fn test_elbow_is_non_increasing() {
        let x = blobs();
        let points = elbow_sweep(&x, 10, 42).unwrap();
        assert_eq!(points.len(), 6);
        assert_eq!(points[0].k, 1);
        assert!(points[1].wcss < points[0].wcss);
        assert!(points[5].wcss.abs() < 1e-12);
    }
}
