//! Model training module
//!
//! Numeric kernels behind the analysis runners:
//! - K-Nearest Neighbors and Gaussian Naive Bayes classifiers
//! - Linear models (OLS with inference, Lasso, logistic regression)
//! - K-means clustering for the elbow diagnostic
//! - Train/test splitting and cross-validation
//! - Evaluation metrics and predictor reduction

pub mod clustering;
pub mod cross_validation;
pub mod knn;
pub mod linalg;
pub mod linear_models;
pub mod metrics;
pub mod naive_bayes;
pub mod reduction;
pub mod stats;

pub use clustering::{elbow_sweep, ElbowPoint, KMeans};
pub use cross_validation::{
    cross_val_accuracy, train_test_split, CVSplit, CVStrategy, CrossValidator, SplitData,
    TrainTestIndices,
};
pub use knn::{compute_distance, DistanceMetric, KNNClassifier, KNNConfig, WeightScheme};
pub use linear_models::{LassoRegression, LinearRegression, LogisticRegression, OlsInference};
pub use metrics::{
    trapezoid_auc, AverageMetrics, ClassMetrics, ClassificationReport, ConfusionMatrix,
    RegressionMetrics, RocCurve,
};
pub use naive_bayes::GaussianNaiveBayes;
pub use reduction::{backward_elimination, lasso_selection, ReducedModel, ReductionMethod};
pub use stats::Describe;
