//! K-nearest-neighbors classification flow

use super::classification::{
    class_distribution, cross_validate, evaluate, positive_scores, split, ClassificationOutcome,
    EvaluationInput,
};
use super::AnalysisOutcome;
use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::preprocessing::{PreparedData, VifFilter};
use crate::results::{OutputDir, ResultWriter};
use crate::training::{elbow_sweep, KNNClassifier, KNNConfig};
use crate::utils::frame::to_matrix;
use ndarray::{Array1, Array2};
use polars::prelude::*;
use tracing::info;

pub(crate) fn knn_config(config: &AnalysisConfig) -> KNNConfig {
    KNNConfig {
        n_neighbors: config.knn.n_neighbors,
        metric: config.knn.metric,
        weights: config.knn.weights,
    }
}

/// Split, fit, predict and evaluate a KNN classifier on `x`
pub(crate) fn fit_and_evaluate(
    model: &str,
    x: &Array2<f64>,
    y: &Array1<f64>,
    features: &[String],
    config: &AnalysisConfig,
) -> Result<ClassificationOutcome> {
    let data = split(x, y, config)?;
    let mut knn = KNNClassifier::new(knn_config(config));
    knn.fit(&data.x_train, &data.y_train)?;

    let y_pred = knn.predict(&data.x_test)?;
    let proba = knn.predict_proba(&data.x_test)?;
    let scores = positive_scores(&proba, knn.classes());

    let cv_scores = cross_validate(x, y, config, |x_tr, y_tr, x_te| {
        let mut fold_model = KNNClassifier::new(knn_config(config));
        fold_model.fit(x_tr, y_tr)?;
        fold_model.predict(x_te)
    });

    let input = EvaluationInput {
        model,
        features,
        n_train: data.y_train.len(),
        scores,
        cv_scores,
    };
    evaluate(input, &data.y_test, &y_pred, config)
}

fn elbow_frame(x: &Array2<f64>, config: &AnalysisConfig) -> Result<DataFrame> {
    let points = elbow_sweep(x, config.knn.elbow_max_k, config.random_state)?;
    let ks: Vec<u32> = points.iter().map(|p| p.k as u32).collect();
    let wcss: Vec<f64> = points.iter().map(|p| p.wcss).collect();
    Ok(DataFrame::new(vec![
        Column::new("k".into(), ks),
        Column::new("wcss".into(), wcss),
    ])?)
}

pub fn run(
    prepared: &PreparedData,
    config: &AnalysisConfig,
    writer: &ResultWriter,
) -> Result<AnalysisOutcome> {
    let y = prepared.y()?;
    let features = if config.knn.vif_filter {
        let vif = VifFilter::new(config.regression.vif_threshold).filter(
            &prepared.frame,
            &prepared.predictors,
            &prepared.target,
        )?;
        writer.try_frame_with(OutputDir::Prepared, "vif_results.csv", || vif.to_frame());
        vif.retained
    } else {
        prepared.predictors.clone()
    };
    let x = to_matrix(&prepared.frame, &features)?;
    info!(rows = x.nrows(), features = x.ncols(), k = config.knn.n_neighbors, "running KNN");

    writer.try_frame_with(OutputDir::Visuals, "class_distribution.csv", || class_distribution(&y));
    if config.knn.elbow_sweep {
        // Diagnostic only; the configured k is used regardless
        writer.try_frame_with(OutputDir::Visuals, "elbow_wcss.csv", || elbow_frame(&x, config));
    }

    let outcome = fit_and_evaluate("K-Nearest Neighbors", &x, &y, &features, config)?;
    outcome.write(writer)?;
    Ok(AnalysisOutcome::Classification(outcome))
}
