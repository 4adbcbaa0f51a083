//! Gaussian Naive Bayes classification flow

use super::classification::{
    class_distribution, cross_validate, evaluate, positive_scores, split, EvaluationInput,
};
use super::AnalysisOutcome;
use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::preprocessing::PreparedData;
use crate::results::{OutputDir, ResultWriter};
use crate::training::GaussianNaiveBayes;
use tracing::info;

pub fn run(
    prepared: &PreparedData,
    config: &AnalysisConfig,
    writer: &ResultWriter,
) -> Result<AnalysisOutcome> {
    let x = prepared.x()?;
    let y = prepared.y()?;
    let smoothing = config.naive_bayes.var_smoothing;
    info!(rows = x.nrows(), features = x.ncols(), smoothing, "running Naive Bayes");

    writer.try_frame_with(OutputDir::Visuals, "class_distribution.csv", || class_distribution(&y));

    let data = split(&x, &y, config)?;
    let mut model = GaussianNaiveBayes::new().with_var_smoothing(smoothing);
    model.fit(&data.x_train, &data.y_train)?;
    let y_pred = model.predict(&data.x_test)?;
    let proba = model.predict_proba(&data.x_test)?;
    let scores = positive_scores(&proba, model.classes());

    let cv_scores = cross_validate(&x, &y, config, |x_tr, y_tr, x_te| {
        let mut fold_model = GaussianNaiveBayes::new().with_var_smoothing(smoothing);
        fold_model.fit(x_tr, y_tr)?;
        fold_model.predict(x_te)
    });

    let input = EvaluationInput {
        model: "Gaussian Naive Bayes",
        features: &prepared.predictors,
        n_train: data.y_train.len(),
        scores,
        cv_scores,
    };
    let outcome = evaluate(input, &data.y_test, &y_pred, config)?;
    outcome.write(writer)?;
    Ok(AnalysisOutcome::Classification(outcome))
}
