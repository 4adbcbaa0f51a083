//! Shared evaluation for the classification analyses

use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::results::{OutputDir, ResultWriter};
use crate::training::{
    cross_val_accuracy, train_test_split, CVStrategy, ClassificationReport, ConfusionMatrix,
    CrossValidator, RocCurve, SplitData,
};
use crate::utils::frame::frame_from_columns;
use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write;
use tracing::{info, warn};

/// Evaluation of one fitted classifier on the held-out rows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationOutcome {
    pub model: String,
    pub features: Vec<String>,
    pub n_train: usize,
    pub n_test: usize,
    pub class_names: Vec<String>,
    pub confusion: ConfusionMatrix,
    pub report: ClassificationReport,
    pub roc: Option<RocCurve>,
    pub cv_scores: Option<Vec<f64>>,
    /// McFadden pseudo-R², logistic regression only
    pub pseudo_r_squared: Option<f64>,
}

impl ClassificationOutcome {
    pub fn accuracy(&self) -> f64 {
        self.report.accuracy
    }

    pub fn auc(&self) -> Option<f64> {
        self.roc.as_ref().map(|r| r.auc)
    }

    pub fn cv_mean(&self) -> Option<f64> {
        self.cv_scores
            .as_ref()
            .filter(|s| !s.is_empty())
            .map(|s| s.iter().sum::<f64>() / s.len() as f64)
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Model: {}", self.model);
        let _ = writeln!(out, "Features ({}): {}", self.features.len(), self.features.join(", "));
        let _ = writeln!(out, "Train rows: {}  Test rows: {}\n", self.n_train, self.n_test);
        let _ = writeln!(out, "Accuracy: {:.4}", self.accuracy());
        if let Some(auc) = self.auc() {
            let _ = writeln!(out, "ROC AUC: {:.4}", auc);
        }
        if let Some(r2) = self.pseudo_r_squared {
            let _ = writeln!(out, "Pseudo R-squared (McFadden): {:.4}", r2);
        }
        if let (Some(scores), Some(mean)) = (&self.cv_scores, self.cv_mean()) {
            let folds: Vec<String> = scores.iter().map(|s| format!("{:.4}", s)).collect();
            let _ = writeln!(out, "Cross-validation accuracy: {:.4} [{}]", mean, folds.join(", "));
        }
        let _ = writeln!(out, "\nConfusion matrix:\n{}", self.confusion.to_text(&self.class_names));
        let _ = writeln!(out, "Classification report:\n{}", self.report.to_text());
        out
    }

    pub fn confusion_frame(&self) -> Result<DataFrame> {
        let mut columns: Vec<Column> = vec![Column::new(
            "actual".into(),
            self.class_names.clone(),
        )];
        for (j, name) in self.class_names.iter().enumerate() {
            let counts: Vec<u64> = self
                .confusion
                .matrix
                .column(j)
                .iter()
                .map(|&c| c as u64)
                .collect();
            columns.push(Column::new(format!("predicted_{}", name).into(), counts));
        }
        Ok(DataFrame::new(columns)?)
    }

    /// Write the report, the confusion matrix and the ROC points
    pub fn write(&self, writer: &ResultWriter) -> Result<()> {
        writer.write_text(OutputDir::Results, "classification_report.txt", &self.to_text())?;
        writer.try_frame_with(OutputDir::Results, "confusion_matrix.csv", || self.confusion_frame());
        if let Some(roc) = &self.roc {
            writer.try_frame_with(OutputDir::Visuals, "roc_curve.csv", || roc_frame(roc));
        }
        Ok(())
    }
}

fn roc_frame(roc: &RocCurve) -> Result<DataFrame> {
    frame_from_columns(vec![
        ("fpr".to_string(), roc.fpr.clone()),
        ("tpr".to_string(), roc.tpr.clone()),
        ("threshold".to_string(), roc.thresholds.clone()),
    ])
}

/// Count of each class label in `y`
pub fn class_distribution(y: &Array1<f64>) -> Result<DataFrame> {
    let mut counts: BTreeMap<i64, u64> = BTreeMap::new();
    for v in y {
        *counts.entry(v.round() as i64).or_insert(0) += 1;
    }
    let total = y.len().max(1) as f64;
    let classes: Vec<i64> = counts.keys().copied().collect();
    let n: Vec<u64> = counts.values().copied().collect();
    let share: Vec<f64> = n.iter().map(|c| *c as f64 / total).collect();
    Ok(DataFrame::new(vec![
        Column::new("class".into(), classes),
        Column::new("count".into(), n),
        Column::new("proportion".into(), share),
    ])?)
}

/// Scores of one class against the rest, for the ROC curve
#[derive(Debug, Clone)]
pub struct PositiveScores {
    pub label: f64,
    pub scores: Array1<f64>,
}

/// Probability of the larger label for a binary task
pub fn positive_scores(proba: &Array2<f64>, classes: &[i64]) -> Option<PositiveScores> {
    match classes {
        [_, positive] if proba.ncols() == 2 => Some(PositiveScores {
            label: *positive as f64,
            scores: proba.column(1).to_owned(),
        }),
        _ => None,
    }
}

/// Seeded split of the full matrix using the configured test share
pub fn split(x: &Array2<f64>, y: &Array1<f64>, config: &AnalysisConfig) -> Result<SplitData> {
    let indices = train_test_split(x.nrows(), config.test_size, config.random_state)?;
    let data = SplitData::from_indices(x, y, &indices);
    info!(train = data.y_train.len(), test = data.y_test.len(), "split data");
    Ok(data)
}

/// Stratified k-fold accuracy when `cross_val_folds` is configured
pub fn cross_validate<F>(
    x: &Array2<f64>,
    y: &Array1<f64>,
    config: &AnalysisConfig,
    fit_predict: F,
) -> Option<Vec<f64>>
where
    F: FnMut(&Array2<f64>, &Array1<f64>, &Array2<f64>) -> Result<Array1<f64>>,
{
    let folds = config.knn.cross_val_folds?;
    let validator = CrossValidator::new(CVStrategy::StratifiedKFold {
        n_splits: folds,
        shuffle: true,
    })
    .with_random_state(config.random_state);
    match cross_val_accuracy(x, y, &validator, fit_predict) {
        Ok(scores) => {
            info!(folds, mean = scores.iter().sum::<f64>() / scores.len().max(1) as f64, "cross-validation");
            Some(scores)
        }
        Err(e) => {
            warn!(error = %e, "cross-validation skipped");
            None
        }
    }
}

/// Inputs of [`evaluate`] besides the labels
pub struct EvaluationInput<'a> {
    pub model: &'a str,
    pub features: &'a [String],
    pub n_train: usize,
    /// Positive-class scores for the ROC curve, when available
    pub scores: Option<PositiveScores>,
    pub cv_scores: Option<Vec<f64>>,
}

/// Confusion matrix, report and best-effort ROC curve
pub fn evaluate(
    input: EvaluationInput<'_>,
    y_test: &Array1<f64>,
    y_pred: &Array1<f64>,
    config: &AnalysisConfig,
) -> Result<ClassificationOutcome> {
    let confusion = ConfusionMatrix::compute(y_test, y_pred)?;
    let class_names = config.class_names(&confusion.labels);
    let report = ClassificationReport::from_confusion(&confusion, &class_names);

    let roc = input.scores.and_then(|s| match RocCurve::compute(y_test, &s.scores, s.label) {
        Ok(roc) => Some(roc),
        Err(e) => {
            warn!(error = %e, "ROC curve skipped");
            None
        }
    });

    info!(
        model = input.model,
        accuracy = report.accuracy,
        auc = roc.as_ref().map(|r| r.auc),
        "evaluated classifier"
    );

    Ok(ClassificationOutcome {
        model: input.model.to_string(),
        features: input.features.to_vec(),
        n_train: input.n_train,
        n_test: y_test.len(),
        class_names,
        confusion,
        report,
        roc,
        cv_scores: input.cv_scores,
        pseudo_r_squared: None,
    })
}
