//! Linear and logistic regression flows
//!
//! Both start from the VIF-filtered predictor set. The linear flow then
//! compares reduced models; the logistic flow is evaluated as a classifier.

use super::classification::{class_distribution, evaluate, split, EvaluationInput, PositiveScores};
use super::AnalysisOutcome;
use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::preprocessing::{PreparedData, StandardScaler, VifFilter, VifReport};
use crate::results::{OutputDir, ResultWriter};
use crate::training::stats::{durbin_watson, Describe};
use crate::training::{
    backward_elimination, lasso_selection, LinearRegression, LogisticRegression, ReducedModel,
    ReductionMethod,
};
use crate::utils::frame::to_matrix;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use tracing::{info, warn};

/// One row of the coefficient table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coefficient {
    pub name: String,
    pub estimate: f64,
    pub std_error: f64,
    pub t_value: f64,
    pub p_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResidualDiagnostics {
    pub summary: Describe,
    pub durbin_watson: f64,
}

/// Predictors kept by one reduction method
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub method: ReductionMethod,
    pub features: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionOutcome {
    pub target: String,
    pub n_samples: usize,
    /// Intercept first
    pub coefficients: Vec<Coefficient>,
    pub r_squared: f64,
    pub adj_r_squared: f64,
    pub mse: f64,
    pub rse: f64,
    pub f_statistic: f64,
    pub f_p_value: f64,
    pub residuals: ResidualDiagnostics,
    pub vif: VifReport,
    pub selections: Vec<Selection>,
    /// Initial, VIF and one refit per reduction method
    pub comparisons: Vec<ReducedModel>,
}

impl RegressionOutcome {
    /// Membership of every initial predictor in each selected set
    pub fn selection_frame(&self, predictors: &[String]) -> Result<DataFrame> {
        let mark = |set: &[String], name: &String| -> String {
            let hit = if set.contains(name) { "✓" } else { "" };
            hit.to_string()
        };
        let mut columns = vec![
            Column::new("variable".into(), predictors.to_vec()),
            Column::new(
                "Initial".into(),
                predictors.iter().map(|p| mark(predictors, p)).collect::<Vec<_>>(),
            ),
            Column::new(
                "VIF".into(),
                predictors.iter().map(|p| mark(&self.vif.retained, p)).collect::<Vec<_>>(),
            ),
        ];
        for sel in &self.selections {
            columns.push(Column::new(
                sel.method.title().into(),
                predictors.iter().map(|p| mark(&sel.features, p)).collect::<Vec<_>>(),
            ));
        }
        Ok(DataFrame::new(columns)?)
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "OLS regression of {} ({} observations)\n", self.target, self.n_samples);
        let width = self
            .coefficients
            .iter()
            .map(|c| c.name.len())
            .max()
            .unwrap_or(9)
            .max(9);
        let _ = writeln!(
            out,
            "{:<width$} {:>14} {:>12} {:>10} {:>10}",
            "", "coef", "std err", "t", "P>|t|",
            width = width
        );
        for c in &self.coefficients {
            let _ = writeln!(
                out,
                "{:<width$} {:>14.6} {:>12.6} {:>10.3} {:>10.4}",
                c.name, c.estimate, c.std_error, c.t_value, c.p_value,
                width = width
            );
        }

        let _ = writeln!(out, "\nR-squared:          {:.6}", self.r_squared);
        let _ = writeln!(out, "Adj. R-squared:     {:.6}", self.adj_r_squared);
        let _ = writeln!(out, "F-statistic:        {:.4} (p = {:.4e})", self.f_statistic, self.f_p_value);
        let _ = writeln!(out, "MSE:                {:.6}", self.mse);
        let _ = writeln!(out, "Residual std error: {:.6}", self.rse);

        let r = &self.residuals.summary;
        let _ = writeln!(out, "\nResiduals:");
        let _ = writeln!(
            out,
            "  mean {:.6}  std {:.6}  min {:.6}  25% {:.6}  50% {:.6}  75% {:.6}  max {:.6}",
            r.mean, r.std, r.min, r.q25, r.median, r.q75, r.max
        );
        let _ = writeln!(out, "  Durbin-Watson: {:.4}", self.residuals.durbin_watson);

        let _ = writeln!(out, "\nVariance inflation factors (threshold {}):", self.vif.threshold);
        out.push_str(&self.vif.to_text());

        if !self.selections.is_empty() {
            let _ = writeln!(out, "\nReduced predictor sets:");
            for sel in &self.selections {
                let _ = writeln!(out, "  {}: {}", sel.method.title(), sel.features.join(", "));
            }
        }

        let _ = writeln!(out, "\nModel comparison:");
        let _ = writeln!(
            out,
            "  {:<22} {:>9} {:>12} {:>14} {:>14}",
            "model", "features", "R-squared", "MSE", "RSE"
        );
        for m in &self.comparisons {
            let _ = writeln!(
                out,
                "  {:<22} {:>9} {:>12.6} {:>14.6} {:>14.6}",
                m.label,
                m.features.len(),
                m.r_squared,
                m.mse,
                m.rse
            );
        }
        out
    }
}

fn write_vif(report: &VifReport, writer: &ResultWriter) {
    writer.try_frame_with(OutputDir::Prepared, "vif_results.csv", || report.to_frame());
}

pub fn run_linear(
    prepared: &PreparedData,
    config: &AnalysisConfig,
    writer: &ResultWriter,
) -> Result<AnalysisOutcome> {
    let settings = &config.regression;
    let names = &prepared.predictors;
    let x = prepared.x()?;
    let y = prepared.y()?;
    info!(rows = x.nrows(), features = x.ncols(), target = %prepared.target, "running OLS");

    let mut model = LinearRegression::new();
    model.fit(&x, &y)?;
    let inference = model.inference()?.clone();
    let coef = model.coefficients.clone().unwrap_or_default();

    let mut coefficients = vec![Coefficient {
        name: "const".to_string(),
        estimate: model.intercept.unwrap_or(0.0),
        std_error: inference.intercept_se,
        t_value: inference.intercept_t,
        p_value: inference.intercept_p,
    }];
    coefficients.extend(names.iter().enumerate().map(|(j, name)| Coefficient {
        name: name.clone(),
        estimate: coef[j],
        std_error: inference.std_errors[j],
        t_value: inference.t_values[j],
        p_value: inference.p_values[j],
    }));

    let residual_values = inference.residuals.to_vec();
    let residuals = ResidualDiagnostics {
        summary: Describe::from_values(&residual_values).unwrap_or(Describe {
            count: 0,
            mean: f64::NAN,
            std: f64::NAN,
            min: f64::NAN,
            q25: f64::NAN,
            median: f64::NAN,
            q75: f64::NAN,
            max: f64::NAN,
        }),
        durbin_watson: durbin_watson(&residual_values),
    };

    let vif = VifFilter::new(settings.vif_threshold).filter(&prepared.frame, names, &prepared.target)?;
    write_vif(&vif, writer);

    let x_vif = to_matrix(&prepared.frame, &vif.retained)?;
    let mut selections = Vec::new();
    for &method in &settings.reduction_methods {
        let selected = match method {
            ReductionMethod::Lasso => lasso_selection(&x_vif, &y, &vif.retained, settings.lasso_alpha),
            ReductionMethod::BackwardElimination => {
                backward_elimination(&x_vif, &y, &vif.retained, settings.significance_level)
            }
        };
        match selected {
            Ok(features) => {
                info!(method = %method, kept = features.len(), "reduced predictors");
                selections.push(Selection { method, features });
            }
            Err(e) => warn!(method = %method, error = %e, "reduction failed"),
        }
    }

    let mut comparisons = vec![
        ReducedModel::refit("Initial", &x, &y, names, names)?,
        ReducedModel::refit("VIF", &x, &y, names, &vif.retained)?,
    ];
    for sel in &selections {
        comparisons.push(ReducedModel::refit(sel.method.title(), &x, &y, names, &sel.features)?);
    }

    let outcome = RegressionOutcome {
        target: prepared.target.clone(),
        n_samples: inference.n_samples,
        coefficients,
        r_squared: inference.r_squared,
        adj_r_squared: inference.adj_r_squared,
        mse: inference.mse,
        rse: inference.rse,
        f_statistic: inference.f_statistic,
        f_p_value: inference.f_p_value,
        residuals,
        vif,
        selections,
        comparisons,
    };

    writer.write_text(OutputDir::Results, "regression_summary.txt", &outcome.to_text())?;
    writer.try_frame_with(OutputDir::Results, "variable_selection.csv", || {
        outcome.selection_frame(names)
    });
    info!(r_squared = outcome.r_squared, mse = outcome.mse, "linear regression complete");
    Ok(AnalysisOutcome::Regression(outcome))
}

pub fn run_logistic(
    prepared: &PreparedData,
    config: &AnalysisConfig,
    writer: &ResultWriter,
) -> Result<AnalysisOutcome> {
    let settings = &config.regression;
    let y = prepared.y()?;
    writer.try_frame_with(OutputDir::Visuals, "class_distribution.csv", || class_distribution(&y));

    let vif = VifFilter::new(settings.vif_threshold).filter(
        &prepared.frame,
        &prepared.predictors,
        &prepared.target,
    )?;
    write_vif(&vif, writer);
    let features = vif.retained.clone();
    let x = to_matrix(&prepared.frame, &features)?;
    info!(rows = x.nrows(), features = x.ncols(), "running logistic regression");

    let data = split(&x, &y, config)?;
    let mut scaler = StandardScaler::new();
    let x_train = scaler.fit_transform_array(&data.x_train)?;
    let x_test = scaler.transform_array(&data.x_test)?;

    let mut model = LogisticRegression::new()
        .with_alpha(settings.logistic_alpha)
        .with_max_iter(settings.logistic_max_iter)
        .with_learning_rate(settings.logistic_learning_rate);
    model.fit(&x_train, &data.y_train)?;

    let y_pred = model.predict(&x_test)?;
    let scores = model.predict_proba(&x_test)?;
    let pseudo_r2 = match model.pseudo_r_squared(&x_train, &data.y_train) {
        Ok(r2) => Some(r2),
        Err(e) => {
            warn!(error = %e, "pseudo R-squared unavailable");
            None
        }
    };

    let input = EvaluationInput {
        model: "Logistic Regression",
        features: &features,
        n_train: data.y_train.len(),
        scores: Some(PositiveScores { label: 1.0, scores }),
        cv_scores: None,
    };
    let mut outcome = evaluate(input, &data.y_test, &y_pred, config)?;
    outcome.pseudo_r_squared = pseudo_r2;
    outcome.write(writer)?;
    Ok(AnalysisOutcome::Classification(outcome))
}
