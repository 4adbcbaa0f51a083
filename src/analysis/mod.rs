//! Analysis dispatch and model runners
//!
//! Every [`AnalysisKind`] maps to exactly one runner function. A run writes
//! the summary statistics first, then hands the prepared data to the runner.

pub mod classification;
pub mod knn;
pub mod naive_bayes;
pub mod pca;
pub mod regression;
pub mod summary;

pub use classification::ClassificationOutcome;
pub use pca::PcaOutcome;
pub use regression::{Coefficient, RegressionOutcome, ResidualDiagnostics, Selection};
pub use summary::SummaryStatistics;

use crate::config::{AnalysisConfig, AnalysisKind};
use crate::error::Result;
use crate::preprocessing::PreparedData;
use crate::results::ResultWriter;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Signature shared by every runner
pub type AnalysisFn = fn(&PreparedData, &AnalysisConfig, &ResultWriter) -> Result<AnalysisOutcome>;

impl AnalysisKind {
    pub fn runner(self) -> AnalysisFn {
        match self {
            AnalysisKind::Knn => knn::run,
            AnalysisKind::NaiveBayes => naive_bayes::run,
            AnalysisKind::Linear => regression::run_linear,
            AnalysisKind::Logistic => regression::run_logistic,
            AnalysisKind::PcaAnalysis => pca::run,
        }
    }
}

/// What a run produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AnalysisOutcome {
    Classification(ClassificationOutcome),
    Pca(PcaOutcome),
    Regression(RegressionOutcome),
}

impl AnalysisOutcome {
    /// The classifier evaluation, for the kinds that end in one
    pub fn classification(&self) -> Option<&ClassificationOutcome> {
        match self {
            AnalysisOutcome::Classification(c) => Some(c),
            AnalysisOutcome::Pca(p) => Some(&p.classification),
            AnalysisOutcome::Regression(_) => None,
        }
    }

    pub fn regression(&self) -> Option<&RegressionOutcome> {
        match self {
            AnalysisOutcome::Regression(r) => Some(r),
            _ => None,
        }
    }

    /// Accuracy for classifiers, R² for regression
    pub fn headline(&self) -> (&'static str, f64) {
        match self {
            AnalysisOutcome::Regression(r) => ("R-squared", r.r_squared),
            other => (
                "accuracy",
                other.classification().map_or(f64::NAN, |c| c.accuracy()),
            ),
        }
    }

    pub fn to_text(&self) -> String {
        match self {
            AnalysisOutcome::Classification(c) => c.to_text(),
            AnalysisOutcome::Pca(p) => p.to_text(),
            AnalysisOutcome::Regression(r) => r.to_text(),
        }
    }
}

/// Write summary statistics, then run the configured analysis
pub fn run_analysis(
    prepared: &PreparedData,
    config: &AnalysisConfig,
    writer: &ResultWriter,
) -> Result<AnalysisOutcome> {
    match SummaryStatistics::compute(prepared).and_then(|s| s.write(writer)) {
        Ok(()) => info!("summary statistics written"),
        Err(e) => warn!(error = %e, "summary statistics skipped"),
    }

    let kind = config.config_type;
    info!(analysis = %kind, "dispatching analysis");
    let runner = kind.runner();
    runner(prepared, config, writer)
}
