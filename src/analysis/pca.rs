//! PCA followed by KNN on the projected space

use super::classification::{class_distribution, ClassificationOutcome};
use super::knn::fit_and_evaluate;
use super::AnalysisOutcome;
use crate::config::AnalysisConfig;
use crate::decomposition::{Pca, PcaConfig};
use crate::error::Result;
use crate::preprocessing::{PreparedData, StandardScaler};
use crate::results::{OutputDir, ResultWriter};
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PcaOutcome {
    pub features: Vec<String>,
    pub components: Vec<String>,
    pub explained_variance: Vec<f64>,
    pub explained_variance_ratio: Vec<f64>,
    pub cumulative_variance_ratio: Vec<f64>,
    /// n_features x n_components
    pub loadings: Array2<f64>,
    pub classification: ClassificationOutcome,
}

impl PcaOutcome {
    pub fn variance_frame(&self) -> Result<DataFrame> {
        Ok(DataFrame::new(vec![
            Column::new("component".into(), self.components.clone()),
            Column::new("explained_variance".into(), self.explained_variance.clone()),
            Column::new("explained_variance_ratio".into(), self.explained_variance_ratio.clone()),
            Column::new("cumulative_variance_ratio".into(), self.cumulative_variance_ratio.clone()),
        ])?)
    }

    pub fn loadings_frame(&self) -> Result<DataFrame> {
        let mut columns = vec![Column::new("feature".into(), self.features.clone())];
        for (j, name) in self.components.iter().enumerate() {
            columns.push(Column::new(name.as_str().into(), self.loadings.column(j).to_vec()));
        }
        Ok(DataFrame::new(columns)?)
    }

    pub fn to_text(&self) -> String {
        let mut out = String::from("Explained variance:\n");
        for (i, name) in self.components.iter().enumerate() {
            let _ = writeln!(
                out,
                "  {:<6} {:>10.4} {:>8.2}% {:>8.2}%",
                name,
                self.explained_variance[i],
                self.explained_variance_ratio[i] * 100.0,
                self.cumulative_variance_ratio[i] * 100.0
            );
        }
        out.push('\n');
        out.push_str(&self.classification.to_text());
        out
    }
}

pub fn run(
    prepared: &PreparedData,
    config: &AnalysisConfig,
    writer: &ResultWriter,
) -> Result<AnalysisOutcome> {
    let x = prepared.x()?;
    let y = prepared.y()?;
    writer.try_frame_with(OutputDir::Visuals, "class_distribution.csv", || class_distribution(&y));

    // The target never enters the decomposition
    let standardized = StandardScaler::new().fit_transform_array(&x)?;
    let mut pca = Pca::new(PcaConfig {
        n_components: config.pca.components_retained,
        random_state: config.random_state,
        ..PcaConfig::default()
    });
    let projected = pca.fit_transform(&standardized)?;

    let components: Vec<String> = (1..=pca.n_components()).map(|i| format!("PC{}", i)).collect();
    let ratio = pca.explained_variance_ratio();
    info!(
        components = components.len(),
        explained = ratio.iter().sum::<f64>(),
        "fitted PCA"
    );

    let classification = fit_and_evaluate(
        "PCA + K-Nearest Neighbors",
        &projected,
        &y,
        &components,
        config,
    )?;

    let outcome = PcaOutcome {
        features: prepared.predictors.clone(),
        explained_variance: pca.explained_variance().to_vec(),
        cumulative_variance_ratio: pca.cumulative_variance_ratio(),
        explained_variance_ratio: ratio,
        loadings: pca.components()?.t().to_owned(),
        components,
        classification,
    };

    writer.try_frame_with(OutputDir::Visuals, "explained_variance.csv", || outcome.variance_frame());
    writer.try_frame_with(OutputDir::Results, "pca_loadings.csv", || outcome.loadings_frame());
    outcome.classification.write(writer)?;
    Ok(AnalysisOutcome::Pca(outcome))
}
