//! Integration test: analysis runners on prepared data

use medflow::analysis::{run_analysis, AnalysisOutcome};
use medflow::config::{AnalysisConfig, AnalysisKind, ColumnSpec, KnnSettings};
use medflow::preprocessing::{DataPreparer, PreparedData};
use medflow::results::{OutputDir, ResultWriter};
use medflow::training::ReductionMethod;
use polars::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::path::Path;
use tempfile::tempdir;

const ROWS: usize = 100;

fn raw_frame() -> DataFrame {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let mut age = Vec::with_capacity(ROWS);
    let mut income = Vec::with_capacity(ROWS);
    let mut charges = Vec::with_capacity(ROWS);
    let mut stroke = Vec::with_capacity(ROWS);
    let mut overweight = Vec::with_capacity(ROWS);

    for _ in 0..ROWS {
        let a: f64 = rng.gen_range(20.0..80.0);
        let inc: f64 = rng.gen_range(20_000.0..100_000.0);
        age.push(a);
        income.push(inc);
        charges.push(120.0 * a + 0.02 * inc + rng.gen_range(-200.0..200.0));
        stroke.push(if rng.gen_bool(0.3) { "Yes" } else { "No" });
        let noisy = a + rng.gen_range(-10.0..10.0);
        overweight.push(if noisy > 50.0 { "Yes" } else { "No" });
    }

    df!(
        "Age" => age,
        "Income" => income,
        "Charges" => charges,
        "Stroke" => stroke,
        "Overweight" => overweight
    )
    .unwrap()
}

fn classification_config(kind: AnalysisKind, dir: &Path) -> AnalysisConfig {
    AnalysisConfig::new(
        kind,
        "Overweight",
        vec![
            ColumnSpec::continuous("Age"),
            ColumnSpec::continuous("Income"),
            ColumnSpec::categorical("Stroke"),
            ColumnSpec::categorical("Overweight"),
        ],
    )
    .with_paths(dir.join("raw.csv"), dir.join("prepared"), dir.join("results"))
}

fn linear_config(dir: &Path) -> AnalysisConfig {
    AnalysisConfig::new(
        AnalysisKind::Linear,
        "Charges",
        vec![
            ColumnSpec::continuous("Age"),
            ColumnSpec::continuous("Income"),
            ColumnSpec::continuous("Charges"),
            ColumnSpec::categorical("Stroke"),
        ],
    )
    .with_paths(dir.join("raw.csv"), dir.join("prepared"), dir.join("results"))
}

fn prepare(config: &AnalysisConfig) -> PreparedData {
    DataPreparer::new(config).prepare(&raw_frame()).unwrap()
}

fn run(config: &AnalysisConfig) -> (AnalysisOutcome, ResultWriter) {
    let prepared = prepare(config);
    let writer = ResultWriter::from_config(config);
    let outcome = run_analysis(&prepared, config, &writer).unwrap();
    (outcome, writer)
}

#[test]
fn test_knn_confusion_matches_test_rows() {
    let dir = tempdir().unwrap();
    let config = classification_config(AnalysisKind::Knn, dir.path());
    let (outcome, writer) = run(&config);

    let c = outcome.classification().unwrap();
    assert_eq!(c.n_test, 20);
    assert_eq!(c.n_train, 80);
    assert_eq!(c.confusion.total(), c.n_test);
    assert!((0.0..=1.0).contains(&c.accuracy()));
    assert!(c.cv_scores.is_none());

    for (sub, name) in [
        (OutputDir::Results, "classification_report.txt"),
        (OutputDir::Results, "confusion_matrix.csv"),
        (OutputDir::Results, "summary_statistics.txt"),
        (OutputDir::Visuals, "elbow_wcss.csv"),
        (OutputDir::Visuals, "class_distribution.csv"),
    ] {
        assert!(writer.path(sub, name).exists(), "{} missing", name);
    }
}

#[test]
fn test_knn_cross_validation() {
    let dir = tempdir().unwrap();
    let knn = KnnSettings {
        cross_val_folds: Some(5),
        elbow_sweep: false,
        ..Default::default()
    };
    let config = classification_config(AnalysisKind::Knn, dir.path()).with_knn(knn);
    let (outcome, writer) = run(&config);

    let c = outcome.classification().unwrap();
    let scores = c.cv_scores.as_ref().unwrap();
    assert_eq!(scores.len(), 5);
    assert!(scores.iter().all(|s| (0.0..=1.0).contains(s)));
    assert!(!writer.path(OutputDir::Visuals, "elbow_wcss.csv").exists());
}

#[test]
fn test_naive_bayes_runner() {
    let dir = tempdir().unwrap();
    let config = classification_config(AnalysisKind::NaiveBayes, dir.path())
        .with_class_labels(vec!["Not overweight".to_string(), "Overweight".to_string()]);
    let (outcome, writer) = run(&config);

    let c = outcome.classification().unwrap();
    assert_eq!(c.confusion.total(), c.n_test);
    assert_eq!(c.class_names, vec!["Not overweight", "Overweight"]);
    assert!(c.accuracy() > 0.6);
    assert!(c.roc.is_some());

    let report = std::fs::read_to_string(writer.path(OutputDir::Results, "classification_report.txt")).unwrap();
    assert!(report.contains("Not overweight"));
}

#[test]
fn test_logistic_runner() {
    let dir = tempdir().unwrap();
    let config = classification_config(AnalysisKind::Logistic, dir.path());
    let (outcome, writer) = run(&config);

    let c = outcome.classification().unwrap();
    assert_eq!(c.confusion.total(), c.n_test);
    assert!(c.accuracy() > 0.6);
    let pseudo = c.pseudo_r_squared.unwrap();
    assert!(pseudo > 0.0 && pseudo < 1.0);
    assert!(!c.features.contains(&"Overweight_Yes".to_string()));
    assert!(writer.path(OutputDir::Prepared, "vif_results.csv").exists());
}

#[test]
fn test_linear_runner() {
    let dir = tempdir().unwrap();
    let config = linear_config(dir.path());
    let (outcome, writer) = run(&config);

    let r = outcome.regression().unwrap();
    assert_eq!(r.target, "Charges");
    assert_eq!(r.n_samples, ROWS);
    assert!(r.r_squared > 0.95);
    assert_eq!(r.coefficients[0].name, "const");
    assert_eq!(r.coefficients.len(), 4);

    let age = r.coefficients.iter().find(|c| c.name == "Age").unwrap();
    assert!((age.estimate - 120.0).abs() < 5.0);
    assert!(age.p_value < 0.001);

    let labels: Vec<&str> = r.comparisons.iter().map(|m| m.label.as_str()).collect();
    assert_eq!(labels[..2], ["Initial", "VIF"]);
    assert_eq!(r.selections.len(), 2);
    assert!(r
        .selections
        .iter()
        .any(|s| s.method == ReductionMethod::BackwardElimination && s.features.contains(&"Age".to_string())));

    assert!(writer.path(OutputDir::Results, "regression_summary.txt").exists());
    assert!(writer.path(OutputDir::Results, "variable_selection.csv").exists());
    assert!(outcome.to_text().contains("R-squared"));
}

#[test]
fn test_pca_runner() {
    let dir = tempdir().unwrap();
    let config = classification_config(AnalysisKind::PcaAnalysis, dir.path());
    let (outcome, writer) = run(&config);

    let AnalysisOutcome::Pca(p) = &outcome else {
        panic!("expected a PCA outcome");
    };
    // Age, Income and Stroke_Yes; three components retained by default
    assert_eq!(p.components, vec!["PC1", "PC2", "PC3"]);
    assert_eq!(p.loadings.dim(), (3, 3));
    assert!(p.explained_variance_ratio.windows(2).all(|w| w[0] >= w[1] - 1e-9));
    let last = *p.cumulative_variance_ratio.last().unwrap();
    assert!((last - 1.0).abs() < 1e-6);
    assert_eq!(p.classification.confusion.total(), p.classification.n_test);

    assert!(writer.path(OutputDir::Visuals, "explained_variance.csv").exists());
    assert!(writer.path(OutputDir::Results, "pca_loadings.csv").exists());
}

#[test]
fn test_headline_metric() {
    let dir = tempdir().unwrap();
    let (outcome, _) = run(&linear_config(dir.path()));
    let (name, value) = outcome.headline();
    assert_eq!(name, "R-squared");
    assert!(value > 0.9);
}
