//! Integration test: marker file to result files

use medflow::config::{AnalysisConfig, AnalysisKind, ColumnSpec, KnnSettings, DEFAULT_MARKER_FILE};
use medflow::pipeline::Pipeline;
use medflow::utils::frame::is_numeric;
use medflow::utils::{DataLoader, DataSaver};
use medflow::MedflowError;
use polars::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

const ROWS: usize = 60;

/// Shape of the `Age_twin` column
#[derive(Clone, Copy)]
enum Twin {
    Noisy,
    /// 2 * Age + 1, missing where Age is missing
    Exact,
}

fn write_raw_csv(path: &Path, twin_kind: Twin) {
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    let mut age: Vec<Option<f64>> = Vec::with_capacity(ROWS);
    let mut twin: Vec<Option<f64>> = Vec::with_capacity(ROWS);
    let mut income = Vec::with_capacity(ROWS);
    let mut charges = Vec::with_capacity(ROWS);
    let mut stroke = Vec::with_capacity(ROWS);
    let mut overweight = Vec::with_capacity(ROWS);
    let mut doc_visits = Vec::with_capacity(ROWS);

    for i in 0..ROWS {
        let a: f64 = rng.gen_range(20.0..80.0);
        let inc: f64 = rng.gen_range(20_000.0..90_000.0);
        age.push(if i == 4 { None } else { Some(a) });
        let noise: f64 = rng.gen_range(-0.5..0.5);
        twin.push(match twin_kind {
            Twin::Noisy => Some(a * 1.5 + noise),
            Twin::Exact if i == 4 => None,
            Twin::Exact => Some(2.0 * a + 1.0),
        });
        income.push(inc);
        charges.push(90.0 * a + 0.01 * inc + rng.gen_range(-150.0..150.0));
        stroke.push(if i % 4 == 0 { "Yes" } else { "No" });
        overweight.push(if a + rng.gen_range(-8.0..8.0) > 50.0 { "Yes" } else { "No" });
        doc_visits.push(if i % 5 == 0 { 6.0 } else { 5.0 });
    }

    let mut df = df!(
        "Age" => age,
        "Age_twin" => twin,
        "Income" => income,
        "Charges" => charges,
        "Stroke" => stroke,
        "Overweight" => overweight,
        "Doc_visits" => doc_visits
    )
    .unwrap();
    DataSaver::save_csv(&mut df, path).unwrap();
}

/// Lay out a project directory: raw data, marker and settings
fn project(dir: &Path, config: AnalysisConfig) -> PathBuf {
    project_with(dir, config, Twin::Noisy)
}

fn project_with(dir: &Path, config: AnalysisConfig, twin: Twin) -> PathBuf {
    write_raw_csv(&dir.join("medical.csv"), twin);
    let config = config.with_paths("medical.csv", "prepared", "results");
    fs::write(
        dir.join(config.config_type.settings_file_name()),
        serde_json::to_string_pretty(&config).unwrap(),
    )
    .unwrap();

    let marker = dir.join(DEFAULT_MARKER_FILE);
    fs::write(&marker, format!("CONFIG_TYPE = '{}'\n", config.config_type)).unwrap();
    marker
}

fn overweight_config(kind: AnalysisKind) -> AnalysisConfig {
    AnalysisConfig::new(
        kind,
        "Overweight",
        vec![
            ColumnSpec::continuous("Age"),
            ColumnSpec::continuous("Age_twin"),
            ColumnSpec::continuous("Income"),
            ColumnSpec::categorical("Stroke"),
            ColumnSpec::categorical("Overweight"),
        ],
    )
}

fn one_age_column(features: &[String]) -> bool {
    let ages = features.iter().filter(|f| f.starts_with("Age")).count();
    ages == 1
}

#[test]
fn test_logistic_end_to_end() {
    let dir = tempdir().unwrap();
    let marker = project(dir.path(), overweight_config(AnalysisKind::Logistic));

    let pipeline = Pipeline::from_marker(&marker).unwrap();
    let summary = pipeline.run().unwrap();

    assert_eq!(summary.kind, AnalysisKind::Logistic);
    assert_eq!(summary.rows, ROWS);
    assert_eq!(summary.target, "Overweight_Yes");
    assert!(!summary.predictors.contains(&summary.target));

    // The prepared CSV holds the target first, no gaps, only numbers
    let prepared = DataLoader::new().load_csv(&summary.prepared_path).unwrap();
    assert_eq!(prepared.get_column_names()[0].as_str(), "Overweight_Yes");
    assert_eq!(prepared.height(), ROWS);
    for column in prepared.get_columns() {
        assert_eq!(column.null_count(), 0, "{} has gaps", column.name());
        assert!(is_numeric(column.dtype()), "{} is not numeric", column.name());
    }

    // The missing Age (row 4) holds the median of the observed ages
    let raw = DataLoader::new().load_csv(&dir.path().join("medical.csv")).unwrap();
    let mut observed: Vec<f64> = raw.column("Age").unwrap().f64().unwrap().into_iter().flatten().collect();
    assert_eq!(observed.len(), ROWS - 1);
    observed.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let median = observed[29];
    let filled = prepared.column("Age").unwrap().f64().unwrap().get(4).unwrap();
    assert!((filled - median).abs() < 1e-6);

    let c = summary.outcome.classification().unwrap();
    assert!(one_age_column(&c.features), "VIF keeps one of the twins: {:?}", c.features);
    assert_eq!(c.confusion.total(), c.n_test);

    let json_path = dir.path().join("results").join("run_summary.json");
    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(json_path).unwrap()).unwrap();
    assert_eq!(json["kind"], "logistic");
    assert_eq!(json["rows"], ROWS as u64);
    assert!(summary.files.iter().any(|f| f.ends_with("classification_report.txt")));
    assert!(dir.path().join("prepared").join("vif_results.csv").exists());
}

#[test]
fn test_linear_end_to_end() {
    let dir = tempdir().unwrap();
    let config = AnalysisConfig::new(
        AnalysisKind::Linear,
        "Charges",
        vec![
            ColumnSpec::continuous("Age"),
            ColumnSpec::continuous("Age_twin"),
            ColumnSpec::continuous("Income"),
            ColumnSpec::continuous("Charges"),
            ColumnSpec::categorical("Stroke"),
        ],
    );
    let marker = project(dir.path(), config);

    let summary = Pipeline::from_marker(&marker).unwrap().run().unwrap();
    let r = summary.outcome.regression().unwrap();

    assert_eq!(r.vif.dropped.len(), 1);
    assert!(r.vif.dropped[0].starts_with("Age"));
    assert!(one_age_column(&r.vif.retained));
    assert!(r.r_squared > 0.9);
    assert!(dir.path().join("results").join("regression_summary.txt").exists());
    assert!(dir.path().join("results").join("summary_statistics.txt").exists());
}

#[test]
fn test_knn_end_to_end() {
    let dir = tempdir().unwrap();
    let knn = KnnSettings { vif_filter: true, ..Default::default() };
    let marker = project(dir.path(), overweight_config(AnalysisKind::Knn).with_knn(knn));

    let summary = Pipeline::from_marker(&marker).unwrap().run().unwrap();
    let c = summary.outcome.classification().unwrap();

    // Age filled, Overweight_Yes as target, one twin screened out, KNN on the rest
    assert_eq!(summary.target, "Overweight_Yes");
    assert!(one_age_column(&c.features), "{:?}", c.features);
    assert!(c.features.contains(&"Income".to_string()));
    assert_eq!(c.n_test, 12);
    assert_eq!(c.n_train, ROWS - 12);
    assert_eq!(c.confusion.total(), 12);
    assert!(dir.path().join("results").join("confusion_matrix.csv").exists());
    assert!(dir.path().join("results").join("visuals").join("elbow_wcss.csv").exists());
}

#[test]
fn test_knn_with_exact_twin() {
    let dir = tempdir().unwrap();
    let knn = KnnSettings { vif_filter: true, ..Default::default() };
    let config = overweight_config(AnalysisKind::Knn).with_knn(knn);
    let marker = project_with(dir.path(), config, Twin::Exact);

    let summary = Pipeline::from_marker(&marker).unwrap().run().unwrap();
    let c = summary.outcome.classification().unwrap();

    assert!(one_age_column(&c.features), "{:?}", c.features);
    assert!(c.features.contains(&"Income".to_string()));
    assert_eq!(c.confusion.total(), c.n_test);
}

#[test]
fn test_constant_after_cleaning_is_screened() {
    let dir = tempdir().unwrap();
    let config = AnalysisConfig::new(
        AnalysisKind::Logistic,
        "Overweight",
        vec![
            ColumnSpec::continuous("Age"),
            ColumnSpec::continuous("Doc_visits"),
            ColumnSpec::categorical("Overweight"),
        ],
    );
    let marker = project(dir.path(), config);

    let summary = Pipeline::from_marker(&marker).unwrap().run().unwrap();

    // Zero IQR: every 6.0 is an outlier and goes back to 5.0
    let prepared = DataLoader::new().load_csv(&summary.prepared_path).unwrap();
    let visits = prepared.column("Doc_visits").unwrap().f64().unwrap();
    assert_eq!(visits.min(), Some(5.0));
    assert_eq!(visits.max(), Some(5.0));

    let c = summary.outcome.classification().unwrap();
    assert_eq!(c.features, vec!["Age".to_string()]);
    assert_eq!(c.confusion.total(), c.n_test);
}

#[test]
fn test_missing_raw_data() {
    let dir = tempdir().unwrap();
    let marker = project(dir.path(), overweight_config(AnalysisKind::NaiveBayes));
    fs::remove_file(dir.path().join("medical.csv")).unwrap();

    let err = Pipeline::from_marker(&marker).unwrap().run().unwrap_err();
    assert!(matches!(err, MedflowError::DataError(_)));
}
