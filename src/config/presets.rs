//! Built-in settings for the medical readmission dataset

use super::{AnalysisConfig, AnalysisKind, ColumnKind, ColumnSpec, KnnSettings};
use crate::training::DistanceMetric;
use std::collections::BTreeMap;

const CONDITIONS: [&str; 10] = [
    "Stroke",
    "Arthritis",
    "Diabetes",
    "Hyperlipidemia",
    "BackPain",
    "Anxiety",
    "Allergic_rhinitis",
    "Reflux_esophagitis",
    "Asthma",
    "Overweight",
];

fn yes_no_mapping() -> BTreeMap<String, f64> {
    BTreeMap::from([("Yes".to_string(), 1.0), ("No".to_string(), 0.0)])
}

fn condition_columns(skip: Option<&str>) -> Vec<ColumnSpec> {
    CONDITIONS
        .iter()
        .filter(|c| Some(**c) != skip)
        .map(|c| ColumnSpec::categorical(*c))
        .collect()
}

fn indicator_names(columns: &[ColumnSpec]) -> Vec<String> {
    columns
        .iter()
        .map(|c| match c.kind {
            ColumnKind::Continuous => c.name.clone(),
            ColumnKind::Categorical => format!("{}_Yes", c.name),
        })
        .collect()
}

impl AnalysisConfig {
    /// Settings reproducing the reference analyses of the medical dataset
    pub fn preset(kind: AnalysisKind) -> Self {
        match kind {
            AnalysisKind::Knn => {
                let mut columns = vec![
                    ColumnSpec::continuous("Age"),
                    ColumnSpec::continuous("Income"),
                    ColumnSpec::categorical("Soft_drink"),
                ];
                columns.extend(condition_columns(None));
                let predictors = indicator_names(&columns);

                let mut config = AnalysisConfig::new(kind, "HighBlood", columns)
                    .with_target_mapping(yes_no_mapping())
                    .with_independent_variables(predictors)
                    .with_class_labels(vec!["0".to_string(), "1".to_string()]);
                config.prepared_data_file = "prepared_data_with_dummies.csv".to_string();
                config
            }
            AnalysisKind::NaiveBayes => {
                let mut columns = vec![
                    ColumnSpec::continuous("Age"),
                    ColumnSpec::continuous("Income"),
                    ColumnSpec::continuous("VitD_levels"),
                ];
                columns.extend(condition_columns(None));

                AnalysisConfig::new(kind, "HighBlood", columns)
                    .with_target_mapping(yes_no_mapping())
                    .with_class_labels(vec!["No HighBlood".to_string(), "HighBlood".to_string()])
            }
            AnalysisKind::PcaAnalysis => {
                let mut columns = vec![
                    ColumnSpec::continuous("Age"),
                    ColumnSpec::continuous("Income"),
                    ColumnSpec::continuous("VitD_levels"),
                    ColumnSpec::categorical("Doc_visits"),
                    ColumnSpec::categorical("Overweight"),
                ];
                columns.extend(condition_columns(Some("Overweight")));

                let mut config = AnalysisConfig::new(kind, "Overweight_Yes", columns)
                    .with_excluded_columns(vec!["ID".to_string(), "Customer_id".to_string()])
                    .with_class_labels(vec!["Not Overweight".to_string(), "Overweight".to_string()])
                    .with_knn(KnnSettings {
                        metric: DistanceMetric::Minkowski(2.0),
                        elbow_sweep: false,
                        ..KnnSettings::default()
                    });
                config.prepared_data_file = format!("prepared_data_for_{}.csv", kind.slug());
                config
            }
            AnalysisKind::Linear => {
                let mut columns = vec![
                    ColumnSpec::continuous("TotalCharge"),
                    ColumnSpec::continuous("Age"),
                    ColumnSpec::continuous("Income"),
                    ColumnSpec::continuous("VitD_levels"),
                    ColumnSpec::continuous("Initial_days"),
                    ColumnSpec::continuous("Doc_visits"),
                    ColumnSpec::categorical("ReAdmis"),
                ];
                columns.extend(condition_columns(None));

                AnalysisConfig::new(kind, "TotalCharge", columns)
            }
            AnalysisKind::Logistic => {
                let mut columns = vec![
                    ColumnSpec::categorical("ReAdmis"),
                    ColumnSpec::continuous("Age"),
                    ColumnSpec::continuous("Income"),
                    ColumnSpec::continuous("Initial_days"),
                    ColumnSpec::continuous("Doc_visits"),
                ];
                columns.extend(condition_columns(None));

                AnalysisConfig::new(kind, "ReAdmis", columns)
                    .with_class_labels(vec!["Not Readmitted".to_string(), "Readmitted".to_string()])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_preset_validates() {
        for kind in AnalysisKind::ALL {
            let config = AnalysisConfig::preset(kind);
            assert_eq!(config.config_type, kind);
            assert!(config.validate().is_ok(), "preset {} should validate", kind);
        }
    }

    #[test]
    fn test_knn_preset_predictors_use_indicators() {
        let config = AnalysisConfig::preset(AnalysisKind::Knn);
        let predictors = config.independent_variables.unwrap();
        assert!(predictors.contains(&"Age".to_string()));
        assert!(predictors.contains(&"Stroke_Yes".to_string()));
        assert!(!predictors.contains(&"HighBlood".to_string()));
    }

    #[test]
    fn test_pca_preset_keeps_target_out_of_conditions() {
        let config = AnalysisConfig::preset(AnalysisKind::PcaAnalysis);
        let overweight = config
            .columns
            .iter()
            .filter(|c| c.name == "Overweight")
            .count();
        assert_eq!(overweight, 1);
        assert_eq!(config.pca.components_retained, 3);
    }
}
