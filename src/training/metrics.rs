//! Evaluation metrics for classifiers and regressors

use crate::error::{MedflowError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

fn labels_of(values: &Array1<f64>) -> impl Iterator<Item = i64> + '_ {
    values.iter().map(|v| v.round() as i64)
}

/// Confusion matrix over the sorted union of true and predicted labels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub labels: Vec<i64>,
    /// Rows are true labels, columns are predicted labels
    pub matrix: Array2<usize>,
}

impl ConfusionMatrix {
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<Self> {
        if y_true.len() != y_pred.len() {
            return Err(MedflowError::ShapeError {
                expected: format!("{} predictions", y_true.len()),
                actual: format!("{} predictions", y_pred.len()),
            });
        }

        let mut labels: Vec<i64> = labels_of(y_true).chain(labels_of(y_pred)).collect();
        labels.sort_unstable();
        labels.dedup();

        let n = labels.len();
        let mut matrix = Array2::zeros((n, n));
        for (t, p) in labels_of(y_true).zip(labels_of(y_pred)) {
            if let (Ok(i), Ok(j)) = (labels.binary_search(&t), labels.binary_search(&p)) {
                matrix[[i, j]] += 1;
            }
        }
        Ok(Self { labels, matrix })
    }

    pub fn total(&self) -> usize {
        self.matrix.sum()
    }

    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let correct: usize = (0..self.labels.len()).map(|i| self.matrix[[i, i]]).sum();
        correct as f64 / total as f64
    }

    /// Plain-text grid with row and column headers
    pub fn to_text(&self, names: &[String]) -> String {
        let names: Vec<String> = if names.len() == self.labels.len() {
            names.to_vec()
        } else {
            self.labels.iter().map(|l| l.to_string()).collect()
        };
        let width = names.iter().map(|n| n.len()).max().unwrap_or(1).max(6) + 2;

        let mut out = String::new();
        let _ = write!(out, "{:>width$}", "true\\pred", width = width + 2);
        for name in &names {
            let _ = write!(out, "{:>width$}", name, width = width);
        }
        out.push('\n');
        for (i, name) in names.iter().enumerate() {
            let _ = write!(out, "{:>width$}", name, width = width + 2);
            for j in 0..names.len() {
                let _ = write!(out, "{:>width$}", self.matrix[[i, j]], width = width);
            }
            out.push('\n');
        }
        out
    }
}

/// Per-class precision, recall and F1
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub label: i64,
    pub name: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AverageMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Classification report in the familiar tabular layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub classes: Vec<ClassMetrics>,
    pub accuracy: f64,
    pub macro_avg: AverageMetrics,
    pub weighted_avg: AverageMetrics,
    pub support: usize,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

impl ClassificationReport {
    /// Build from a confusion matrix; `names` relabels the classes when the counts match
    pub fn from_confusion(cm: &ConfusionMatrix, names: &[String]) -> Self {
        let n = cm.labels.len();
        let total = cm.total();

        let classes: Vec<ClassMetrics> = (0..n)
            .map(|i| {
                let tp = cm.matrix[[i, i]];
                let predicted: usize = cm.matrix.column(i).sum();
                let actual: usize = cm.matrix.row(i).sum();
                let precision = ratio(tp, predicted);
                let recall = ratio(tp, actual);
                let f1 = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };
                ClassMetrics {
                    label: cm.labels[i],
                    name: if names.len() == n { names[i].clone() } else { cm.labels[i].to_string() },
                    precision,
                    recall,
                    f1,
                    support: actual,
                }
            })
            .collect();

        let macro_avg = if n == 0 {
            AverageMetrics { precision: 0.0, recall: 0.0, f1: 0.0 }
        } else {
            AverageMetrics {
                precision: classes.iter().map(|c| c.precision).sum::<f64>() / n as f64,
                recall: classes.iter().map(|c| c.recall).sum::<f64>() / n as f64,
                f1: classes.iter().map(|c| c.f1).sum::<f64>() / n as f64,
            }
        };

        let weight = |f: fn(&ClassMetrics) -> f64| -> f64 {
            if total == 0 {
                0.0
            } else {
                classes.iter().map(|c| f(c) * c.support as f64).sum::<f64>() / total as f64
            }
        };
        let weighted_avg = AverageMetrics {
            precision: weight(|c| c.precision),
            recall: weight(|c| c.recall),
            f1: weight(|c| c.f1),
        };

        Self {
            accuracy: cm.accuracy(),
            classes,
            macro_avg,
            weighted_avg,
            support: total,
        }
    }

    pub fn to_text(&self) -> String {
        let width = self
            .classes
            .iter()
            .map(|c| c.name.len())
            .max()
            .unwrap_or(0)
            .max("weighted avg".len());

        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:>width$} {:>9} {:>9} {:>9} {:>9}\n",
            "", "precision", "recall", "f1-score", "support",
            width = width
        );
        for c in &self.classes {
            let _ = writeln!(
                out,
                "{:>width$} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                c.name, c.precision, c.recall, c.f1, c.support,
                width = width
            );
        }
        out.push('\n');
        let _ = writeln!(
            out,
            "{:>width$} {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy", "", "", self.accuracy, self.support,
            width = width
        );
        for (name, avg) in [("macro avg", self.macro_avg), ("weighted avg", self.weighted_avg)] {
            let _ = writeln!(
                out,
                "{:>width$} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                name, avg.precision, avg.recall, avg.f1, self.support,
                width = width
            );
        }
        out
    }
}

/// Receiver operating characteristic of a binary scorer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RocCurve {
    pub fpr: Vec<f64>,
    pub tpr: Vec<f64>,
    pub thresholds: Vec<f64>,
    pub auc: f64,
}

impl RocCurve {
    /// ROC of `scores` for the class labelled `positive`; every other label
    /// counts as negative.
    ///
    /// Fails when the labels hold only one class.
    pub fn compute(y_true: &Array1<f64>, scores: &Array1<f64>, positive: f64) -> Result<Self> {
        if y_true.len() != scores.len() {
            return Err(MedflowError::ShapeError {
                expected: format!("{} scores", y_true.len()),
                actual: format!("{} scores", scores.len()),
            });
        }
        let is_positive = |v: f64| (v - positive).abs() < 1e-9;
        let positives = y_true.iter().filter(|&&v| is_positive(v)).count();
        let negatives = y_true.len() - positives;
        if positives == 0 || negatives == 0 {
            return Err(MedflowError::ComputationError(
                "ROC needs both classes in the evaluated labels".to_string(),
            ));
        }

        let mut order: Vec<usize> = (0..scores.len()).collect();
        order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

        let mut fpr = vec![0.0];
        let mut tpr = vec![0.0];
        let mut thresholds = vec![f64::INFINITY];
        let (mut tp, mut fp) = (0usize, 0usize);

        for (pos, &i) in order.iter().enumerate() {
            if is_positive(y_true[i]) {
                tp += 1;
            } else {
                fp += 1;
            }
            let last_of_score = order
                .get(pos + 1)
                .map_or(true, |&next| scores[next] != scores[i]);
            if last_of_score {
                fpr.push(fp as f64 / negatives as f64);
                tpr.push(tp as f64 / positives as f64);
                thresholds.push(scores[i]);
            }
        }

        let auc = trapezoid_auc(&fpr, &tpr);
        Ok(Self { fpr, tpr, thresholds, auc })
    }
}

/// Area under a piecewise-linear curve
pub fn trapezoid_auc(x: &[f64], y: &[f64]) -> f64 {
    x.windows(2)
        .zip(y.windows(2))
        .map(|(xs, ys)| (xs[1] - xs[0]) * (ys[0] + ys[1]) / 2.0)
        .sum()
}

/// Goodness-of-fit numbers for a regressor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub r2: f64,
    pub mse: f64,
    pub rmse: f64,
    pub mae: f64,
}

impl RegressionMetrics {
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<Self> {
        if y_true.len() != y_pred.len() || y_true.is_empty() {
            return Err(MedflowError::ShapeError {
                expected: format!("{} non-empty predictions", y_true.len()),
                actual: format!("{} predictions", y_pred.len()),
            });
        }
        let n = y_true.len() as f64;
        let resid = y_true - y_pred;
        let mse = resid.mapv(|v| v * v).sum() / n;
        let mae = resid.mapv(f64::abs).sum() / n;
        let mean = y_true.sum() / n;
        let ss_tot = y_true.mapv(|v| (v - mean).powi(2)).sum();
        let r2 = if ss_tot == 0.0 { 0.0 } else { 1.0 - mse * n / ss_tot };
        Ok(Self { r2, mse, rmse: mse.sqrt(), mae })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_confusion_matrix_counts() {
        let y_true = array![0.0, 0.0, 1.0, 1.0, 1.0];
        let y_pred = array![0.0, 1.0, 1.0, 1.0, 0.0];
        let cm = ConfusionMatrix::compute(&y_true, &y_pred).unwrap();

        assert_eq!(cm.labels, vec![0, 1]);
        assert_eq!(cm.matrix, array![[1, 1], [1, 2]]);
        assert_eq!(cm.total(), 5);
        assert!((cm.accuracy() - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_confusion_matrix_label_union() {
        // Predicted label never seen in y_true still gets a column
        let cm = ConfusionMatrix::compute(&array![0.0, 0.0], &array![0.0, 1.0]).unwrap();
        assert_eq!(cm.labels, vec![0, 1]);
        assert_eq!(cm.total(), 2);
    }

    #[test]
    fn test_classification_report() {
        let y_true = array![0.0, 0.0, 1.0, 1.0, 1.0];
        let y_pred = array![0.0, 1.0, 1.0, 1.0, 0.0];
        let cm = ConfusionMatrix::compute(&y_true, &y_pred).unwrap();
        let report = ClassificationReport::from_confusion(&cm, &["No".to_string(), "Yes".to_string()]);

        assert_eq!(report.classes[0].name, "No");
        assert!((report.classes[1].precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((report.classes[1].recall - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(report.classes[1].support, 3);
        assert!((report.macro_avg.recall - (0.5 + 2.0 / 3.0) / 2.0).abs() < 1e-12);

        let text = report.to_text();
        assert!(text.contains("precision"));
        assert!(text.contains("weighted avg"));
    }

    #[test]
    fn test_roc_perfect_and_random() {
        let y = array![0.0, 0.0, 1.0, 1.0];
        let perfect = RocCurve::compute(&y, &array![0.1, 0.2, 0.8, 0.9], 1.0).unwrap();
        assert!((perfect.auc - 1.0).abs() < 1e-12);

        let tied = RocCurve::compute(&y, &array![0.5, 0.5, 0.5, 0.5], 1.0).unwrap();
        assert!((tied.auc - 0.5).abs() < 1e-12);
        assert_eq!(tied.fpr, vec![0.0, 1.0]);

        let reversed = RocCurve::compute(&y, &array![0.9, 0.8, 0.2, 0.1], 1.0).unwrap();
        assert!(reversed.auc.abs() < 1e-12);
    }

    #[test]
    fn test_roc_requires_both_classes() {
        assert!(RocCurve::compute(&array![1.0, 1.0], &array![0.2, 0.4], 1.0).is_err());
    }

    #[test]
    fn test_roc_with_one_two_labels() {
        let y = array![1.0, 2.0, 1.0, 2.0];
        let roc = RocCurve::compute(&y, &array![0.2, 0.7, 0.4, 0.9], 2.0).unwrap();
        assert!((roc.auc - 1.0).abs() < 1e-12);
        assert!(RocCurve::compute(&y, &array![0.2, 0.7, 0.4, 0.9], 0.0).is_err());
    }

    #[test]
    fn test_regression_metrics() {
        let y = array![1.0, 2.0, 3.0];
        let m = RegressionMetrics::compute(&y, &array![1.0, 2.0, 4.0]).unwrap();
        assert!((m.mse - 1.0 / 3.0).abs() < 1e-12);
        assert!((m.mae - 1.0 / 3.0).abs() < 1e-12);
        assert!((m.r2 - 0.5).abs() < 1e-12);
    }
}
