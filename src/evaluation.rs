//! Offline evaluation of the classifier on a labelled image set.

use crate::prediction::{Label, DECISION_THRESHOLD};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConfusionMatrix {
    pub tn: usize,
    pub fp: usize,
    pub fn_: usize,
    pub tp: usize,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

fn f1(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

impl ConfusionMatrix {
    /// Thresholds `scores` with the serving decision rule and tallies them
    /// against `labels` (`true` = TB).
    pub fn from_scores(labels: &[bool], scores: &[f64]) -> Self {
        let mut matrix = Self::default();
        for (&actual, &score) in labels.iter().zip(scores) {
            let predicted = score > DECISION_THRESHOLD;
            match (actual, predicted) {
                (false, false) => matrix.tn += 1,
                (false, true) => matrix.fp += 1,
                (true, false) => matrix.fn_ += 1,
                (true, true) => matrix.tp += 1,
            }
        }
        matrix
    }

    pub fn total(&self) -> usize {
        self.tn + self.fp + self.fn_ + self.tp
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.tp + self.tn, self.total())
    }

    pub fn sensitivity(&self) -> f64 {
        ratio(self.tp, self.tp + self.fn_)
    }

    pub fn specificity(&self) -> f64 {
        ratio(self.tn, self.tn + self.fp)
    }

    pub fn balanced_accuracy(&self) -> f64 {
        (self.sensitivity() + self.specificity()) / 2.0
    }

    pub fn class_metrics(&self, label: Label) -> ClassMetrics {
        let (precision, recall, support) = match label {
            Label::Tb => (
                ratio(self.tp, self.tp + self.fp),
                self.sensitivity(),
                self.tp + self.fn_,
            ),
            Label::Normal => (
                ratio(self.tn, self.tn + self.fn_),
                self.specificity(),
                self.tn + self.fp,
            ),
        };

        ClassMetrics {
            precision,
            recall,
            f1: f1(precision, recall),
            support,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Area under the ROC curve via the Mann-Whitney U statistic, with tied
/// scores sharing their average rank. `None` unless both classes occur.
pub fn roc_auc(labels: &[bool], scores: &[f64]) -> Option<f64> {
    let n = labels.len().min(scores.len());
    let positives = labels[..n].iter().filter(|&&l| l).count();
    let negatives = n - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        let average_rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = average_rank;
        }
        i = j + 1;
    }

    let positive_rank_sum: f64 = (0..n).filter(|&k| labels[k]).map(|k| ranks[k]).sum();
    let p = positives as f64;
    let u = positive_rank_sum - p * (p + 1.0) / 2.0;

    Some(u / (p * negatives as f64))
}

/// Inverse-frequency weights `total / (2 * count)` for (Normal, TB).
pub fn class_weights(normal_count: usize, tb_count: usize) -> (f64, f64) {
    let total = (normal_count + tb_count) as f64;
    let weight = |count: usize| {
        if count == 0 {
            0.0
        } else {
            total / (2.0 * count as f64)
        }
    };

    (weight(normal_count), weight(tb_count))
}

#[derive(Debug, Clone)]
pub struct EvaluationReport {
    pub matrix: ConfusionMatrix,
    pub auc: Option<f64>,
    pub normal_count: usize,
    pub tb_count: usize,
}

impl EvaluationReport {
    pub fn new(labels: &[bool], scores: &[f64]) -> Self {
        let tb_count = labels.iter().filter(|&&l| l).count();

        Self {
            matrix: ConfusionMatrix::from_scores(labels, scores),
            auc: roc_auc(labels, scores),
            normal_count: labels.len() - tb_count,
            tb_count,
        }
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.normal_count + self.tb_count;
        let (normal_weight, tb_weight) = class_weights(self.normal_count, self.tb_count);

        writeln!(f, "Dataset Statistics:")?;
        writeln!(f, "Normal images: {}", self.normal_count)?;
        writeln!(f, "TB images: {}", self.tb_count)?;
        writeln!(f, "Total images: {}", total)?;
        writeln!(
            f,
            "TB ratio: {:.2}%",
            100.0 * ratio(self.tb_count, total)
        )?;
        writeln!(f, "Class weights: Normal {:.2}, TB {:.2}", normal_weight, tb_weight)?;

        writeln!(f)?;
        writeln!(f, "{}", "=".repeat(50))?;
        writeln!(f, "MODEL EVALUATION")?;
        writeln!(f, "{}", "=".repeat(50))?;

        match self.auc {
            Some(auc) => writeln!(f, "\nAUC Score: {:.4}", auc)?,
            None => writeln!(f, "\nAUC Score: n/a (single class)")?,
        }

        writeln!(f, "\nClassification Report:")?;
        writeln!(
            f,
            "{:>10} {:>10} {:>10} {:>10} {:>10}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        for label in [Label::Normal, Label::Tb] {
            let m = self.matrix.class_metrics(label);
            writeln!(
                f,
                "{:>10} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                label.as_str(),
                m.precision,
                m.recall,
                m.f1,
                m.support
            )?;
        }
        writeln!(
            f,
            "{:>10} {:>10} {:>10} {:>10.2} {:>10}",
            "accuracy",
            "",
            "",
            self.matrix.accuracy(),
            self.matrix.total()
        )?;

        writeln!(f, "\nConfusion Matrix:")?;
        writeln!(f, "[[{} {}]", self.matrix.tn, self.matrix.fp)?;
        writeln!(f, " [{} {}]]", self.matrix.fn_, self.matrix.tp)?;

        writeln!(f, "\nSensitivity (TPR): {:.4}", self.matrix.sensitivity())?;
        writeln!(f, "Specificity (TNR): {:.4}", self.matrix.specificity())?;
        write!(f, "Balanced Accuracy: {:.4}", self.matrix.balanced_accuracy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confusion_matrix_uses_strict_threshold() {
        let labels = [false, false, true, true, false];
        let scores = [0.1, 0.5, 0.51, 0.2, 0.9];

        let matrix = ConfusionMatrix::from_scores(&labels, &scores);

        assert_eq!(
            matrix,
            ConfusionMatrix {
                tn: 2,
                fp: 1,
                fn_: 1,
                tp: 1
            }
        );
        assert_eq!(matrix.sensitivity(), 0.5);
        assert!((matrix.specificity() - 2.0 / 3.0).abs() < 1e-12);
        assert!((matrix.balanced_accuracy() - (0.5 + 2.0 / 3.0) / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_class_metrics() {
        let matrix = ConfusionMatrix {
            tn: 8,
            fp: 2,
            fn_: 1,
            tp: 4,
        };

        let tb = matrix.class_metrics(Label::Tb);
        assert!((tb.precision - 4.0 / 6.0).abs() < 1e-12);
        assert!((tb.recall - 0.8).abs() < 1e-12);
        assert_eq!(tb.support, 5);

        let normal = matrix.class_metrics(Label::Normal);
        assert!((normal.precision - 8.0 / 9.0).abs() < 1e-12);
        assert!((normal.recall - 0.8).abs() < 1e-12);
        assert_eq!(normal.support, 10);
    }

    #[test]
    fn test_empty_matrix_does_not_divide_by_zero() {
        let matrix = ConfusionMatrix::default();

        assert_eq!(matrix.accuracy(), 0.0);
        assert_eq!(matrix.sensitivity(), 0.0);
        assert_eq!(matrix.class_metrics(Label::Tb).f1, 0.0);
    }

    #[test]
    fn test_auc_perfect_and_inverted() {
        let labels = [false, false, true, true];

        assert_eq!(roc_auc(&labels, &[0.1, 0.2, 0.8, 0.9]), Some(1.0));
        assert_eq!(roc_auc(&labels, &[0.9, 0.8, 0.2, 0.1]), Some(0.0));
    }

    #[test]
    fn test_auc_with_ties() {
        let labels = [false, true, false, true];
        let scores = [0.3, 0.3, 0.1, 0.7];

        // pairs (neg, pos): (0.3,0.3)=0.5 (0.3,0.7)=1 (0.1,0.3)=1 (0.1,0.7)=1
        assert_eq!(roc_auc(&labels, &scores), Some(0.875));
    }

    #[test]
    fn test_auc_single_class() {
        assert_eq!(roc_auc(&[true, true], &[0.2, 0.9]), None);
    }

    #[test]
    fn test_class_weights() {
        let (normal, tb) = class_weights(3500, 700);

        assert!((normal - 0.6).abs() < 1e-12);
        assert!((tb - 3.0).abs() < 1e-12);
        assert_eq!(class_weights(0, 0), (0.0, 0.0));
    }

    #[test]
    fn test_report_sections() {
        let report = EvaluationReport::new(&[false, true, true], &[0.2, 0.7, 0.4]);
        let text = report.to_string();

        assert_eq!(report.normal_count, 1);
        assert_eq!(report.tb_count, 2);
        assert!(text.contains("AUC Score: 1.0000"));
        assert!(text.contains("Confusion Matrix:\n[[1 0]\n [1 1]]"));
        assert!(text.contains("Sensitivity (TPR): 0.5000"));
    }
}
