//! Classification report and confusion matrix

use crate::model::NUM_CLASSES;
use sarcasm_core::Label;
use serde::Serialize;
use std::fmt;

/// Counts of (true, predicted) label pairs; rows are true labels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    pub counts: [[usize; NUM_CLASSES]; NUM_CLASSES],
}

impl ConfusionMatrix {
    /// Label indices outside the class range are ignored
    pub fn from_labels(truth: &[u32], predicted: &[u32]) -> Self {
        let mut matrix = Self::default();
        for (&t, &p) in truth.iter().zip(predicted) {
            let (t, p) = (t as usize, p as usize);
            if t < NUM_CLASSES && p < NUM_CLASSES {
                matrix.counts[t][p] += 1;
            }
        }
        matrix
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    pub fn correct(&self) -> usize {
        (0..NUM_CLASSES).map(|c| self.counts[c][c]).sum()
    }

    /// Examples whose true label is `class`
    pub fn support(&self, class: usize) -> usize {
        self.counts[class].iter().sum()
    }

    /// Examples predicted as `class`
    pub fn predicted(&self, class: usize) -> usize {
        self.counts.iter().map(|row| row[class]).sum()
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in &self.counts {
            let cells: Vec<String> = row.iter().map(|c| format!("{:>6}", c)).collect();
            writeln!(f, "[{}]", cells.join(" "))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
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

/// Per-class precision/recall/F1 with accuracy and averaged rows.
/// Any metric with a zero denominator is 0.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationReport {
    pub per_class: [ClassMetrics; NUM_CLASSES],
    pub accuracy: f64,
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
}

impl ClassificationReport {
    pub fn from_confusion(matrix: &ConfusionMatrix) -> Self {
        let mut per_class = [ClassMetrics::default(); NUM_CLASSES];
        for (class, metrics) in per_class.iter_mut().enumerate() {
            let tp = matrix.counts[class][class];
            let precision = ratio(tp, matrix.predicted(class));
            let recall = ratio(tp, matrix.support(class));
            *metrics = ClassMetrics {
                precision,
                recall,
                f1: f1(precision, recall),
                support: matrix.support(class),
            };
        }

        let total = matrix.total();
        let average = |weight: &dyn Fn(&ClassMetrics) -> f64| {
            let norm: f64 = per_class.iter().map(weight).sum();
            let mean = |field: fn(&ClassMetrics) -> f64| {
                if norm == 0.0 {
                    0.0
                } else {
                    per_class.iter().map(|m| weight(m) * field(m)).sum::<f64>() / norm
                }
            };
            ClassMetrics {
                precision: mean(|m| m.precision),
                recall: mean(|m| m.recall),
                f1: mean(|m| m.f1),
                support: total,
            }
        };

        let macro_avg = average(&|_| 1.0);
        let weighted_avg = average(&|m| m.support as f64);

        Self {
            per_class,
            accuracy: ratio(matrix.correct(), total),
            macro_avg,
            weighted_avg,
        }
    }

    pub fn from_labels(truth: &[u32], predicted: &[u32]) -> Self {
        Self::from_confusion(&ConfusionMatrix::from_labels(truth, predicted))
    }

    pub fn class(&self, label: Label) -> &ClassMetrics {
        &self.per_class[label.index() as usize]
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = Label::ALL
            .iter()
            .map(|l| l.as_str().len())
            .chain(std::iter::once("weighted avg".len()))
            .max()
            .unwrap_or(12);

        let row = |f: &mut fmt::Formatter<'_>, name: &str, m: &ClassMetrics| {
            writeln!(
                f,
                "{:>width$} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                name,
                m.precision,
                m.recall,
                m.f1,
                m.support,
                width = width
            )
        };

        writeln!(
            f,
            "{:>width$} {:>9} {:>9} {:>9} {:>9}",
            "",
            "precision",
            "recall",
            "f1-score",
            "support",
            width = width
        )?;
        writeln!(f)?;
        for label in Label::ALL {
            row(f, label.as_str(), self.class(label))?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>width$} {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy",
            "",
            "",
            self.accuracy,
            self.macro_avg.support,
            width = width
        )?;
        row(f, "macro avg", &self.macro_avg)?;
        row(f, "weighted avg", &self.weighted_avg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confusion_matrix_rows_are_truth() {
        let truth = [0, 0, 1, 1, 1];
        let pred = [0, 1, 1, 1, 0];
        let m = ConfusionMatrix::from_labels(&truth, &pred);
        assert_eq!(m.counts, [[1, 1], [1, 2]]);
        assert_eq!(m.total(), 5);
        assert_eq!(m.correct(), 3);
        assert_eq!(m.support(1), 3);
        assert_eq!(m.predicted(1), 3);
    }

    #[test]
    fn test_report_values() {
        let truth = [0, 0, 1, 1, 1];
        let pred = [0, 1, 1, 1, 0];
        let report = ClassificationReport::from_labels(&truth, &pred);

        let not = report.class(Label::NotSarcastic);
        assert!((not.precision - 0.5).abs() < 1e-12);
        assert!((not.recall - 0.5).abs() < 1e-12);
        assert_eq!(not.support, 2);

        let sarc = report.class(Label::Sarcastic);
        assert!((sarc.precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((sarc.recall - 2.0 / 3.0).abs() < 1e-12);

        assert!((report.accuracy - 0.6).abs() < 1e-12);
        assert!((report.macro_avg.f1 - (0.5 + 2.0 / 3.0) / 2.0).abs() < 1e-12);
        let weighted = (0.5 * 2.0 + (2.0 / 3.0) * 3.0) / 5.0;
        assert!((report.weighted_avg.f1 - weighted).abs() < 1e-12);
        assert_eq!(report.weighted_avg.support, 5);
    }

    #[test]
    fn test_zero_division_reports_zero() {
        // Sarcastic is never predicted and never true
        let report = ClassificationReport::from_labels(&[0, 0], &[0, 0]);
        let sarc = report.class(Label::Sarcastic);
        assert_eq!(sarc.precision, 0.0);
        assert_eq!(sarc.recall, 0.0);
        assert_eq!(sarc.f1, 0.0);
        assert_eq!(report.accuracy, 1.0);

        let empty = ClassificationReport::from_labels(&[], &[]);
        assert_eq!(empty.accuracy, 0.0);
        assert_eq!(empty.weighted_avg.f1, 0.0);
    }

    #[test]
    fn test_report_display() {
        let report = ClassificationReport::from_labels(&[0, 1, 1], &[0, 1, 0]);
        let text = report.to_string();
        assert!(text.contains("precision"));
        assert!(text.contains("not sarcastic"));
        assert!(text.contains("weighted avg"));
        assert!(text.lines().any(|l| l.trim_start().starts_with("accuracy")));
    }
}
