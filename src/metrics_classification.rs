//! Common metrics for performance evaluation of classifier
//!
//! Scoring is essential for classification tasks. This module implements the confusion matrix
//! and the scores derived from it: error rate, accuracy, precision, recall and f1-score.
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use ndarray::prelude::*;
use ndarray::Data;

use crate::dataset::{DataSpec, Float, Label};
use crate::error::{Error, Result};

/// Confusion matrix for multi-label evaluation
///
/// A confusion matrix shows predictions in a matrix, where rows correspond to the actual class
/// and columns to the predicted class. The diagonal entries are correct predictions. Classes are
/// indexed in ascending label order, over the union of predicted and actual labels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfusionMatrix<L> {
    values: Array2<usize>,
    label_index: BTreeMap<L, usize>,
}

impl<L: Label> ConfusionMatrix<L> {
    /// Tallies predictions against the actual labels
    ///
    /// Fails with `ShapeMismatch` if both have a different length.
    pub fn new(
        predictions: &ArrayBase<impl Data<Elem = L>, Ix1>,
        actual: &ArrayBase<impl Data<Elem = L>, Ix1>,
    ) -> Result<Self> {
        if predictions.len() != actual.len() {
            return Err(Error::ShapeMismatch {
                context: "predictions and actual labels",
                expected: actual.len(),
                found: predictions.len(),
            });
        }

        let labels = predictions
            .iter()
            .chain(actual.iter())
            .cloned()
            .collect::<BTreeSet<_>>();
        let label_index = labels
            .into_iter()
            .enumerate()
            .map(|(idx, label)| (label, idx))
            .collect::<BTreeMap<_, _>>();

        let mut values = Array2::zeros((label_index.len(), label_index.len()));
        for (predicted, actual) in predictions.iter().zip(actual.iter()) {
            values[(label_index[actual], label_index[predicted])] += 1;
        }

        Ok(ConfusionMatrix {
            values,
            label_index,
        })
    }

    /// Counts, rows are actual and columns predicted classes
    pub fn values(&self) -> &Array2<usize> {
        &self.values
    }

    /// Maps every label to its row and column
    pub fn label_index(&self) -> &BTreeMap<L, usize> {
        &self.label_index
    }

    /// Labels in index order
    pub fn labels(&self) -> Vec<&L> {
        self.label_index.keys().collect()
    }

    /// Number of tallied observations
    pub fn total(&self) -> usize {
        self.values.sum()
    }

    /// Fraction of misclassified observations, zero if there are none
    pub fn error(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => 1.0 - self.values.diag().sum() as f64 / total as f64,
        }
    }

    /// Fraction of correctly classified observations, one if there are none
    pub fn accuracy(&self) -> f64 {
        1.0 - self.error()
    }

    /// Calculate precision for every class
    pub fn precision(&self) -> Array1<f64> {
        let predicted = self.values.sum_axis(Axis(0));
        ratio(&self.values.diag(), &predicted)
    }

    /// Calculate recall for every class
    pub fn recall(&self) -> Array1<f64> {
        let actual = self.values.sum_axis(Axis(1));
        ratio(&self.values.diag(), &actual)
    }

    /// Return beta=1 score for every class
    pub fn f1_score(&self) -> Array1<f64> {
        let precision = self.precision();
        let recall = self.recall();

        Array1::from_iter(precision.iter().zip(recall.iter()).map(|(p, r)| {
            if p + r > 0.0 {
                2.0 * p * r / (p + r)
            } else {
                0.0
            }
        }))
    }
}

fn ratio(
    numerator: &ArrayBase<impl Data<Elem = usize>, Ix1>,
    denominator: &ArrayBase<impl Data<Elem = usize>, Ix1>,
) -> Array1<f64> {
    Array1::from_iter(numerator.iter().zip(denominator.iter()).map(|(n, d)| {
        if *d == 0 {
            0.0
        } else {
            *n as f64 / *d as f64
        }
    }))
}

impl<L: Label> fmt::Display for ConfusionMatrix<L> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let labels = self
            .label_index
            .keys()
            .map(|label| format!("{:?}", label))
            .collect::<Vec<_>>();
        let width = labels
            .iter()
            .map(|label| label.len())
            .chain(self.values.iter().map(|count| count.to_string().len()))
            .max()
            .unwrap_or(1);

        write!(f, "{:>width$} |", "", width = width)?;
        for label in &labels {
            write!(f, " {:>width$}", label, width = width)?;
        }
        writeln!(f)?;
        writeln!(f, "{}", "-".repeat((width + 1) * (labels.len() + 1) + 1))?;

        for (label, row) in labels.iter().zip(self.values.rows()) {
            write!(f, "{:>width$} |", label, width = width)?;
            for count in row {
                write!(f, " {:>width$}", count, width = width)?;
            }
            writeln!(f)?;
        }

        Ok(())
    }
}

/// Classification functions
///
/// Builds the confusion matrix of a prediction against a ground truth.
pub trait ToConfusionMatrix<L, T> {
    fn confusion_matrix(&self, ground_truth: T) -> Result<ConfusionMatrix<L>>;
}

impl<'a, L: Label, S: Data<Elem = L>, T: Data<Elem = L>> ToConfusionMatrix<L, &'a ArrayBase<T, Ix1>>
    for ArrayBase<S, Ix1>
{
    fn confusion_matrix(&self, ground_truth: &'a ArrayBase<T, Ix1>) -> Result<ConfusionMatrix<L>> {
        ConfusionMatrix::new(self, ground_truth)
    }
}

impl<'a, F: Float, L: Label, S: Data<Elem = L>> ToConfusionMatrix<L, &'a DataSpec<F, L>>
    for ArrayBase<S, Ix1>
{
    fn confusion_matrix(&self, ground_truth: &'a DataSpec<F, L>) -> Result<ConfusionMatrix<L>> {
        ConfusionMatrix::new(self, &ground_truth.y())
    }
}
