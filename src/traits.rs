//! Provide traits for different classes of algorithms
//!

use ndarray::{Array1, ArrayBase, Data, Ix2};

use crate::dataset::{DataSpec, Float, Label};
use crate::error::Result;

/// Fittable algorithms
///
/// A fittable algorithm takes a dataset and creates a concept of some kind about it. For example
/// in tree induction the training data is used to grow a tree of separating projections. The
/// `Fit` trait is implemented on the checked hyperparameters of an algorithm and returns the
/// trained model.
pub trait Fit<D> {
    type Object;

    fn fit(&self, dataset: &D) -> Result<Self::Object>;
}

/// Predict with model into a mutable reference of targets.
pub trait PredictInplace<R, T> {
    /// Predict something in place
    fn predict_inplace<'a>(&'a self, x: &'a R, y: &mut T);

    /// Create targets that `predict_inplace` works with.
    fn default_target(&self, x: &R) -> T;
}

/// Predict with model
///
/// This trait assumes the `PredictInplace` implementation and provides additional input/output
/// combinations.
///
/// # Provided implementation
///
/// * Array2 -> Array1 with default targets
/// * DataSpec -> Array1 on the features of the dataset
pub trait Predict<R, T> {
    fn predict(&self, x: R) -> T;
}

impl<'a, L, D: Data, O> Predict<&'a ArrayBase<D, Ix2>, Array1<L>> for O
where
    O: PredictInplace<ArrayBase<D, Ix2>, Array1<L>>,
{
    fn predict(&self, records: &'a ArrayBase<D, Ix2>) -> Array1<L> {
        let mut targets = self.default_target(records);
        self.predict_inplace(records, &mut targets);
        targets
    }
}

impl<'a, F: Float, L: Label, O> Predict<&'a DataSpec<F, L>, Array1<L>> for O
where
    O: for<'b> PredictInplace<ndarray::ArrayView2<'b, F>, Array1<L>>,
{
    fn predict(&self, dataset: &'a DataSpec<F, L>) -> Array1<L> {
        let records = dataset.x();
        let mut targets = self.default_target(&records);
        self.predict_inplace(&records, &mut targets);
        targets
    }
}
