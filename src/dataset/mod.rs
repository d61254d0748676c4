//! Datasets
//!
//! This module implements the partition layer used by tree induction: a plain labelled
//! [`DataSpec`], its class-contiguous refinement [`SortedDataSpec`] with the [`GroupSpec`]
//! index of class blocks, and [`BootstrapDataSpec`] which views a bootstrap draw of a shared
//! `SortedDataSpec` together with its out-of-bag complement.
use ndarray::{Array1, Array2, ArrayBase, ArrayView1, ArrayView2, Axis, Data, Ix2, NdFloat};

use num_traits::{FromPrimitive, NumCast, Signed};

use std::collections::BTreeSet;
use std::fmt;
use std::hash::Hash;
use std::iter::Sum;

use crate::error::{Error, Result};

mod bootstrap;
mod group;
mod sorted;
mod standardize;

pub use bootstrap::BootstrapDataSpec;
pub use group::GroupSpec;
pub use sorted::SortedDataSpec;
pub use standardize::Standardization;

/// Floating point numbers
///
/// This trait bound multiplexes to the most common assumption of floating point number and
/// implement them for 32bit and 64bit floating points. They are used in the feature matrix of a
/// dataset and in the projectors and thresholds of a tree.
pub trait Float: NdFloat + FromPrimitive + Default + Signed + Sum + approx::AbsDiffEq {
    fn cast<T: NumCast>(x: T) -> Self {
        NumCast::from(x).unwrap()
    }
}

impl Float for f32 {}

impl Float for f64 {}

/// Discrete labels
///
/// Labels are countable, totally ordered and hashable. The ordering decides the layout of
/// class blocks in a [`SortedDataSpec`] and every tie-break of the training algorithm.
pub trait Label: PartialEq + Eq + Hash + Ord + Clone + Default + fmt::Debug + Send + Sync {}

impl Label for bool {}
impl Label for usize {}
impl Label for u8 {}
impl Label for u16 {}
impl Label for u32 {}
impl Label for u64 {}
impl Label for i32 {}
impl Label for i64 {}
impl Label for String {}

/// Labelled observations
///
/// A feature matrix with one row per observation, the label of every row and the set of
/// classes the data is about. The class set defaults to the distinct labels but may be larger,
/// for example when an out-of-bag selection misses a class of the full training set.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSpec<F, L> {
    x: Array2<F>,
    y: Array1<L>,
    classes: BTreeSet<L>,
}

impl<F: Float, L: Label> DataSpec<F, L> {
    /// Create a new dataset from features and labels
    ///
    /// Fails with `ShapeMismatch` if the number of rows differs from the number of labels.
    pub fn new(x: Array2<F>, y: Array1<L>) -> Result<Self> {
        let classes = y.iter().cloned().collect();
        Self::with_classes(x, y, classes)
    }

    /// Create a new dataset with an explicit class set
    ///
    /// Every label in `y` must be part of `classes`.
    pub fn with_classes(x: Array2<F>, y: Array1<L>, classes: BTreeSet<L>) -> Result<Self> {
        if x.nrows() != y.len() {
            return Err(Error::ShapeMismatch {
                context: "labelled data",
                expected: x.nrows(),
                found: y.len(),
            });
        }
        if let Some(unknown) = y.iter().find(|label| !classes.contains(label)) {
            return Err(Error::Parameters(format!(
                "label {:?} is not part of the class set",
                unknown
            )));
        }

        Ok(DataSpec { x, y, classes })
    }

    /// Copy features and labels from any array representation
    pub fn from_arrays<D: Data<Elem = F>>(
        x: &ArrayBase<D, Ix2>,
        y: &ArrayBase<impl Data<Elem = L>, ndarray::Ix1>,
    ) -> Result<Self> {
        Self::new(x.to_owned(), y.to_owned())
    }

    pub fn x(&self) -> ArrayView2<F> {
        self.x.view()
    }

    pub fn y(&self) -> ArrayView1<L> {
        self.y.view()
    }

    pub fn classes(&self) -> &BTreeSet<L> {
        &self.classes
    }

    /// Number of observations
    pub fn nrows(&self) -> usize {
        self.x.nrows()
    }

    /// Number of features
    pub fn ncols(&self) -> usize {
        self.x.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.nrows() == 0
    }

    /// Gathers arbitrary rows, repetitions allowed
    ///
    /// The result is not necessarily class-contiguous. It keeps the class set of `self`.
    ///
    /// ### Panics
    ///
    /// If an index is out of bounds
    pub fn select(&self, indices: &[usize]) -> DataSpec<F, L> {
        DataSpec {
            x: self.x.select(Axis(0), indices),
            y: self.y.select(Axis(0), indices),
            classes: self.classes.clone(),
        }
    }

    /// Keeps only the given feature columns, in the given order
    ///
    /// ### Panics
    ///
    /// If a column index is out of bounds
    pub fn select_columns(&self, columns: &[usize]) -> DataSpec<F, L> {
        DataSpec {
            x: self.x.select(Axis(1), columns),
            y: self.y.clone(),
            classes: self.classes.clone(),
        }
    }

    /// Replaces the feature matrix, keeping labels and classes
    pub fn with_features(self, x: Array2<F>) -> Result<Self> {
        Self::with_classes(x, self.y, self.classes)
    }

    pub fn into_parts(self) -> (Array2<F>, Array1<L>, BTreeSet<L>) {
        (self.x, self.y, self.classes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn rejects_row_label_mismatch() {
        let res = DataSpec::new(array![[1.0f64], [2.0]], array![0usize]);
        assert!(matches!(
            res,
            Err(Error::ShapeMismatch {
                expected: 2,
                found: 1,
                ..
            })
        ));
    }

    #[test]
    fn classes_default_to_distinct_labels() {
        let data = DataSpec::new(array![[1.0f64], [2.0], [3.0]], array![2usize, 0, 2]).unwrap();
        assert_eq!(data.classes().iter().copied().collect::<Vec<_>>(), vec![0, 2]);
    }

    #[test]
    fn explicit_classes_must_cover_labels() {
        let classes = [0usize, 1].into_iter().collect();
        let res = DataSpec::with_classes(array![[1.0f64]], array![3usize], classes);
        assert!(matches!(res, Err(Error::Parameters(_))));
    }

    #[test]
    fn select_gathers_rows_and_keeps_classes() {
        let data = DataSpec::new(
            array![[0.0f64, 1.0], [2.0, 3.0], [4.0, 5.0]],
            array![0usize, 1, 2],
        )
        .unwrap();

        let rows = data.select(&[2, 2, 0]);
        assert_eq!(rows.x(), array![[4.0f64, 5.0], [4.0, 5.0], [0.0, 1.0]]);
        assert_eq!(rows.y(), array![2usize, 2, 0]);
        assert_eq!(rows.classes().len(), 3);

        let cols = data.select_columns(&[1]);
        assert_eq!(cols.x(), array![[1.0f64], [3.0], [5.0]]);
    }
}
