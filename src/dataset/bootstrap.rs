use std::ops::Deref;
use std::sync::Arc;

use rand::Rng;

use super::{Float, Label, SortedDataSpec};
use crate::error::{Error, Result};

/// A bootstrap draw over a shared class-sorted dataset
///
/// Stores only the drawn row indices and their out-of-bag complement, the rows themselves stay
/// in the shared [`SortedDataSpec`]. The distinct sample indices and the out-of-bag indices are
/// disjoint and together cover every row of the full data.
#[derive(Debug, Clone)]
pub struct BootstrapDataSpec<F, L> {
    data: Arc<SortedDataSpec<F, L>>,
    sample_indices: Vec<usize>,
    oob_indices: Vec<usize>,
}

impl<F: Float, L: Label> BootstrapDataSpec<F, L> {
    /// Wraps explicit sample indices, deriving the out-of-bag rows
    ///
    /// Fails with `ShapeMismatch` if an index is not a row of `data`.
    pub fn new(data: Arc<SortedDataSpec<F, L>>, sample_indices: Vec<usize>) -> Result<Self> {
        let nrows = data.nrows();
        let mut in_bag = vec![false; nrows];
        for &idx in &sample_indices {
            if idx >= nrows {
                return Err(Error::ShapeMismatch {
                    context: "bootstrap sample index",
                    expected: nrows,
                    found: idx,
                });
            }
            in_bag[idx] = true;
        }
        let oob_indices = (0..nrows).filter(|idx| !in_bag[*idx]).collect();

        Ok(BootstrapDataSpec {
            data,
            sample_indices,
            oob_indices,
        })
    }

    /// Stratified proportional bootstrap
    ///
    /// Each class block of `size` rows contributes `size` rows drawn with replacement from the
    /// block, so the sample has the class proportions of the full data and stays class-ordered.
    pub fn stratified(data: Arc<SortedDataSpec<F, L>>, rng: &mut impl Rng) -> Self {
        let mut sample_indices = Vec::with_capacity(data.nrows());
        for (_, range) in data.groups().iter() {
            for _ in 0..range.len() {
                sample_indices.push(rng.gen_range(range.clone()));
            }
        }

        let mut in_bag = vec![false; data.nrows()];
        sample_indices.iter().for_each(|idx| in_bag[*idx] = true);
        let oob_indices = (0..data.nrows()).filter(|idx| !in_bag[*idx]).collect();

        BootstrapDataSpec {
            data,
            sample_indices,
            oob_indices,
        }
    }

    pub fn sample_indices(&self) -> &[usize] {
        &self.sample_indices
    }

    pub fn oob_indices(&self) -> &[usize] {
        &self.oob_indices
    }

    /// The full data the draw indexes into
    pub fn full(&self) -> &Arc<SortedDataSpec<F, L>> {
        &self.data
    }

    /// Materializes the drawn rows
    pub fn get_sample(&self) -> Result<SortedDataSpec<F, L>> {
        SortedDataSpec::new(self.data.select(&self.sample_indices))
    }

    /// Materializes the out-of-bag rows, may be empty
    pub fn get_oob(&self) -> Result<SortedDataSpec<F, L>> {
        SortedDataSpec::new(self.data.select(&self.oob_indices))
    }
}

impl<F, L> Deref for BootstrapDataSpec<F, L> {
    type Target = SortedDataSpec<F, L>;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}
