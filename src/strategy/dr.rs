//! Dimensionality reduction
//!
//! Chooses the feature columns a split is searched on. Searching on a random column subset
//! decorrelates the trees of a forest.
use ndarray::{Array1, ArrayBase, Data, Ix1};
use rand::{seq::index::sample, Rng};

#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

use crate::dataset::{Float, Label, SortedDataSpec};
use crate::error::{Error, Result};

/// Feature subsampling policy applied before each split search
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DimensionReduction {
    /// Every feature takes part in every split
    #[default]
    All,
    /// Each split draws `n_vars` distinct features uniformly at random
    Uniform { n_vars: usize },
}

impl DimensionReduction {
    /// Draws the columns of a `width` wide dataset to split on
    ///
    /// Fails with `Parameters` if more columns are requested than available.
    pub fn select(&self, width: usize, rng: &mut impl Rng) -> Result<DrSelection> {
        match *self {
            DimensionReduction::All => Ok(DrSelection {
                selected: (0..width).collect(),
                original_width: width,
            }),
            DimensionReduction::Uniform { n_vars } => {
                if n_vars > width {
                    return Err(Error::Parameters(format!(
                        "cannot select {} variables out of {}",
                        n_vars, width
                    )));
                }
                let mut selected = sample(rng, width, n_vars).into_vec();
                selected.sort_unstable();

                Ok(DrSelection {
                    selected,
                    original_width: width,
                })
            }
        }
    }

    /// Number of columns a selection on `width` columns keeps
    pub fn n_vars(&self, width: usize) -> usize {
        match *self {
            DimensionReduction::All => width,
            DimensionReduction::Uniform { n_vars } => n_vars,
        }
    }
}

/// Columns chosen for one split search
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DrSelection {
    selected: Vec<usize>,
    original_width: usize,
}

impl DrSelection {
    /// Selected columns, ascending
    pub fn selected(&self) -> &[usize] {
        &self.selected
    }

    pub fn original_width(&self) -> usize {
        self.original_width
    }

    pub fn is_all(&self) -> bool {
        self.selected.len() == self.original_width
    }

    /// Restricts `data` to the selected columns
    pub fn reduce<F: Float, L: Label>(&self, data: &SortedDataSpec<F, L>) -> SortedDataSpec<F, L> {
        if self.is_all() {
            data.clone()
        } else {
            data.select_columns(&self.selected)
        }
    }

    /// Scatters a vector over the selected columns back to the full width, zero elsewhere
    pub fn expand<F: Float>(
        &self,
        reduced: &ArrayBase<impl Data<Elem = F>, Ix1>,
    ) -> Result<Array1<F>> {
        if reduced.len() != self.selected.len() {
            return Err(Error::ShapeMismatch {
                context: "reduced projector",
                expected: self.selected.len(),
                found: reduced.len(),
            });
        }

        let mut full = Array1::zeros(self.original_width);
        for (value, column) in reduced.iter().zip(&self.selected) {
            full[*column] = *value;
        }
        Ok(full)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256Plus;

    #[test]
    fn all_selects_every_column() {
        let mut rng = Xoshiro256Plus::seed_from_u64(0);
        let selection = DimensionReduction::All.select(4, &mut rng).unwrap();

        assert_eq!(selection.selected(), &[0, 1, 2, 3]);
        assert!(selection.is_all());
    }

    #[test]
    fn uniform_draws_distinct_sorted_columns() {
        let mut rng = Xoshiro256Plus::seed_from_u64(7);
        let strategy = DimensionReduction::Uniform { n_vars: 3 };

        for _ in 0..50 {
            let selection = strategy.select(10, &mut rng).unwrap();
            let selected = selection.selected();
            assert_eq!(selected.len(), 3);
            assert!(selected.windows(2).all(|w| w[0] < w[1]));
            assert!(selected.iter().all(|c| *c < 10));
        }
    }

    #[test]
    fn uniform_rejects_too_many_variables() {
        let mut rng = Xoshiro256Plus::seed_from_u64(0);
        let res = DimensionReduction::Uniform { n_vars: 5 }.select(4, &mut rng);
        assert!(matches!(res, Err(Error::Parameters(_))));
    }

    #[test]
    fn expand_scatters_back_to_full_width() {
        let selection = DrSelection {
            selected: vec![1, 3],
            original_width: 5,
        };
        let full = selection.expand(&array![0.6, -0.8]).unwrap();
        assert_eq!(full, array![0., 0.6, 0., -0.8, 0.]);

        assert!(selection.expand(&array![1.0]).is_err());
    }
}
