use std::marker::PhantomData;

use crate::{
    dataset::Float,
    error::{Error, Result},
    strategy::DimensionReduction,
    ParamGuard,
};

#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

use super::Tree;

/// The set of hyperparameters that can be specified for fitting a
/// [projection pursuit tree](Tree).
///
/// ### Example
///
/// ```rust
/// use ppforest::prelude::*;
/// use ndarray::array;
///
/// let data = DataSpec::new(
///     array![[1.0], [1.2], [0.9], [3.0], [3.1], [2.8]],
///     array![0usize, 0, 0, 1, 1, 1],
/// ).unwrap();
///
/// // Initialize the default set of parameters and set the blending of the scatter matrix
/// let params = Tree::params().lambda(0.1);
/// let tree = params.fit(&data).unwrap();
///
/// assert_eq!(tree.n_conditions(), 1);
/// assert_eq!(tree.error_rate(&data).unwrap(), 0.0);
/// ```
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TreeValidParams<F, L> {
    lambda: F,
    dimension_reduction: DimensionReduction,
    seed: u64,
    label_marker: PhantomData<L>,
}

impl<F: Float, L> TreeValidParams<F, L> {
    /// Blending of the within-class scatter with its diagonal, see [`Glda`](crate::strategy::Glda)
    pub fn lambda(&self) -> F {
        self.lambda
    }

    pub fn dimension_reduction(&self) -> DimensionReduction {
        self.dimension_reduction
    }

    /// Seed of the feature selection of a standalone tree
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if !(self.lambda >= F::zero() && self.lambda <= F::one()) {
            return Err(Error::Parameters(format!(
                "lambda should lie in [0, 1], but was {}",
                self.lambda
            )));
        }
        if let DimensionReduction::Uniform { n_vars: 0 } = self.dimension_reduction {
            return Err(Error::Parameters(
                "the number of variables per split should be at least one".to_string(),
            ));
        }

        Ok(())
    }

    /// Checks the parameters which depend on the data width
    pub(crate) fn validate_width(&self, width: usize) -> Result<()> {
        match self.dimension_reduction {
            DimensionReduction::Uniform { n_vars } if n_vars > width => {
                Err(Error::Parameters(format!(
                    "cannot select {} variables per split from {} features",
                    n_vars, width
                )))
            }
            _ => Ok(()),
        }
    }
}

#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TreeParams<F, L>(pub(crate) TreeValidParams<F, L>);

impl<F: Float, L> TreeParams<F, L> {
    pub fn new() -> Self {
        Self(TreeValidParams {
            lambda: F::zero(),
            dimension_reduction: DimensionReduction::All,
            seed: 0,
            label_marker: PhantomData,
        })
    }

    /// Sets the blending parameter of the within-class scatter, in `[0, 1]`
    pub fn lambda(mut self, lambda: F) -> Self {
        self.0.lambda = lambda;
        self
    }

    /// Sets the feature subsampling of every split
    pub fn dimension_reduction(mut self, dimension_reduction: DimensionReduction) -> Self {
        self.0.dimension_reduction = dimension_reduction;
        self
    }

    /// Shorthand for a uniform selection of `n_vars` features per split
    pub fn n_vars(self, n_vars: usize) -> Self {
        self.dimension_reduction(DimensionReduction::Uniform { n_vars })
    }

    /// Sets the seed of the feature selection
    pub fn seed(mut self, seed: u64) -> Self {
        self.0.seed = seed;
        self
    }
}

impl<F: Float, L> Default for TreeParams<F, L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Float, L> Default for TreeValidParams<F, L> {
    fn default() -> Self {
        TreeParams::new().0
    }
}

impl<F: Float, L> Tree<F, L> {
    /// Defaults are provided if the optional parameters are not specified:
    /// * `lambda = 0.0`
    /// * `dimension_reduction = DimensionReduction::All`
    /// * `seed = 0`
    // Violates the convention that new should return a value of type `Self`
    #[allow(clippy::new_ret_no_self)]
    pub fn params() -> TreeParams<F, L> {
        TreeParams::new()
    }
}

impl<F: Float, L> ParamGuard for TreeParams<F, L> {
    type Checked = TreeValidParams<F, L>;
    type Error = Error;

    fn check_ref(&self) -> Result<&Self::Checked> {
        self.0.validate()?;
        Ok(&self.0)
    }

    fn check(self) -> Result<Self::Checked> {
        self.check_ref()?;
        Ok(self.0)
    }
}
