use crate::{
    dataset::Float,
    error::{Error, Result},
    strategy::DimensionReduction,
    tree::{TreeParams, TreeValidParams},
    ParamGuard,
};

#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

use super::Forest;

/// The set of hyperparameters that can be specified for fitting a
/// [projection pursuit forest](Forest).
///
/// ### Example
///
/// ```rust
/// use ppforest::prelude::*;
/// use ndarray::array;
///
/// let data = DataSpec::new(
///     array![[0., 1.], [0.5, 0.], [1., 1.], [6., 5.], [6.5, 6.], [7., 5.]],
///     array![0usize, 0, 0, 1, 1, 1],
/// ).unwrap();
///
/// // A forest of 10 trees, each split searches on one random feature
/// let forest = Forest::params(10).n_vars(1).seed(42).fit(&data).unwrap();
///
/// assert_eq!(forest.trees().len(), 10);
/// assert_eq!(forest.predict(&array![[6.2, 5.5]]), array![1]);
/// ```
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ForestValidParams<F, L> {
    size: usize,
    seed: u64,
    n_threads: Option<usize>,
    max_retries: usize,
    tree: TreeValidParams<F, L>,
}

impl<F: Float, L> ForestValidParams<F, L> {
    /// Number of trees
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Size of the dedicated thread pool, `None` runs on the global rayon pool
    pub fn n_threads(&self) -> Option<usize> {
        self.n_threads
    }

    /// Number of times a tree redraws its bootstrap sample after a degenerate split
    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    /// Hyperparameters of every tree
    pub fn tree(&self) -> &TreeValidParams<F, L> {
        &self.tree
    }
}

#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ForestParams<F, L>(ForestValidParams<F, L>);

impl<F: Float, L> ForestParams<F, L> {
    pub fn new(size: usize) -> Self {
        Self(ForestValidParams {
            size,
            seed: 0,
            n_threads: None,
            max_retries: 3,
            tree: TreeValidParams::default(),
        })
    }

    /// Sets the number of trees
    pub fn size(mut self, size: usize) -> Self {
        self.0.size = size;
        self
    }

    /// Sets the seed from which the bootstrap samples and feature selections of all trees derive
    pub fn seed(mut self, seed: u64) -> Self {
        self.0.seed = seed;
        self
    }

    /// Trains on a dedicated pool of `n_threads` threads
    pub fn n_threads(mut self, n_threads: usize) -> Self {
        self.0.n_threads = Some(n_threads);
        self
    }

    /// Sets how often a tree may redraw its bootstrap sample after a degenerate split
    pub fn max_retries(mut self, max_retries: usize) -> Self {
        self.0.max_retries = max_retries;
        self
    }

    /// Sets the hyperparameters of every tree
    ///
    /// The seed of `tree` is ignored, trees draw their randomness from the forest seed.
    pub fn tree(mut self, tree: TreeParams<F, L>) -> Self {
        self.0.tree = tree.0;
        self
    }

    /// Sets the blending parameter of the within-class scatter of every tree
    pub fn lambda(mut self, lambda: F) -> Self {
        self.0.tree = TreeParams(self.0.tree).lambda(lambda).0;
        self
    }

    /// Sets the feature subsampling of every split
    pub fn dimension_reduction(mut self, dimension_reduction: DimensionReduction) -> Self {
        self.0.tree = TreeParams(self.0.tree)
            .dimension_reduction(dimension_reduction)
            .0;
        self
    }

    /// Shorthand for a uniform selection of `n_vars` features per split
    pub fn n_vars(self, n_vars: usize) -> Self {
        self.dimension_reduction(DimensionReduction::Uniform { n_vars })
    }
}

impl<F: Float, L> Forest<F, L> {
    /// Defaults are provided if the optional parameters are not specified:
    /// * `seed = 0`
    /// * `n_threads = None`
    /// * `max_retries = 3`
    /// * tree defaults of [`Tree::params`](crate::Tree::params)
    // Violates the convention that new should return a value of type `Self`
    #[allow(clippy::new_ret_no_self)]
    pub fn params(size: usize) -> ForestParams<F, L> {
        ForestParams::new(size)
    }
}

impl<F: Float, L> ParamGuard for ForestParams<F, L> {
    type Checked = ForestValidParams<F, L>;
    type Error = Error;

    fn check_ref(&self) -> Result<&Self::Checked> {
        if self.0.size == 0 {
            return Err(Error::Parameters(
                "a forest needs at least one tree".to_string(),
            ));
        }
        if self.0.n_threads == Some(0) {
            return Err(Error::Parameters(
                "the thread pool needs at least one thread".to_string(),
            ));
        }
        self.0.tree.validate()?;

        Ok(&self.0)
    }

    fn check(self) -> Result<Self::Checked> {
        self.check_ref()?;
        Ok(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let params = ForestParams::<f64, usize>::new(5).check().unwrap();
        assert_eq!(params.size(), 5);
        assert_eq!(params.seed(), 0);
        assert_eq!(params.n_threads(), None);
        assert_eq!(params.max_retries(), 3);
        assert_eq!(params.tree(), &TreeValidParams::default());
    }

    #[test]
    fn tree_settings_are_forwarded() {
        let params = ForestParams::<f64, usize>::new(5)
            .lambda(0.3)
            .n_vars(2)
            .check()
            .unwrap();
        assert_eq!(params.tree().lambda(), 0.3);
        assert_eq!(
            params.tree().dimension_reduction(),
            DimensionReduction::Uniform { n_vars: 2 }
        );
    }

    #[test]
    fn invalid_settings() {
        assert!(ForestParams::<f64, usize>::new(0).check().is_err());
        assert!(ForestParams::<f64, usize>::new(3).n_threads(0).check().is_err());
        assert!(ForestParams::<f64, usize>::new(3).lambda(2.0).check().is_err());
        assert!(ForestParams::<f64, usize>::new(3).n_vars(0).check().is_err());
        assert!(ForestParams::<f64, usize>::new(3).n_threads(2).check().is_ok());
    }
}
