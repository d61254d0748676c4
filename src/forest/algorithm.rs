//! Projection pursuit forests
//!
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Deref;
use std::sync::Arc;

use ndarray::{Array1, Array2, ArrayBase, ArrayView2, Data, Ix2};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;
use rayon::prelude::*;
use tracing::{debug, info, instrument, warn};

use super::ForestValidParams;
use crate::{
    dataset::{BootstrapDataSpec, DataSpec, Float, Label, SortedDataSpec},
    error::{Error, Result},
    metrics_classification::{ConfusionMatrix, ToConfusionMatrix},
    traits::{Fit, Predict, PredictInplace},
    tree::{grow, Tree, TreeParams},
};

/// SplitMix64 finalizer
pub(crate) fn mix(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce5_e4b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Seed of the `attempt`-th training attempt of the tree at `tree_index`
///
/// Depends only on its arguments, never on the thread a tree is trained on.
pub fn derive_seed(seed: u64, tree_index: usize, attempt: usize) -> u64 {
    mix(mix(seed ^ mix(tree_index as u64)) ^ attempt as u64)
}

/// A tree of a forest together with the bootstrap draw it was trained on
#[derive(Debug, Clone)]
pub struct BootstrapTree<F, L> {
    tree: Tree<F, L>,
    bootstrap: Option<BootstrapDataSpec<F, L>>,
}

impl<F: Float, L: Label> BootstrapTree<F, L> {
    pub(crate) fn new(tree: Tree<F, L>, bootstrap: Option<BootstrapDataSpec<F, L>>) -> Self {
        BootstrapTree { tree, bootstrap }
    }

    pub fn tree(&self) -> &Tree<F, L> {
        &self.tree
    }

    /// The bootstrap draw, `None` for restored models
    pub fn bootstrap(&self) -> Option<&BootstrapDataSpec<F, L>> {
        self.bootstrap.as_ref()
    }

    /// Seed of the successful training attempt
    pub fn seed(&self) -> u64 {
        self.tree.hyperparams().seed()
    }

    fn require_bootstrap(&self) -> Result<&BootstrapDataSpec<F, L>> {
        self.bootstrap.as_ref().ok_or_else(|| {
            Error::MissingTrainingData("the tree carries no bootstrap sample".to_string())
        })
    }

    /// The rows the tree was trained on
    pub fn sample(&self) -> Result<SortedDataSpec<F, L>> {
        self.require_bootstrap()?.get_sample()
    }

    /// The rows of the full data which were not drawn for this tree
    pub fn oob_data(&self) -> Result<SortedDataSpec<F, L>> {
        self.require_bootstrap()?.get_oob()
    }

    /// Confusion matrix of the predictions on the out-of-bag rows
    pub fn oob_confusion_matrix(&self) -> Result<ConfusionMatrix<L>> {
        let oob = self.oob_data()?;
        self.tree.predict(&oob.x()).confusion_matrix(&oob.y())
    }

    /// Fraction of misclassified out-of-bag rows, zero if every row was drawn
    pub fn oob_error_rate(&self) -> Result<f64> {
        Ok(self.oob_confusion_matrix()?.error())
    }
}

impl<F, L> Deref for BootstrapTree<F, L> {
    type Target = Tree<F, L>;

    fn deref(&self) -> &Self::Target {
        &self.tree
    }
}

impl<F: Float, L: Label, D: Data<Elem = F>> PredictInplace<ArrayBase<D, Ix2>, Array1<L>>
    for BootstrapTree<F, L>
{
    fn predict_inplace(&self, x: &ArrayBase<D, Ix2>, y: &mut Array1<L>) {
        self.tree.predict_inplace(x, y)
    }

    fn default_target(&self, x: &ArrayBase<D, Ix2>) -> Array1<L> {
        self.tree.default_target(x)
    }
}

/// Trains the tree at `index`, redrawing the bootstrap sample after degenerate splits
fn train_tree<F: Float, L: Label>(
    params: &ForestValidParams<F, L>,
    data: &Arc<SortedDataSpec<F, L>>,
    index: usize,
) -> Result<BootstrapTree<F, L>> {
    let mut attempt = 0;
    loop {
        let seed = derive_seed(params.seed(), index, attempt);
        let mut rng = Xoshiro256Plus::seed_from_u64(seed);
        let bootstrap = BootstrapDataSpec::stratified(Arc::clone(data), &mut rng);
        let sample = bootstrap.get_sample()?;

        match grow(params.tree(), &sample, &mut rng) {
            Ok(root) => {
                let tree_params = TreeParams(params.tree().clone()).seed(seed).0;
                let tree = Tree::from_parts(root, tree_params, sample.ncols(), None);
                debug!(
                    tree = index,
                    attempt,
                    conditions = tree.n_conditions(),
                    oob = bootstrap.oob_indices().len(),
                    "trained tree"
                );
                return Ok(BootstrapTree::new(tree, Some(bootstrap)));
            }
            Err(err) if err.is_degenerate() => {
                if attempt >= params.max_retries() {
                    return Err(Error::RetriesExhausted {
                        retries: attempt,
                        source: Box::new(err),
                    });
                }
                warn!(tree = index, attempt, reason = %err, "degenerate split, redrawing bootstrap sample");
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Plurality vote, ties go to the smallest label
fn plurality<L: Label>(votes: &BTreeMap<L, usize>) -> Option<L> {
    let mut winner: Option<(&L, usize)> = None;
    for (label, &count) in votes {
        match winner {
            Some((_, best)) if count <= best => {}
            _ => winner = Some((label, count)),
        }
    }
    winner.map(|(label, _)| label.clone())
}

/// A fitted projection pursuit forest
///
/// An ensemble of [projection pursuit trees](Tree), each grown on a stratified bootstrap sample
/// of the training data with a random subset of the features considered at every split.
/// Predictions are the plurality vote of the trees.
///
/// ### Training
///
/// Trees are trained in parallel on the rayon thread pool, or on a dedicated pool of
/// `n_threads` threads. The randomness of every tree derives from the forest seed and the tree
/// index, so the same seed grows the same forest for any number of threads.
///
/// ```rust
/// use ppforest::prelude::*;
/// use ndarray::array;
///
/// let data = DataSpec::new(
///     array![[0., 0.], [0.4, 1.], [1., 0.2], [5., 5.], [5.5, 6.], [6., 5.2], [0., 9.], [1., 9.5], [0.3, 10.]],
///     array![0usize, 0, 0, 1, 1, 1, 2, 2, 2],
/// ).unwrap();
///
/// let forest = Forest::params(20).seed(3).fit(&data).unwrap();
/// let other = Forest::params(20).seed(3).n_threads(2).fit(&data).unwrap();
///
/// assert_eq!(forest, other);
/// assert_eq!(forest.predict(&array![[5.2, 5.4]]), array![1usize]);
/// ```
#[derive(Debug, Clone)]
pub struct Forest<F, L> {
    trees: Vec<BootstrapTree<F, L>>,
    params: ForestValidParams<F, L>,
    data: Option<Arc<SortedDataSpec<F, L>>>,
    classes: BTreeSet<L>,
}

impl<F: Float, L: Label> Forest<F, L> {
    pub(crate) fn from_parts(
        trees: Vec<BootstrapTree<F, L>>,
        params: ForestValidParams<F, L>,
        data: Option<Arc<SortedDataSpec<F, L>>>,
    ) -> Self {
        let classes = match &data {
            Some(data) => data.classes().clone(),
            None => trees.iter().flat_map(|tree| tree.classes()).collect(),
        };

        Forest {
            trees,
            params,
            data,
            classes,
        }
    }

    pub fn trees(&self) -> &[BootstrapTree<F, L>] {
        &self.trees
    }

    /// Number of trees
    pub fn size(&self) -> usize {
        self.trees.len()
    }

    /// Classes of the training data, in the column order of [`Forest::vote_proportions`]
    pub fn classes(&self) -> &BTreeSet<L> {
        &self.classes
    }

    /// The checked hyperparameters the forest was trained with
    pub fn hyperparams(&self) -> &ForestValidParams<F, L> {
        &self.params
    }

    /// The shared class-sorted training data, `None` for restored models
    pub fn training_data(&self) -> Option<&Arc<SortedDataSpec<F, L>>> {
        self.data.as_ref()
    }

    /// Width of the observations the forest predicts
    pub fn n_features(&self) -> usize {
        self.trees
            .first()
            .map(|tree| tree.n_features())
            .unwrap_or_default()
    }

    /// Predictions of every tree, one row per tree
    fn tree_votes(&self, x: ArrayView2<F>) -> Vec<Array1<L>> {
        self.trees
            .par_iter()
            .map(|tree| tree.predict(&x))
            .collect()
    }

    /// Fraction of trees voting for every class
    ///
    /// Returns one row per observation and one column per class of [`Forest::classes`].
    pub fn vote_proportions(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array2<F> {
        let columns = self
            .classes
            .iter()
            .enumerate()
            .map(|(idx, label)| (label, idx))
            .collect::<BTreeMap<_, _>>();

        let mut counts = Array2::<F>::zeros((x.nrows(), columns.len()));
        for votes in self.tree_votes(x.view()) {
            for (row, label) in votes.iter().enumerate() {
                if let Some(&col) = columns.get(label) {
                    counts[(row, col)] += F::one();
                }
            }
        }

        if !self.trees.is_empty() {
            counts.mapv_inplace(|count| count / F::cast(self.trees.len()));
        }
        counts
    }

    /// Confusion matrix of the predictions on `data`
    pub fn confusion_matrix(&self, data: &DataSpec<F, L>) -> Result<ConfusionMatrix<L>> {
        if let Some(tree) = self.trees.first() {
            tree.check_width(data.ncols())?;
        }
        self.predict(data).confusion_matrix(data)
    }

    /// Fraction of misclassified observations of `data`
    pub fn error_rate(&self, data: &DataSpec<F, L>) -> Result<f64> {
        Ok(self.confusion_matrix(data)?.error())
    }

    /// Out-of-bag confusion matrix
    ///
    /// Every training row is classified by the plurality of the trees which did not draw it.
    /// Rows drawn by every tree are left out.
    pub fn oob_confusion_matrix(&self) -> Result<ConfusionMatrix<L>> {
        let data = self.data.as_ref().ok_or_else(|| {
            Error::MissingTrainingData("the forest carries no training data".to_string())
        })?;

        let per_tree = self
            .trees
            .par_iter()
            .map(|tree| -> Result<Vec<(usize, L)>> {
                let bootstrap = tree.require_bootstrap()?;
                let oob = bootstrap.oob_indices();
                let predictions = tree.predict(&data.x().select(ndarray::Axis(0), oob));
                Ok(oob.iter().copied().zip(predictions).collect::<Vec<_>>())
            })
            .collect::<Result<Vec<_>>>()?;

        let mut votes: BTreeMap<usize, BTreeMap<L, usize>> = BTreeMap::new();
        for (row, label) in per_tree.into_iter().flatten() {
            *votes.entry(row).or_default().entry(label).or_default() += 1;
        }

        let labels = data.y();
        let (predicted, actual): (Vec<L>, Vec<L>) = votes
            .iter()
            .filter_map(|(row, votes)| Some((plurality(votes)?, labels[*row].clone())))
            .unzip();

        Array1::from(predicted).confusion_matrix(&Array1::from(actual))
    }

    /// Out-of-bag error rate of the forest
    pub fn oob_error_rate(&self) -> Result<f64> {
        Ok(self.oob_confusion_matrix()?.error())
    }
}

impl<F: Float, L: Label> PartialEq for Forest<F, L> {
    fn eq(&self, other: &Self) -> bool {
        self.trees.len() == other.trees.len()
            && self
                .trees
                .iter()
                .zip(other.trees.iter())
                .all(|(a, b)| a.tree == b.tree)
    }
}

impl<F: Float, L: Label, D: Data<Elem = F>> PredictInplace<ArrayBase<D, Ix2>, Array1<L>>
    for Forest<F, L>
{
    /// Plurality vote of the trees for each row of `x`
    fn predict_inplace(&self, x: &ArrayBase<D, Ix2>, y: &mut Array1<L>) {
        assert_eq!(
            x.nrows(),
            y.len(),
            "The number of data points must match the number of output targets."
        );

        let mut votes = vec![BTreeMap::<L, usize>::new(); x.nrows()];
        for tree_votes in self.tree_votes(x.view()) {
            for (row, label) in tree_votes.into_iter().enumerate() {
                *votes[row].entry(label).or_default() += 1;
            }
        }

        for (target, votes) in y.iter_mut().zip(votes.iter()) {
            if let Some(label) = plurality(votes) {
                *target = label;
            }
        }
    }

    fn default_target(&self, x: &ArrayBase<D, Ix2>) -> Array1<L> {
        Array1::default(x.nrows())
    }
}

impl<F: Float, L: Label> Fit<DataSpec<F, L>> for ForestValidParams<F, L> {
    type Object = Forest<F, L>;

    /// Fit a projection pursuit forest on a labelled dataset
    #[instrument(skip_all, fields(size = self.size(), n_samples = dataset.nrows(), n_features = dataset.ncols()))]
    fn fit(&self, dataset: &DataSpec<F, L>) -> Result<Self::Object> {
        if dataset.is_empty() {
            return Err(Error::Parameters(
                "cannot train a forest on data without rows".to_string(),
            ));
        }
        self.tree().validate_width(dataset.ncols())?;

        let data = Arc::new(SortedDataSpec::new(dataset.clone())?);
        info!(
            classes = data.groups().len(),
            threads = ?self.n_threads(),
            "training forest"
        );

        let train = || {
            (0..self.size())
                .into_par_iter()
                .map(|index| train_tree(self, &data, index))
                .collect::<Result<Vec<_>>>()
        };
        let trees = match self.n_threads() {
            Some(n_threads) => rayon::ThreadPoolBuilder::new()
                .num_threads(n_threads)
                .build()
                .map_err(|err| Error::ThreadPool(err.to_string()))?
                .install(train)?,
            None => train()?,
        };

        info!(trees = trees.len(), "trained forest");
        Ok(Forest::from_parts(trees, self.clone(), Some(data)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ParamGuard;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    /// Ten jittered points around each of three distant centers
    fn three_blobs() -> DataSpec<f64, usize> {
        let centers = [(0.0, 0.0), (6.0, 6.0), (0.0, 10.0)];
        let x = Array2::from_shape_fn((30, 2), |(row, col)| {
            let (cx, cy) = centers[row / 10];
            let k = (row % 10) as f64;
            if col == 0 {
                cx + 0.5 * (k * 0.37).sin()
            } else {
                cy + 0.5 * (k * 0.71 + 0.3).cos()
            }
        });
        let y = (0..30).map(|row| row / 10).collect::<Array1<usize>>();
        DataSpec::new(x, y).unwrap()
    }

    #[test]
    fn derived_seeds_differ() {
        let seeds = (0..4)
            .flat_map(|tree| (0..4).map(move |attempt| derive_seed(7, tree, attempt)))
            .collect::<BTreeSet<_>>();
        assert_eq!(seeds.len(), 16);
        assert_eq!(derive_seed(7, 2, 1), derive_seed(7, 2, 1));
        assert_ne!(derive_seed(7, 2, 1), derive_seed(8, 2, 1));
    }

    #[test]
    fn plurality_prefers_smallest_label_on_ties() {
        let votes = [(3usize, 2usize), (1, 2), (2, 1)].into_iter().collect();
        assert_eq!(plurality(&votes), Some(1));

        let votes = [(3usize, 3usize), (1, 2)].into_iter().collect();
        assert_eq!(plurality(&votes), Some(3));

        assert_eq!(plurality(&BTreeMap::<usize, usize>::new()), None);
    }

    #[test]
    fn forest_has_requested_size() {
        let data = three_blobs();
        let forest = Forest::params(7).seed(1).fit(&data).unwrap();

        assert_eq!(forest.size(), 7);
        assert_eq!(forest.hyperparams().size(), 7);
        assert_eq!(forest.hyperparams().seed(), 1);
        assert_eq!(forest.n_features(), 2);
        assert_eq!(forest.classes().len(), 3);
        for tree in forest.trees() {
            assert_eq!(tree.n_conditions(), 2);
            assert!(tree.training_data().is_none());
            let bootstrap = tree.bootstrap().unwrap();
            assert_eq!(bootstrap.sample_indices().len(), data.nrows());
        }
    }

    #[test]
    fn same_seed_same_forest() {
        let data = three_blobs();
        let params = Forest::params(8).n_vars(1).seed(11);
        let single = params.clone().n_threads(1).fit(&data).unwrap();
        let many = params.clone().n_threads(4).fit(&data).unwrap();
        let global = params.fit(&data).unwrap();

        assert_eq!(single, many);
        assert_eq!(single, global);
        for (a, b) in single.trees().iter().zip(many.trees()) {
            assert_eq!(a.seed(), b.seed());
            assert_eq!(
                a.bootstrap().unwrap().sample_indices(),
                b.bootstrap().unwrap().sample_indices()
            );
        }
    }

    #[test]
    fn vote_proportions_sum_to_one() {
        let data = three_blobs();
        let forest = Forest::params(5).seed(2).fit(&data).unwrap();
        let proportions = forest.vote_proportions(&data.x());

        assert_eq!(proportions.dim(), (30, 3));
        for row in proportions.rows() {
            assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-12);
        }
        assert!(forest.error_rate(&data).unwrap() < 0.1);
    }

    #[test]
    fn oob_error_on_separable_data() {
        let data = three_blobs();
        let forest = Forest::params(10).seed(4).fit(&data).unwrap();

        let cm = forest.oob_confusion_matrix().unwrap();
        assert!(cm.total() <= data.nrows());
        assert!(forest.oob_error_rate().unwrap() < 0.1);
        for tree in forest.trees() {
            let error = tree.oob_error_rate().unwrap();
            assert!((0.0..=1.0).contains(&error));
        }
    }

    #[test]
    fn constant_data_exhausts_retries() {
        let data = DataSpec::new(
            array![[1.0, 1.0], [1.0, 1.0], [1.0, 1.0], [1.0, 1.0]],
            array![0usize, 0, 1, 1],
        )
        .unwrap();

        match Forest::params(2).max_retries(2).fit(&data) {
            Err(Error::RetriesExhausted { retries, source }) => {
                assert_eq!(retries, 2);
                assert!(source.is_degenerate());
            }
            other => panic!("expected exhausted retries, got {:?}", other),
        }
    }

    #[test]
    fn degenerate_draws_are_redrawn() {
        // class 1 only varies through its last row, so draws missing it are constant
        let data = DataSpec::new(
            array![[0.0], [0.0], [0.0], [0.0], [0.0], [0.0], [0.0], [5.0]],
            array![0usize, 0, 0, 0, 1, 1, 1, 1],
        )
        .unwrap();
        let params = Forest::params(40).seed(3).max_retries(20);
        let forest = params.fit(&data).unwrap();
        let full = Arc::new(SortedDataSpec::new(data.clone()).unwrap());

        let attempts = forest
            .trees()
            .iter()
            .enumerate()
            .map(|(idx, tree)| {
                let attempt = (0..=20)
                    .find(|attempt| derive_seed(3, idx, *attempt) == tree.seed())
                    .unwrap();

                let mut rng = Xoshiro256Plus::seed_from_u64(tree.seed());
                let redrawn = BootstrapDataSpec::stratified(Arc::clone(&full), &mut rng);
                assert_eq!(
                    redrawn.sample_indices(),
                    tree.bootstrap().unwrap().sample_indices()
                );
                assert_eq!(tree.n_conditions(), 1);
                attempt
            })
            .collect::<Vec<_>>();
        assert!(attempts.iter().any(|attempt| *attempt > 0));

        // retries of one tree leave the others untouched
        let smaller = params.clone().size(10).fit(&data).unwrap();
        for (a, b) in smaller.trees().iter().zip(forest.trees()) {
            assert_eq!(a.seed(), b.seed());
            assert_eq!(a.tree(), b.tree());
        }
    }

    #[test]
    fn configuration_errors() {
        let data = three_blobs();
        assert!(matches!(
            Forest::params(0).fit(&data),
            Err(Error::Parameters(_))
        ));
        assert!(matches!(
            Forest::params(3).n_vars(3).fit(&data),
            Err(Error::Parameters(_))
        ));
        assert!(Forest::<f64, usize>::params(3).n_threads(0).check().is_err());
    }
}
