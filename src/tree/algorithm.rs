//! Projection pursuit trees
//!
use std::collections::{BTreeMap, BTreeSet};

use ndarray::{Array1, ArrayBase, Data, Ix1, Ix2};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;
use tracing::{debug, instrument};

use super::{Condition, NodeIter, TreeNode, TreeValidParams};
use crate::{
    dataset::{DataSpec, Float, Label, SortedDataSpec},
    error::{Error, Result},
    metrics_classification::{ConfusionMatrix, ToConfusionMatrix},
    strategy::{Glda, ProjectionPursuit},
    traits::{Fit, Predict, PredictInplace},
};

/// A fitted split: the projector, the threshold between the projected means of the two groups
/// and the group labels on either side
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Split<F, L> {
    pub projector: Array1<F>,
    pub threshold: F,
    pub lower: L,
    pub upper: L,
}

/// Reduction of several classes to two super-groups
///
/// Each super-group is labelled by the smallest class it contains, `mapping` relabels every
/// class to its super-group.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Regrouping<L> {
    pub mapping: BTreeMap<L, L>,
    pub groups: BTreeMap<L, BTreeSet<L>>,
}

/// Mean of every class block projected onto `projector`, in label order
pub(crate) fn projected_means<F: Float, L: Label>(
    data: &SortedDataSpec<F, L>,
    projector: &ArrayBase<impl Data<Elem = F>, Ix1>,
) -> Result<Vec<(L, F)>> {
    data.groups()
        .labels()
        .map(|label| {
            let mean = data
                .group(label)?
                .dot(projector)
                .mean()
                .ok_or_else(|| Error::Parameters(format!("class {:?} has no rows", label)))?;
            Ok((label.clone(), mean))
        })
        .collect()
}

/// Cuts the classes sorted by projected mean at the largest gap
///
/// Classes with equal means are ordered by label and the first of several equally large gaps
/// is taken, so the result only depends on the means.
pub(crate) fn binary_regroup<F: Float, L: Label>(mut means: Vec<(L, F)>) -> Result<Regrouping<L>> {
    if means.len() < 2 {
        return Err(Error::Parameters(format!(
            "regrouping needs at least two classes, got {}",
            means.len()
        )));
    }

    means.sort_by(|a, b| {
        a.1.partial_cmp(&b.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });

    let mut cut = 0;
    let mut largest = means[1].1 - means[0].1;
    for (idx, pair) in means.windows(2).enumerate().skip(1) {
        let gap = pair[1].1 - pair[0].1;
        if gap > largest {
            largest = gap;
            cut = idx;
        }
    }

    let (below, above) = means.split_at(cut + 1);
    let mut mapping = BTreeMap::new();
    let mut groups = BTreeMap::new();
    for side in [below, above] {
        let classes = side
            .iter()
            .map(|(label, _)| label.clone())
            .collect::<BTreeSet<_>>();
        let representative = classes
            .iter()
            .next()
            .cloned()
            .ok_or_else(|| Error::Parameters("empty super-group".to_string()))?;

        for class in &classes {
            mapping.insert(class.clone(), representative.clone());
        }
        groups.insert(representative, classes);
    }

    Ok(Regrouping { mapping, groups })
}

/// Orders the two groups of `means` by projected mean and puts the threshold in the middle
fn orient<F: Float, L: Label>(projector: Array1<F>, means: Vec<(L, F)>) -> Result<Split<F, L>> {
    let [(a, mean_a), (b, mean_b)]: [(L, F); 2] = means.try_into().map_err(|means: Vec<_>| {
        Error::Parameters(format!("a split needs two groups, got {}", means.len()))
    })?;

    let scale = F::one().max(mean_a.abs()).max(mean_b.abs());
    if (mean_a - mean_b).abs() <= F::epsilon() * scale {
        return Err(Error::DegenerateSplit(format!(
            "groups {:?} and {:?} have the same projected mean {}",
            a, b, mean_a
        )));
    }

    let threshold = (mean_a + mean_b) / F::cast(2.0);
    let (lower, upper) = if mean_a < mean_b { (a, b) } else { (b, a) };

    Ok(Split {
        projector,
        threshold,
        lower,
        upper,
    })
}

/// Optimizes the projector of `data` on the columns chosen by the dimensionality reduction
fn fit_projector<F: Float, L: Label>(
    params: &TreeValidParams<F, L>,
    data: &SortedDataSpec<F, L>,
    columns: &crate::strategy::DrSelection,
) -> Result<Array1<F>> {
    let glda = Glda::new(params.lambda());
    let reduced = glda.optimize(&columns.reduce(data))?;
    columns.expand(&reduced)
}

/// Splits a node holding two or more classes
///
/// Two classes are split directly. More classes are first projected to find the binary
/// regrouping, then the split is fitted on the two super-groups. Returns the split together
/// with the classes on its lower and upper side.
pub(crate) fn find_split<F: Float, L: Label>(
    params: &TreeValidParams<F, L>,
    data: &SortedDataSpec<F, L>,
    rng: &mut impl Rng,
) -> Result<(Split<F, L>, BTreeSet<L>, BTreeSet<L>)> {
    let columns = params.dimension_reduction().select(data.ncols(), rng)?;

    if data.groups().len() == 2 {
        let projector = fit_projector(params, data, &columns)?;
        let means = projected_means(data, &projector)?;
        let split = orient(projector, means)?;
        let lower = std::iter::once(split.lower.clone()).collect();
        let upper = std::iter::once(split.upper.clone()).collect();
        return Ok((split, lower, upper));
    }

    let projector = fit_projector(params, data, &columns)?;
    let regrouping = binary_regroup(projected_means(data, &projector)?)?;
    let regrouped = data.remap(&regrouping.mapping)?;

    let projector = fit_projector(params, &regrouped, &columns)?;
    let means = projected_means(&regrouped, &projector)?;
    let split = orient(projector, means)?;

    let side = |label: &L| {
        regrouping
            .groups
            .get(label)
            .cloned()
            .ok_or_else(|| Error::Parameters(format!("unknown super-group {:?}", label)))
    };
    let lower = side(&split.lower)?;
    let upper = side(&split.upper)?;

    Ok((split, lower, upper))
}

/// Work item of the tree builder
enum Frame<F, L> {
    /// Grow the subtree of a node holding this data
    Grow(SortedDataSpec<F, L>),
    /// Combine the two subtrees on top of the result stack
    Assemble { projector: Array1<F>, threshold: F },
}

/// Grows a tree on class-sorted data
///
/// The builder runs on an explicit stack. A node with more than two classes pushes an
/// `Assemble` frame below the frames of its two children, once both children are resolved
/// their nodes lie on top of the result stack, lower below upper.
pub(crate) fn grow<F: Float, L: Label>(
    params: &TreeValidParams<F, L>,
    data: &SortedDataSpec<F, L>,
    rng: &mut impl Rng,
) -> Result<TreeNode<F, L>> {
    if data.is_empty() {
        return Err(Error::Parameters(
            "cannot grow a tree on data without rows".to_string(),
        ));
    }
    params.validate_width(data.ncols())?;

    let mut frames = vec![Frame::Grow(data.clone())];
    let mut built: Vec<TreeNode<F, L>> = Vec::new();

    while let Some(frame) = frames.pop() {
        match frame {
            Frame::Grow(data) => match data.groups().len() {
                0 => {
                    return Err(Error::Parameters(
                        "cannot grow a node without classes".to_string(),
                    ))
                }
                1 => {
                    let value = data.groups().labels().next().cloned().unwrap_or_default();
                    built.push(TreeNode::response(value));
                }
                2 => {
                    let (split, _, _) = find_split(params, &data, rng)?;
                    debug!(lower = ?split.lower, upper = ?split.upper, threshold = %split.threshold, "split two classes");

                    built.push(TreeNode::Condition(Condition::new(
                        split.projector,
                        split.threshold,
                        TreeNode::response(split.lower),
                        TreeNode::response(split.upper),
                    )));
                }
                _ => {
                    let (split, lower, upper) = find_split(params, &data, rng)?;
                    debug!(lower = ?lower, upper = ?upper, threshold = %split.threshold, "split super-groups");

                    let lower_data = data.subset(&lower)?;
                    let upper_data = data.subset(&upper)?;
                    frames.push(Frame::Assemble {
                        projector: split.projector,
                        threshold: split.threshold,
                    });
                    frames.push(Frame::Grow(upper_data));
                    frames.push(Frame::Grow(lower_data));
                }
            },
            Frame::Assemble {
                projector,
                threshold,
            } => {
                let (upper, lower) = match (built.pop(), built.pop()) {
                    (Some(upper), Some(lower)) => (upper, lower),
                    _ => {
                        return Err(Error::Parameters(
                            "tree builder lost a subtree".to_string(),
                        ))
                    }
                };
                built.push(TreeNode::Condition(Condition::new(
                    projector, threshold, lower, upper,
                )));
            }
        }
    }

    built
        .pop()
        .ok_or_else(|| Error::Parameters("tree builder produced no root".to_string()))
}

/// A fitted projection pursuit tree
///
/// Every internal node splits the classes reaching it into two groups along a linear
/// projection found by [`Glda`]. Trees trained on `K` separable classes have `K - 1` conditions
/// and one response per class.
///
/// ### Structure
///
/// ```rust
/// use ppforest::prelude::*;
/// use ndarray::array;
///
/// let data = DataSpec::new(
///     array![[0., 0.], [0., 1.], [5., 0.], [5., 1.], [10., 0.], [10., 1.2]],
///     array![0usize, 0, 1, 1, 2, 2],
/// ).unwrap();
/// let tree = Tree::params().fit(&data).unwrap();
///
/// assert_eq!(tree.n_conditions(), 2);
/// assert_eq!(tree.n_leaves(), 3);
/// assert_eq!(tree.predict(&array![[9.5, 0.5]]), array![2usize]);
/// ```
#[derive(Debug, Clone)]
pub struct Tree<F, L> {
    root: TreeNode<F, L>,
    params: TreeValidParams<F, L>,
    n_features: usize,
    training_data: Option<SortedDataSpec<F, L>>,
}

impl<F: Float, L: Label> Tree<F, L> {
    pub(crate) fn from_parts(
        root: TreeNode<F, L>,
        params: TreeValidParams<F, L>,
        n_features: usize,
        training_data: Option<SortedDataSpec<F, L>>,
    ) -> Self {
        Tree {
            root,
            params,
            n_features,
            training_data,
        }
    }

    pub fn root(&self) -> &TreeNode<F, L> {
        &self.root
    }

    /// The checked hyperparameters the tree was trained with
    pub fn hyperparams(&self) -> &TreeValidParams<F, L> {
        &self.params
    }

    /// Width of the observations the tree predicts
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// The class-sorted training data, `None` for bootstrap trees and restored models
    pub fn training_data(&self) -> Option<&SortedDataSpec<F, L>> {
        self.training_data.as_ref()
    }

    /// Create a node iterator in level-order (BFT)
    pub fn iter_nodes(&self) -> NodeIter<F, L> {
        NodeIter::new(&self.root)
    }

    /// Number of internal splits
    pub fn n_conditions(&self) -> usize {
        self.iter_nodes().filter(|node| !node.is_leaf()).count()
    }

    /// Number of responses
    pub fn n_leaves(&self) -> usize {
        self.iter_nodes().filter(|node| node.is_leaf()).count()
    }

    /// Number of conditions on the longest path from the root to a response
    pub fn depth(&self) -> usize {
        self.root
            .fold(|_| 0, |_, lower, upper| 1 + usize::max(lower, upper))
    }

    /// Classes the tree can predict
    pub fn classes(&self) -> BTreeSet<L> {
        self.root.classes()
    }

    /// Predicts the class of one observation
    pub fn predict_row(&self, row: &ArrayBase<impl Data<Elem = F>, Ix1>) -> &L {
        self.root.predict_row(row)
    }

    /// Confusion matrix of the predictions on `data`
    pub fn confusion_matrix(&self, data: &DataSpec<F, L>) -> Result<ConfusionMatrix<L>> {
        self.check_width(data.ncols())?;
        self.predict(data).confusion_matrix(data)
    }

    /// Fraction of misclassified observations of `data`
    pub fn error_rate(&self, data: &DataSpec<F, L>) -> Result<f64> {
        Ok(self.confusion_matrix(data)?.error())
    }

    pub(crate) fn check_width(&self, width: usize) -> Result<()> {
        if width != self.n_features && self.n_features > 0 {
            return Err(Error::ShapeMismatch {
                context: "number of features",
                expected: self.n_features,
                found: width,
            });
        }
        Ok(())
    }
}

impl<F: Float, L: Label> PartialEq for Tree<F, L> {
    fn eq(&self, other: &Self) -> bool {
        self.root == other.root
    }
}

impl<F: Float, L: Label, D: Data<Elem = F>> PredictInplace<ArrayBase<D, Ix2>, Array1<L>>
    for Tree<F, L>
{
    /// Make predictions for each row of a matrix of features `x`.
    fn predict_inplace(&self, x: &ArrayBase<D, Ix2>, y: &mut Array1<L>) {
        assert_eq!(
            x.nrows(),
            y.len(),
            "The number of data points must match the number of output targets."
        );

        for (row, target) in x.rows().into_iter().zip(y.iter_mut()) {
            *target = self.root.predict_row(&row).clone();
        }
    }

    fn default_target(&self, x: &ArrayBase<D, Ix2>) -> Array1<L> {
        Array1::default(x.nrows())
    }
}

impl<F: Float, L: Label> Fit<DataSpec<F, L>> for TreeValidParams<F, L> {
    type Object = Tree<F, L>;

    /// Fit a projection pursuit tree on a labelled dataset
    ///
    /// The rows are sorted into class blocks first, the sorted copy is kept as the training data
    /// of the tree.
    #[instrument(skip_all, fields(n_samples = dataset.nrows(), n_features = dataset.ncols()))]
    fn fit(&self, dataset: &DataSpec<F, L>) -> Result<Self::Object> {
        let data = SortedDataSpec::new(dataset.clone())?;
        let mut rng = Xoshiro256Plus::seed_from_u64(self.seed());
        let root = grow(self, &data, &mut rng)?;
        debug!(classes = data.groups().len(), "grown tree");

        Ok(Tree::from_parts(root, self.clone(), data.ncols(), Some(data)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ParamGuard;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array2};

    fn sorted(x: Array2<f64>, y: Array1<usize>) -> SortedDataSpec<f64, usize> {
        SortedDataSpec::new(DataSpec::new(x, y).unwrap()).unwrap()
    }

    #[test]
    fn regroup_cuts_at_largest_gap() {
        let regrouping =
            binary_regroup(vec![(0usize, 0.0), (1, 10.0), (2, 1.0), (3, 12.0)]).unwrap();

        assert_eq!(regrouping.mapping[&2], 0);
        assert_eq!(regrouping.mapping[&3], 1);
        assert_eq!(regrouping.groups[&0], [0, 2].into_iter().collect::<BTreeSet<_>>());
        assert_eq!(regrouping.groups[&1], [1, 3].into_iter().collect::<BTreeSet<_>>());
    }

    #[test]
    fn regroup_takes_first_of_equal_gaps() {
        let regrouping = binary_regroup(vec![(5usize, 2.0), (7, 0.0), (9, 1.0)]).unwrap();
        // sorted 7, 9, 5 with gaps 1 and 1
        assert_eq!(regrouping.groups[&7], [7].into_iter().collect::<BTreeSet<_>>());
        assert_eq!(regrouping.groups[&5], [5, 9].into_iter().collect::<BTreeSet<_>>());
    }

    #[test]
    fn regroup_breaks_mean_ties_by_label() {
        let regrouping = binary_regroup(vec![(2usize, 0.0), (1, 0.0), (0, 3.0)]).unwrap();
        assert_eq!(regrouping.groups[&1], [1, 2].into_iter().collect::<BTreeSet<_>>());
        assert_eq!(regrouping.groups[&0], [0].into_iter().collect::<BTreeSet<_>>());
    }

    #[test]
    fn regroup_needs_two_classes() {
        assert!(binary_regroup(vec![(0usize, 1.0)]).is_err());
    }

    #[test]
    fn orient_puts_smaller_mean_below() {
        let split = orient(array![1.0], vec![(0usize, 4.0), (1, 2.0)]).unwrap();
        assert_eq!(split.lower, 1);
        assert_eq!(split.upper, 0);
        assert_eq!(split.threshold, 3.0);

        let res = orient(array![1.0], vec![(0usize, 2.0), (1, 2.0)]);
        assert!(matches!(res, Err(Error::DegenerateSplit(_))));
    }

    #[test]
    fn two_class_scenario() {
        let data = DataSpec::new(
            array![[1.], [1.], [1.], [1.], [1.], [2.], [2.], [2.], [2.], [2.]],
            array![0usize, 0, 0, 0, 0, 1, 1, 1, 1, 1],
        )
        .unwrap();
        let tree = Tree::params().lambda(0.0).fit(&data).unwrap();

        let condition = tree.root().as_condition().unwrap();
        assert_abs_diff_eq!(condition.projector(), &array![1.0], epsilon = 1e-10);
        assert_abs_diff_eq!(condition.threshold(), 1.5, epsilon = 1e-10);
        assert_eq!(condition.lower(), &TreeNode::response(0));
        assert_eq!(condition.upper(), &TreeNode::response(1));
    }

    #[test]
    fn labels_on_the_wrong_side_are_swapped() {
        let data = DataSpec::new(
            array![[5.], [6.], [0.], [1.]],
            array![0usize, 0, 1, 1],
        )
        .unwrap();
        let tree = Tree::params().fit(&data).unwrap();
        let condition = tree.root().as_condition().unwrap();

        assert_eq!(condition.lower().value(), Some(&1));
        assert_eq!(condition.upper().value(), Some(&0));
        assert_eq!(tree.predict(&data), data.y());
    }

    #[test]
    fn grow_builds_k_minus_one_conditions() {
        let data = sorted(
            array![
                [0., 0.], [0.5, 0.2], [0.2, 0.6],
                [6., 0.], [6.4, 0.4], [6.1, 0.9],
                [0., 8.], [0.3, 8.5], [0.7, 8.2],
                [9., 9.], [9.2, 9.6], [9.7, 9.1]
            ],
            array![0, 0, 0, 1, 1, 1, 2, 2, 2, 3, 3, 3],
        );
        let params = TreeValidParams::default();
        let mut rng = Xoshiro256Plus::seed_from_u64(0);
        let root = grow(&params, &data, &mut rng).unwrap();
        let tree = Tree::from_parts(root, params, 2, None);

        assert_eq!(tree.n_conditions(), 3);
        assert_eq!(tree.n_leaves(), 4);
        assert_eq!(tree.classes().len(), 4);
        assert!(tree.depth() >= 2);
        assert_eq!(tree.predict(&data.x()), data.y());
    }

    #[test]
    fn single_class_is_a_response() {
        let data = DataSpec::new(array![[1., 2.], [3., 4.]], array![7usize, 7]).unwrap();
        let tree = Tree::params().fit(&data).unwrap();

        assert_eq!(tree.root(), &TreeNode::response(7));
        assert_eq!(tree.depth(), 0);
        assert_eq!(tree.predict(&array![[100., -100.]]), array![7usize]);
    }

    #[test]
    fn empty_data_is_rejected() {
        let data = DataSpec::<f64, usize>::new(Array2::zeros((0, 2)), Array1::from_vec(vec![]))
            .unwrap();
        assert!(matches!(
            Tree::params().fit(&data),
            Err(Error::Parameters(_))
        ));
    }

    #[test]
    fn too_many_variables_are_rejected() {
        let data = DataSpec::new(array![[1.], [2.]], array![0usize, 1]).unwrap();
        let params = Tree::params().n_vars(2);
        assert!(params.check_ref().is_ok());
        assert!(matches!(params.fit(&data), Err(Error::Parameters(_))));
    }

    #[test]
    fn wrong_width_is_a_shape_mismatch() {
        let data = DataSpec::new(
            array![[1., 0.], [1.5, 0.4], [0.8, -0.3], [6., 1.], [6.4, 1.5], [5.7, 0.6]],
            array![0usize, 0, 0, 1, 1, 1],
        )
        .unwrap();
        let tree = Tree::params().fit(&data).unwrap();
        let narrow = DataSpec::new(array![[1.], [2.]], array![0usize, 1]).unwrap();

        assert!(matches!(
            tree.error_rate(&narrow),
            Err(Error::ShapeMismatch { .. })
        ));
    }
}
