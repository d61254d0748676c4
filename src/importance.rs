//! Variable importance
//!
//! Measures how much every feature contributes to the splits of a tree or a forest. Three
//! strategies are available:
//!
//! * [`ProjectorImportance`] sums the absolute projector coefficients of all conditions, each
//!   weighted by the number of classes the condition separates
//! * [`AdjustedProjectorImportance`] weights the coefficients with the separability index of
//!   the node data and scales every tree by its out-of-bag accuracy
//! * [`PermutationImportance`] measures the loss of out-of-bag accuracy when a feature is
//!   shuffled
//!
//! Projector coefficients are reported in standardized units, the standardization is fitted on
//! the training data of the model.
use std::collections::{BTreeMap, BTreeSet};

use ndarray::{Array1, Axis};
use rand::{seq::SliceRandom, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;
use rayon::prelude::*;

use crate::{
    dataset::{Float, Label, SortedDataSpec, Standardization},
    error::{Error, Result},
    forest::{mix, BootstrapTree, Forest},
    metrics_classification::ToConfusionMatrix,
    strategy::{Glda, ProjectionPursuit},
    traits::Predict,
    tree::Tree,
};

/// A strategy to rank features by their contribution to a model
pub trait VariableImportance {
    /// Importance of every feature in a standalone tree
    fn tree_importance<F: Float, L: Label>(
        &self,
        tree: &Tree<F, L>,
        scale: &Standardization<F>,
    ) -> Result<Array1<F>>;

    /// Importance of every feature in a tree of a forest
    fn bootstrap_tree_importance<F: Float, L: Label>(
        &self,
        tree: &BootstrapTree<F, L>,
        scale: &Standardization<F>,
    ) -> Result<Array1<F>>;
}

/// Sum of `|a ∘ σ| / |classes|` over all conditions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectorImportance;

/// Projector coefficients weighted by the separability at every node and the out-of-bag
/// accuracy of the tree
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdjustedProjectorImportance;

/// Decrease of out-of-bag accuracy when a feature is shuffled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PermutationImportance {
    seed: u64,
}

impl PermutationImportance {
    pub fn new(seed: u64) -> Self {
        PermutationImportance { seed }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

/// Projector in standardized units
fn scaled_projector<F: Float>(projector: &Array1<F>, scale: &Standardization<F>) -> Array1<F> {
    projector * scale.std()
}

fn check_scale<F: Float, L: Label>(tree: &Tree<F, L>, scale: &Standardization<F>) -> Result<()> {
    tree.check_width(scale.std().len())
}

impl VariableImportance for ProjectorImportance {
    fn tree_importance<F: Float, L: Label>(
        &self,
        tree: &Tree<F, L>,
        scale: &Standardization<F>,
    ) -> Result<Array1<F>> {
        check_scale(tree, scale)?;
        let width = scale.std().len();

        Ok(tree.root().fold(
            |_| Array1::zeros(width),
            |condition, lower, upper| {
                let weight = F::cast(condition.classes().len());
                let coefficients =
                    scaled_projector(condition.projector(), scale).mapv(|a| a.abs() / weight);
                lower + upper + coefficients
            },
        ))
    }

    fn bootstrap_tree_importance<F: Float, L: Label>(
        &self,
        tree: &BootstrapTree<F, L>,
        scale: &Standardization<F>,
    ) -> Result<Array1<F>> {
        self.tree_importance(tree.tree(), scale)
    }
}

impl VariableImportance for AdjustedProjectorImportance {
    fn tree_importance<F: Float, L: Label>(
        &self,
        _tree: &Tree<F, L>,
        _scale: &Standardization<F>,
    ) -> Result<Array1<F>> {
        Err(Error::UnsupportedImportance(
            "adjusted projector importance needs the out-of-bag rows of a forest tree"
                .to_string(),
        ))
    }

    fn bootstrap_tree_importance<F: Float, L: Label>(
        &self,
        tree: &BootstrapTree<F, L>,
        scale: &Standardization<F>,
    ) -> Result<Array1<F>> {
        check_scale(tree, scale)?;
        let width = scale.std().len();

        let sample = tree.sample()?;
        let n_classes = sample.groups().len();
        if n_classes < 2 {
            return Ok(Array1::zeros(width));
        }

        let standardized = SortedDataSpec::new(
            sample
                .as_data()
                .clone()
                .with_features(scale.transform(&sample.x()))?,
        )?;
        let present = standardized.present_classes();
        let glda = Glda::new(tree.hyperparams().lambda());

        let mut importance = Array1::zeros(width);
        for node in tree.iter_nodes() {
            let condition = match node.as_condition() {
                Some(condition) => condition,
                None => continue,
            };

            let node_classes = condition
                .classes()
                .intersection(&present)
                .cloned()
                .collect::<BTreeSet<_>>();
            if node_classes.is_empty() {
                continue;
            }

            let sides = [condition.lower().classes(), condition.upper().classes()];
            let mut mapping = BTreeMap::new();
            for side in &sides {
                let representative = match side.intersection(&node_classes).next() {
                    Some(label) => label.clone(),
                    None => continue,
                };
                for label in side.intersection(&node_classes) {
                    mapping.insert(label.clone(), representative.clone());
                }
            }

            let node_data = standardized.subset(&node_classes)?.remap(&mapping)?;
            let projector = scaled_projector(condition.projector(), scale);
            let index = glda.index(&node_data, &projector)?;
            importance.scaled_add(index, &projector.mapv(|a| a.abs()));
        }

        let accuracy = F::one() - F::cast(tree.oob_error_rate()?);
        Ok(importance * (accuracy / F::cast(n_classes - 1)))
    }
}

impl VariableImportance for PermutationImportance {
    fn tree_importance<F: Float, L: Label>(
        &self,
        _tree: &Tree<F, L>,
        _scale: &Standardization<F>,
    ) -> Result<Array1<F>> {
        Err(Error::UnsupportedImportance(
            "permutation importance needs the out-of-bag rows of a forest tree".to_string(),
        ))
    }

    fn bootstrap_tree_importance<F: Float, L: Label>(
        &self,
        tree: &BootstrapTree<F, L>,
        scale: &Standardization<F>,
    ) -> Result<Array1<F>> {
        check_scale(tree, scale)?;
        let width = scale.std().len();

        let oob = tree.oob_data()?;
        if oob.is_empty() {
            return Ok(Array1::zeros(width));
        }

        let x = oob.x();
        let y = oob.y();
        let baseline = tree.predict(&x).confusion_matrix(&y)?.accuracy();

        let mut rng = Xoshiro256Plus::seed_from_u64(mix(self.seed ^ tree.seed()));
        let mut order = (0..oob.nrows()).collect::<Vec<_>>();
        let mut importance = Array1::zeros(width);
        for column in 0..width {
            order.shuffle(&mut rng);
            let mut shuffled = x.to_owned();
            shuffled
                .column_mut(column)
                .assign(&x.column(column).select(Axis(0), &order));

            let accuracy = tree.predict(&shuffled).confusion_matrix(&y)?.accuracy();
            importance[column] = F::cast(baseline - accuracy);
        }

        Ok(importance)
    }
}

impl<F: Float, L: Label> Tree<F, L> {
    /// Importance of every feature, in the column order of the training data
    ///
    /// Fails with `MissingTrainingData` for restored trees and with `UnsupportedImportance` for
    /// strategies which need out-of-bag rows.
    pub fn variable_importance(&self, strategy: &impl VariableImportance) -> Result<Array1<F>> {
        let data = self.training_data().ok_or_else(|| {
            Error::MissingTrainingData("the tree carries no training data".to_string())
        })?;
        let scale = Standardization::fit(&data.x())?;
        strategy.tree_importance(self, &scale)
    }
}

impl<F: Float, L: Label> Forest<F, L> {
    /// Mean importance of every feature over all trees
    pub fn variable_importance(
        &self,
        strategy: &(impl VariableImportance + Sync),
    ) -> Result<Array1<F>> {
        let data = self.training_data().ok_or_else(|| {
            Error::MissingTrainingData("the forest carries no training data".to_string())
        })?;
        let scale = Standardization::fit(&data.x())?;

        let per_tree = self
            .trees()
            .par_iter()
            .map(|tree| strategy.bootstrap_tree_importance(tree, &scale))
            .collect::<Result<Vec<_>>>()?;

        let mut total = Array1::zeros(data.ncols());
        for importance in &per_tree {
            total += importance;
        }
        Ok(total / F::cast(per_tree.len().max(1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::DataSpec;
    use crate::traits::Fit;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array2};

    /// Only the first feature separates the classes, the second is noise
    fn informative_first_column() -> DataSpec<f64, usize> {
        let x = Array2::from_shape_fn((40, 2), |(row, col)| {
            let k = (row % 20) as f64;
            if col == 0 {
                (row / 20) as f64 * 8.0 + 0.4 * (k * 0.61).sin()
            } else {
                3.0 * (k * 1.37 + row as f64 * 0.11).cos()
            }
        });
        let y = (0..40).map(|row| row / 20).collect::<Array1<usize>>();
        DataSpec::new(x, y).unwrap()
    }

    #[test]
    fn projector_importance_of_a_single_split() {
        let data = DataSpec::new(
            array![[0.0, 1.0], [1.0, -1.0], [10.0, 1.0], [11.0, -1.0]],
            array![0usize, 0, 1, 1],
        )
        .unwrap();
        let tree = Tree::params().fit(&data).unwrap();
        let scale = Standardization::fit(&data.x()).unwrap();

        let importance = tree.variable_importance(&ProjectorImportance).unwrap();
        let projector = tree.root().as_condition().unwrap().projector();
        let expected = (projector * scale.std()).mapv(|a: f64| a.abs() / 2.0);
        assert_abs_diff_eq!(importance, expected, epsilon = 1e-10);
    }

    #[test]
    fn single_class_tree_has_no_importance() {
        let data = DataSpec::new(array![[1.0, 2.0], [3.0, 4.0]], array![0usize, 0]).unwrap();
        let tree = Tree::params().fit(&data).unwrap();
        let importance = tree.variable_importance(&ProjectorImportance).unwrap();
        assert_eq!(importance, array![0.0f64, 0.0]);
    }

    #[test]
    fn oob_strategies_need_a_forest() {
        let data = informative_first_column();
        let tree = Tree::params().fit(&data).unwrap();

        assert!(matches!(
            tree.variable_importance(&AdjustedProjectorImportance),
            Err(Error::UnsupportedImportance(_))
        ));
        assert!(matches!(
            tree.variable_importance(&PermutationImportance::new(0)),
            Err(Error::UnsupportedImportance(_))
        ));
    }

    #[test]
    fn informative_feature_ranks_first() {
        let data = informative_first_column();
        let forest = Forest::params(10).seed(5).fit(&data).unwrap();

        let projector = forest.variable_importance(&ProjectorImportance).unwrap();
        assert!(projector[0] > projector[1]);

        let adjusted = forest
            .variable_importance(&AdjustedProjectorImportance)
            .unwrap();
        assert!(adjusted[0] > adjusted[1]);
        assert!(adjusted.iter().all(|v| *v >= 0.0));

        let permutation = forest
            .variable_importance(&PermutationImportance::new(1))
            .unwrap();
        assert!(permutation[0] > permutation[1]);
    }

    /// Two constant classes on the first feature, the second feature never varies
    fn constant_classes() -> DataSpec<f64, usize> {
        let x = Array2::from_shape_fn((12, 2), |(row, col)| {
            if col == 0 {
                2.0 * (row / 6) as f64
            } else {
                3.0
            }
        });
        let y = (0..12).map(|row| row / 6).collect::<Array1<usize>>();
        DataSpec::new(x, y).unwrap()
    }

    #[test]
    fn adjusted_importance_of_a_perfect_stump() {
        let data = constant_classes();
        let forest = Forest::params(1).seed(4).fit(&data).unwrap();
        let tree = &forest.trees()[0];
        let scale = Standardization::fit(&data.x()).unwrap();

        // no spread inside the classes gives an index of one, and the stump makes no oob error
        assert_eq!(tree.oob_error_rate().unwrap(), 0.0);
        let projector = tree.root().as_condition().unwrap().projector();
        let (index, oob_accuracy, n_classes) = (1.0, 1.0, 2.0);
        let expected = (projector * scale.std())
            .mapv(|a: f64| a.abs() * index * oob_accuracy / (n_classes - 1.0));
        assert_abs_diff_eq!(expected, array![(12.0f64 / 11.0).sqrt(), 0.0], epsilon = 1e-10);

        let importance = AdjustedProjectorImportance
            .bootstrap_tree_importance(tree, &scale)
            .unwrap();
        assert_abs_diff_eq!(importance, expected, epsilon = 1e-10);
        assert_abs_diff_eq!(
            forest
                .variable_importance(&AdjustedProjectorImportance)
                .unwrap(),
            expected,
            epsilon = 1e-10
        );
    }

    #[test]
    fn permutation_importance_is_the_accuracy_lost() {
        let data = constant_classes();
        let forest = Forest::params(1).seed(6).fit(&data).unwrap();
        let tree = &forest.trees()[0];
        let strategy = PermutationImportance::new(8);

        let oob = tree.oob_data().unwrap();
        let expected = if oob.is_empty() {
            0.0
        } else {
            // every row keeps its class, so the accuracy left is the share of rows whose
            // shuffled first feature comes from the same class
            let mut rng = Xoshiro256Plus::seed_from_u64(mix(8 ^ tree.seed()));
            let mut order = (0..oob.nrows()).collect::<Vec<_>>();
            order.shuffle(&mut rng);
            let kept = order
                .iter()
                .enumerate()
                .filter(|(row, source)| oob.y()[*row] == oob.y()[**source])
                .count();
            1.0 - kept as f64 / oob.nrows() as f64
        };

        let importance = forest.variable_importance(&strategy).unwrap();
        assert_abs_diff_eq!(importance[0], expected, epsilon = 1e-10);
        assert_eq!(importance[1], 0.0);
    }

    #[test]
    fn permutation_importance_is_reproducible() {
        let data = informative_first_column();
        let forest = Forest::params(4).seed(9).fit(&data).unwrap();
        let strategy = PermutationImportance::new(3);

        assert_eq!(
            forest.variable_importance(&strategy).unwrap(),
            forest.variable_importance(&strategy).unwrap()
        );
    }
}
