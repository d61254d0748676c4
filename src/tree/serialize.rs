//! JSON model format
//!
//! A tree is stored as `{"root": node}` where a node is either
//! `{"projector": [..], "threshold": t, "lower": node, "upper": node}` or `{"value": label}`.
//! A forest is stored as `{"trees": [tree, ..]}`. Only the decision structure is kept, restored
//! models carry default hyperparameters and no training data.
use ndarray::Array1;
use serde_crate::{de::DeserializeOwned, Deserialize, Serialize};

use super::{Condition, Tree, TreeNode, TreeValidParams};
use crate::{
    dataset::{Float, Label},
    error::{Error, Result},
    forest::{BootstrapTree, Forest},
    ParamGuard,
};

#[derive(Serialize, Deserialize)]
#[serde(crate = "serde_crate", untagged)]
enum NodeRepr<F, L> {
    Condition {
        projector: Vec<F>,
        threshold: F,
        lower: Box<NodeRepr<F, L>>,
        upper: Box<NodeRepr<F, L>>,
    },
    Response {
        value: L,
    },
}

#[derive(Serialize, Deserialize)]
#[serde(crate = "serde_crate")]
struct TreeRepr<F, L> {
    root: NodeRepr<F, L>,
}

#[derive(Serialize, Deserialize)]
#[serde(crate = "serde_crate")]
struct ForestRepr<F, L> {
    trees: Vec<TreeRepr<F, L>>,
}

impl<F: Float, L: Label> NodeRepr<F, L> {
    fn from_node(node: &TreeNode<F, L>) -> Self {
        node.fold(
            |value| NodeRepr::Response {
                value: value.clone(),
            },
            |condition, lower, upper| NodeRepr::Condition {
                projector: condition.projector().to_vec(),
                threshold: condition.threshold(),
                lower: Box::new(lower),
                upper: Box::new(upper),
            },
        )
    }

    fn into_node(self) -> TreeNode<F, L> {
        match self {
            NodeRepr::Response { value } => TreeNode::response(value),
            NodeRepr::Condition {
                projector,
                threshold,
                lower,
                upper,
            } => TreeNode::Condition(Condition::new(
                Array1::from(projector),
                threshold,
                lower.into_node(),
                upper.into_node(),
            )),
        }
    }
}

impl<F: Float, L: Label> TreeRepr<F, L> {
    fn from_tree(tree: &Tree<F, L>) -> Self {
        TreeRepr {
            root: NodeRepr::from_node(tree.root()),
        }
    }

    /// Rebuilds the tree, every projector must have the same width
    fn into_tree(self) -> Result<Tree<F, L>> {
        let root = self.root.into_node();

        let mut n_features = None;
        for node in super::NodeIter::new(&root) {
            if let Some(condition) = node.as_condition() {
                let width = condition.projector().len();
                match n_features {
                    None => n_features = Some(width),
                    Some(expected) if expected != width => {
                        return Err(Error::ShapeMismatch {
                            context: "projector width",
                            expected,
                            found: width,
                        })
                    }
                    _ => {}
                }
            }
        }

        Ok(Tree::from_parts(
            root,
            TreeValidParams::default(),
            n_features.unwrap_or_default(),
            None,
        ))
    }
}

impl<F, L> Tree<F, L>
where
    F: Float + Serialize + DeserializeOwned,
    L: Label + Serialize + DeserializeOwned,
{
    /// Encodes the decision structure as JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&TreeRepr::from_tree(self))?)
    }

    /// Restores a tree from JSON
    ///
    /// The tree has default hyperparameters and no training data.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str::<TreeRepr<F, L>>(json)?.into_tree()
    }
}

impl<F, L> Forest<F, L>
where
    F: Float + Serialize + DeserializeOwned,
    L: Label + Serialize + DeserializeOwned,
{
    /// Encodes the decision structure of every tree as JSON
    pub fn to_json(&self) -> Result<String> {
        let repr = ForestRepr {
            trees: self
                .trees()
                .iter()
                .map(|tree| TreeRepr::from_tree(tree))
                .collect(),
        };
        Ok(serde_json::to_string(&repr)?)
    }

    /// Restores a forest from JSON
    ///
    /// The trees carry no bootstrap samples, out-of-bag metrics and importance strategies
    /// which need training data fail with `MissingTrainingData`.
    pub fn from_json(json: &str) -> Result<Self> {
        let repr = serde_json::from_str::<ForestRepr<F, L>>(json)?;
        let params = Forest::<F, L>::params(repr.trees.len()).check()?;

        let trees = repr
            .trees
            .into_iter()
            .map(|tree| tree.into_tree().map(|tree| BootstrapTree::new(tree, None)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Forest::from_parts(trees, params, None))
    }
}
