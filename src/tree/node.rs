use std::collections::BTreeSet;

use ndarray::{Array1, ArrayBase, Data, Ix1};

use crate::dataset::{Float, Label};

/// Tolerance of the threshold comparison in the semantic equality of nodes
pub const THRESHOLD_TOLERANCE: f64 = 1e-5;

/// A node in the projection pursuit tree
///
/// Either an internal `Condition` which routes an observation by the side of a threshold its
/// projection falls on, or a terminal `Response` carrying the predicted class. Children are
/// owned exclusively by their parent.
#[derive(Debug, Clone)]
pub enum TreeNode<F, L> {
    Condition(Condition<F, L>),
    Response { value: L },
}

/// An internal split of the tree
///
/// Observations whose projection onto `projector` is below `threshold` continue in `lower`,
/// all others in `upper`. The classes reachable from the `lower` side have the smaller
/// projected means on the training data.
#[derive(Debug, Clone)]
pub struct Condition<F, L> {
    projector: Array1<F>,
    threshold: F,
    lower: Box<TreeNode<F, L>>,
    upper: Box<TreeNode<F, L>>,
    classes: BTreeSet<L>,
}

impl<F: Float, L: Label> Condition<F, L> {
    pub fn new(
        projector: Array1<F>,
        threshold: F,
        lower: TreeNode<F, L>,
        upper: TreeNode<F, L>,
    ) -> Self {
        let mut classes = lower.classes();
        classes.extend(upper.classes());

        Condition {
            projector,
            threshold,
            lower: Box::new(lower),
            upper: Box::new(upper),
            classes,
        }
    }

    pub fn projector(&self) -> &Array1<F> {
        &self.projector
    }

    pub fn threshold(&self) -> F {
        self.threshold
    }

    pub fn lower(&self) -> &TreeNode<F, L> {
        &self.lower
    }

    pub fn upper(&self) -> &TreeNode<F, L> {
        &self.upper
    }

    /// Classes of the responses below this condition
    pub fn classes(&self) -> &BTreeSet<L> {
        &self.classes
    }

    /// Returns the child an observation is routed to
    pub fn route(&self, row: &ArrayBase<impl Data<Elem = F>, Ix1>) -> &TreeNode<F, L> {
        if row.dot(&self.projector) < self.threshold {
            &self.lower
        } else {
            &self.upper
        }
    }
}

enum Visit<'a, F, L> {
    Enter(&'a TreeNode<F, L>),
    Exit(&'a Condition<F, L>),
}

impl<F: Float, L: Label> TreeNode<F, L> {
    pub fn response(value: L) -> Self {
        TreeNode::Response { value }
    }

    /// Returns true if the node has no children
    pub fn is_leaf(&self) -> bool {
        matches!(self, TreeNode::Response { .. })
    }

    /// Returns `Some(value)` for responses and `None` for conditions
    pub fn value(&self) -> Option<&L> {
        match self {
            TreeNode::Response { value } => Some(value),
            TreeNode::Condition(_) => None,
        }
    }

    pub fn as_condition(&self) -> Option<&Condition<F, L>> {
        match self {
            TreeNode::Condition(condition) => Some(condition),
            TreeNode::Response { .. } => None,
        }
    }

    /// Returns both children, first lower then upper
    pub fn children(&self) -> Vec<&TreeNode<F, L>> {
        match self {
            TreeNode::Condition(condition) => vec![condition.lower(), condition.upper()],
            TreeNode::Response { .. } => vec![],
        }
    }

    /// Classes reachable from this node
    pub fn classes(&self) -> BTreeSet<L> {
        match self {
            TreeNode::Condition(condition) => condition.classes.clone(),
            TreeNode::Response { value } => std::iter::once(value.clone()).collect(),
        }
    }

    /// Descends to the response of a single observation
    pub fn predict_row(&self, row: &ArrayBase<impl Data<Elem = F>, Ix1>) -> &L {
        let mut node = self;
        loop {
            match node {
                TreeNode::Condition(condition) => node = condition.route(row),
                TreeNode::Response { value } => return value,
            }
        }
    }

    /// Post-order fold over the subtree
    ///
    /// `response` maps every leaf to a value, `condition` combines a split with the values of its
    /// lower and upper subtree. Runs on an explicit stack, so the depth of the tree is not
    /// limited by the call stack.
    pub fn fold<T>(
        &self,
        mut response: impl FnMut(&L) -> T,
        mut condition: impl FnMut(&Condition<F, L>, T, T) -> T,
    ) -> T {
        let mut stack = vec![Visit::Enter(self)];
        let mut folded: Vec<T> = Vec::new();

        while let Some(visit) = stack.pop() {
            match visit {
                Visit::Enter(TreeNode::Response { value }) => folded.push(response(value)),
                Visit::Enter(TreeNode::Condition(split)) => {
                    stack.push(Visit::Exit(split));
                    stack.push(Visit::Enter(split.upper()));
                    stack.push(Visit::Enter(split.lower()));
                }
                Visit::Exit(split) => {
                    let upper = folded.pop().expect("upper subtree is folded before its parent");
                    let lower = folded.pop().expect("lower subtree is folded before its parent");
                    folded.push(condition(split, lower, upper));
                }
            }
        }

        folded.pop().expect("the root is folded last")
    }
}

/// Semantic equality
///
/// Two trees are equal if they have the same shape and responses, the projectors of matching
/// conditions point in the same direction (up to a positive scale) and their thresholds agree up
/// to [`THRESHOLD_TOLERANCE`].
impl<F: Float, L: Label> PartialEq for TreeNode<F, L> {
    fn eq(&self, other: &Self) -> bool {
        let tolerance = F::cast(THRESHOLD_TOLERANCE);
        let mut pairs = vec![(self, other)];

        while let Some(pair) = pairs.pop() {
            match pair {
                (TreeNode::Response { value: a }, TreeNode::Response { value: b }) => {
                    if a != b {
                        return false;
                    }
                }
                (TreeNode::Condition(a), TreeNode::Condition(b)) => {
                    if !collinear(&a.projector, &b.projector, tolerance)
                        || (a.threshold - b.threshold).abs() > tolerance
                    {
                        return false;
                    }
                    pairs.push((a.lower(), b.lower()));
                    pairs.push((a.upper(), b.upper()));
                }
                _ => return false,
            }
        }

        true
    }
}

fn collinear<F: Float>(a: &Array1<F>, b: &Array1<F>, tolerance: F) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let norms = (a.dot(a) * b.dot(b)).sqrt();
    if norms == F::zero() {
        return a.dot(a) == b.dot(b);
    }

    a.dot(b) / norms >= F::one() - tolerance
}
