use std::collections::VecDeque;
use std::iter::Iterator;

use super::TreeNode;
use crate::dataset::{Float, Label};

/// Level-order (BFT) iterator of nodes in a projection pursuit tree
pub struct NodeIter<'a, F, L> {
    queue: VecDeque<&'a TreeNode<F, L>>,
}

impl<'a, F, L> NodeIter<'a, F, L> {
    pub fn new(root: &'a TreeNode<F, L>) -> Self {
        NodeIter {
            queue: VecDeque::from(vec![root]),
        }
    }
}

impl<'a, F: Float, L: Label> Iterator for NodeIter<'a, F, L> {
    type Item = &'a TreeNode<F, L>;

    fn next(&mut self) -> Option<Self::Item> {
        self.queue.pop_front().map(|node| {
            self.queue.extend(node.children());
            node
        })
    }
}
