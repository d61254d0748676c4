use std::collections::BTreeMap;
use std::ops::Range;

use ndarray::{ArrayBase, Data, Ix1};

use super::Label;
use crate::error::{Error, Result};

/// Row ranges of the class blocks in a class-sorted label vector
///
/// Every class maps to the `(start, size)` of the single contiguous block of rows carrying its
/// label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSpec<L> {
    blocks: BTreeMap<L, (usize, usize)>,
}

impl<L: Label> GroupSpec<L> {
    /// Builds the block index with a single scan over `labels`
    ///
    /// Fails with `NonContiguousGroup` if a label re-appears after a different one, i.e. the
    /// rows of one class are not stored in one block.
    pub fn from_sorted_labels(labels: &ArrayBase<impl Data<Elem = L>, Ix1>) -> Result<Self> {
        let mut blocks: BTreeMap<L, (usize, usize)> = BTreeMap::new();
        let mut current: Option<&L> = None;

        for (row, label) in labels.iter().enumerate() {
            if current == Some(label) {
                if let Some(block) = blocks.get_mut(label) {
                    block.1 += 1;
                }
                continue;
            }

            if blocks.contains_key(label) {
                return Err(Error::NonContiguousGroup(format!(
                    "label {:?} at row {} continues a block which ended before",
                    label, row
                )));
            }
            blocks.insert(label.clone(), (row, 1));
            current = Some(label);
        }

        Ok(GroupSpec { blocks })
    }

    /// First row of the class block
    pub fn group_start(&self, label: &L) -> Option<usize> {
        self.blocks.get(label).map(|(start, _)| *start)
    }

    /// One past the last row of the class block
    pub fn group_end(&self, label: &L) -> Option<usize> {
        self.blocks.get(label).map(|(start, size)| start + size)
    }

    pub fn group_size(&self, label: &L) -> Option<usize> {
        self.blocks.get(label).map(|(_, size)| *size)
    }

    pub fn range(&self, label: &L) -> Option<Range<usize>> {
        self.blocks.get(label).map(|(start, size)| *start..start + size)
    }

    /// Iterates `(label, rows)` in label order
    pub fn iter(&self) -> impl Iterator<Item = (&L, Range<usize>)> + '_ {
        self.blocks
            .iter()
            .map(|(label, (start, size))| (label, *start..start + size))
    }

    pub fn labels(&self) -> impl Iterator<Item = &L> + '_ {
        self.blocks.keys()
    }

    /// Number of classes
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}
