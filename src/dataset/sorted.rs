use std::collections::{BTreeMap, BTreeSet};
use std::ops::Deref;

use ndarray::{s, ArrayView1, ArrayView2};

use super::{DataSpec, Float, GroupSpec, Label};
use crate::error::{Error, Result};

/// Labelled observations stored in class-contiguous blocks
///
/// On construction the rows are stably sorted by label, so that every class occupies one
/// block of rows and rows of the same class keep their relative order. The block index is
/// available through [`SortedDataSpec::groups`].
#[derive(Debug, Clone, PartialEq)]
pub struct SortedDataSpec<F, L> {
    data: DataSpec<F, L>,
    groups: GroupSpec<L>,
}

impl<F: Float, L: Label> SortedDataSpec<F, L> {
    pub fn new(data: DataSpec<F, L>) -> Result<Self> {
        let y = data.y();
        let mut order = (0..data.nrows()).collect::<Vec<_>>();
        // `sort_by` is stable
        order.sort_by(|a, b| y[*a].cmp(&y[*b]));

        let data = if order.iter().enumerate().all(|(i, row)| i == *row) {
            data
        } else {
            data.select(&order)
        };
        let groups = GroupSpec::from_sorted_labels(&data.y())?;

        Ok(SortedDataSpec { data, groups })
    }

    pub fn groups(&self) -> &GroupSpec<L> {
        &self.groups
    }

    /// Classes which have at least one row
    pub fn present_classes(&self) -> BTreeSet<L> {
        self.groups.labels().cloned().collect()
    }

    /// Feature rows of a class block
    pub fn group(&self, label: &L) -> Result<ArrayView2<F>> {
        let range = self
            .groups
            .range(label)
            .ok_or_else(|| Error::Parameters(format!("class {:?} has no rows", label)))?;

        Ok(self.data.x().slice_move(s![range, ..]))
    }

    /// Mean of the rows of a class block
    pub fn group_mean(&self, label: &L) -> Result<ndarray::Array1<F>> {
        let rows = self.group(label)?;
        rows.mean_axis(ndarray::Axis(0))
            .ok_or_else(|| Error::Parameters(format!("class {:?} has no rows", label)))
    }

    /// Keeps only the rows of the listed classes
    ///
    /// The blocks stay in label order, the result is class-contiguous as well.
    pub fn subset(&self, classes: &BTreeSet<L>) -> Result<Self> {
        let mut indices = Vec::new();
        for label in classes {
            let range = self.groups.range(label).ok_or_else(|| {
                Error::Parameters(format!("cannot subset on class {:?} without rows", label))
            })?;
            indices.extend(range);
        }

        let data = self.data.select(&indices);
        let (x, y, _) = data.into_parts();
        let data = DataSpec::with_classes(x, y, classes.clone())?;
        let groups = GroupSpec::from_sorted_labels(&data.y())?;

        Ok(SortedDataSpec { data, groups })
    }

    /// Relabels the rows with `mapping`, merging classes which map to the same label
    ///
    /// Classes missing in `mapping` keep their label. Blocks merged into one new class are
    /// concatenated in the order of their original position, so the result is again stored in
    /// class-contiguous blocks.
    pub fn remap(&self, mapping: &BTreeMap<L, L>) -> Result<Self> {
        let target = |label: &L| mapping.get(label).unwrap_or(label).clone();

        let mut merged: BTreeMap<L, Vec<(usize, usize)>> = BTreeMap::new();
        for (label, range) in self.groups.iter() {
            merged
                .entry(target(label))
                .or_default()
                .push((range.start, range.end));
        }

        let mut indices = Vec::with_capacity(self.nrows());
        let mut labels = Vec::with_capacity(self.nrows());
        for (label, mut blocks) in merged {
            blocks.sort_unstable();
            for (start, end) in blocks {
                indices.extend(start..end);
                labels.extend(std::iter::repeat(label.clone()).take(end - start));
            }
        }

        let classes = self.data.classes().iter().map(target).collect();
        let x = self.data.x().select(ndarray::Axis(0), &indices);
        let data = DataSpec::with_classes(x, labels.into(), classes)?;
        let groups = GroupSpec::from_sorted_labels(&data.y())?;

        Ok(SortedDataSpec { data, groups })
    }

    /// Keeps only the given feature columns, blocks are unchanged
    pub fn select_columns(&self, columns: &[usize]) -> Self {
        SortedDataSpec {
            data: self.data.select_columns(columns),
            groups: self.groups.clone(),
        }
    }

    /// Labels of the class blocks in row order
    pub fn labels(&self) -> ArrayView1<L> {
        self.data.y()
    }

    pub fn as_data(&self) -> &DataSpec<F, L> {
        &self.data
    }

    pub fn into_data(self) -> DataSpec<F, L> {
        self.data
    }
}

impl<F, L> Deref for SortedDataSpec<F, L> {
    type Target = DataSpec<F, L>;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array1};

    fn shuffled() -> SortedDataSpec<f64, usize> {
        let x = array![[0.], [1.], [2.], [3.], [4.], [5.], [6.]];
        let y = array![2usize, 0, 1, 0, 2, 1, 0];
        SortedDataSpec::new(DataSpec::new(x, y).unwrap()).unwrap()
    }

    fn assert_contiguous(data: &SortedDataSpec<f64, usize>) {
        let mut covered = 0;
        for (label, range) in data.groups().iter() {
            assert_eq!(range.start, covered);
            assert!(data.labels().slice(s![range.clone()]).iter().all(|l| l == label));
            assert_eq!(
                data.groups().group_end(label).unwrap() - data.groups().group_start(label).unwrap(),
                data.groups().group_size(label).unwrap()
            );
            covered = range.end;
        }
        assert_eq!(covered, data.nrows());
    }

    #[test]
    fn stable_sort_by_label() {
        let data = shuffled();
        assert_contiguous(&data);
        assert_eq!(data.labels(), array![0usize, 0, 0, 1, 1, 2, 2]);
        assert_eq!(
            data.x().column(0),
            array![1.0f64, 3., 6., 2., 5., 0., 4.]
        );
        assert_eq!(data.group(&1).unwrap(), array![[2.0f64], [5.]]);
        assert_eq!(data.group_mean(&0).unwrap(), array![10.0f64 / 3.]);
        assert!(data.group(&7).is_err());
    }

    #[test]
    fn subset_keeps_listed_classes() {
        let data = shuffled();
        let classes = [0usize, 2].into_iter().collect::<BTreeSet<_>>();
        let sub = data.subset(&classes).unwrap();

        assert_contiguous(&sub);
        assert_eq!(sub.classes(), &classes);
        assert_eq!(sub.labels(), array![0usize, 0, 0, 2, 2]);
        assert_eq!(sub.x().column(0), array![1.0f64, 3., 6., 0., 4.]);
    }

    #[test]
    fn subset_rejects_class_without_rows() {
        let data = shuffled();
        let classes = [0usize, 5].into_iter().collect::<BTreeSet<_>>();
        assert!(matches!(data.subset(&classes), Err(Error::Parameters(_))));
    }

    #[test]
    fn remap_merges_blocks_in_row_order() {
        let data = shuffled();
        let mapping = [(0usize, 0usize), (1, 1), (2, 0)].into_iter().collect();
        let merged = data.remap(&mapping).unwrap();

        assert_contiguous(&merged);
        assert_eq!(merged.labels(), array![0usize, 0, 0, 0, 0, 1, 1]);
        assert_eq!(
            merged.x().column(0),
            array![1.0f64, 3., 6., 0., 4., 2., 5.]
        );
        assert_eq!(merged.classes().len(), 2);
    }

    #[test]
    fn remap_with_empty_mapping_is_identity() {
        let data = shuffled();
        let same = data.remap(&BTreeMap::new()).unwrap();
        assert_eq!(same, data);
    }

    #[test]
    fn empty_data_sorts() {
        let x = ndarray::Array2::<f64>::zeros((0, 3));
        let y: Array1<usize> = Array1::from_vec(vec![]);
        let data = SortedDataSpec::new(DataSpec::new(x, y).unwrap()).unwrap();
        assert!(data.groups().is_empty());
        assert!(data.is_empty());
    }
}
