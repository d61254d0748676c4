//! ppforest prelude.
//!
//! This module contains the most used types, type aliases, traits and
//! functions that you can import easily as a group.
//!

#[doc(no_inline)]
pub use crate::error::{Error, Result};

#[doc(no_inline)]
pub use crate::traits::*;

#[doc(no_inline)]
pub use crate::param_guard::ParamGuard;

#[doc(no_inline)]
pub use crate::dataset::{
    BootstrapDataSpec, DataSpec, Float, GroupSpec, Label, SortedDataSpec, Standardization,
};

#[doc(no_inline)]
pub use crate::metrics_classification::{ConfusionMatrix, ToConfusionMatrix};

#[doc(no_inline)]
pub use crate::strategy::{DimensionReduction, Glda, ProjectionPursuit};

#[doc(no_inline)]
pub use crate::tree::{Tree, TreeNode, TreeParams};

#[doc(no_inline)]
pub use crate::forest::{BootstrapTree, Forest, ForestParams};

#[doc(no_inline)]
pub use crate::importance::{
    AdjustedProjectorImportance, PermutationImportance, ProjectorImportance, VariableImportance,
};
