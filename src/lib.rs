//! `ppforest` grows projection pursuit trees and forests for multi-class classification.
//!
//! A projection pursuit tree splits the classes reaching a node into two groups along a linear
//! projection of all (or a random subset of the) features. The projection is found by
//! generalized linear discriminant analysis, [`Glda`](strategy::Glda), which maximizes the
//! separation of the class means relative to the within-class scatter. A tree trained on `K`
//! classes has `K - 1` conditions and one response per class.
//!
//! A [`Forest`] grows trees on stratified bootstrap samples in parallel and classifies by
//! plurality vote. Training is reproducible: the randomness of every tree derives from the
//! forest seed and the tree index only.
//!
//! ## Example
//!
//! ```rust
//! use ppforest::prelude::*;
//! use ndarray::array;
//!
//! let data = DataSpec::new(
//!     array![[1.0, 0.2], [1.1, 0.1], [0.8, 0.3], [3.0, 2.9], [3.2, 3.1], [2.9, 3.3]],
//!     array!["a".to_string(), "a".into(), "a".into(), "b".into(), "b".into(), "b".into()],
//! ).unwrap();
//!
//! let tree = Tree::params().fit(&data).unwrap();
//! assert_eq!(tree.predict(&array![[3.1, 3.0]]), array!["b".to_string()]);
//!
//! let forest = Forest::params(10).seed(7).fit(&data).unwrap();
//! assert_eq!(forest.predict(&array![[0.9, 0.1]]), array!["a".to_string()]);
//! ```
//!
//! ## Features
//!
//! * `serde` (default): serialization of hyperparameters and the JSON model format, see
//!   [`Tree::to_json`] and [`Forest::to_json`]

pub mod dataset;
pub mod error;
pub mod forest;
pub mod importance;
mod metrics_classification;
mod param_guard;
pub mod prelude;
pub mod strategy;
pub mod traits;
pub mod tree;

pub use dataset::{DataSpec, Float, Label};
pub use error::{Error, Result};
pub use forest::{BootstrapTree, Forest, ForestParams, ForestValidParams};
pub use param_guard::ParamGuard;
pub use tree::{Tree, TreeParams, TreeValidParams};

/// Common metrics functions for classification
pub mod metrics {
    pub use crate::metrics_classification::{ConfusionMatrix, ToConfusionMatrix};
}
