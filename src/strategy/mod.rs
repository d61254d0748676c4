//! Split search strategies
//!
//! A split is searched in two steps: the [dimensionality reduction](dr) strategy picks the
//! feature columns, then the [projection pursuit](pp) strategy finds the separating projection
//! on those columns.
pub mod dr;
pub mod pp;

pub use dr::{DimensionReduction, DrSelection};
pub use pp::{Glda, ProjectionPursuit};
