mod algorithm;
mod hyperparams;
mod iter;
mod node;
#[cfg(feature = "serde")]
mod serialize;

pub use algorithm::*;
pub use hyperparams::*;
pub use iter::*;
pub use node::*;

pub(crate) use algorithm::grow;
