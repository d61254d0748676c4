mod algorithm;
mod hyperparams;

pub use algorithm::*;
pub use hyperparams::*;

pub(crate) use algorithm::mix;
