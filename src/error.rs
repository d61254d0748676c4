//! Error types in ppforest
//!

use thiserror::Error;

use ndarray::ShapeError;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error("invalid parameter {0}")]
    Parameters(String),
    #[error("shape mismatch in {context}: expected {expected}, found {found}")]
    ShapeMismatch {
        context: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("labels are not grouped into contiguous blocks: {0}")]
    NonContiguousGroup(String),
    #[error("degenerate split: {0}")]
    DegenerateSplit(String),
    #[error("tree training failed after {retries} retries: {source}")]
    RetriesExhausted {
        retries: usize,
        #[source]
        source: Box<Error>,
    },
    #[error("training data is not available: {0}")]
    MissingTrainingData(String),
    #[error("unsupported variable importance: {0}")]
    UnsupportedImportance(String),
    #[error("could not build thread pool: {0}")]
    ThreadPool(String),
    #[error("linear algebra failure: {0}")]
    Linalg(String),
    #[error("invalid ndarray shape {0}")]
    NdShape(#[from] ShapeError),
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl From<linfa_linalg::LinalgError> for Error {
    fn from(err: linfa_linalg::LinalgError) -> Self {
        Error::Linalg(err.to_string())
    }
}

#[cfg(feature = "serde")]
impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl Error {
    /// Returns true for the errors a forest recovers from by redrawing the bootstrap sample
    pub fn is_degenerate(&self) -> bool {
        matches!(self, Error::DegenerateSplit(_))
    }
}
