//! `ppforest-datasets` provides synthetic labelled datasets ready to be used in the tests and
//! benchmarks of `ppforest`.
//!
//! ## Current State
//!
//! Gaussian blobs around a set of centroids, either unlabelled ([`generate::blobs`]) or with one
//! class label per centroid ([`generate::labelled_blobs`]). The generators return plain
//! `ndarray` arrays so that they can be fed to any `ppforest` constructor.
//!
//! ```
//! use ndarray::array;
//! use ndarray_rand::rand::SeedableRng;
//! use rand_xoshiro::Xoshiro256Plus;
//!
//! let mut rng = Xoshiro256Plus::seed_from_u64(42);
//! let centroids = array![[0., 0.], [10., 10.]];
//! let (x, y) = ppforest_datasets::labelled_blobs(25, &centroids, &mut rng);
//! assert_eq!(x.dim(), (50, 2));
//! assert_eq!(y.len(), 50);
//! ```

pub mod generate;

pub use generate::{blobs, labelled_blobs, shuffled_labelled_blobs};
