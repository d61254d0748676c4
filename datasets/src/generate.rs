//! Utility functions for randomly generating datasets

use ndarray::{s, Array, Array1, Array2, ArrayBase, Data, Ix1, Ix2};
use ndarray_rand::{
    rand::Rng,
    rand_distr::{Distribution, StandardNormal},
    RandomExt,
};

/// Special case of `blobs_with_distribution` with a standard normal distribution.
pub fn blobs(
    blob_size: usize,
    blob_centroids: &ArrayBase<impl Data<Elem = f64>, Ix2>,
    rng: &mut impl Rng,
) -> Array2<f64> {
    blobs_with_distribution(blob_size, blob_centroids, StandardNormal, rng)
}

/// Given an input matrix `blob_centroids`, with shape `(n_blobs, n_features)`,
/// generate `blob_size` data points (a "blob") around each of the blob centroids.
///
/// Rows are grouped by blob: the first `blob_size` rows belong to the first centroid and so on.
pub fn blobs_with_distribution(
    blob_size: usize,
    blob_centroids: &ArrayBase<impl Data<Elem = f64>, Ix2>,
    distribution: impl Distribution<f64> + Clone,
    rng: &mut impl Rng,
) -> Array2<f64> {
    let (n_centroids, n_features) = blob_centroids.dim();
    let mut blobs: Array2<f64> = Array2::zeros((n_centroids * blob_size, n_features));

    for (blob_index, blob_centroid) in blob_centroids.rows().into_iter().enumerate() {
        let blob = make_blob(blob_size, &blob_centroid, distribution.clone(), rng);

        let indexes = s![blob_index * blob_size..(blob_index + 1) * blob_size, ..];
        blobs.slice_mut(indexes).assign(&blob);
    }
    blobs
}

/// Gaussian blobs together with their class labels.
///
/// The label of a row is the index of the centroid it was drawn around, so a call with `k`
/// centroids produces a `k`-class classification problem with `blob_size` rows per class.
pub fn labelled_blobs(
    blob_size: usize,
    blob_centroids: &ArrayBase<impl Data<Elem = f64>, Ix2>,
    rng: &mut impl Rng,
) -> (Array2<f64>, Array1<usize>) {
    let records = blobs(blob_size, blob_centroids, rng);
    let targets = (0..blob_centroids.nrows())
        .flat_map(|label| std::iter::repeat(label).take(blob_size))
        .collect::<Array1<_>>();

    (records, targets)
}

/// Like [`labelled_blobs`] but the rows of the different classes are interleaved.
///
/// Useful to check that consumers do not rely on the input being sorted by label.
pub fn shuffled_labelled_blobs(
    blob_size: usize,
    blob_centroids: &ArrayBase<impl Data<Elem = f64>, Ix2>,
    rng: &mut impl Rng,
) -> (Array2<f64>, Array1<usize>) {
    let (records, targets) = labelled_blobs(blob_size, blob_centroids, rng);
    let n_blobs = blob_centroids.nrows();

    // row i of the output takes the (i / n_blobs)-th point of blob (i % n_blobs)
    let order = (0..records.nrows())
        .map(|i| (i % n_blobs) * blob_size + i / n_blobs)
        .collect::<Vec<_>>();

    (
        records.select(ndarray::Axis(0), &order),
        targets.select(ndarray::Axis(0), &order),
    )
}

/// Generate `blob_size` data points (a "blob") around `blob_centroid` using the given distribution.
fn make_blob(
    blob_size: usize,
    blob_centroid: &ArrayBase<impl Data<Elem = f64>, Ix1>,
    distribution: impl Distribution<f64>,
    rng: &mut impl Rng,
) -> Array2<f64> {
    let shape = (blob_size, blob_centroid.len());
    let origin_blob: Array2<f64> = Array::random_using(shape, distribution, rng);
    origin_blob + blob_centroid
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use ndarray_rand::rand::SeedableRng;
    use rand_xoshiro::Xoshiro256Plus;

    #[test]
    fn labels_follow_blob_order() {
        let mut rng = Xoshiro256Plus::seed_from_u64(3);
        let centroids = array![[0., 0.], [5., 5.], [-5., 5.]];
        let (x, y) = labelled_blobs(4, &centroids, &mut rng);

        assert_eq!(x.dim(), (12, 2));
        assert_eq!(y, array![0usize, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2]);
    }

    #[test]
    fn shuffled_blobs_interleave_labels() {
        let mut rng = Xoshiro256Plus::seed_from_u64(3);
        let centroids = array![[0.], [100.]];
        let (x, y) = shuffled_labelled_blobs(3, &centroids, &mut rng);

        assert_eq!(y, array![0usize, 1, 0, 1, 0, 1]);
        for (row, label) in x.rows().into_iter().zip(y.iter()) {
            assert_eq!(row[0] > 50., *label == 1);
        }
    }
}
