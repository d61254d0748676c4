use ndarray::{Array1, Array2, ArrayBase, Axis, Data, Ix2};

use super::Float;
use crate::error::{Error, Result};

/// Column-wise centering and scaling
///
/// Learns the mean and the sample standard deviation (one degree of freedom) of every column.
/// Columns without spread are scaled by one, so constant columns map to zero instead of NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct Standardization<F> {
    mean: Array1<F>,
    std: Array1<F>,
}

impl<F: Float> Standardization<F> {
    pub fn fit(x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Self> {
        let mean = x.mean_axis(Axis(0)).ok_or_else(|| {
            Error::Parameters("cannot standardize data without rows".to_string())
        })?;

        let std = if x.nrows() < 2 {
            Array1::ones(x.ncols())
        } else {
            x.std_axis(Axis(0), F::one())
                .mapv(|s| if s > F::zero() { s } else { F::one() })
        };

        Ok(Standardization { mean, std })
    }

    /// Column means
    pub fn mean(&self) -> &Array1<F> {
        &self.mean
    }

    /// Column scales, strictly positive
    pub fn std(&self) -> &Array1<F> {
        &self.std
    }

    pub fn transform(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array2<F> {
        (x - &self.mean) / &self.std
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn centers_and_scales_columns() {
        let x = array![[1.0f64, 10., 5.], [2., 20., 5.], [3., 30., 5.]];
        let scale = Standardization::fit(&x).unwrap();

        assert_abs_diff_eq!(scale.mean(), &array![2.0f64, 20., 5.], epsilon = 1e-12);
        assert_abs_diff_eq!(scale.std(), &array![1.0f64, 10., 1.], epsilon = 1e-12);

        let z = scale.transform(&x);
        assert_abs_diff_eq!(
            z,
            array![[-1.0f64, -1., 0.], [0., 0., 0.], [1., 1., 0.]],
            epsilon = 1e-12
        );
    }

    #[test]
    fn single_row_has_unit_scale() {
        let scale = Standardization::fit(&array![[4.0f64, -2.0]]).unwrap();
        assert_eq!(scale.std(), &array![1.0f64, 1.]);
    }

    #[test]
    fn empty_data_is_rejected() {
        let x = Array2::<f64>::zeros((0, 2));
        assert!(Standardization::fit(&x).is_err());
    }
}
