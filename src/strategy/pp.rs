//! Projection pursuit
//!
//! A projection pursuit strategy searches for the one-dimensional linear projection which
//! separates the classes of a dataset best with respect to a separability index.
use linfa_linalg::eigh::Eigh;
use ndarray::{s, Array1, Array2, ArrayBase, Axis, Data, Ix1};

#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

use crate::dataset::{Float, Label, SortedDataSpec};
use crate::error::{Error, Result};

/// Coefficients with a smaller magnitude are set to zero in an optimized projector
pub const COEFFICIENT_CUTOFF: f64 = 1e-15;

/// Optimization of a separating projection
pub trait ProjectionPursuit<F: Float> {
    /// Returns the unit-norm projector maximizing the separability index on `data`
    fn optimize<L: Label>(&self, data: &SortedDataSpec<F, L>) -> Result<Array1<F>>;

    /// Separability of the classes of `data` along `projector`, between 0 and 1
    fn index<L: Label>(
        &self,
        data: &SortedDataSpec<F, L>,
        projector: &ArrayBase<impl Data<Elem = F>, Ix1>,
    ) -> Result<F>;
}

/// Generalized linear discriminant analysis
///
/// Blends the within-class scatter `W` with its diagonal:
/// `Wλ = diag(W) + (1 - λ) (W - diag(W))`. With `λ = 0` the full scatter is used (classic LDA),
/// with `λ = 1` only the per-feature variances remain. The projector maximizes the ratio of the
/// between-class scatter `B` to `Wλ + B`.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Glda<F> {
    lambda: F,
}

impl<F: Float> Glda<F> {
    pub fn new(lambda: F) -> Self {
        Glda { lambda }
    }

    pub fn lambda(&self) -> F {
        self.lambda
    }

    /// Returns `(Wλ, B)` of the classes present in `data`
    fn scatter<L: Label>(&self, data: &SortedDataSpec<F, L>) -> Result<(Array2<F>, Array2<F>)> {
        let (within, between) = scatter_matrices(data)?;
        let diagonal = Array2::from_diag(&within.diag());
        let blended = &diagonal + &((&within - &diagonal) * (F::one() - self.lambda));

        Ok((blended, between))
    }
}

impl<F: Float> ProjectionPursuit<F> for Glda<F> {
    fn optimize<L: Label>(&self, data: &SortedDataSpec<F, L>) -> Result<Array1<F>> {
        let width = data.ncols();
        let active = varying_columns(data);
        if active.is_empty() {
            return Err(Error::DegenerateSplit(
                "every feature is constant on the node data".to_string(),
            ));
        }

        let reduced = data.select_columns(&active);
        let (within, between) = self.scatter(&reduced)?;
        let reduced_projector = solve_generalized(&(&within + &between), &between)?;

        let mut projector = Array1::zeros(width);
        for (coefficient, column) in reduced_projector.iter().zip(active.iter()) {
            projector[*column] = *coefficient;
        }

        Ok(canonicalize(projector))
    }

    fn index<L: Label>(
        &self,
        data: &SortedDataSpec<F, L>,
        projector: &ArrayBase<impl Data<Elem = F>, Ix1>,
    ) -> Result<F> {
        if projector.len() != data.ncols() {
            return Err(Error::ShapeMismatch {
                context: "projector width",
                expected: data.ncols(),
                found: projector.len(),
            });
        }

        let (within, between) = self.scatter(data)?;
        let numerator = projector.dot(&within.dot(projector));
        let denominator = numerator + projector.dot(&between.dot(projector));

        if denominator.abs() <= F::epsilon() {
            Ok(F::zero())
        } else {
            Ok(F::one() - numerator / denominator)
        }
    }
}

/// Within-class scatter `W` and between-class scatter `B` over the class blocks of `data`
pub(crate) fn scatter_matrices<F: Float, L: Label>(
    data: &SortedDataSpec<F, L>,
) -> Result<(Array2<F>, Array2<F>)> {
    let x = data.x();
    let width = x.ncols();
    let mean = x
        .mean_axis(Axis(0))
        .ok_or_else(|| Error::Parameters("cannot compute scatter without rows".to_string()))?;

    let mut within = Array2::zeros((width, width));
    let mut between = Array2::zeros((width, width));
    for (_, rows) in data.groups().iter() {
        let size = rows.len();
        let block = x.slice(s![rows, ..]);
        let group_mean = block
            .mean_axis(Axis(0))
            .ok_or_else(|| Error::Parameters("empty class block".to_string()))?;

        let centered = &block - &group_mean;
        within += &centered.t().dot(&centered);

        let offset = (&group_mean - &mean).insert_axis(Axis(1));
        between.scaled_add(F::cast(size), &offset.dot(&offset.t()));
    }

    Ok((within, between))
}

/// Columns with more than one distinct value
fn varying_columns<F: Float, L: Label>(data: &SortedDataSpec<F, L>) -> Vec<usize> {
    data.x()
        .axis_iter(Axis(1))
        .enumerate()
        .filter(|(_, column)| {
            column
                .iter()
                .next()
                .map(|first| column.iter().any(|value| value != first))
                .unwrap_or(false)
        })
        .map(|(idx, _)| idx)
        .collect()
}

/// Leading eigenvector of `A⁻¹B` for symmetric `A` (positive definite) and `B`
///
/// The problem is symmetrized with `A^{-1/2}`: the eigenvectors `u` of `A^{-1/2} B A^{-1/2}` map
/// back to eigenvectors `A^{-1/2} u` of `A⁻¹B` with the same eigenvalues. Among equal magnitudes
/// the lowest eigenvalue index is taken.
fn solve_generalized<F: Float>(a: &Array2<F>, b: &Array2<F>) -> Result<Array1<F>> {
    let (values, vectors) = a.eigh()?;

    let largest = values.iter().fold(F::zero(), |acc, v| acc.max(v.abs()));
    let smallest = values.iter().fold(F::infinity(), |acc, v| acc.min(*v));
    if largest <= F::zero() || smallest <= F::cast(a.nrows()) * F::epsilon() * largest {
        return Err(Error::DegenerateSplit(format!(
            "scatter matrix is singular (smallest eigenvalue {}, largest {})",
            smallest, largest
        )));
    }

    let inv_sqrt = vectors
        .dot(&Array2::from_diag(&values.mapv(|v| v.sqrt().recip())))
        .dot(&vectors.t());
    let reduced = inv_sqrt.dot(b).dot(&inv_sqrt);
    // symmetric up to rounding
    let reduced = (&reduced + &reduced.t()) * F::cast(0.5);

    let (values, vectors) = reduced.eigh()?;
    let mut leading = 0;
    for (idx, value) in values.iter().enumerate() {
        if value.abs() > values[leading].abs() {
            leading = idx;
        }
    }
    if values[leading].abs() <= F::cast(a.nrows()) * F::epsilon() {
        return Err(Error::DegenerateSplit(
            "classes are not separable on the node data".to_string(),
        ));
    }

    Ok(inv_sqrt.dot(&vectors.column(leading)))
}

/// Unit norm, negligible coefficients truncated to zero and a positive first coefficient
fn canonicalize<F: Float>(projector: Array1<F>) -> Array1<F> {
    let norm = projector.dot(&projector).sqrt();
    let cutoff = F::cast(COEFFICIENT_CUTOFF);
    let mut projector = projector.mapv(|c| {
        let c = c / norm;
        if c.abs() < cutoff {
            F::zero()
        } else {
            c
        }
    });

    if let Some(first) = projector.iter().find(|c| **c != F::zero()) {
        if *first < F::zero() {
            projector.mapv_inplace(|c| -c);
        }
    }

    projector
}
