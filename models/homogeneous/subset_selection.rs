use crate::utils::squared_norm;
use itertools::Itertools;
use ndarray::{Array2, ArrayBase, ArrayView2, Axis, Data, Ix2, s};
use ndarray_linalg::{SVD, error::LinalgError};
use thiserror::Error;

/// Errors raised by subset selection and the conditioning drivers.
///
/// Every variant except `LinalgError` describes a malformed call (an invalid
/// argument). Singular inputs and unreachable thresholds are not errors; the
/// drivers return the best subset they can find instead.
#[derive(Error, Debug)]
pub enum ConditioningError {
    #[error(
        "Cannot select {requested} columns from a matrix with {available} columns; expected 1 <= n < {available}."
    )]
    InvalidSubsetSize { requested: usize, available: usize },

    #[error("Matrix must have at least one row and one column, but has shape ({rows}, {cols}).")]
    EmptyMatrix { rows: usize, cols: usize },

    #[error("Matrix contains non-finite entries; conditioning requires finite values.")]
    NonFiniteEntries,

    #[error("Condition number threshold must not be NaN (got {0}).")]
    InvalidThreshold(f64),

    #[error("The SVD did not return right singular vectors.")]
    MissingRightSingularVectors,

    #[error("Singular value decomposition failed: {0}")]
    LinalgError(#[from] LinalgError),
}

/// Calculate the condition number of a matrix from its singular values.
///
/// The ratio runs over the `min(rows, cols)` singular values. A matrix whose
/// smallest singular value falls below `max_sv * eps * max(rows, cols)` is
/// treated as numerically singular and reported as `f64::INFINITY`.
pub fn condition_number<S>(matrix: &ArrayBase<S, Ix2>) -> Result<f64, ConditioningError>
where
    S: Data<Elem = f64>,
{
    validate_matrix(matrix)?;
    let (_, singular_values, _) = matrix.svd(false, false)?;

    let max_sv = singular_values.iter().fold(0.0_f64, |max, &val| max.max(val));
    let min_sv = singular_values
        .iter()
        .fold(f64::INFINITY, |min, &val| min.min(val));

    let (rows, cols) = matrix.dim();
    let tolerance = max_sv * f64::EPSILON * rows.max(cols) as f64;
    if max_sv == 0.0 || min_sv <= tolerance {
        return Ok(f64::INFINITY);
    }

    Ok(max_sv / min_sv)
}

/// Selects `n` linearly independent columns of `x`.
///
/// The leading right singular vectors of `x` are passed through a
/// column-pivoted QR factorization; the first `n` pivots are the columns that
/// best span the dominant row space. When a column is (nearly) a linear
/// combination of others, one of the columns involved in that dependency is
/// left out.
///
/// # Arguments
/// * `x` - The design matrix. It is never modified.
/// * `n` - The number of columns to keep. Must satisfy `1 <= n < x.ncols()`;
///   selecting every column is left to the caller.
///
/// # Returns
/// The selected column indices, sorted ascending.
pub fn svd_subset_selection<S>(x: &ArrayBase<S, Ix2>, n: usize) -> Result<Vec<usize>, ConditioningError>
where
    S: Data<Elem = f64>,
{
    validate_matrix(x)?;
    let cols = x.ncols();
    if n < 1 || n >= cols {
        return Err(ConditioningError::InvalidSubsetSize {
            requested: n,
            available: cols,
        });
    }

    let (vt, rank_bound) = internal::right_singular_vectors(x)?;
    Ok(internal::select_from_right_singular_vectors(
        vt.view(),
        rank_bound,
        n,
    ))
}

/// Conditions `x` by removing one column at a time.
///
/// Starting from every column, the least informative column (as judged by
/// [`svd_subset_selection`]) is dropped until the condition number of the
/// remaining columns is at most `kappa` or a single column is left.
///
/// Returns a freshly allocated sub-matrix together with the original indices
/// of its columns.
pub fn backward_subset_selection_conditioning<S>(
    x: &ArrayBase<S, Ix2>,
    kappa: f64,
) -> Result<(Array2<f64>, Vec<usize>), ConditioningError>
where
    S: Data<Elem = f64>,
{
    validate_threshold(kappa)?;
    validate_matrix(x)?;

    let mut columns: Vec<usize> = (0..x.ncols()).collect();
    let mut conditioned = x.to_owned();

    loop {
        let kappa_actual = condition_number(&conditioned)?;
        log::debug!(
            "Backward conditioning: {} active columns, condition number {:.3e} (target {:.3e})",
            columns.len(),
            kappa_actual,
            kappa
        );

        if kappa_actual <= kappa {
            break;
        }
        if columns.len() == 1 {
            log::warn!(
                "Backward conditioning reached a single column with condition number {:.3e} > {:.3e}",
                kappa_actual,
                kappa
            );
            break;
        }

        let keep = svd_subset_selection(&conditioned, columns.len() - 1)?;
        columns = keep.iter().map(|&local| columns[local]).collect();
        conditioned = conditioned.select(Axis(1), &keep);
    }

    log::info!(
        "Backward conditioning kept {} of {} columns",
        columns.len(),
        x.ncols()
    );
    Ok((conditioned, columns))
}

/// Conditions `x` by growing a column selection.
///
/// If `x` already satisfies `kappa` it is returned whole. Otherwise subsets
/// of size 1, 2, ... are selected from the right singular vectors of `x`, and
/// the largest subset whose condition number stays at most `kappa` is kept.
/// When even a single column exceeds `kappa`, that column is returned as the
/// best achievable result.
pub fn forward_subset_selection_conditioning<S>(
    x: &ArrayBase<S, Ix2>,
    kappa: f64,
) -> Result<(Array2<f64>, Vec<usize>), ConditioningError>
where
    S: Data<Elem = f64>,
{
    validate_threshold(kappa)?;
    validate_matrix(x)?;

    let cols = x.ncols();
    let full_condition = condition_number(x)?;
    if full_condition <= kappa || cols == 1 {
        if full_condition > kappa {
            log::warn!(
                "Forward conditioning: single-column matrix has condition number {:.3e} > {:.3e}",
                full_condition,
                kappa
            );
        }
        return Ok((x.to_owned(), (0..cols).collect()));
    }

    // One decomposition serves every subset size.
    let (vt, rank_bound) = internal::right_singular_vectors(x)?;

    let mut columns = internal::select_from_right_singular_vectors(vt.view(), rank_bound, 1);
    let seed_condition = condition_number(&x.select(Axis(1), &columns))?;
    if seed_condition > kappa {
        log::warn!(
            "Forward conditioning: best single column has condition number {:.3e} > {:.3e}",
            seed_condition,
            kappa
        );
        return Ok((x.select(Axis(1), &columns), columns));
    }

    for n in 2..cols {
        let candidate = internal::select_from_right_singular_vectors(vt.view(), rank_bound, n);
        let kappa_actual = condition_number(&x.select(Axis(1), &candidate))?;
        log::debug!(
            "Forward conditioning: {} candidate columns, condition number {:.3e} (target {:.3e})",
            n,
            kappa_actual,
            kappa
        );
        if kappa_actual > kappa {
            break;
        }
        columns = candidate;
    }

    log::info!(
        "Forward conditioning kept {} of {} columns",
        columns.len(),
        cols
    );
    Ok((x.select(Axis(1), &columns), columns))
}

fn validate_matrix<S>(matrix: &ArrayBase<S, Ix2>) -> Result<(), ConditioningError>
where
    S: Data<Elem = f64>,
{
    let (rows, cols) = matrix.dim();
    if rows == 0 || cols == 0 {
        return Err(ConditioningError::EmptyMatrix { rows, cols });
    }
    if matrix.iter().any(|value| !value.is_finite()) {
        return Err(ConditioningError::NonFiniteEntries);
    }
    Ok(())
}

fn validate_threshold(kappa: f64) -> Result<(), ConditioningError> {
    if kappa.is_nan() {
        return Err(ConditioningError::InvalidThreshold(kappa));
    }
    Ok(())
}

mod internal {
    use super::*;

    /// Full `Vᵀ` of `x` plus the number of rows that carry singular values.
    pub(super) fn right_singular_vectors<S>(
        x: &ArrayBase<S, Ix2>,
    ) -> Result<(Array2<f64>, usize), ConditioningError>
    where
        S: Data<Elem = f64>,
    {
        let (_, singular_values, vt) = x.svd(false, true)?;
        let vt = vt.ok_or(ConditioningError::MissingRightSingularVectors)?;
        Ok((vt, singular_values.len()))
    }

    /// Pivots the leading `min(n, rank_bound)` rows of `vt` and keeps `n` columns.
    pub(super) fn select_from_right_singular_vectors(
        vt: ArrayView2<f64>,
        rank_bound: usize,
        n: usize,
    ) -> Vec<usize> {
        let leading = n.min(rank_bound);
        let order = pivoted_qr_column_order(vt.slice(s![..leading, ..]));
        order.into_iter().take(n).sorted_unstable().collect()
    }

    /// Column order produced by Householder QR with Businger-Golub pivoting.
    ///
    /// At each step the column with the largest remaining norm is moved into
    /// place; ties go to the lowest current position.
    pub(super) fn pivoted_qr_column_order(block: ArrayView2<f64>) -> Vec<usize> {
        let (rows, cols) = block.dim();
        let mut r = block.to_owned();
        let mut order: Vec<usize> = (0..cols).collect();
        let mut norms: Vec<f64> = r.columns().into_iter().map(|c| squared_norm(&c)).collect();

        for k in 0..rows.min(cols) {
            let pivot = (k..cols).fold(k, |best, j| if norms[j] > norms[best] { j } else { best });
            if pivot != k {
                let (left, right) = r.multi_slice_mut((s![.., k], s![.., pivot]));
                ndarray::Zip::from(left)
                    .and(right)
                    .for_each(|a, b| std::mem::swap(a, b));
                order.swap(k, pivot);
                norms.swap(k, pivot);
            }

            let mut reflector = r.slice(s![k.., k]).to_owned();
            let column_norm = squared_norm(&reflector).sqrt();
            if column_norm > 0.0 {
                let alpha = if reflector[0] >= 0.0 {
                    -column_norm
                } else {
                    column_norm
                };
                reflector[0] -= alpha;
                let reflector_sq = squared_norm(&reflector);
                if reflector_sq > 0.0 {
                    let projections = reflector.dot(&r.slice(s![k.., k..]));
                    let mut trailing = r.slice_mut(s![k.., k..]);
                    for (mut column, &projection) in
                        trailing.columns_mut().into_iter().zip(projections.iter())
                    {
                        column.scaled_add(-2.0 * projection / reflector_sq, &reflector);
                    }
                }
            }

            // Norms are recomputed rather than downdated to avoid cancellation.
            for j in (k + 1)..cols {
                norms[j] = squared_norm(&r.slice(s![(k + 1).., j]));
            }
        }

        order
    }
}
