//! Array helpers shared by the voxel model and the conditioning code.

use ahash::AHashMap;
use itertools::Itertools;
use ndarray::{Array2, ArrayBase, ArrayView2, Data, Dimension, s};
use std::fmt::Debug;
use std::hash::Hash;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UtilsError {
    #[error("lex_order must not contain duplicates, but {0} appears more than once.")]
    DuplicateInLexOrder(String),

    #[error("lex_order contains {0}, which is not present in the array; pass allow_extra to ignore it.")]
    ExtraInLexOrder(String),

    #[error("Key has length {key_len}, but the volume has {columns} columns.")]
    KeyShapeMismatch { key_len: usize, columns: usize },
}

/// Distinct values together with where they first occur and how often.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueCounts<T> {
    pub values: Vec<T>,
    /// Position of the first occurrence of each value in the input.
    pub index: Vec<usize>,
    pub counts: Vec<usize>,
}

/// Sum of squared elements, i.e. the squared Euclidean (Frobenius) norm.
pub fn squared_norm<S, D>(array: &ArrayBase<S, D>) -> f64
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    array.iter().map(|&x| x * x).sum()
}

/// Sorted distinct values, skipping `T::default()` (zero for numeric types).
pub fn nonzero_unique<T>(values: &[T]) -> Vec<T>
where
    T: Copy + Ord + Default,
{
    values
        .iter()
        .copied()
        .filter(|value| *value != T::default())
        .sorted_unstable()
        .dedup()
        .collect()
}

/// Distinct values in order of first appearance.
pub fn ordered_unique<T>(values: &[T]) -> UniqueCounts<T>
where
    T: Copy + Eq + Hash,
{
    let mut position: AHashMap<T, usize> = AHashMap::new();
    let mut unique = UniqueCounts {
        values: Vec::new(),
        index: Vec::new(),
        counts: Vec::new(),
    };

    for (i, &value) in values.iter().enumerate() {
        match position.get(&value) {
            Some(&slot) => unique.counts[slot] += 1,
            None => {
                position.insert(value, unique.values.len());
                unique.values.push(value);
                unique.index.push(i);
                unique.counts.push(1);
            }
        }
    }

    unique
}

/// Distinct values of `values`, ordered as they appear in `lex_order`.
///
/// Values missing from `lex_order` are left out of the result. A value in
/// `lex_order` that never occurs in `values` is an error unless
/// `allow_extra` is set, in which case it is skipped.
pub fn lex_ordered_unique<T>(
    values: &[T],
    lex_order: &[T],
    allow_extra: bool,
) -> Result<UniqueCounts<T>, UtilsError>
where
    T: Copy + Eq + Hash + Debug,
{
    if let Some(duplicate) = lex_order.iter().duplicates().next() {
        return Err(UtilsError::DuplicateInLexOrder(format!("{duplicate:?}")));
    }

    let first_seen = ordered_unique(values);
    let slots: AHashMap<T, usize> = first_seen
        .values
        .iter()
        .enumerate()
        .map(|(slot, &value)| (value, slot))
        .collect();

    let mut unique = UniqueCounts {
        values: Vec::with_capacity(lex_order.len()),
        index: Vec::with_capacity(lex_order.len()),
        counts: Vec::with_capacity(lex_order.len()),
    };
    for value in lex_order {
        match slots.get(value) {
            Some(&slot) => {
                unique.values.push(*value);
                unique.index.push(first_seen.index[slot]);
                unique.counts.push(first_seen.counts[slot]);
            }
            None if allow_extra => continue,
            None => return Err(UtilsError::ExtraInLexOrder(format!("{value:?}"))),
        }
    }

    Ok(unique)
}

/// Places `blocks` along the diagonal of a zero matrix.
///
/// The result has as many rows as all blocks combined and as many columns as
/// all blocks combined; blocks need not be square.
pub fn padded_diagonal_fill(blocks: &[Array2<f64>]) -> Array2<f64> {
    let rows: usize = blocks.iter().map(|block| block.nrows()).sum();
    let cols: usize = blocks.iter().map(|block| block.ncols()).sum();
    let mut filled = Array2::zeros((rows, cols));

    let (mut row, mut col) = (0, 0);
    for block in blocks {
        let (height, width) = block.dim();
        filled
            .slice_mut(s![row..row + height, col..col + width])
            .assign(block);
        row += height;
        col += width;
    }

    filled
}

/// Sums the columns of `volume` that share a nonzero `key`.
///
/// `volume` is `rows x voxels` and `key` assigns a structure to each voxel.
/// Output columns follow ascending key order; voxels keyed zero are dropped.
pub fn unionize(volume: ArrayView2<f64>, key: &[i64]) -> Result<Array2<f64>, UtilsError> {
    if key.len() != volume.ncols() {
        return Err(UtilsError::KeyShapeMismatch {
            key_len: key.len(),
            columns: volume.ncols(),
        });
    }

    let structures = nonzero_unique(key);
    let slots: AHashMap<i64, usize> = structures
        .iter()
        .enumerate()
        .map(|(slot, &structure)| (structure, slot))
        .collect();

    let mut unionized = Array2::zeros((volume.nrows(), structures.len()));
    for (voxel, structure) in key.iter().enumerate() {
        if let Some(&slot) = slots.get(structure) {
            let mut target = unionized.column_mut(slot);
            target += &volume.column(voxel);
        }
    }

    Ok(unionized)
}
