use ndarray::{Array2, Array3, ArrayView1, Axis, Zip, s};
use serde::{Deserialize, Serialize};
use std::cell::OnceCell;
use std::str::FromStr;
use thiserror::Error;

/// Source of per-structure voxel masks in the common coordinate framework.
pub trait StructureAtlas {
    /// Boolean volume marking the voxels of `structure_id`, or `None` if the
    /// atlas has no such structure.
    fn structure_mask(&self, structure_id: u32) -> Option<Array3<bool>>;
}

#[derive(Error, Debug)]
pub enum MaskError {
    #[error("At least one structure id is required to build a mask.")]
    NoStructures,

    #[error("Structure {0} is not present in the atlas.")]
    UnknownStructure(u32),

    #[error("Structure {structure_id} has mask shape {found:?}, but {expected:?} was expected.")]
    ShapeMismatch {
        structure_id: u32,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("Hemisphere must be one of \"contra\", \"ipsi\", \"both\" or 1, 2, 3; got {0}.")]
    InvalidHemisphere(String),

    #[error("Masked vector has length {found}, but the mask selects {expected} voxels.")]
    LengthMismatch { expected: usize, found: usize },
}

/// Which side of the midline (last axis) a mask keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Hemisphere {
    /// Left hemisphere: voxels at or beyond the midline.
    Contra = 1,
    /// Right hemisphere: voxels before the midline. Injections are always here.
    Ipsi = 2,
    Both = 3,
}

impl Hemisphere {
    fn restrict(self, mask: &mut Array3<bool>) {
        let midline = mask.len_of(Axis(2)) / 2;
        match self {
            Hemisphere::Contra => mask.slice_mut(s![.., .., ..midline]).fill(false),
            Hemisphere::Ipsi => mask.slice_mut(s![.., .., midline..]).fill(false),
            Hemisphere::Both => {}
        }
    }
}

impl FromStr for Hemisphere {
    type Err = MaskError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "contra" => Ok(Hemisphere::Contra),
            "ipsi" => Ok(Hemisphere::Ipsi),
            "both" => Ok(Hemisphere::Both),
            other => Err(MaskError::InvalidHemisphere(other.to_string())),
        }
    }
}

impl TryFrom<u8> for Hemisphere {
    type Error = MaskError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Hemisphere::Contra),
            2 => Ok(Hemisphere::Ipsi),
            3 => Ok(Hemisphere::Both),
            other => Err(MaskError::InvalidHemisphere(other.to_string())),
        }
    }
}

/// Logical OR of the masks of every structure in `structure_ids`.
pub fn union_mask<A>(atlas: &A, structure_ids: &[u32]) -> Result<Array3<bool>, MaskError>
where
    A: StructureAtlas + ?Sized,
{
    let (&first, rest) = structure_ids
        .split_first()
        .ok_or(MaskError::NoStructures)?;
    let mut union = atlas
        .structure_mask(first)
        .ok_or(MaskError::UnknownStructure(first))?;

    for &structure_id in rest {
        let mask = atlas
            .structure_mask(structure_id)
            .ok_or(MaskError::UnknownStructure(structure_id))?;
        if mask.shape() != union.shape() {
            return Err(MaskError::ShapeMismatch {
                structure_id,
                expected: union.shape().to_vec(),
                found: mask.shape().to_vec(),
            });
        }
        Zip::from(&mut union)
            .and(&mask)
            .for_each(|voxel, &inside| *voxel |= inside);
    }

    Ok(union)
}

/// A union of atlas structures restricted to one hemisphere.
///
/// The boolean volume is computed from the atlas on first use and cached for
/// the lifetime of the mask.
pub struct Mask<'a, A: StructureAtlas + ?Sized> {
    atlas: &'a A,
    structure_ids: Vec<u32>,
    hemisphere: Hemisphere,
    mask: OnceCell<Array3<bool>>,
}

impl<'a, A: StructureAtlas + ?Sized> Mask<'a, A> {
    /// Mask over injection sites, which are always in the right hemisphere.
    pub fn source(atlas: &'a A, structure_ids: &[u32]) -> Self {
        Self::target(atlas, structure_ids, Hemisphere::Ipsi)
    }

    /// Mask over projection targets in the given hemisphere.
    pub fn target(atlas: &'a A, structure_ids: &[u32], hemisphere: Hemisphere) -> Self {
        Self {
            atlas,
            structure_ids: structure_ids.to_vec(),
            hemisphere,
            mask: OnceCell::new(),
        }
    }

    pub fn structure_ids(&self) -> &[u32] {
        &self.structure_ids
    }

    pub fn hemisphere(&self) -> Hemisphere {
        self.hemisphere
    }

    pub fn mask(&self) -> Result<&Array3<bool>, MaskError> {
        if let Some(mask) = self.mask.get() {
            return Ok(mask);
        }

        let mut mask = union_mask(self.atlas, &self.structure_ids)?;
        self.hemisphere.restrict(&mut mask);
        log::debug!(
            "Computed {:?} mask over {} structures: {} voxels",
            self.hemisphere,
            self.structure_ids.len(),
            mask.iter().filter(|&&inside| inside).count()
        );
        Ok(self.mask.get_or_init(|| mask))
    }

    pub fn ccf_shape(&self) -> Result<[usize; 3], MaskError> {
        let (x, y, z) = self.mask()?.dim();
        Ok([x, y, z])
    }

    /// Grid coordinates of every voxel inside the mask, one row per voxel, in
    /// row-major order.
    pub fn coordinates(&self) -> Result<Array2<usize>, MaskError> {
        let voxels: Vec<(usize, usize, usize)> = self
            .mask()?
            .indexed_iter()
            .filter(|&(_, &inside)| inside)
            .map(|(index, _)| index)
            .collect();

        let mut coordinates = Array2::zeros((voxels.len(), 3));
        for (mut row, (x, y, z)) in coordinates.rows_mut().into_iter().zip(voxels) {
            row[0] = x;
            row[1] = y;
            row[2] = z;
        }
        Ok(coordinates)
    }

    /// Flat row-major indices of the voxels inside the mask.
    pub fn key(&self) -> Result<Vec<usize>, MaskError> {
        Ok(self
            .mask()?
            .iter()
            .enumerate()
            .filter(|&(_, &inside)| inside)
            .map(|(flat, _)| flat)
            .collect())
    }

    /// Scatters a vector over the masked voxels back into a full volume.
    ///
    /// Voxels outside the mask are zero.
    pub fn map_to_ccf(&self, y: ArrayView1<f64>) -> Result<Array3<f64>, MaskError> {
        let mask = self.mask()?;
        let expected = mask.iter().filter(|&&inside| inside).count();
        if y.len() != expected {
            return Err(MaskError::LengthMismatch {
                expected,
                found: y.len(),
            });
        }

        let mut volume = Array3::zeros(mask.raw_dim());
        let mut values = y.iter();
        for (voxel, &inside) in volume.iter_mut().zip(mask.iter()) {
            if inside {
                if let Some(&value) = values.next() {
                    *voxel = value;
                }
            }
        }
        Ok(volume)
    }
}
