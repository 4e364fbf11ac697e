//! Masked arrays: values plus a parallel validity mask.

use ndarray::{Array2, Array3, ArrayView2, Axis};
use serde::{Serialize, Serializer};
use stmap_common::{StmapError, StmapResult};

/// A `[band, row, col]` array with a mask marking invalid cells.
///
/// Masked cells hold no meaningful value and are skipped by every
/// reduction.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskedArray {
    data: Array3<f64>,
    mask: Array3<bool>,
}

impl MaskedArray {
    pub fn new(data: Array3<f64>, mask: Array3<bool>) -> StmapResult<Self> {
        if data.shape() != mask.shape() {
            return Err(StmapError::InternalError(format!(
                "mask shape {:?} does not match data shape {:?}",
                mask.shape(),
                data.shape()
            )));
        }
        Ok(Self { data, mask })
    }

    /// Wrap `data`, masking cells where `is_masked` holds.
    pub fn from_data(data: Array3<f64>, is_masked: impl Fn(f64) -> bool) -> Self {
        let mask = data.mapv(is_masked);
        Self { data, mask }
    }

    /// An array of `shape` with every cell masked.
    pub fn fully_masked(shape: (usize, usize, usize)) -> Self {
        Self {
            data: Array3::from_elem(shape, f64::NAN),
            mask: Array3::from_elem(shape, true),
        }
    }

    /// `(bands, rows, cols)`.
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    pub fn data(&self) -> &Array3<f64> {
        &self.data
    }

    pub fn mask(&self) -> &Array3<bool> {
        &self.mask
    }

    pub fn into_parts(self) -> (Array3<f64>, Array3<bool>) {
        (self.data, self.mask)
    }

    /// Value at `(band, row, col)`, `None` when masked.
    pub fn get(&self, band: usize, row: usize, col: usize) -> Option<f64> {
        let idx = (band, row, col);
        match self.mask.get(idx) {
            Some(false) => self.data.get(idx).copied(),
            _ => None,
        }
    }

    pub fn valid_count(&self) -> usize {
        self.mask.iter().filter(|m| !**m).count()
    }

    pub fn is_fully_masked(&self) -> bool {
        self.mask.iter().all(|m| *m)
    }

    /// One band's values and mask.
    pub fn band(&self, band: usize) -> (ArrayView2<'_, f64>, ArrayView2<'_, bool>) {
        (
            self.data.index_axis(Axis(0), band),
            self.mask.index_axis(Axis(0), band),
        )
    }

    /// Nested `[band][row][col]` lists with `None` for masked cells.
    pub fn to_nested(&self) -> Vec<Vec<Vec<Option<f64>>>> {
        let (bands, rows, cols) = self.dim();
        (0..bands)
            .map(|b| {
                (0..rows)
                    .map(|r| (0..cols).map(|c| self.get(b, r, c)).collect())
                    .collect()
            })
            .collect()
    }
}

impl Serialize for MaskedArray {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_nested().serialize(serializer)
    }
}

/// Fractional coverage of each `[row, col]` cell by a region.
pub type WeightMask = Array2<f64>;
