//! Arrays with a per-element validity mask.
//!
//! The mask follows the masked-array convention used for geophysical data:
//! `true` marks an element as masked (missing or invalid). The data slot of a
//! masked element is never read by this crate; outputs store `NaN` there.

use crate::error::{RateError, Result};
use ndarray::{Array, Array2, Axis, Dimension, Ix2, IxDyn, NdIndex, Zip};

#[derive(Debug, Clone, PartialEq)]
pub struct MaskedArray<D: Dimension> {
    data: Array<f64, D>,
    mask: Array<bool, D>,
}

pub type MaskedArray2 = MaskedArray<Ix2>;

impl<D: Dimension> MaskedArray<D> {
    /// Wrap `data` with every element valid.
    pub fn from_data(data: Array<f64, D>) -> Self {
        let mask = Array::from_elem(data.raw_dim(), false);
        Self { data, mask }
    }

    /// Pair `data` with an explicit mask of the same shape.
    pub fn new(data: Array<f64, D>, mask: Array<bool, D>) -> Result<Self> {
        if data.shape() != mask.shape() {
            return Err(RateError::shape_mismatch(data.shape(), mask.shape()));
        }
        Ok(Self { data, mask })
    }

    /// Mask every non-finite element (NaN or infinite).
    pub fn masked_invalid(data: Array<f64, D>) -> Self {
        let mask = data.mapv(|v| !v.is_finite());
        Self { data, mask }
    }

    /// Mask every element equal to `fill_value`, plus any non-finite element.
    pub fn masked_values(data: Array<f64, D>, fill_value: f64) -> Self {
        let mask = data.mapv(|v| !v.is_finite() || v == fill_value);
        Self { data, mask }
    }

    /// An array of the given shape with every element masked.
    pub fn fully_masked(dim: D) -> Self {
        Self {
            data: Array::from_elem(dim.clone(), f64::NAN),
            mask: Array::from_elem(dim, true),
        }
    }

    pub fn data(&self) -> &Array<f64, D> {
        &self.data
    }

    pub fn mask(&self) -> &Array<bool, D> {
        &self.mask
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn raw_dim(&self) -> D {
        self.data.raw_dim()
    }

    pub fn into_parts(self) -> (Array<f64, D>, Array<bool, D>) {
        (self.data, self.mask)
    }

    /// Value at `index`, or `None` when masked or out of bounds.
    pub fn get<I: NdIndex<D> + Copy>(&self, index: I) -> Option<f64> {
        match self.mask.get(index) {
            Some(&false) => self.data.get(index).copied(),
            _ => None,
        }
    }

    /// Out-of-bounds indices count as masked.
    pub fn is_masked<I: NdIndex<D>>(&self, index: I) -> bool {
        self.mask.get(index).copied().unwrap_or(true)
    }

    /// Store `value` at `index` and mark it valid.
    pub fn set<I: NdIndex<D> + Copy>(&mut self, index: I, value: f64) {
        self.data[index] = value;
        self.mask[index] = false;
    }

    /// Mark `index` masked; its data slot becomes `NaN`.
    pub fn set_masked<I: NdIndex<D> + Copy>(&mut self, index: I) {
        self.data[index] = f64::NAN;
        self.mask[index] = true;
    }

    pub fn count_masked(&self) -> usize {
        self.mask.iter().filter(|&&m| m).count()
    }

    pub fn count_valid(&self) -> usize {
        self.mask.len() - self.count_masked()
    }

    /// Iterator over valid values in logical order.
    pub fn valid_values(&self) -> impl Iterator<Item = f64> + '_ {
        self.data
            .iter()
            .zip(self.mask.iter())
            .filter(|&(_, &m)| !m)
            .map(|(&v, _)| v)
    }

    pub fn valid_min(&self) -> Option<f64> {
        self.valid_values().reduce(f64::min)
    }

    pub fn valid_max(&self) -> Option<f64> {
        self.valid_values().reduce(f64::max)
    }

    /// Replace masked elements with `fill`.
    pub fn filled(&self, fill: f64) -> Array<f64, D> {
        let mut out = self.data.clone();
        Zip::from(&mut out).and(&self.mask).for_each(|v, &m| {
            if m {
                *v = fill;
            }
        });
        out
    }

    /// Apply `f` to valid elements; masked elements stay masked.
    pub fn map_valid<F>(&self, f: F) -> Self
    where
        F: Fn(f64) -> f64,
    {
        let mut data = self.data.clone();
        Zip::from(&mut data).and(&self.mask).for_each(|v, &m| {
            *v = if m { f64::NAN } else { f(*v) };
        });
        Self {
            data,
            mask: self.mask.clone(),
        }
    }

    /// Combine two arrays elementwise; the result is masked where either is.
    pub fn zip_with<F>(&self, other: &Self, f: F) -> Result<Self>
    where
        F: Fn(f64, f64) -> f64,
    {
        if self.shape() != other.shape() {
            return Err(RateError::shape_mismatch(self.shape(), other.shape()));
        }
        let mut data = Array::from_elem(self.raw_dim(), f64::NAN);
        let mut mask = Array::from_elem(self.raw_dim(), true);
        Zip::from(&mut data)
            .and(&mut mask)
            .and(&self.data)
            .and(&self.mask)
            .and(&other.data)
            .and(&other.mask)
            .for_each(|d, m, &a, &ma, &b, &mb| {
                if !(ma || mb) {
                    *d = f(a, b);
                    *m = false;
                }
            });
        Ok(Self { data, mask })
    }

    /// Average adjacent pairs along `axis`, masking a result element when
    /// either parent is masked.
    pub fn unstagger(&self, axis: Axis) -> Result<Self> {
        let data = crate::stagger::unstagger(&self.data, axis)?;
        let len = self.mask.len_of(axis);
        let n = len.saturating_sub(1);
        let lo = self.mask.slice_axis(axis, (0..n).into());
        let hi = self.mask.slice_axis(axis, (len.min(1)..len).into());
        let mut mask = Array::from_elem(data.raw_dim(), false);
        Zip::from(&mut mask)
            .and(&lo)
            .and(&hi)
            .for_each(|m, &a, &b| *m = a || b);
        let data = Zip::from(&data)
            .and(&mask)
            .map_collect(|&v, &m| if m { f64::NAN } else { v });
        Ok(Self { data, mask })
    }

    pub fn into_dyn(self) -> MaskedArray<IxDyn> {
        MaskedArray {
            data: self.data.into_dyn(),
            mask: self.mask.into_dyn(),
        }
    }
}

impl MaskedArray<Ix2> {
    /// `(rows, cols)`, i.e. `(ydim, xdim)` in meshgrid layout.
    pub fn dim(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Build from rows, masking non-finite values and `fill_value` if given.
    pub fn from_rows(rows: &[Vec<f64>], fill_value: Option<f64>) -> Result<Self> {
        let ncols = rows.first().map_or(0, |r| r.len());
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != ncols) {
            return Err(RateError::ShapeMismatch {
                expected: format!("{} columns", ncols),
                actual: format!("{} columns in row {}", row.len(), i),
            });
        }
        let flat: Vec<f64> = rows.iter().flatten().copied().collect();
        let data = Array2::from_shape_vec((rows.len(), ncols), flat)
            .map_err(|e| RateError::Parse(e.to_string()))?;
        Ok(match fill_value {
            Some(fill) => Self::masked_values(data, fill),
            None => Self::masked_invalid(data),
        })
    }
}

impl<D: Dimension> From<Array<f64, D>> for MaskedArray<D> {
    fn from(data: Array<f64, D>) -> Self {
        Self::from_data(data)
    }
}
