//! Unstaggering of C-grid model output.
//!
//! Atmospheric models such as WRF and NAM store `u` at (i+1/2, k) and `v` at
//! (i, k+1/2). Averaging adjacent pairs along the staggered axis moves the
//! samples back onto the mass points, shrinking that axis by one.

use crate::error::{RateError, Result};
use ndarray::{Array, ArrayBase, Axis, Data, Dimension, Slice, Zip};

/// Arithmetic mean of each adjacent pair along `axis`, for any dimensionality.
///
/// A length-0 or length-1 axis yields an empty axis.
pub fn unstagger<S, D>(x: &ArrayBase<S, D>, axis: Axis) -> Result<Array<f64, D>>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    if axis.index() >= x.ndim() {
        return Err(RateError::InvalidAxis {
            axis: axis.index(),
            ndim: x.ndim(),
        });
    }
    let len = x.len_of(axis);
    let n = len.saturating_sub(1);
    let lo = x.slice_axis(axis, Slice::from(0..n));
    let hi = x.slice_axis(axis, Slice::from(len.min(1)..len));

    Ok(Zip::from(&lo)
        .and(&hi)
        .map_collect(|&a, &b| (a + b) / 2.0))
}
