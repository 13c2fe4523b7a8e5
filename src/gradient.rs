//! Finite-difference gradients of masked 2D fields.
//!
//! Interior points use second-order central differences; edge points use
//! one-sided differences of the configured order. Non-uniform coordinates use
//! the three-point weights built from the neighbouring spacings.
//!
//! A derivative is masked when its own sample or any sample of its stencil is
//! masked. Masked neighbours never raise.

use crate::error::{RateError, Result};
use crate::grid::AxisSpacing;
use crate::masked::MaskedArray2;
use ndarray::{Array2, ArrayView1, ArrayViewMut1, Axis, Zip};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// Accuracy of the one-sided differences at the domain edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum EdgeOrder {
    #[default]
    First,
    Second,
}

impl EdgeOrder {
    /// Fewest points an axis needs for this edge stencil.
    pub fn required_points(self) -> usize {
        u8::from(self) as usize + 1
    }
}

impl TryFrom<u8> for EdgeOrder {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(EdgeOrder::First),
            2 => Ok(EdgeOrder::Second),
            other => Err(format!("edge_order must be 1 or 2, got {}", other)),
        }
    }
}

impl From<EdgeOrder> for u8 {
    fn from(order: EdgeOrder) -> u8 {
        match order {
            EdgeOrder::First => 1,
            EdgeOrder::Second => 2,
        }
    }
}

fn axis_name(axis: Axis) -> &'static str {
    // Meshgrid layout: rows are y, columns are x
    if axis.index() == 0 {
        "y"
    } else {
        "x"
    }
}

/// Derivative of `field` along `axis` (0 = y/rows, 1 = x/columns).
pub fn gradient(
    field: &MaskedArray2,
    axis: Axis,
    spacing: AxisSpacing<'_>,
    edge_order: EdgeOrder,
) -> Result<MaskedArray2> {
    if axis.index() > 1 {
        return Err(RateError::InvalidAxis {
            axis: axis.index(),
            ndim: 2,
        });
    }
    let name = axis_name(axis);
    let len = field.data().len_of(axis);
    spacing.validate(name, len)?;
    if len < edge_order.required_points() {
        return Err(RateError::InsufficientPoints {
            axis: name,
            len,
            required: edge_order.required_points(),
        });
    }

    let (rows, cols) = field.dim();
    let mut data = Array2::<f64>::from_elem((rows, cols), f64::NAN);
    let mut mask = Array2::from_elem((rows, cols), true);

    Zip::from(data.lanes_mut(axis))
        .and(mask.lanes_mut(axis))
        .and(field.data().lanes(axis))
        .and(field.mask().lanes(axis))
        .for_each(|out, out_mask, f, m| {
            gradient_lane(f, m, spacing, edge_order, out, out_mask);
        });

    MaskedArray2::new(data, mask)
}

/// Both derivatives in numpy order: `(d/dy, d/dx)`.
pub fn gradient2(
    field: &MaskedArray2,
    dy: AxisSpacing<'_>,
    dx: AxisSpacing<'_>,
    edge_order: EdgeOrder,
) -> Result<(MaskedArray2, MaskedArray2)> {
    let dfdy = gradient(field, Axis(0), dy, edge_order)?;
    let dfdx = gradient(field, Axis(1), dx, edge_order)?;
    Ok((dfdy, dfdx))
}

fn gradient_lane(
    f: ArrayView1<f64>,
    m: ArrayView1<bool>,
    spacing: AxisSpacing<'_>,
    edge_order: EdgeOrder,
    mut out: ArrayViewMut1<f64>,
    mut out_mask: ArrayViewMut1<bool>,
) {
    let n = f.len();
    for k in 0..n {
        let (value, mut stencil) = match spacing {
            AxisSpacing::Uniform(h) => uniform_derivative(&f, k, h, edge_order),
            AxisSpacing::Coordinates(x) => nonuniform_derivative(&f, &x, k, edge_order),
        };
        // The stencil always covers k itself; overflow to inf is masked too
        if !value.is_finite() || stencil.any(|s| m[s]) {
            out[k] = f64::NAN;
            out_mask[k] = true;
        } else {
            out[k] = value;
            out_mask[k] = false;
        }
    }
}

fn uniform_derivative(
    f: &ArrayView1<f64>,
    k: usize,
    h: f64,
    edge_order: EdgeOrder,
) -> (f64, RangeInclusive<usize>) {
    let n = f.len();
    if k > 0 && k < n - 1 {
        return ((f[k + 1] - f[k - 1]) / (2.0 * h), k - 1..=k + 1);
    }
    match (k == 0, edge_order) {
        (true, EdgeOrder::First) => ((f[1] - f[0]) / h, 0..=1),
        (true, EdgeOrder::Second) => ((-3.0 * f[0] + 4.0 * f[1] - f[2]) / (2.0 * h), 0..=2),
        (false, EdgeOrder::First) => ((f[n - 1] - f[n - 2]) / h, n - 2..=n - 1),
        (false, EdgeOrder::Second) => (
            (3.0 * f[n - 1] - 4.0 * f[n - 2] + f[n - 3]) / (2.0 * h),
            n - 3..=n - 1,
        ),
    }
}

fn nonuniform_derivative(
    f: &ArrayView1<f64>,
    x: &ArrayView1<f64>,
    k: usize,
    edge_order: EdgeOrder,
) -> (f64, RangeInclusive<usize>) {
    let n = f.len();
    if k > 0 && k < n - 1 {
        let hs = x[k] - x[k - 1];
        let hd = x[k + 1] - x[k];
        let a = -hd / (hs * (hd + hs));
        let b = (hd - hs) / (hd * hs);
        let c = hs / (hd * (hd + hs));
        return (a * f[k - 1] + b * f[k] + c * f[k + 1], k - 1..=k + 1);
    }
    match (k == 0, edge_order) {
        (true, EdgeOrder::First) => ((f[1] - f[0]) / (x[1] - x[0]), 0..=1),
        (true, EdgeOrder::Second) => {
            let dx1 = x[1] - x[0];
            let dx2 = x[2] - x[1];
            let a = -(2.0 * dx1 + dx2) / (dx1 * (dx1 + dx2));
            let b = (dx1 + dx2) / (dx1 * dx2);
            let c = -dx1 / (dx2 * (dx1 + dx2));
            (a * f[0] + b * f[1] + c * f[2], 0..=2)
        }
        (false, EdgeOrder::First) => (
            (f[n - 1] - f[n - 2]) / (x[n - 1] - x[n - 2]),
            n - 2..=n - 1,
        ),
        (false, EdgeOrder::Second) => {
            let dx1 = x[n - 2] - x[n - 3];
            let dx2 = x[n - 1] - x[n - 2];
            let a = dx2 / (dx1 * (dx1 + dx2));
            let b = -(dx2 + dx1) / (dx1 * dx2);
            let c = (2.0 * dx2 + dx1) / (dx2 * (dx1 + dx2));
            (a * f[n - 3] + b * f[n - 2] + c * f[n - 1], n - 3..=n - 1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{array, Array1};

    fn row(values: Array1<f64>) -> MaskedArray2 {
        let n = values.len();
        MaskedArray2::masked_invalid(values.into_shape((1, n)).unwrap())
    }

    #[test]
    fn test_uniform_first_order_edges() {
        let f = row(array![1.0, 2.0, 4.0, 7.0, 11.0]);
        let g = gradient(&f, Axis(1), AxisSpacing::Uniform(1.0), EdgeOrder::First).unwrap();
        let expected = [1.0, 1.5, 2.5, 3.5, 4.0];
        for (k, e) in expected.iter().enumerate() {
            assert_relative_eq!(g.get([0, k]).unwrap(), *e);
        }
    }

    #[test]
    fn test_uniform_second_order_exact_on_quadratic() {
        let h = 0.25;
        let f = row(Array1::from_shape_fn(6, |k| (k as f64 * h).powi(2)));
        let g = gradient(&f, Axis(1), AxisSpacing::Uniform(h), EdgeOrder::Second).unwrap();
        for k in 0..6 {
            assert_relative_eq!(g.get([0, k]).unwrap(), 2.0 * k as f64 * h, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_nonuniform_second_order_exact_on_quadratic() {
        let x = array![0.0, 0.5, 1.5, 1.75, 3.0];
        let f = row(x.mapv(|v| 3.0 * v * v - v + 2.0));
        let g = gradient(
            &f,
            Axis(1),
            AxisSpacing::Coordinates(x.view()),
            EdgeOrder::Second,
        )
        .unwrap();
        for k in 0..x.len() {
            assert_relative_eq!(g.get([0, k]).unwrap(), 6.0 * x[k] - 1.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_nonuniform_matches_uniform_on_even_coordinates() {
        let f = row(array![0.0, 1.0, 8.0, 27.0]);
        let x = array![0.0, 2.0, 4.0, 6.0];
        for order in [EdgeOrder::First, EdgeOrder::Second] {
            let a = gradient(&f, Axis(1), AxisSpacing::Uniform(2.0), order).unwrap();
            let b = gradient(&f, Axis(1), AxisSpacing::Coordinates(x.view()), order).unwrap();
            for k in 0..4 {
                assert_relative_eq!(a.get([0, k]).unwrap(), b.get([0, k]).unwrap(), epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_axis_zero_differentiates_rows() {
        // f = 3 * row index
        let f = MaskedArray2::from_data(Array2::from_shape_fn((4, 3), |(i, _)| 3.0 * i as f64));
        let (dfdy, dfdx) = gradient2(
            &f,
            AxisSpacing::Uniform(1.0),
            AxisSpacing::Uniform(1.0),
            EdgeOrder::Second,
        )
        .unwrap();
        assert!(dfdy.valid_values().all(|v| (v - 3.0).abs() < 1e-12));
        assert!(dfdx.valid_values().all(|v| v.abs() < 1e-12));
    }

    #[test]
    fn test_mask_propagates_through_stencil() {
        let f = row(array![1.0, 2.0, f64::NAN, 4.0, 5.0, 6.0, 7.0]);
        let g = gradient(&f, Axis(1), AxisSpacing::Uniform(1.0), EdgeOrder::Second).unwrap();
        // Edge stencil 0..=2 reaches the masked sample
        assert!(g.is_masked([0, 0]));
        assert!(g.is_masked([0, 1]));
        assert!(g.is_masked([0, 2]));
        assert!(g.is_masked([0, 3]));
        assert!(!g.is_masked([0, 4]));
        assert!(!g.is_masked([0, 5]));
        assert!(!g.is_masked([0, 6]));
    }

    #[test]
    fn test_overflowing_difference_is_masked() {
        let f = row(array![f64::MAX, -f64::MAX, f64::MAX, f64::MAX]);
        let g = gradient(&f, Axis(1), AxisSpacing::Uniform(1.0), EdgeOrder::First).unwrap();
        assert!(g.is_masked([0, 0]));
        assert!(!g.is_masked([0, 1]));
        assert!(g.is_masked([0, 2]));
        assert_eq!(g.get([0, 3]), Some(0.0));
        assert!(g.data()[[0, 0]].is_nan());
    }

    #[test]
    fn test_masked_center_is_masked() {
        let f = row(array![1.0, f64::NAN, 3.0]);
        let g = gradient(&f, Axis(1), AxisSpacing::Uniform(1.0), EdgeOrder::First).unwrap();
        assert!(g.is_masked([0, 1]));
    }

    #[test]
    fn test_too_few_points() {
        let f = row(array![1.0, 2.0]);
        assert!(gradient(&f, Axis(1), AxisSpacing::Uniform(1.0), EdgeOrder::First).is_ok());
        assert!(matches!(
            gradient(&f, Axis(1), AxisSpacing::Uniform(1.0), EdgeOrder::Second),
            Err(RateError::InsufficientPoints {
                axis: "x",
                len: 2,
                required: 3
            })
        ));
        // A single row has no y derivative at all
        assert!(matches!(
            gradient(&f, Axis(0), AxisSpacing::Uniform(1.0), EdgeOrder::First),
            Err(RateError::InsufficientPoints { axis: "y", .. })
        ));
    }

    #[test]
    fn test_edge_order_parsing() {
        assert_eq!(EdgeOrder::try_from(1u8).unwrap(), EdgeOrder::First);
        assert_eq!(EdgeOrder::try_from(2u8).unwrap(), EdgeOrder::Second);
        assert!(EdgeOrder::try_from(3u8).is_err());
        assert_eq!(EdgeOrder::default(), EdgeOrder::First);
        assert_eq!(EdgeOrder::default().required_points(), 2);
        assert_eq!(EdgeOrder::Second.required_points(), 3);
    }
}
