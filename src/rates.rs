//! Attraction and repulsion rates of a sampled 2D velocity field.
//!
//! At every grid point the velocity gradient tensor
//! `[[du/dx, du/dy], [dv/dx, dv/dy]]` is symmetrised into the rate-of-strain
//! tensor `S`. Its smallest eigenvalue is the repulsion rate `s1`, its largest
//! the attraction rate `s2`. The paired unit eigenvectors `Xi1`, `Xi2` are
//! optional.
//!
//! A point is masked in the output iff any of the four gradient components
//! there is masked.
//!
//! When `s1 == s2` (isotropic strain, including zero strain) every direction is
//! an eigenvector. The closed form then returns `Xi2 = (1, 0)` and
//! `Xi1 = (0, 1)`; callers should not rely on that choice.

use crate::error::{RateError, Result};
use crate::gradient::{gradient2, EdgeOrder};
use crate::grid::{AxisSpacing, Grid};
use crate::masked::{MaskedArray, MaskedArray2};
use crate::velocity::VelocityField;
use log::debug;
use ndarray::{Ix2, Ix3};
use rayon::prelude::*;

/// Symmetric part of the velocity gradient tensor at one point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrainTensor {
    pub sxx: f64,
    pub sxy: f64,
    pub syy: f64,
}

/// Eigen-decomposition of a [`StrainTensor`], sorted ascending.
///
/// `vectors[k]` is the unit eigenvector paired with `values[k]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Eigen2 {
    pub values: [f64; 2],
    pub vectors: [[f64; 2]; 2],
}

impl StrainTensor {
    pub fn from_gradient(dudx: f64, dudy: f64, dvdx: f64, dvdy: f64) -> Self {
        // S = 0.5 * (Grad + Grad^T)
        Self {
            sxx: dudx,
            sxy: 0.5 * (dudy + dvdx),
            syy: dvdy,
        }
    }

    pub fn as_matrix(&self) -> [[f64; 2]; 2] {
        [[self.sxx, self.sxy], [self.sxy, self.syy]]
    }

    pub fn trace(&self) -> f64 {
        self.sxx + self.syy
    }

    pub fn determinant(&self) -> f64 {
        self.sxx * self.syy - self.sxy * self.sxy
    }

    /// `S · v`
    pub fn apply(&self, v: [f64; 2]) -> [f64; 2] {
        [
            self.sxx * v[0] + self.sxy * v[1],
            self.sxy * v[0] + self.syy * v[1],
        ]
    }

    /// Closed-form eigenvalues and orthonormal eigenvectors.
    pub fn eigen(&self) -> Eigen2 {
        // tr/2 ± sqrt((tr/2)^2 - det), written without the cancellation
        let mean = 0.5 * self.trace();
        let radius = (0.5 * (self.sxx - self.syy)).hypot(self.sxy);

        // Principal direction of the largest eigenvalue
        let theta = 0.5 * (2.0 * self.sxy).atan2(self.sxx - self.syy);
        let (sin, cos) = theta.sin_cos();

        Eigen2 {
            values: [mean - radius, mean + radius],
            vectors: [[-sin, cos], [cos, sin]],
        }
    }
}

/// Output of [`RateFieldComputer`]: repulsion and attraction rates plus
/// optional eigenvector fields of shape `(ydim, xdim, 2)`.
#[derive(Debug, Clone, PartialEq)]
pub struct RateField {
    s1: MaskedArray2,
    s2: MaskedArray2,
    xi1: Option<MaskedArray<Ix3>>,
    xi2: Option<MaskedArray<Ix3>>,
}

impl RateField {
    fn masked(ydim: usize, xdim: usize, with_eigenvectors: bool) -> Self {
        let vectors = || MaskedArray::fully_masked(Ix3(ydim, xdim, 2));
        Self {
            s1: MaskedArray::fully_masked(Ix2(ydim, xdim)),
            s2: MaskedArray::fully_masked(Ix2(ydim, xdim)),
            xi1: with_eigenvectors.then(vectors),
            xi2: with_eigenvectors.then(vectors),
        }
    }

    fn write(&mut self, i: usize, j: usize, eigen: &Eigen2) {
        self.s1.set([i, j], eigen.values[0]);
        self.s2.set([i, j], eigen.values[1]);
        if let (Some(xi1), Some(xi2)) = (self.xi1.as_mut(), self.xi2.as_mut()) {
            for c in 0..2 {
                xi1.set([i, j, c], eigen.vectors[0][c]);
                xi2.set([i, j, c], eigen.vectors[1][c]);
            }
        }
    }

    /// Repulsion rate (smallest eigenvalue).
    pub fn s1(&self) -> &MaskedArray2 {
        &self.s1
    }

    /// Attraction rate (largest eigenvalue).
    pub fn s2(&self) -> &MaskedArray2 {
        &self.s2
    }

    pub fn xi1(&self) -> Option<&MaskedArray<Ix3>> {
        self.xi1.as_ref()
    }

    pub fn xi2(&self) -> Option<&MaskedArray<Ix3>> {
        self.xi2.as_ref()
    }

    pub fn shape(&self) -> (usize, usize) {
        self.s1.dim()
    }

    pub fn count_masked(&self) -> usize {
        self.s1.count_masked()
    }
}

/// The four velocity derivatives on the grid.
struct Gradients {
    dudx: MaskedArray2,
    dudy: MaskedArray2,
    dvdx: MaskedArray2,
    dvdy: MaskedArray2,
}

impl Gradients {
    fn strain_at(&self, i: usize, j: usize) -> Option<StrainTensor> {
        Some(StrainTensor::from_gradient(
            self.dudx.get([i, j])?,
            self.dudy.get([i, j])?,
            self.dvdx.get([i, j])?,
            self.dvdy.get([i, j])?,
        ))
    }

    /// `None` when a component is masked or the decomposition overflows.
    fn eigen_at(&self, i: usize, j: usize) -> Option<Eigen2> {
        let eigen = self.strain_at(i, j)?.eigen();
        eigen.values.iter().all(|v| v.is_finite()).then_some(eigen)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateFieldComputer {
    pub edge_order: EdgeOrder,
    pub with_eigenvectors: bool,
    pub parallel: bool,
}

impl Default for RateFieldComputer {
    fn default() -> Self {
        Self {
            edge_order: EdgeOrder::First,
            with_eigenvectors: true,
            parallel: false,
        }
    }
}

impl RateFieldComputer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn edge_order(mut self, edge_order: EdgeOrder) -> Self {
        self.edge_order = edge_order;
        self
    }

    pub fn with_eigenvectors(mut self, with_eigenvectors: bool) -> Self {
        self.with_eigenvectors = with_eigenvectors;
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Rates for `u`, `v` on a uniform grid with spacings `dx`, `dy`.
    pub fn compute(
        &self,
        u: &MaskedArray2,
        v: &MaskedArray2,
        dx: f64,
        dy: f64,
    ) -> Result<RateField> {
        self.compute_with_spacing(u, v, AxisSpacing::Uniform(dx), AxisSpacing::Uniform(dy))
    }

    /// Rates for a velocity field on a uniform or coordinate grid.
    pub fn compute_on_grid(&self, field: &VelocityField, grid: &Grid) -> Result<RateField> {
        let (ny, nx) = grid.shape();
        if field.shape() != (ny, nx) {
            return Err(RateError::shape_mismatch(&[ny, nx], field.u().shape()));
        }
        self.compute_with_spacing(field.u(), field.v(), grid.x_spacing(), grid.y_spacing())
    }

    pub fn compute_with_spacing(
        &self,
        u: &MaskedArray2,
        v: &MaskedArray2,
        dx: AxisSpacing<'_>,
        dy: AxisSpacing<'_>,
    ) -> Result<RateField> {
        if u.shape() != v.shape() {
            return Err(RateError::shape_mismatch(u.shape(), v.shape()));
        }
        let (ydim, xdim) = u.dim();
        dx.validate("x", xdim)?;
        dy.validate("y", ydim)?;

        let (dudy, dudx) = gradient2(u, dy, dx, self.edge_order)?;
        let (dvdy, dvdx) = gradient2(v, dy, dx, self.edge_order)?;
        let grads = Gradients {
            dudx,
            dudy,
            dvdx,
            dvdy,
        };

        let mut rates = RateField::masked(ydim, xdim, self.with_eigenvectors);

        if self.parallel {
            let indices: Vec<(usize, usize)> = (0..ydim)
                .flat_map(|i| (0..xdim).map(move |j| (i, j)))
                .collect();

            let updates: Vec<(usize, usize, Eigen2)> = indices
                .par_iter()
                .filter_map(|&(i, j)| grads.eigen_at(i, j).map(|e| (i, j, e)))
                .collect();

            for (i, j, eigen) in updates {
                rates.write(i, j, &eigen);
            }
        } else {
            for i in 0..ydim {
                for j in 0..xdim {
                    if let Some(eigen) = grads.eigen_at(i, j) {
                        rates.write(i, j, &eigen);
                    }
                }
            }
        }

        debug!(
            "Computed rates on {}x{} grid ({} masked, s1 min {:?}, s2 max {:?})",
            ydim,
            xdim,
            rates.count_masked(),
            rates.s1.valid_min(),
            rates.s2.valid_max()
        );

        Ok(rates)
    }
}

/// Rates with first-order edges on a uniform grid.
pub fn compute(
    u: &MaskedArray2,
    v: &MaskedArray2,
    dx: f64,
    dy: f64,
    with_eigenvectors: bool,
) -> Result<RateField> {
    RateFieldComputer::new()
        .with_eigenvectors(with_eigenvectors)
        .compute(u, v, dx, dy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array2;

    fn assert_eigenpair(s: &StrainTensor, value: f64, vector: [f64; 2]) {
        let sv = s.apply(vector);
        assert_relative_eq!(sv[0], value * vector[0], epsilon = 1e-12);
        assert_relative_eq!(sv[1], value * vector[1], epsilon = 1e-12);
        assert_relative_eq!(vector[0].hypot(vector[1]), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_strain_symmetrises_gradient() {
        let s = StrainTensor::from_gradient(1.0, 2.0, 4.0, -1.0);
        assert_eq!(s.as_matrix(), [[1.0, 3.0], [3.0, -1.0]]);
        assert_relative_eq!(s.trace(), 0.0);
        assert_relative_eq!(s.determinant(), -10.0);
    }

    #[test]
    fn test_eigen_matches_characteristic_polynomial() {
        for &(a, b, c, d) in &[
            (1.0, 2.0, 4.0, -1.0),
            (0.3, -0.7, 0.1, 2.5),
            (-2.0, 0.0, 0.0, 5.0),
            (5.0, 0.0, 0.0, -2.0),
            (0.0, 1.0, 0.0, 0.0),
        ] {
            let s = StrainTensor::from_gradient(a, b, c, d);
            let e = s.eigen();
            let half = 0.5 * s.trace();
            let disc = (half * half - s.determinant()).sqrt();
            assert_relative_eq!(e.values[0], half - disc, epsilon = 1e-12);
            assert_relative_eq!(e.values[1], half + disc, epsilon = 1e-12);
            assert!(e.values[0] <= e.values[1]);
            assert_eigenpair(&s, e.values[0], e.vectors[0]);
            assert_eigenpair(&s, e.values[1], e.vectors[1]);
        }
    }

    #[test]
    fn test_eigen_of_zero_tensor() {
        let e = StrainTensor::from_gradient(0.0, 1.0, -1.0, 0.0).eigen();
        assert_eq!(e.values, [0.0, 0.0]);
        let [v1, v2] = e.vectors;
        assert_relative_eq!(v1[0] * v2[0] + v1[1] * v2[1], 0.0);
    }

    #[test]
    fn test_shape_mismatch() {
        let u = MaskedArray2::from_data(Array2::zeros((3, 3)));
        let v = MaskedArray2::from_data(Array2::zeros((3, 4)));
        assert!(matches!(
            compute(&u, &v, 1.0, 1.0, false),
            Err(RateError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_invalid_spacing() {
        let u = MaskedArray2::from_data(Array2::zeros((3, 3)));
        let v = u.clone();
        assert!(matches!(
            compute(&u, &v, 0.0, 1.0, false),
            Err(RateError::InvalidSpacing { axis: "x", .. })
        ));
        assert!(matches!(
            compute(&u, &v, 1.0, -2.0, false),
            Err(RateError::InvalidSpacing { axis: "y", .. })
        ));
    }

    #[test]
    fn test_eigenvectors_only_when_requested() {
        let u = MaskedArray2::from_data(Array2::zeros((3, 3)));
        let v = u.clone();
        let without = compute(&u, &v, 1.0, 1.0, false).unwrap();
        assert!(without.xi1().is_none() && without.xi2().is_none());
        let with = compute(&u, &v, 1.0, 1.0, true).unwrap();
        assert_eq!(with.xi1().unwrap().shape(), &[3, 3, 2]);
        assert_eq!(with.xi2().unwrap().shape(), &[3, 3, 2]);
    }

    #[test]
    fn test_overflowing_gradient_is_masked() {
        // Alternating columns of +-1e308 overflow the edge differences
        let u = MaskedArray2::from_data(Array2::from_shape_fn((3, 3), |(_, j)| {
            if j % 2 == 0 {
                1e308
            } else {
                -1e308
            }
        }));
        let v = MaskedArray2::from_data(Array2::zeros((3, 3)));
        let rates = compute(&u, &v, 1.0, 1.0, true).unwrap();
        assert!(rates.s2().is_masked([0, 0]));
        assert!(rates.s1().is_masked([2, 2]));
        assert_eq!(rates.s2().get([1, 1]), Some(0.0));
        assert!(rates.s1().valid_values().all(f64::is_finite));
        assert!(rates.s2().valid_values().all(f64::is_finite));
    }

    #[test]
    fn test_overflowing_strain_is_masked() {
        // Each derivative is finite but du/dy + dv/dx is not
        let e = StrainTensor::from_gradient(0.0, f64::MAX, f64::MAX, 0.0).eigen();
        assert!(!e.values[1].is_finite());

        // du/dy = dv/dx = f64::MAX on a half-unit grid
        let half = 0.5 * f64::MAX;
        let u = MaskedArray2::from_data(Array2::from_shape_fn((3, 3), |(i, _)| half * i as f64));
        let v = MaskedArray2::from_data(Array2::from_shape_fn((3, 3), |(_, j)| half * j as f64));
        let rates = compute(&u, &v, 0.5, 0.5, false).unwrap();
        assert_eq!(rates.count_masked(), 9);
        assert!(rates.s1().data().iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_masked_v_masks_output() {
        let u = MaskedArray2::from_data(Array2::zeros((3, 3)));
        let mut vdata = Array2::zeros((3, 3));
        vdata[[0, 0]] = f64::NAN;
        let v = MaskedArray2::masked_invalid(vdata);
        let rates = RateFieldComputer::new()
            .edge_order(EdgeOrder::First)
            .compute(&u, &v, 1.0, 1.0)
            .unwrap();
        assert!(rates.s1().is_masked([0, 0]));
        assert!(rates.xi2().unwrap().is_masked([0, 0, 1]));
        assert!(!rates.s2().is_masked([2, 2]));
    }
}
