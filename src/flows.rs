//! Analytic velocity fields for demonstrations and tests.

use crate::grid::Grid;
use crate::velocity::VelocityField;
use serde::{Deserialize, Serialize};

/// Anything that can give a velocity at a physical point.
pub trait VelocityProvider {
    fn velocity(&self, x: f64, y: f64) -> (f64, f64);

    /// Sample on every grid point in meshgrid order.
    fn sample_on(&self, grid: &Grid) -> VelocityField {
        VelocityField::from_fn(grid, |x, y| self.velocity(x, y))
    }
}

/// Rigid rotation with angular velocity `omega`: no strain anywhere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolidBodyRotation {
    pub omega: f64,
}

impl VelocityProvider for SolidBodyRotation {
    fn velocity(&self, x: f64, y: f64) -> (f64, f64) {
        (-self.omega * y, self.omega * x)
    }
}

/// Plane Couette-type shear `u = rate * y`, `v = 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimpleShear {
    pub rate: f64,
}

impl VelocityProvider for SimpleShear {
    fn velocity(&self, _x: f64, y: f64) -> (f64, f64) {
        (self.rate * y, 0.0)
    }
}

/// Parameters of the perturbed Bickley jet, lengths in km and speeds in km/s.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BickleyParams {
    pub u0: f64,     // Jet speed (km/s)
    pub length: f64, // Jet half width (km)
    pub r0: f64,     // Earth radius (km)
    pub epsilon: [f64; 3],
}

impl Default for BickleyParams {
    fn default() -> Self {
        Self {
            u0: 62.66e-3,
            length: 1770.0,
            r0: 6371.0,
            epsilon: [0.0075, 0.15, 0.3],
        }
    }
}

impl BickleyParams {
    /// Wave numbers k_n = 2n / r0.
    pub fn wave_numbers(&self) -> [f64; 3] {
        [1.0, 2.0, 3.0].map(|n| 2.0 * n / self.r0)
    }

    /// Phase speeds; c1 is fixed by c2, c3 and the wave number ratio.
    pub fn phase_speeds(&self) -> [f64; 3] {
        let k = self.wave_numbers();
        let c2 = 0.205 * self.u0;
        let c3 = 0.461 * self.u0;
        let c1 = c3 + (5f64.sqrt() - 1.0) / 2.0 * (k[1] / k[0]) * (c2 - c3);
        [c1, c2, c3]
    }
}

/// Bickley jet with three travelling Rossby waves, evaluated at `time` seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BickleyJet {
    pub time: f64,
    pub params: BickleyParams,
}

impl BickleyJet {
    pub fn new(time: f64) -> Self {
        Self {
            time,
            params: BickleyParams::default(),
        }
    }

    pub fn with_params(time: f64, params: BickleyParams) -> Self {
        Self { time, params }
    }
}

impl VelocityProvider for BickleyJet {
    fn velocity(&self, x: f64, y: f64) -> (f64, f64) {
        let p = &self.params;
        let k = p.wave_numbers();
        let c = p.phase_speeds();
        let sech2 = 1.0 / (y / p.length).cosh().powi(2);
        let tanh = (y / p.length).tanh();

        let mut waves = 0.0;
        let mut waves_dx = 0.0;
        for n in 0..3 {
            let phase = k[n] * (x - c[n] * self.time);
            waves += p.epsilon[n] * phase.cos();
            waves_dx += p.epsilon[n] * k[n] * phase.sin();
        }

        // psi = -U L tanh(y/L) + U L sech²(y/L) Σ eps_n cos(k_n (x - c_n t))
        let u = p.u0 * sech2 * (1.0 + 2.0 * tanh * waves);
        let v = -p.u0 * p.length * sech2 * waves_dx;
        (u, v)
    }
}
