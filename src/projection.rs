//! Lambert conformal conic projection between a sphere and a plane.
//!
//! Useful for putting geophysical lon/lat grids onto a kilometre grid before
//! differentiating.

use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_4;

/// Mean Earth radius (km).
pub const EARTH_RADIUS_KM: f64 = 6371.0;

pub fn cot(th: f64) -> f64 {
    1.0 / th.tan()
}

pub fn sec(th: f64) -> f64 {
    1.0 / th.cos()
}

/// Two-standard-parallel Lambert conformal conic, angles in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LambertConformal {
    pub ref_lon: f64,
    pub ref_lat: f64,
    #[serde(default = "default_std_lat1")]
    pub std_lat1: f64,
    #[serde(default = "default_std_lat2")]
    pub std_lat2: f64,
}

fn default_std_lat1() -> f64 {
    30.0
}

fn default_std_lat2() -> f64 {
    60.0
}

impl LambertConformal {
    /// Projection about a reference point with standard parallels 30° and 60°.
    pub fn new(ref_lon: f64, ref_lat: f64) -> Self {
        Self {
            ref_lon,
            ref_lat,
            std_lat1: default_std_lat1(),
            std_lat2: default_std_lat2(),
        }
    }

    pub fn with_standard_parallels(mut self, std_lat1: f64, std_lat2: f64) -> Self {
        self.std_lat1 = std_lat1;
        self.std_lat2 = std_lat2;
        self
    }

    /// Cone constant n and scale factor F.
    fn cone(&self) -> (f64, f64) {
        let phi1 = self.std_lat1.to_radians();
        let phi2 = self.std_lat2.to_radians();
        let n = (phi1.cos() * sec(phi2)).ln()
            / ((FRAC_PI_4 + 0.5 * phi2).tan() * cot(FRAC_PI_4 + 0.5 * phi1)).ln();
        let f = phi1.cos() * (FRAC_PI_4 + 0.5 * phi1).tan().powf(n) / n;
        (n, f)
    }

    fn rho(&self, lat_rad: f64, n: f64, f: f64) -> f64 {
        EARTH_RADIUS_KM * f * cot(FRAC_PI_4 + 0.5 * lat_rad).powf(n)
    }

    /// Map (lon, lat) in degrees to (x, y) in km relative to the reference point.
    pub fn forward(&self, lon: f64, lat: f64) -> (f64, f64) {
        let (n, f) = self.cone();
        let p0 = self.rho(self.ref_lat.to_radians(), n, f);
        let p = self.rho(lat.to_radians(), n, f);
        let th = n * (lon.to_radians() - self.ref_lon.to_radians());
        (p * th.sin(), p0 - p * th.cos())
    }

    /// Map (x, y) in km back to (lon, lat) in degrees.
    pub fn inverse(&self, x: f64, y: f64) -> (f64, f64) {
        let (n, f) = self.cone();
        let p0 = self.rho(self.ref_lat.to_radians(), n, f);
        let p = n.signum() * (x * x + (p0 - y) * (p0 - y)).sqrt();
        let th = (x / (p0 - y)).atan();
        let lon = th / n + self.ref_lon.to_radians();
        let lat = 2.0 * (EARTH_RADIUS_KM * f / p).powf(1.0 / n).atan() - 0.5 * std::f64::consts::PI;
        (lon.to_degrees(), lat.to_degrees())
    }
}
