use crate::error::{RateError, Result};
use crate::projection::LambertConformal;
use ndarray::{Array1, ArrayView1};

/// Spacing along one axis, as seen by the gradient operator.
#[derive(Debug, Clone, Copy)]
pub enum AxisSpacing<'a> {
    Uniform(f64),
    Coordinates(ArrayView1<'a, f64>),
}

impl<'a> AxisSpacing<'a> {
    /// Check the spacing against an axis of `len` points.
    pub fn validate(&self, axis: &'static str, len: usize) -> Result<()> {
        match self {
            AxisSpacing::Uniform(h) => {
                if !h.is_finite() || *h <= 0.0 {
                    return Err(RateError::invalid_spacing(
                        axis,
                        format!("spacing must be positive and finite, got {}", h),
                    ));
                }
            }
            AxisSpacing::Coordinates(c) => {
                if c.len() != len {
                    return Err(RateError::ShapeMismatch {
                        expected: format!("{} coordinates along {}", len, axis),
                        actual: format!("{}", c.len()),
                    });
                }
                if c.iter().any(|v| !v.is_finite()) {
                    return Err(RateError::invalid_spacing(axis, "non-finite coordinate"));
                }
                if let Some(k) = (1..c.len()).find(|&k| c[k] <= c[k - 1]) {
                    return Err(RateError::invalid_spacing(
                        axis,
                        format!(
                            "coordinates must be strictly increasing ({} at {} after {})",
                            c[k],
                            k,
                            c[k - 1]
                        ),
                    ));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Spacing {
    Uniform { dx: f64, dy: f64, x0: f64, y0: f64 },
    Coordinates { x: Array1<f64>, y: Array1<f64> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    pub nx: usize, // Number of columns (x direction)
    pub ny: usize, // Number of rows (y direction)
    pub spacing: Spacing,
}

impl Grid {
    pub fn new(nx: usize, ny: usize, dx: f64, dy: f64) -> Self {
        Grid {
            nx,
            ny,
            spacing: Spacing::Uniform {
                dx,
                dy,
                x0: 0.0,
                y0: 0.0,
            },
        }
    }

    /// Move the first uniform grid point to `(x0, y0)`. Coordinate grids are unchanged.
    pub fn with_origin(mut self, x0: f64, y0: f64) -> Self {
        if let Spacing::Uniform { x0: ox, y0: oy, .. } = &mut self.spacing {
            *ox = x0;
            *oy = y0;
        }
        self
    }

    /// Rectilinear grid with explicit (possibly non-uniform) coordinates.
    pub fn from_coordinates(x: Array1<f64>, y: Array1<f64>) -> Self {
        Grid {
            nx: x.len(),
            ny: y.len(),
            spacing: Spacing::Coordinates { x, y },
        }
    }

    /// Project lon/lat axes (degrees) to km with a Lambert conformal conic.
    ///
    /// Longitudes are projected along the reference latitude and latitudes
    /// along the reference longitude, giving a rectilinear approximation of
    /// the projected mesh.
    pub fn from_lonlat(lon: &[f64], lat: &[f64], projection: &LambertConformal) -> Self {
        let x = lon
            .iter()
            .map(|&l| projection.forward(l, projection.ref_lat).0)
            .collect::<Array1<f64>>();
        let y = lat
            .iter()
            .map(|&p| projection.forward(projection.ref_lon, p).1)
            .collect::<Array1<f64>>();
        Grid::from_coordinates(x, y)
    }

    pub fn validate(&self) -> Result<()> {
        self.x_spacing().validate("x", self.nx)?;
        self.y_spacing().validate("y", self.ny)
    }

    pub fn x_spacing(&self) -> AxisSpacing<'_> {
        match &self.spacing {
            Spacing::Uniform { dx, .. } => AxisSpacing::Uniform(*dx),
            Spacing::Coordinates { x, .. } => AxisSpacing::Coordinates(x.view()),
        }
    }

    pub fn y_spacing(&self) -> AxisSpacing<'_> {
        match &self.spacing {
            Spacing::Uniform { dy, .. } => AxisSpacing::Uniform(*dy),
            Spacing::Coordinates { y, .. } => AxisSpacing::Coordinates(y.view()),
        }
    }

    pub fn x_coord(&self, j: usize) -> f64 {
        // Convert column index j to physical x coordinate
        match &self.spacing {
            Spacing::Uniform { dx, x0, .. } => x0 + dx * (j as f64),
            Spacing::Coordinates { x, .. } => x[j],
        }
    }

    pub fn y_coord(&self, i: usize) -> f64 {
        // Convert row index i to physical y coordinate
        match &self.spacing {
            Spacing::Uniform { dy, y0, .. } => y0 + dy * (i as f64),
            Spacing::Coordinates { y, .. } => y[i],
        }
    }

    pub fn in_bounds(&self, i: usize, j: usize) -> bool {
        // Meshgrid order: i is the row, j the column
        i < self.ny && j < self.nx
    }

    pub fn width(&self) -> f64 {
        if self.nx == 0 {
            return 0.0;
        }
        self.x_coord(self.nx - 1) - self.x_coord(0)
    }

    pub fn height(&self) -> f64 {
        if self.ny == 0 {
            return 0.0;
        }
        self.y_coord(self.ny - 1) - self.y_coord(0)
    }

    /// `(ny, nx)`, the shape of fields sampled on this grid.
    pub fn shape(&self) -> (usize, usize) {
        (self.ny, self.nx)
    }
}
