use crate::error::{RateError, Result};
use crate::gradient::{gradient2, EdgeOrder};
use crate::grid::Grid;
use crate::masked::MaskedArray2;
use log::info;
use ndarray::{Array2, Zip};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Two velocity components on a meshgrid, `u[i, j]` and `v[i, j]` with
/// `i` the row (y) and `j` the column (x).
#[derive(Debug, Clone, PartialEq)]
pub struct VelocityField {
    u: MaskedArray2,
    v: MaskedArray2,
}

/// On-disk layout: rows of `u` and `v`, outer index is y.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct VelocityFile {
    u: Vec<Vec<f64>>,
    v: Vec<Vec<f64>>,
}

impl VelocityField {
    pub fn new(u: MaskedArray2, v: MaskedArray2) -> Result<Self> {
        if u.shape() != v.shape() {
            return Err(RateError::shape_mismatch(u.shape(), v.shape()));
        }
        Ok(Self { u, v })
    }

    /// Wrap plain arrays, masking non-finite samples.
    pub fn from_arrays(u: Array2<f64>, v: Array2<f64>) -> Result<Self> {
        Self::new(MaskedArray2::masked_invalid(u), MaskedArray2::masked_invalid(v))
    }

    /// Evaluate `f(x, y)` at every point of `grid`, masking non-finite samples.
    pub fn from_fn<F>(grid: &Grid, f: F) -> Self
    where
        F: Fn(f64, f64) -> (f64, f64),
    {
        let (ny, nx) = grid.shape();
        let mut u = Array2::<f64>::zeros((ny, nx));
        let mut v = Array2::<f64>::zeros((ny, nx));
        for i in 0..ny {
            let y = grid.y_coord(i);
            for j in 0..nx {
                let (uij, vij) = f(grid.x_coord(j), y);
                u[[i, j]] = uij;
                v[[i, j]] = vij;
            }
        }
        Self {
            u: MaskedArray2::masked_invalid(u),
            v: MaskedArray2::masked_invalid(v),
        }
    }

    pub fn zeros(ny: usize, nx: usize) -> Self {
        Self {
            u: MaskedArray2::from_data(Array2::zeros((ny, nx))),
            v: MaskedArray2::from_data(Array2::zeros((ny, nx))),
        }
    }

    /// Read a TOML file holding `u = [[...]]` and `v = [[...]]`.
    ///
    /// Non-finite samples (`nan`, `inf`) and samples equal to `fill_value`
    /// are masked.
    pub fn from_toml_file<P: AsRef<Path>>(path: P, fill_value: Option<f64>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let file: VelocityFile = toml::from_str(&content)
            .map_err(|e| RateError::Parse(format!("{}: {}", path.display(), e)))?;

        let u = MaskedArray2::from_rows(&file.u, fill_value)?;
        let v = MaskedArray2::from_rows(&file.v, fill_value)?;
        let field = Self::new(u, v)?;
        info!(
            "Read {}x{} velocity field from {} ({} masked u, {} masked v)",
            field.shape().0,
            field.shape().1,
            path.display(),
            field.u.count_masked(),
            field.v.count_masked()
        );
        Ok(field)
    }

    pub fn u(&self) -> &MaskedArray2 {
        &self.u
    }

    pub fn v(&self) -> &MaskedArray2 {
        &self.v
    }

    /// `(ydim, xdim)`
    pub fn shape(&self) -> (usize, usize) {
        self.u.dim()
    }

    fn check_grid(&self, grid: &Grid) -> Result<()> {
        let (ny, nx) = grid.shape();
        if self.shape() != (ny, nx) {
            return Err(RateError::shape_mismatch(&[ny, nx], self.u.shape()));
        }
        Ok(())
    }

    /// du/dx + dv/dy
    pub fn divergence(&self, grid: &Grid, edge_order: EdgeOrder) -> Result<MaskedArray2> {
        self.check_grid(grid)?;
        let (_, dudx) = gradient2(&self.u, grid.y_spacing(), grid.x_spacing(), edge_order)?;
        let (dvdy, _) = gradient2(&self.v, grid.y_spacing(), grid.x_spacing(), edge_order)?;
        dudx.zip_with(&dvdy, |a, b| a + b)
    }

    /// dv/dx - du/dy
    pub fn vorticity(&self, grid: &Grid, edge_order: EdgeOrder) -> Result<MaskedArray2> {
        self.check_grid(grid)?;
        let (dudy, _) = gradient2(&self.u, grid.y_spacing(), grid.x_spacing(), edge_order)?;
        let (_, dvdx) = gradient2(&self.v, grid.y_spacing(), grid.x_spacing(), edge_order)?;
        dvdx.zip_with(&dudy, |a, b| a - b)
    }

    /// |v| = sqrt(u² + v²)
    pub fn speed(&self) -> MaskedArray2 {
        // u and v share a shape by construction
        let speed = Zip::from(self.u.data())
            .and(self.u.mask())
            .and(self.v.data())
            .and(self.v.mask())
            .map_collect(|&u, &mu, &v, &mv| if mu || mv { f64::NAN } else { u.hypot(v) });
        MaskedArray2::masked_invalid(speed)
    }
}
