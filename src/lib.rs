//! Attraction and repulsion rate fields of sampled 2D velocity fields.
//!
//! The repulsion rate `s1` and attraction rate `s2` are the smallest and
//! largest eigenvalues of the rate-of-strain tensor, the symmetric part of
//! the velocity gradient. Fields are stored in meshgrid layout: `u[i, j]`
//! with `i` the row (y) and `j` the column (x). Missing samples are carried
//! as masks and propagate to every output that depends on them.
//!
//! ```ignore
//! use ndarray::Array2;
//! use strain_rates::{compute, MaskedArray2};
//!
//! let u = MaskedArray2::from_data(Array2::from_shape_fn((5, 5), |(i, _)| i as f64));
//! let v = MaskedArray2::from_data(Array2::zeros((5, 5)));
//! let rates = compute(&u, &v, 1.0, 1.0, true)?;
//! assert_eq!(rates.s2().get([2, 2]), Some(0.5));
//! ```

pub mod config;
pub mod error;
pub mod flows;
pub mod gradient;
pub mod grid;
pub mod masked;
pub mod pipeline;
pub mod projection;
pub mod rates;
pub mod stagger;
pub mod velocity;
pub mod visualisation;

pub use error::{RateError, Result};
pub use gradient::EdgeOrder;
pub use grid::{AxisSpacing, Grid, Spacing};
pub use masked::{MaskedArray, MaskedArray2};
pub use rates::{compute, Eigen2, RateField, RateFieldComputer, StrainTensor};
pub use velocity::VelocityField;
