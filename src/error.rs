//! Error types for rate field computation.

use thiserror::Error;

/// Errors reported before any computation starts.
///
/// Masked grid points are not errors; they propagate to the output.
#[derive(Error, Debug)]
pub enum RateError {
    /// Two arrays that must agree in shape do not.
    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    /// Grid spacing is zero, negative or not finite.
    #[error("Invalid spacing along {axis}: {reason}")]
    InvalidSpacing { axis: &'static str, reason: String },

    /// An axis has too few points for the requested difference stencil.
    #[error("Axis {axis} has {len} points, at least {required} are required")]
    InsufficientPoints {
        axis: &'static str,
        len: usize,
        required: usize,
    },

    /// Axis index outside the array's dimensionality.
    #[error("Axis {axis} out of range for a {ndim}-dimensional array")]
    InvalidAxis { axis: usize, ndim: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl RateError {
    /// Create a shape mismatch error from two shapes.
    pub fn shape_mismatch(expected: &[usize], actual: &[usize]) -> Self {
        Self::ShapeMismatch {
            expected: format!("{:?}", expected),
            actual: format!("{:?}", actual),
        }
    }

    pub fn invalid_spacing(axis: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidSpacing {
            axis,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RateError>;
