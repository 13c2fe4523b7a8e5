use crate::config::Config;
use crate::grid::Grid;
use crate::masked::MaskedArray2;
use crate::rates::RateField;
use crate::velocity::VelocityField;
use crate::visualisation::FieldVisualiser;
use anyhow::{anyhow, Context, Result};
use log::{info, warn};
use std::path::PathBuf;

/// What a run produced.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub shape: (usize, usize),
    pub masked: usize,
    pub s1_range: Option<(f64, f64)>,
    pub s2_range: Option<(f64, f64)>,
    pub outputs: Vec<PathBuf>,
}

fn range(field: &MaskedArray2) -> Option<(f64, f64)> {
    Some((field.valid_min()?, field.valid_max()?))
}

pub struct Pipeline {
    pub config: Config,
    pub grid: Grid,
    pub velocity: VelocityField,
}

impl Pipeline {
    /// Build the grid and velocity field described by `config`.
    pub fn new(config: Config) -> Result<Self> {
        let grid = config.grid.build();
        let velocity = config.flow.velocity_field(&grid)?;
        if velocity.shape() != grid.shape() {
            return Err(anyhow!(
                "Velocity field is {:?} but the grid is {:?} (ny, nx)",
                velocity.shape(),
                grid.shape()
            ));
        }
        Ok(Self {
            config,
            grid,
            velocity,
        })
    }

    pub fn compute_rates(&self) -> Result<RateField> {
        self.config
            .rates
            .computer()
            .compute_on_grid(&self.velocity, &self.grid)
            .context("Rate computation failed")
    }

    /// Compute the rates and, when `plots` is set, render the configured fields.
    pub fn run(&self, plots: bool) -> Result<RunSummary> {
        info!("Computing attraction and repulsion rates...");
        let rates = self.compute_rates()?;

        let summary_ranges = (range(rates.s1()), range(rates.s2()));
        info!(
            "Rates computed on {}x{} grid, {} masked points",
            rates.shape().0,
            rates.shape().1,
            rates.count_masked()
        );
        if let (Some((s1_min, s1_max)), Some((s2_min, s2_max))) = summary_ranges {
            info!("Repulsion rate s1 in [{:.4e}, {:.4e}]", s1_min, s1_max);
            info!("Attraction rate s2 in [{:.4e}, {:.4e}]", s2_min, s2_max);
        } else {
            warn!("Every grid point is masked");
        }

        let outputs = if plots {
            self.visualise(&rates)?
        } else {
            Vec::new()
        };

        Ok(RunSummary {
            shape: rates.shape(),
            masked: rates.count_masked(),
            s1_range: summary_ranges.0,
            s2_range: summary_ranges.1,
            outputs,
        })
    }

    fn visualise(&self, rates: &RateField) -> Result<Vec<PathBuf>> {
        let vis = &self.config.visualization;
        let visualiser = FieldVisualiser::new(&vis.output_dir, vis.image_width, vis.image_height)
            .with_context(|| {
                format!("Failed to create output directory '{}'", vis.output_dir.display())
            })?;
        let edge_order = self.config.rates.edge_order;
        let stride = vis.eigenvector_stride;

        let mut outputs = Vec::with_capacity(vis.fields.len());
        for field in &vis.fields {
            let (data, directions) = match field.as_str() {
                "s1" => (rates.s1().clone(), rates.xi1().map(|xi| (xi, stride))),
                "s2" => (rates.s2().clone(), rates.xi2().map(|xi| (xi, stride))),
                "divergence" => (self.velocity.divergence(&self.grid, edge_order)?, None),
                "vorticity" => (self.velocity.vorticity(&self.grid, edge_order)?, None),
                "speed" => (self.velocity.speed(), None),
                other => return Err(anyhow!("Unknown field: {}", other)),
            };

            let path = visualiser
                .plot_field(&data, field, directions)
                .map_err(|e| anyhow!("Failed to visualise '{}': {}", field, e))?;
            outputs.push(path);
        }
        info!("Fields saved to {}", vis.output_dir.display());
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn shear_config() -> Config {
        Config::from_toml_str(
            r#"
            [grid]
            nx = 6
            ny = 5
            dx = 1.0
            dy = 1.0

            [flow]
            kind = "simple_shear"
            rate = 1.0
        "#,
        )
        .unwrap()
    }

    #[test]
    fn test_run_without_plots() {
        let pipeline = Pipeline::new(shear_config()).unwrap();
        let summary = pipeline.run(false).unwrap();
        assert_eq!(summary.shape, (5, 6));
        assert_eq!(summary.masked, 0);
        let (s1_min, s1_max) = summary.s1_range.unwrap();
        assert_relative_eq!(s1_min, -0.5, epsilon = 1e-10);
        assert_relative_eq!(s1_max, -0.5, epsilon = 1e-10);
        let (s2_min, _) = summary.s2_range.unwrap();
        assert_relative_eq!(s2_min, 0.5, epsilon = 1e-10);
        assert!(summary.outputs.is_empty());
    }

    #[test]
    #[ignore = "text rendering needs system fonts"]
    fn test_run_writes_requested_plots() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = shear_config();
        config.visualization.output_dir = dir.path().to_path_buf();
        config.visualization.fields = vec!["s2".to_string(), "vorticity".to_string()];
        config.visualization.image_width = 400;
        config.visualization.image_height = 300;
        config.visualization.eigenvector_stride = 2;

        let summary = Pipeline::new(config).unwrap().run(true).unwrap();
        assert_eq!(summary.outputs.len(), 2);
        for path in &summary.outputs {
            assert!(path.exists(), "{} missing", path.display());
        }
    }
}
