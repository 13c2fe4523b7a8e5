use crate::flows::{BickleyJet, BickleyParams, SimpleShear, SolidBodyRotation, VelocityProvider};
use crate::gradient::EdgeOrder;
use crate::grid::Grid;
use crate::projection::LambertConformal;
use crate::rates::RateFieldComputer;
use crate::velocity::VelocityField;
use anyhow::{anyhow, Context, Result};
use log::{info, warn};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Fields the visualiser knows how to render.
pub const VALID_FIELDS: [&str; 5] = ["s1", "s2", "divergence", "vorticity", "speed"];

/// Grid configuration: uniform spacing or explicit coordinates
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GridConfig {
    pub nx: usize,
    pub ny: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dx: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dy: Option<f64>,
    #[serde(default)]
    pub x0: f64, // First uniform grid point
    #[serde(default)]
    pub y0: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<Vec<f64>>,
    // When set, x and y are longitudes and latitudes in degrees
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projection: Option<LambertConformal>,
}

impl GridConfig {
    fn validate(&self) -> Result<()> {
        if self.nx == 0 || self.ny == 0 {
            return Err(anyhow!(
                "Grid dimensions must be positive (nx={}, ny={})",
                self.nx,
                self.ny
            ));
        }
        match (self.dx, self.dy, &self.x, &self.y) {
            (Some(dx), Some(dy), None, None) => {
                if self.projection.is_some() {
                    return Err(anyhow!("grid.projection requires explicit x/y coordinates"));
                }
                if dx <= 0.0 || dy <= 0.0 {
                    return Err(anyhow!(
                        "Grid spacing must be positive (dx={}, dy={})",
                        dx,
                        dy
                    ));
                }
            }
            (None, None, Some(x), Some(y)) => {
                if x.len() != self.nx || y.len() != self.ny {
                    return Err(anyhow!(
                        "Coordinate lengths ({}, {}) do not match grid dimensions ({}, {})",
                        x.len(),
                        y.len(),
                        self.nx,
                        self.ny
                    ));
                }
            }
            _ => {
                return Err(anyhow!(
                    "Grid needs either both dx and dy, or both x and y coordinate arrays"
                ))
            }
        }
        // Catches non-increasing coordinates, including after projection
        self.build()
            .validate()
            .map_err(|e| anyhow!("Invalid grid: {}", e))
    }

    pub fn build(&self) -> Grid {
        match (&self.x, &self.y, &self.projection) {
            (Some(x), Some(y), Some(proj)) => Grid::from_lonlat(x, y, proj),
            (Some(x), Some(y), None) => {
                Grid::from_coordinates(Array1::from(x.clone()), Array1::from(y.clone()))
            }
            _ => Grid::new(
                self.nx,
                self.ny,
                self.dx.unwrap_or(0.0),
                self.dy.unwrap_or(0.0),
            )
            .with_origin(self.x0, self.y0),
        }
    }
}

/// Where the velocity field comes from
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FlowConfig {
    SolidBodyRotation {
        #[serde(default = "default_unit")]
        omega: f64,
    },
    SimpleShear {
        #[serde(default = "default_unit")]
        rate: f64,
    },
    BickleyJet {
        #[serde(default)]
        time: f64, // Seconds
        #[serde(default)]
        params: BickleyParams,
    },
    File {
        path: PathBuf,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fill_value: Option<f64>,
    },
}

fn default_unit() -> f64 {
    1.0
}

impl FlowConfig {
    fn validate(&self) -> Result<()> {
        match self {
            FlowConfig::SolidBodyRotation { omega } if !omega.is_finite() => {
                Err(anyhow!("omega must be finite, got {}", omega))
            }
            FlowConfig::SimpleShear { rate } if !rate.is_finite() => {
                Err(anyhow!("rate must be finite, got {}", rate))
            }
            FlowConfig::BickleyJet { params, .. } if params.length <= 0.0 || params.r0 <= 0.0 => {
                Err(anyhow!(
                    "Bickley jet length and r0 must be positive (length={}, r0={})",
                    params.length,
                    params.r0
                ))
            }
            _ => Ok(()),
        }
    }

    /// Build the velocity field on `grid`.
    pub fn velocity_field(&self, grid: &Grid) -> Result<VelocityField> {
        let field = match self {
            FlowConfig::SolidBodyRotation { omega } => {
                SolidBodyRotation { omega: *omega }.sample_on(grid)
            }
            FlowConfig::SimpleShear { rate } => SimpleShear { rate: *rate }.sample_on(grid),
            FlowConfig::BickleyJet { time, params } => {
                BickleyJet::with_params(*time, *params).sample_on(grid)
            }
            FlowConfig::File { path, fill_value } => {
                VelocityField::from_toml_file(path, *fill_value).with_context(|| {
                    format!("Failed to load velocity field '{}'", path.display())
                })?
            }
        };
        Ok(field)
    }

    pub fn name(&self) -> &'static str {
        match self {
            FlowConfig::SolidBodyRotation { .. } => "solid_body_rotation",
            FlowConfig::SimpleShear { .. } => "simple_shear",
            FlowConfig::BickleyJet { .. } => "bickley_jet",
            FlowConfig::File { .. } => "file",
        }
    }
}

/// Rate computation options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RatesConfig {
    #[serde(default)]
    pub edge_order: EdgeOrder,
    #[serde(default = "default_true")]
    pub eigenvectors: bool,
    #[serde(default)]
    pub parallel: bool,
}

impl Default for RatesConfig {
    fn default() -> Self {
        Self {
            edge_order: EdgeOrder::default(),
            eigenvectors: true,
            parallel: false,
        }
    }
}

fn default_true() -> bool {
    true
}

impl RatesConfig {
    pub fn computer(&self) -> RateFieldComputer {
        RateFieldComputer::new()
            .edge_order(self.edge_order)
            .with_eigenvectors(self.eigenvectors)
            .parallel(self.parallel)
    }
}

/// Visualization configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VisualizationConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_fields")]
    pub fields: Vec<String>,
    #[serde(default = "default_image_width")]
    pub image_width: u32,
    #[serde(default = "default_image_height")]
    pub image_height: u32,
    #[serde(default = "default_eigenvector_stride")]
    pub eigenvector_stride: usize,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_fields() -> Vec<String> {
    vec!["s1".to_string(), "s2".to_string()]
}

fn default_image_width() -> u32 {
    1200
}

fn default_image_height() -> u32 {
    1000
}

fn default_eigenvector_stride() -> usize {
    8
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            fields: default_fields(),
            image_width: default_image_width(),
            image_height: default_image_height(),
            eigenvector_stride: default_eigenvector_stride(),
        }
    }
}

impl VisualizationConfig {
    fn validate(&self) -> Result<()> {
        if let Some(field) = self.fields.iter().find(|f| !VALID_FIELDS.contains(&f.as_str())) {
            return Err(anyhow!(
                "Invalid field '{}'. Must be one of: {:?}",
                field,
                VALID_FIELDS
            ));
        }
        if self.image_width == 0 || self.image_height == 0 {
            return Err(anyhow!(
                "Image dimensions must be positive (width={}, height={})",
                self.image_width,
                self.image_height
            ));
        }
        if self.eigenvector_stride == 0 {
            return Err(anyhow!("eigenvector_stride must be positive"));
        }
        Ok(())
    }
}

/// Complete run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub grid: GridConfig,
    pub flow: FlowConfig,
    #[serde(default)]
    pub rates: RatesConfig,
    #[serde(default)]
    pub visualization: VisualizationConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// A relative velocity file path is resolved against the config's directory.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;

        let mut config = Self::from_toml_str(&content)?;

        if let FlowConfig::File { path: file, .. } = &mut config.flow {
            if file.is_relative() {
                if let Some(dir) = path.parent() {
                    *file = dir.join(&*file);
                }
            }
        }

        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| anyhow!("Failed to parse TOML config: {}", e))?;

        // Validate before returning
        config.validate()?;

        Ok(config)
    }

    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<()> {
        self.grid.validate()?;
        self.flow.validate()?;
        self.visualization.validate()?;

        if self.rates.edge_order.required_points() > self.grid.nx.min(self.grid.ny) {
            return Err(anyhow!(
                "edge_order {} needs at least {} points per axis, grid is {}x{}",
                u8::from(self.rates.edge_order),
                self.rates.edge_order.required_points(),
                self.grid.nx,
                self.grid.ny
            ));
        }

        let wants_vectors = self
            .visualization
            .fields
            .iter()
            .any(|f| f == "s1" || f == "s2");
        if wants_vectors && !self.rates.eigenvectors {
            warn!("Eigenvectors disabled, s1/s2 plots will have no direction overlay");
        }

        Ok(())
    }

    /// Log configuration summary
    pub fn log_summary(&self) {
        info!("=== Rate Field Configuration ===");
        let grid = self.grid.build();
        info!(
            "Grid: {}x{} ({:.3} x {:.3})",
            self.grid.nx,
            self.grid.ny,
            grid.width(),
            grid.height()
        );
        if let Some(proj) = &self.grid.projection {
            info!(
                "Projection: Lambert conformal about ({}, {}), standard parallels {} and {}",
                proj.ref_lon, proj.ref_lat, proj.std_lat1, proj.std_lat2
            );
        }
        info!("Flow: {}", self.flow.name());
        info!(
            "Rates: edge_order={}, eigenvectors={}, parallel={}",
            u8::from(self.rates.edge_order),
            self.rates.eigenvectors,
            self.rates.parallel
        );
        info!(
            "Visualization: {:?} at {}x{} into {}",
            self.visualization.fields,
            self.visualization.image_width,
            self.visualization.image_height,
            self.visualization.output_dir.display()
        );
        info!("================================");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const UNIFORM: &str = r#"
        [grid]
        nx = 5
        ny = 4
        dx = 0.5
        dy = 0.25

        [flow]
        kind = "simple_shear"
        rate = 2.0
    "#;

    #[test]
    fn test_defaults_applied() {
        let config = Config::from_toml_str(UNIFORM).unwrap();
        assert_eq!(config.rates.edge_order, EdgeOrder::First);
        assert!(config.rates.eigenvectors);
        assert!(!config.rates.parallel);
        assert_eq!(config.visualization.fields, vec!["s1", "s2"]);
        assert_eq!(config.visualization.eigenvector_stride, 8);
        assert_eq!(config.grid.build().shape(), (4, 5));
    }

    #[test]
    fn test_flow_kinds_parse() {
        let toml = r#"
            [grid]
            nx = 3
            ny = 3
            dx = 1.0
            dy = 1.0

            [flow]
            kind = "bickley_jet"
            time = 3600.0

            [rates]
            edge_order = 2
            parallel = true
        "#;
        let config = Config::from_toml_str(toml).unwrap();
        assert!(matches!(config.flow, FlowConfig::BickleyJet { time, .. } if time == 3600.0));
        assert_eq!(config.rates.edge_order, EdgeOrder::Second);
        let computer = config.rates.computer();
        assert!(computer.parallel);
    }

    #[test]
    fn test_rejects_bad_edge_order() {
        let toml = format!("{}\n[rates]\nedge_order = 3\n", UNIFORM);
        assert!(Config::from_toml_str(&toml).is_err());
    }

    #[test]
    fn test_rejects_missing_spacing() {
        let toml = r#"
            [grid]
            nx = 3
            ny = 3
            dx = 1.0

            [flow]
            kind = "solid_body_rotation"
        "#;
        assert!(Config::from_toml_str(toml).is_err());
    }

    #[test]
    fn test_rejects_negative_spacing() {
        let toml = UNIFORM.replace("dx = 0.5", "dx = -0.5");
        let err = Config::from_toml_str(&toml).unwrap_err();
        assert!(err.to_string().contains("spacing"));
    }

    #[test]
    fn test_rejects_unknown_field() {
        let toml = format!("{}\n[visualization]\nfields = [\"s3\"]\n", UNIFORM);
        let err = Config::from_toml_str(&toml).unwrap_err();
        assert!(err.to_string().contains("s3"));
    }

    #[test]
    fn test_rejects_grid_too_small_for_edge_order() {
        // Two rows are enough for first-order edges only
        let two_rows = UNIFORM.replace("ny = 4", "ny = 2");
        assert!(Config::from_toml_str(&two_rows).is_ok());
        let second = format!("{}\n[rates]\nedge_order = 2\n", two_rows);
        let err = Config::from_toml_str(&second).unwrap_err();
        assert!(err.to_string().contains("at least 3 points"));

        let one_row = UNIFORM.replace("ny = 4", "ny = 1");
        assert!(Config::from_toml_str(&one_row).is_err());
    }

    #[test]
    fn test_coordinate_grid() {
        let toml = r#"
            [grid]
            nx = 3
            ny = 3
            x = [0.0, 1.0, 3.0]
            y = [-1.0, 0.0, 0.5]

            [flow]
            kind = "solid_body_rotation"
        "#;
        let config = Config::from_toml_str(toml).unwrap();
        let grid = config.grid.build();
        assert_eq!(grid.x_coord(2), 3.0);
        assert_eq!(grid.y_coord(0), -1.0);

        let bad = toml.replace("x = [0.0, 1.0, 3.0]", "x = [0.0, 3.0, 1.0]");
        assert!(Config::from_toml_str(&bad).is_err());
    }

    #[test]
    fn test_projected_grid() {
        let toml = r#"
            [grid]
            nx = 3
            ny = 2
            x = [-71.0, -70.0, -69.0]
            y = [40.0, 41.0]

            [grid.projection]
            ref_lon = -70.0
            ref_lat = 40.0

            [flow]
            kind = "solid_body_rotation"
        "#;
        let config = Config::from_toml_str(toml).unwrap();
        let proj = config.grid.projection.unwrap();
        assert_eq!((proj.std_lat1, proj.std_lat2), (30.0, 60.0));
        assert_eq!(config.rates.edge_order, EdgeOrder::First);
        let grid = config.grid.build();
        assert_eq!(grid.shape(), (2, 3));
        assert!(grid.x_coord(0) < 0.0 && grid.x_coord(2) > 0.0);
    }

    #[test]
    fn test_from_file_resolves_velocity_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut velocity = fs::File::create(dir.path().join("uv.toml")).unwrap();
        writeln!(velocity, "u = [[1.0, 3.0], [1.0, 2.0]]").unwrap();
        writeln!(velocity, "v = [[1.0, 1.0], [2.0, 2.0]]").unwrap();

        let mut config_file = NamedTempFile::new_in(dir.path()).unwrap();
        writeln!(
            config_file,
            "[grid]\nnx = 2\nny = 2\ndx = 1.0\ndy = 1.0\n\n[flow]\nkind = \"file\"\npath = \"uv.toml\"\n\n[rates]\nedge_order = 1"
        )
        .unwrap();

        let config = Config::from_file(config_file.path()).unwrap();
        let grid = config.grid.build();
        let field = config.flow.velocity_field(&grid).unwrap();
        assert_eq!(field.shape(), (2, 2));
    }

    #[test]
    fn test_from_file_missing() {
        let err = Config::from_file("/nonexistent/config.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
