use crate::masked::{MaskedArray, MaskedArray2};
use log::info;
use ndarray::Ix3;
use plotters::prelude::*;
use std::path::{Path, PathBuf};

const COLORBAR_WIDTH: u32 = 140;
const COLORBAR_STEPS: usize = 128;
const MASKED_COLOR: RGBColor = RGBColor(160, 160, 160);

/// Format a colorbar tick as `m.mm · 10^e`.
pub fn sci_notation(x: f64) -> String {
    let s = format!("{:.2e}", x);
    match s.split_once('e') {
        Some((mantissa, exponent)) => match exponent.parse::<i32>() {
            Ok(b) => format!("{} · 10^{}", mantissa, b),
            Err(_) => s,
        },
        None => s,
    }
}

/// Colour range for a field: symmetric about zero for signed data.
fn value_range(field: &MaskedArray2) -> (f64, f64) {
    match (field.valid_min(), field.valid_max()) {
        (Some(lo), Some(hi)) if lo >= 0.0 => (lo, hi),
        (Some(lo), Some(hi)) => {
            let max_abs = lo.abs().max(hi.abs());
            (-max_abs, max_abs)
        }
        _ => (-1.0, 1.0),
    }
}

pub struct FieldVisualiser {
    output_dir: PathBuf,
    width: u32,
    height: u32,
    gradient: Box<dyn colorgrad::Gradient>,
}

impl FieldVisualiser {
    pub fn new<P: AsRef<Path>>(output_dir: P, width: u32, height: u32) -> std::io::Result<Self> {
        std::fs::create_dir_all(output_dir.as_ref())?;

        let gradient = Box::new(colorgrad::preset::rd_yl_bu());

        Ok(Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            width,
            height,
            gradient,
        })
    }

    /// Render `field` as a heat map, optionally overlaying a direction field
    /// sampled every `stride` points. Returns the written file.
    pub fn plot_field(
        &self,
        field: &MaskedArray2,
        name: &str,
        directions: Option<(&MaskedArray<Ix3>, usize)>,
    ) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let filename = self.output_dir.join(format!("{}.png", name));
        // Drawing areas borrow `filename` until the end of this block
        {
            let root = BitMapBackend::new(&filename, (self.width, self.height)).into_drawing_area();
            root.fill(&WHITE)?;

            let (ny, nx) = field.dim();
            let (min_val, max_val) = value_range(field);
            let (map_area, bar_area) = root.split_horizontally(self.width.saturating_sub(COLORBAR_WIDTH));

            let title = format!("{} ({} of {} points masked)", name, field.count_masked(), nx * ny);
            let mut chart = ChartBuilder::on(&map_area)
                .caption(&title, ("sans-serif", 30))
                .margin(10)
                .x_label_area_size(40)
                .y_label_area_size(40)
                .build_cartesian_2d(0.0..nx as f64, 0.0..ny as f64)?;

            chart
                .configure_mesh()
                .disable_mesh()
                .x_desc("j (x grid points)")
                .y_desc("i (y grid points)")
                .draw()?;

            chart.draw_series((0..ny).flat_map(|i| (0..nx).map(move |j| (i, j))).map(|(i, j)| {
                let color = match field.get([i, j]) {
                    Some(value) => self.value_to_color(value, min_val, max_val),
                    None => MASKED_COLOR,
                };
                Rectangle::new(
                    [(j as f64, i as f64), ((j + 1) as f64, (i + 1) as f64)],
                    color.filled(),
                )
            }))?;

            if let Some((vectors, stride)) = directions {
                let stride = stride.max(1);
                let half = 0.4 * stride as f64;
                let segments = (0..ny)
                    .step_by(stride)
                    .flat_map(|i| (0..nx).step_by(stride).map(move |j| (i, j)))
                    .filter_map(|(i, j)| {
                        let ex = vectors.get([i, j, 0])?;
                        let ey = vectors.get([i, j, 1])?;
                        let (cx, cy) = (j as f64 + 0.5, i as f64 + 0.5);
                        Some(PathElement::new(
                            vec![(cx - half * ex, cy - half * ey), (cx + half * ex, cy + half * ey)],
                            BLACK.stroke_width(1),
                        ))
                    });
                chart.draw_series(segments)?;
            }

            self.draw_colorbar(&bar_area, min_val, max_val)?;

            root.present()?;
        }
        info!("Saved field: {}", filename.display());
        Ok(filename)
    }

    fn draw_colorbar(
        &self,
        area: &DrawingArea<BitMapBackend, plotters::coord::Shift>,
        min_val: f64,
        max_val: f64,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let span = if max_val > min_val { max_val - min_val } else { 1.0 };
        let mut bar = ChartBuilder::on(area)
            .margin_top(50)
            .margin_bottom(50)
            .margin_right(10)
            .y_label_area_size(100)
            .build_cartesian_2d(0.0..1.0, min_val..min_val + span)?;

        bar.configure_mesh()
            .disable_mesh()
            .disable_x_axis()
            .y_labels(6)
            .y_label_formatter(&|v| sci_notation(*v))
            .draw()?;

        let step = span / COLORBAR_STEPS as f64;
        bar.draw_series((0..COLORBAR_STEPS).map(|k| {
            let lo = min_val + k as f64 * step;
            let color = self.value_to_color(lo + 0.5 * step, min_val, max_val);
            Rectangle::new([(0.0, lo), (1.0, lo + step)], color.filled())
        }))?;
        Ok(())
    }

    fn value_to_color(&self, value: f64, min_val: f64, max_val: f64) -> RGBColor {
        let normalized = if max_val > min_val {
            (value - min_val) / (max_val - min_val)
        } else {
            0.5
        };
        let normalized = normalized.clamp(0.0, 1.0);
        let color_rgba = self.gradient.at(normalized as f32).to_rgba8();
        RGBColor(color_rgba[0], color_rgba[1], color_rgba[2])
    }
}
