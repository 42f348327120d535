//! Visualization tools for gridded volumes.
//!
//! This module renders 2D projections of a [`GriddedVolume`] as PNG heat
//! maps using the plotters library.

use std::path::Path;

use plotters::prelude::*;
use plotters_bitmap::BitMapBackend;
use thiserror::Error;

use crate::processors::gridder::{GridSpec, GriddedVolume};

/// Errors that can occur during visualization.
#[derive(Error, Debug)]
pub enum VisualizationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Plotting error: {0}")]
    PlottingError(String),

    #[error("Projection axis must be 0, 1 or 2, got {0}")]
    InvalidAxis(usize),

    #[error("Volume has no occupied cells")]
    EmptyVolume,
}

/// Result type for visualization operations.
pub type Result<T> = std::result::Result<T, VisualizationError>;

/// Default plot width in pixels.
const DEFAULT_WIDTH: u32 = 1200;

/// Default plot height in pixels.
const DEFAULT_HEIGHT: u32 = 1000;

/// Lower edge and width of the bins along one axis.
///
/// Degenerate axes get a unit span centered on their single value.
fn bin_edges(spec: &GridSpec, axis: usize) -> (f64, f64) {
    let width = spec.bin_width(axis);
    if width > 0.0 {
        (spec.q_min[axis], width)
    } else {
        (spec.q_min[axis] - 0.5, 1.0 / spec.bins[axis] as f64)
    }
}

/// Heat map color for a normalized value in `[0, 1]`, blue to red.
fn heat_color(t: f64) -> HSLColor {
    HSLColor(0.66 * (1.0 - t.clamp(0.0, 1.0)), 0.9, 0.5)
}

/// Plot the mean intensity of `volume` projected along `axis` and save as PNG.
///
/// Colors follow `log10` of the mean; cells with non-positive means get the
/// low end of the scale and empty cells stay white.
///
/// # Arguments
///
/// * `output_path` - Path to save the PNG image
/// * `volume` - The gridded volume to project
/// * `axis` - Axis summed over: 0 for qx, 1 for qy, 2 for qz
pub fn plot_projection(output_path: &Path, volume: &GriddedVolume, axis: usize) -> Result<()> {
    if axis > 2 {
        return Err(VisualizationError::InvalidAxis(axis));
    }
    if volume.points_in_grid() == 0 {
        return Err(VisualizationError::EmptyVolume);
    }

    let (h_axis, v_axis) = match axis {
        0 => (1, 2),
        1 => (0, 2),
        _ => (0, 1),
    };
    let projection = volume.projected_mean(axis);

    let logs: Vec<f64> = projection
        .iter()
        .flatten()
        .filter(|m| **m > 0.0)
        .map(|m| m.log10())
        .collect();
    let lo = logs.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = logs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = if hi > lo { hi - lo } else { 1.0 };

    let (x0, dx) = bin_edges(&volume.spec, h_axis);
    let (y0, dy) = bin_edges(&volume.spec, v_axis);
    let (nx, ny) = projection.dim();
    let x1 = x0 + dx * nx as f64;
    let y1 = y0 + dy * ny as f64;

    let root = BitMapBackend::new(output_path, (DEFAULT_WIDTH, DEFAULT_HEIGHT))
        .into_drawing_area();

    root.fill(&WHITE).map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x0..x1, y0..y1)
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .disable_y_mesh()
        .draw()
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    chart
        .draw_series(projection.indexed_iter().filter_map(|((i, j), mean)| {
            let mean = (*mean)?;
            let t = if mean > 0.0 { (mean.log10() - lo) / span } else { 0.0 };
            let left = x0 + dx * i as f64;
            let bottom = y0 + dy * j as f64;
            Some(Rectangle::new(
                [(left, bottom), (left + dx, bottom + dy)],
                heat_color(t).filled(),
            ))
        }))
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    root.present().map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    Ok(())
}
