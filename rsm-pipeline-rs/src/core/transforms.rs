//! Pixel position to diffractometer angle conversion.
//!
//! A flat detector at distance `D` sees pixel `(x, y)` under an angular
//! offset `atan((p - p0) * pitch / D)` from the reference pixel `(x0, y0)`.
//! Offsets are subtracted from the reference detector angles, so pixels with
//! larger `y` map to smaller delta and pixels with larger `x` to smaller gamma.

use std::f64::consts::PI;

use rayon::prelude::*;

use crate::config::DetectorGeometry;
use crate::core::frame::{extract_coordinates, PixelCoordinateGrid, RegionOfInterest};
use crate::geometry::PixelAngles;

/// Angular offset in degrees of a pixel `offset` pixels away from the reference.
#[inline]
fn offset_degrees(offset: f64, pitch: f64, distance: f64) -> f64 {
    (offset * pitch / distance).atan() / PI * 180.0
}

/// Per-pixel (delta, gamma) for the given coordinates.
///
/// # Arguments
///
/// * `coords` - Flattened detector coordinates of the pixels
/// * `del0` - Delta at the reference pixel, degrees
/// * `gam0` - Gamma at the reference pixel, degrees
/// * `detector` - Binned detector constants (distance, pitch, reference pixel)
///
/// # Returns
///
/// One delta and one gamma per pixel, in the order of `coords`.
pub fn pixel_angles(
    coords: &PixelCoordinateGrid,
    del0: f64,
    gam0: f64,
    detector: &DetectorGeometry,
) -> PixelAngles {
    let (delta, gamma): (Vec<f64>, Vec<f64>) = coords
        .x
        .par_iter()
        .zip(coords.y.par_iter())
        .map(|(&x, &y)| {
            let delta = del0
                - offset_degrees(
                    y as f64 - detector.center_y,
                    detector.pixel_size_y,
                    detector.distance,
                );
            let gamma = gam0
                - offset_degrees(
                    x as f64 - detector.center_x,
                    detector.pixel_size_x,
                    detector.distance,
                );
            (delta, gamma)
        })
        .unzip();

    PixelAngles { delta, gamma }
}

/// Shorthand for [`pixel_angles`] over every pixel of a region.
pub fn region_pixel_angles(
    roi: &RegionOfInterest,
    del0: f64,
    gam0: f64,
    detector: &DetectorGeometry,
) -> PixelAngles {
    pixel_angles(&extract_coordinates(roi), del0, gam0, detector)
}
