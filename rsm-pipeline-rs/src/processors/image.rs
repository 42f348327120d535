//! Transformation of one corrected exposure into reciprocal space.

use ndarray::Array2;

use super::{ProcessingError, Result};
use crate::config::DetectorGeometry;
use crate::core::frame::PixelCoordinateGrid;
use crate::core::point_cloud::ReciprocalPoint;
use crate::core::transforms::pixel_angles;
use crate::geometry::{AngleToQ, FrameMode, ScanAngles};

/// Geometry shared by every exposure of a set.
#[derive(Debug, Clone, Copy)]
pub struct ExposureContext<'a> {
    pub detector: &'a DetectorGeometry,
    /// Detector coordinates of the region of interest, flatten order
    pub coords: &'a PixelCoordinateGrid,
    pub wavelength: f64,
    pub frame_mode: FrameMode,
}

/// Map every pixel of a corrected exposure to `(qx, qy, qz, intensity)`.
///
/// The exposure's nominal delta and gamma are the angles of the reference
/// pixel; theta, chi, phi and mu are shared by all pixels. Point `i` pairs
/// the Q vector of pixel `i` with the intensity at flat index `i`.
pub fn process_image<G: AngleToQ + ?Sized>(
    corrected: &Array2<f64>,
    angles: &ScanAngles,
    ctx: &ExposureContext<'_>,
    calculator: &G,
) -> Result<Vec<ReciprocalPoint>> {
    if corrected.len() != ctx.coords.len() {
        return Err(ProcessingError::PixelCountMismatch {
            expected: ctx.coords.len(),
            found: corrected.len(),
        });
    }

    let pixels = pixel_angles(ctx.coords, angles.delta, angles.gamma, ctx.detector);
    let q = calculator.angles_to_q(ctx.wavelength, &pixels, &angles.sample(), ctx.frame_mode)?;

    if q.len() != corrected.len() {
        return Err(ProcessingError::PixelCountMismatch {
            expected: corrected.len(),
            found: q.len(),
        });
    }

    Ok(q
        .into_iter()
        .zip(corrected.iter())
        .map(|(q, &intensity)| ReciprocalPoint::new(q, intensity))
        .collect())
}
