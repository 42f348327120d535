//! Six-circle diffractometer (four sample circles, two detector circles).
//!
//! Conventions follow You (1999), J. Appl. Cryst. 32, 614: beam along +y,
//! `Q_lab = M · Θ · Χ · Φ · UB · h` with the detector at (delta, gamma).

use nalgebra::{Matrix3, Vector3};
use rayon::prelude::*;

use super::{AngleToQ, FrameMode, GeometryError, PixelAngles, Result, SampleAngles};

/// Rotation of the mu circle (about the lab x axis).
fn mu_matrix(mu: f64) -> Matrix3<f64> {
    let (s, c) = mu.to_radians().sin_cos();
    Matrix3::new(1.0, 0.0, 0.0, 0.0, c, -s, 0.0, s, c)
}

/// Rotation of the theta (eta) circle.
fn theta_matrix(theta: f64) -> Matrix3<f64> {
    let (s, c) = theta.to_radians().sin_cos();
    Matrix3::new(c, s, 0.0, -s, c, 0.0, 0.0, 0.0, 1.0)
}

fn chi_matrix(chi: f64) -> Matrix3<f64> {
    let (s, c) = chi.to_radians().sin_cos();
    Matrix3::new(c, 0.0, s, 0.0, 1.0, 0.0, -s, 0.0, c)
}

fn phi_matrix(phi: f64) -> Matrix3<f64> {
    let (s, c) = phi.to_radians().sin_cos();
    Matrix3::new(c, s, 0.0, -s, c, 0.0, 0.0, 0.0, 1.0)
}

/// Momentum transfer in the lab frame for detector angles in degrees.
#[inline]
fn q_lab(k: f64, delta: f64, gamma: f64) -> Vector3<f64> {
    let (sd, cd) = delta.to_radians().sin_cos();
    let (sg, cg) = gamma.to_radians().sin_cos();
    Vector3::new(k * sd, k * (cd * cg - 1.0), k * cd * sg)
}

/// Stock [`AngleToQ`] implementation.
#[derive(Debug, Clone, Default)]
pub struct SixCircle {
    ub_inverse: Option<Matrix3<f64>>,
}

impl SixCircle {
    /// Diffractometer without sample orientation; the hkl frame is unavailable.
    pub fn new() -> Self {
        Self::default()
    }

    /// Diffractometer with an orientation matrix for the hkl frame.
    pub fn with_ub(ub: Matrix3<f64>) -> Result<Self> {
        let ub_inverse = ub.try_inverse().ok_or(GeometryError::SingularUb)?;
        Ok(Self {
            ub_inverse: Some(ub_inverse),
        })
    }

    /// Matrix taking lab-frame Q into the requested frame.
    fn frame_matrix(&self, sample: &SampleAngles, frame: FrameMode) -> Result<Matrix3<f64>> {
        let theta_stage = mu_matrix(sample.mu) * theta_matrix(sample.theta);
        let phi_stage = theta_stage * chi_matrix(sample.chi) * phi_matrix(sample.phi);

        match frame {
            FrameMode::Cartesian => Ok(Matrix3::identity()),
            FrameMode::Theta => Ok(theta_stage.transpose()),
            FrameMode::Phi => Ok(phi_stage.transpose()),
            FrameMode::Hkl => {
                let ub_inverse = self.ub_inverse.ok_or(GeometryError::MissingUb)?;
                Ok(ub_inverse * phi_stage.transpose())
            }
        }
    }
}

impl AngleToQ for SixCircle {
    fn angles_to_q(
        &self,
        wavelength: f64,
        pixels: &PixelAngles,
        sample: &SampleAngles,
        frame: FrameMode,
    ) -> Result<Vec<Vector3<f64>>> {
        if !(wavelength.is_finite() && wavelength > 0.0) {
            return Err(GeometryError::InvalidWavelength(wavelength));
        }
        if pixels.delta.len() != pixels.gamma.len() {
            return Err(GeometryError::LengthMismatch {
                delta: pixels.delta.len(),
                gamma: pixels.gamma.len(),
            });
        }

        let k = 2.0 * std::f64::consts::PI / wavelength;
        let to_frame = self.frame_matrix(sample, frame)?;

        Ok(pixels
            .delta
            .par_iter()
            .zip(pixels.gamma.par_iter())
            .map(|(&delta, &gamma)| to_frame * q_lab(k, delta, gamma))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Lattice;
    use std::f64::consts::PI;

    const WAVELENGTH: f64 = 1.54;

    fn single(delta: f64, gamma: f64) -> PixelAngles {
        PixelAngles {
            delta: vec![delta],
            gamma: vec![gamma],
        }
    }

    #[test]
    fn test_straight_through_beam_has_zero_q() {
        let q = SixCircle::new()
            .angles_to_q(
                WAVELENGTH,
                &single(0.0, 0.0),
                &SampleAngles::default(),
                FrameMode::Cartesian,
            )
            .unwrap();
        assert!(q[0].norm() < 1e-15);
    }

    #[test]
    fn test_q_length_matches_scattering_angle() {
        let k = 2.0 * PI / WAVELENGTH;
        let pixels = PixelAngles {
            delta: vec![10.0, 35.0, 60.0, -20.0],
            gamma: vec![0.0, 12.0, -5.0, 30.0],
        };
        let sample = SampleAngles {
            theta: 13.0,
            chi: 71.0,
            phi: -40.0,
            mu: 2.0,
        };

        for frame in [FrameMode::Cartesian, FrameMode::Theta, FrameMode::Phi] {
            let q = SixCircle::new()
                .angles_to_q(WAVELENGTH, &pixels, &sample, frame)
                .unwrap();
            for (i, v) in q.iter().enumerate() {
                let tth = (pixels.delta[i].to_radians().cos() * pixels.gamma[i].to_radians().cos())
                    .acos();
                let expected = 2.0 * k * (tth / 2.0).sin();
                assert!((v.norm() - expected).abs() < 1e-12, "{:?} pixel {}", frame, i);
            }
        }
    }

    #[test]
    fn test_symmetric_theta_puts_q_along_x() {
        let k = 2.0 * PI / WAVELENGTH;
        let sample = SampleAngles {
            theta: 20.0,
            ..SampleAngles::default()
        };
        let q = SixCircle::new()
            .angles_to_q(WAVELENGTH, &single(40.0, 0.0), &sample, FrameMode::Theta)
            .unwrap();

        assert!((q[0].x - 2.0 * k * (20.0f64).to_radians().sin()).abs() < 1e-12);
        assert!(q[0].y.abs() < 1e-12);
        assert!(q[0].z.abs() < 1e-12);
    }

    #[test]
    fn test_phi_frame_equals_theta_frame_at_zero_chi_phi() {
        let sample = SampleAngles {
            theta: 17.0,
            chi: 0.0,
            phi: 0.0,
            mu: 3.0,
        };
        let pixels = single(33.0, 4.0);
        let diff = SixCircle::new();

        let q_theta = diff
            .angles_to_q(WAVELENGTH, &pixels, &sample, FrameMode::Theta)
            .unwrap();
        let q_phi = diff
            .angles_to_q(WAVELENGTH, &pixels, &sample, FrameMode::Phi)
            .unwrap();
        assert!((q_theta[0] - q_phi[0]).norm() < 1e-12);
    }

    #[test]
    fn test_hkl_with_unit_b_matrix_equals_phi_frame() {
        let b = Lattice::cubic(2.0 * PI).b_matrix().unwrap();
        let diff = SixCircle::with_ub(b).unwrap();
        let sample = SampleAngles {
            theta: 10.0,
            chi: 45.0,
            phi: 30.0,
            mu: 0.0,
        };
        let pixels = single(25.0, 1.0);

        let q_phi = diff
            .angles_to_q(WAVELENGTH, &pixels, &sample, FrameMode::Phi)
            .unwrap();
        let hkl = diff
            .angles_to_q(WAVELENGTH, &pixels, &sample, FrameMode::Hkl)
            .unwrap();
        assert!((q_phi[0] - hkl[0]).norm() < 1e-12);
    }

    #[test]
    fn test_hkl_bragg_reflection() {
        // cubic a = 4 Å, (002) at d = 2 Å
        let a = 4.0;
        let d = 2.0;
        let tth = 2.0 * (WAVELENGTH / (2.0 * d)).asin().to_degrees();
        let diff = SixCircle::with_ub(Lattice::cubic(a).b_matrix().unwrap()).unwrap();

        // chi = 90 tilts the phi-stage z axis onto the theta-stage x axis
        let sample = SampleAngles {
            theta: tth / 2.0,
            chi: 90.0,
            phi: 0.0,
            mu: 0.0,
        };
        let hkl = diff
            .angles_to_q(WAVELENGTH, &single(tth, 0.0), &sample, FrameMode::Hkl)
            .unwrap();

        assert!(hkl[0].x.abs() < 1e-9);
        assert!(hkl[0].y.abs() < 1e-9);
        assert!((hkl[0].z - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_hkl_without_ub_is_error() {
        let err = SixCircle::new()
            .angles_to_q(
                WAVELENGTH,
                &single(10.0, 0.0),
                &SampleAngles::default(),
                FrameMode::Hkl,
            )
            .unwrap_err();
        assert_eq!(err, GeometryError::MissingUb);
    }

    #[test]
    fn test_singular_ub_rejected() {
        assert!(matches!(
            SixCircle::with_ub(Matrix3::zeros()),
            Err(GeometryError::SingularUb)
        ));
    }

    #[test]
    fn test_invalid_inputs() {
        let diff = SixCircle::new();
        let sample = SampleAngles::default();

        assert!(matches!(
            diff.angles_to_q(0.0, &single(1.0, 1.0), &sample, FrameMode::Cartesian),
            Err(GeometryError::InvalidWavelength(_))
        ));

        let ragged = PixelAngles {
            delta: vec![1.0, 2.0],
            gamma: vec![1.0],
        };
        assert!(matches!(
            diff.angles_to_q(WAVELENGTH, &ragged, &sample, FrameMode::Cartesian),
            Err(GeometryError::LengthMismatch { delta: 2, gamma: 1 })
        ));
    }
}
