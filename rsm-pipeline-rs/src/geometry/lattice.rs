//! Direct lattice parameters and the Busing-Levy B matrix.

use std::f64::consts::PI;

use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

use super::{GeometryError, Result};

/// Unit cell lengths (angstrom) and angles (degrees).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Lattice {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

impl Lattice {
    pub fn cubic(a: f64) -> Self {
        Self {
            a,
            b: a,
            c: a,
            alpha: 90.0,
            beta: 90.0,
            gamma: 90.0,
        }
    }

    /// Unit cell volume.
    pub fn volume(&self) -> Result<f64> {
        if [self.a, self.b, self.c].iter().any(|&l| !(l.is_finite() && l > 0.0)) {
            return Err(GeometryError::InvalidLattice(format!(
                "cell lengths must be positive, got ({}, {}, {})",
                self.a, self.b, self.c
            )));
        }
        let (ca, cb, cg) = (
            self.alpha.to_radians().cos(),
            self.beta.to_radians().cos(),
            self.gamma.to_radians().cos(),
        );
        let factor = 1.0 - ca * ca - cb * cb - cg * cg + 2.0 * ca * cb * cg;
        if factor.is_nan() || factor <= 0.0 {
            return Err(GeometryError::InvalidLattice(format!(
                "angles ({}, {}, {}) do not describe a cell",
                self.alpha, self.beta, self.gamma
            )));
        }
        Ok(self.a * self.b * self.c * factor.sqrt())
    }

    /// B matrix with the 2π convention: `B · (h, k, l)` is Q in the crystal
    /// cartesian frame, in inverse angstrom.
    pub fn b_matrix(&self) -> Result<Matrix3<f64>> {
        let volume = self.volume()?;
        let (alpha, beta, gamma) = (
            self.alpha.to_radians(),
            self.beta.to_radians(),
            self.gamma.to_radians(),
        );

        let a_star = 2.0 * PI * self.b * self.c * alpha.sin() / volume;
        let b_star = 2.0 * PI * self.a * self.c * beta.sin() / volume;
        let c_star = 2.0 * PI * self.a * self.b * gamma.sin() / volume;

        let cos_beta_star =
            (alpha.cos() * gamma.cos() - beta.cos()) / (alpha.sin() * gamma.sin());
        let cos_gamma_star =
            (alpha.cos() * beta.cos() - gamma.cos()) / (alpha.sin() * beta.sin());
        let sin_beta_star = (1.0 - cos_beta_star * cos_beta_star).sqrt();
        let sin_gamma_star = (1.0 - cos_gamma_star * cos_gamma_star).sqrt();

        Ok(Matrix3::new(
            a_star,
            b_star * cos_gamma_star,
            c_star * cos_beta_star,
            0.0,
            b_star * sin_gamma_star,
            -c_star * sin_beta_star * alpha.cos(),
            0.0,
            0.0,
            2.0 * PI / self.c,
        ))
    }
}
