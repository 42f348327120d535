//! Angle to reciprocal space conversion.
//!
//! The pipeline only needs the [`AngleToQ`] capability: a pure function from
//! wavelength, per-pixel detector angles and scalar sample angles to one Q
//! vector per pixel. [`SixCircle`] is the stock implementation.

pub mod lattice;
pub mod six_circle;

use std::fmt;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ConfigError;

pub use lattice::Lattice;
pub use six_circle::SixCircle;

/// Errors raised by geometry calculators.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("wavelength must be positive and finite, got {0}")]
    InvalidWavelength(f64),

    #[error("per-pixel angle arrays differ in length: {delta} deltas, {gamma} gammas")]
    LengthMismatch { delta: usize, gamma: usize },

    #[error("the hkl frame needs a UB matrix (set sample.lattice or sample.ub_matrix)")]
    MissingUb,

    #[error("UB matrix is singular")]
    SingularUb,

    #[error("invalid lattice: {0}")]
    InvalidLattice(String),
}

/// Result type for geometry operations.
pub type Result<T> = std::result::Result<T, GeometryError>;

/// Reference frame of the reported Q vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameMode {
    /// Frame attached to the theta stage
    Theta = 1,
    /// Frame attached to the phi stage
    Phi = 2,
    /// Laboratory frame
    Cartesian = 3,
    /// Reciprocal lattice units
    Hkl = 4,
}

impl TryFrom<u8> for FrameMode {
    type Error = ConfigError;

    fn try_from(mode: u8) -> std::result::Result<Self, Self::Error> {
        match mode {
            1 => Ok(FrameMode::Theta),
            2 => Ok(FrameMode::Phi),
            3 => Ok(FrameMode::Cartesian),
            4 => Ok(FrameMode::Hkl),
            other => Err(ConfigError::InvalidFrameMode(other)),
        }
    }
}

impl fmt::Display for FrameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FrameMode::Theta => "theta",
            FrameMode::Phi => "phi",
            FrameMode::Cartesian => "cartesian",
            FrameMode::Hkl => "hkl",
        };
        f.write_str(name)
    }
}

/// The six diffractometer angles of one exposure, in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanAngles {
    pub delta: f64,
    pub theta: f64,
    pub chi: f64,
    pub phi: f64,
    pub mu: f64,
    pub gamma: f64,
}

impl ScanAngles {
    /// The four sample circles.
    pub fn sample(&self) -> SampleAngles {
        SampleAngles {
            theta: self.theta,
            chi: self.chi,
            phi: self.phi,
            mu: self.mu,
        }
    }
}

/// Sample circle angles in degrees, shared by every pixel of an exposure.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SampleAngles {
    pub theta: f64,
    pub chi: f64,
    pub phi: f64,
    pub mu: f64,
}

/// Detector angles in degrees, one entry per pixel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PixelAngles {
    pub delta: Vec<f64>,
    pub gamma: Vec<f64>,
}

impl PixelAngles {
    #[inline]
    pub fn len(&self) -> usize {
        self.delta.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.delta.is_empty()
    }
}

/// Pure conversion from diffractometer angles to reciprocal vectors.
///
/// Implementations must not keep state between calls; the set aggregator
/// calls them from several threads at once.
pub trait AngleToQ: Sync {
    fn angles_to_q(
        &self,
        wavelength: f64,
        pixels: &PixelAngles,
        sample: &SampleAngles,
        frame: FrameMode,
    ) -> Result<Vec<Vector3<f64>>>;
}
