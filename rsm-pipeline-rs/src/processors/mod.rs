//! Data processing modules.

pub mod correction;
pub mod gridder;
pub mod image;
pub mod set;

use thiserror::Error;

use crate::config::ConfigError;
use crate::core::frame::RegionError;
use crate::core::source::SourceError;
use crate::geometry::GeometryError;

// Re-export key types for convenience
pub use correction::{correct_frame, DarkReference, MonitorOf};
pub use gridder::{grid, grid_point_cloud, GridError, GridSpec, GriddedVolume};
pub use image::{process_image, ExposureContext};
pub use set::{process_set, SetProcessor};

/// Errors raised while turning exposures into reciprocal space points.
#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid region of interest: {0}")]
    Region(#[from] RegionError),

    #[error("Q calculation failed: {0}")]
    Geometry(#[from] GeometryError),

    #[error("failed to read scan: {0}")]
    Source(#[from] SourceError),

    #[error("monitor of {frame} must be positive and finite, got {value}")]
    InvalidMonitor { frame: MonitorOf, value: f64 },

    #[error("exposure {exposure} has shape {found:?}, the first exposure has {expected:?}")]
    GeometryMismatch {
        exposure: usize,
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("dark frame has shape {found:?}, the exposures have {expected:?}")]
    DarkShapeMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("got {found} values for {expected} pixels")]
    PixelCountMismatch { expected: usize, found: usize },

    #[error("the scan contains no exposures")]
    EmptySet,
}

impl ProcessingError {
    /// True for errors caused by settings rather than by the data read.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            ProcessingError::Config(_)
                | ProcessingError::InvalidMonitor { .. }
                | ProcessingError::Region(
                    RegionError::EmptyExtent { .. }
                        | RegionError::ZeroOrigin { .. }
                        | RegionError::Unaddressable { .. }
                )
                | ProcessingError::Geometry(
                    GeometryError::InvalidWavelength(_)
                        | GeometryError::MissingUb
                        | GeometryError::SingularUb
                        | GeometryError::InvalidLattice(_)
                )
        )
    }
}

/// Result type for processing operations.
pub type Result<T> = std::result::Result<T, ProcessingError>;
