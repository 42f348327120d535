//! Configuration types for the reciprocal space mapping pipeline.
//!
//! Every option that can be left unset is an `Option` here; the pipeline
//! resolves them into immutable snapshots ([`DetectorGeometry`],
//! [`ScanSettings`], [`GridOptions`]) before any processing starts.

use std::path::Path;

use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::frame::RegionOfInterest;
use crate::geometry::{FrameMode, Lattice};

/// Errors raised while loading or resolving configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("mode = {0} is no proper frame mode: choose theta (1), phi (2), cartesian (3) or hkl (4)")]
    InvalidFrameMode(u8),

    #[error("invalid detector parameter '{name}': {value}")]
    InvalidDetector { name: &'static str, value: f64 },

    #[error("invalid region of interest {roi:?}: {reason}")]
    InvalidRoi { roi: [usize; 4], reason: String },

    #[error("invalid grid options: {0}")]
    InvalidGrid(String),

    #[error("invalid sample description: {0}")]
    InvalidSample(String),
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Detector setup as entered by the user, before binning is applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Sample to detector distance in millimeters
    #[serde(default = "default_distance")]
    pub distance_mm: f64,

    /// Unbinned pixel pitch along x in millimeters
    #[serde(default = "default_pixel_size")]
    pub pixel_size_x_mm: f64,

    /// Unbinned pixel pitch along y in millimeters
    #[serde(default = "default_pixel_size")]
    pub pixel_size_y_mm: f64,

    /// Unbinned detector width in pixels
    #[serde(default = "default_size_x")]
    pub size_x: usize,

    /// Unbinned detector height in pixels
    #[serde(default = "default_size_y")]
    pub size_y: usize,

    /// Unbinned x pixel of the reference point (defaults to size_x / 2)
    #[serde(default)]
    pub center_x: Option<f64>,

    /// Unbinned y pixel of the reference point (defaults to size_y / 2)
    #[serde(default)]
    pub center_y: Option<f64>,

    /// On-chip binning along x
    #[serde(default = "default_bin")]
    pub bin_x: u32,

    /// On-chip binning along y
    #[serde(default = "default_bin")]
    pub bin_y: u32,
}

fn default_distance() -> f64 {
    300.0
}

fn default_pixel_size() -> f64 {
    0.020
}

fn default_size_x() -> usize {
    1300
}

fn default_size_y() -> usize {
    1340
}

fn default_bin() -> u32 {
    1
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            distance_mm: default_distance(),
            pixel_size_x_mm: default_pixel_size(),
            pixel_size_y_mm: default_pixel_size(),
            size_x: default_size_x(),
            size_y: default_size_y(),
            center_x: None,
            center_y: None,
            bin_x: default_bin(),
            bin_y: default_bin(),
        }
    }
}

/// Detector constants after binning, as used by the pixel geometry mapper.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorGeometry {
    pub distance: f64,
    pub pixel_size_x: f64,
    pub pixel_size_y: f64,
    pub size_x: f64,
    pub size_y: f64,
    pub center_x: f64,
    pub center_y: f64,
}

impl DetectorConfig {
    /// Apply binning and validate the detector constants.
    ///
    /// Binning multiplies the pixel pitch and divides the detector size and
    /// the reference pixel.
    pub fn resolve(&self) -> Result<DetectorGeometry> {
        check_positive("distance_mm", self.distance_mm)?;
        check_positive("pixel_size_x_mm", self.pixel_size_x_mm)?;
        check_positive("pixel_size_y_mm", self.pixel_size_y_mm)?;
        check_positive("bin_x", self.bin_x as f64)?;
        check_positive("bin_y", self.bin_y as f64)?;

        let bin_x = self.bin_x as f64;
        let bin_y = self.bin_y as f64;
        let size_x = self.size_x as f64;
        let size_y = self.size_y as f64;
        let center_x = self.center_x.unwrap_or(size_x / 2.0);
        let center_y = self.center_y.unwrap_or(size_y / 2.0);

        Ok(DetectorGeometry {
            distance: self.distance_mm,
            pixel_size_x: self.pixel_size_x_mm * bin_x,
            pixel_size_y: self.pixel_size_y_mm * bin_y,
            size_x: size_x / bin_x,
            size_y: size_y / bin_y,
            center_x: center_x / bin_x,
            center_y: center_y / bin_y,
        })
    }
}

fn check_positive(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidDetector { name, value })
    }
}

/// Image treatment options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    /// Region of interest `[x_min, x_width, y_min, y_height]`, 1-based.
    /// Unset means the full frame.
    #[serde(default)]
    pub roi: Option<[usize; 4]>,

    /// Reference frame of the emitted Q vectors (1 = theta, 2 = phi,
    /// 3 = cartesian, 4 = hkl)
    #[serde(default = "default_frame_mode")]
    pub frame_mode: u8,
}

fn default_frame_mode() -> u8 {
    1
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            roi: None,
            frame_mode: default_frame_mode(),
        }
    }
}

impl ImageConfig {
    /// Validate the optional region of interest without knowing the frame.
    pub fn region(&self) -> Result<Option<RegionOfInterest>> {
        self.roi
            .map(|roi| {
                RegionOfInterest::from_array(roi).map_err(|e| ConfigError::InvalidRoi {
                    roi,
                    reason: e.to_string(),
                })
            })
            .transpose()
    }
}

/// Gridding options. Unset values are derived from the data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GridConfig {
    /// Lower corner of the cuboid `[qx, qy, qz]`
    #[serde(default)]
    pub q_min: Option<[f64; 3]>,

    /// Upper corner of the cuboid `[qx, qy, qz]`
    #[serde(default)]
    pub q_max: Option<[f64; 3]>,

    /// Number of bins per axis `[nqx, nqy, nqz]`
    #[serde(default)]
    pub bins: Option<[usize; 3]>,
}

/// Validated, still partially unresolved, gridding options.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GridOptions {
    pub q_min: Option<[f64; 3]>,
    pub q_max: Option<[f64; 3]>,
    pub bins: Option<[usize; 3]>,
}

impl GridConfig {
    pub fn options(&self) -> Result<GridOptions> {
        if let Some(bins) = self.bins {
            if bins.iter().any(|&n| n == 0) {
                return Err(ConfigError::InvalidGrid(format!(
                    "bin counts must be positive, got {:?}",
                    bins
                )));
            }
        }
        for corner in [self.q_min, self.q_max].into_iter().flatten() {
            if corner.iter().any(|q| !q.is_finite()) {
                return Err(ConfigError::InvalidGrid(format!(
                    "grid bounds must be finite, got {:?}",
                    corner
                )));
            }
        }
        Ok(GridOptions {
            q_min: self.q_min,
            q_max: self.q_max,
            bins: self.bins,
        })
    }
}

/// Sample orientation, only needed for the hkl frame.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SampleConfig {
    /// Direct lattice parameters; builds B
    #[serde(default)]
    pub lattice: Option<Lattice>,

    /// Orientation matrix U (row-major), identity when unset
    #[serde(default)]
    pub orientation: Option<[[f64; 3]; 3]>,

    /// Full UB matrix (row-major); takes precedence over lattice/orientation
    #[serde(default)]
    pub ub_matrix: Option<[[f64; 3]; 3]>,
}

impl SampleConfig {
    /// Build the UB matrix, if the sample is described at all.
    pub fn ub(&self) -> Result<Option<Matrix3<f64>>> {
        if let Some(ub) = self.ub_matrix {
            return Ok(Some(matrix_from_rows(ub)));
        }
        let Some(lattice) = &self.lattice else {
            return Ok(None);
        };
        let b = lattice
            .b_matrix()
            .map_err(|e| ConfigError::InvalidSample(e.to_string()))?;
        let u = self
            .orientation
            .map(matrix_from_rows)
            .unwrap_or_else(Matrix3::identity);
        Ok(Some(u * b))
    }
}

fn matrix_from_rows(rows: [[f64; 3]; 3]) -> Matrix3<f64> {
    Matrix3::new(
        rows[0][0], rows[0][1], rows[0][2], rows[1][0], rows[1][1], rows[1][2], rows[2][0],
        rows[2][1], rows[2][2],
    )
}

/// Everything the set aggregator needs, resolved once per scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanSettings {
    pub detector: DetectorGeometry,
    /// `None` means "full frame", fixed from the first frame read.
    pub roi: Option<RegionOfInterest>,
    pub frame_mode: FrameMode,
}

/// Main pipeline configuration combining all sub-configs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub detector: DetectorConfig,

    #[serde(default)]
    pub image: ImageConfig,

    #[serde(default)]
    pub grid: GridConfig,

    #[serde(default)]
    pub sample: SampleConfig,
}

impl PipelineConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Resolve the per-scan snapshot used by the image processing stages.
    pub fn resolve_scan(&self) -> Result<ScanSettings> {
        Ok(ScanSettings {
            detector: self.detector.resolve()?,
            roi: self.image.region()?,
            frame_mode: FrameMode::try_from(self.image.frame_mode)?,
        })
    }
}
