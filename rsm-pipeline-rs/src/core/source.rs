//! Pull-based access to the exposures of one scan.

use thiserror::Error;

use super::frame::DetectorFrame;
use super::loaders::LoaderError;
use crate::geometry::ScanAngles;

/// Errors raised by image sources.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("exposure {index} out of range (scan has {count} exposures)")]
    NoSuchExposure { index: usize, count: usize },

    #[error("failed to load exposure data: {0}")]
    Loader(#[from] LoaderError),
}

/// Result type for image source operations.
pub type Result<T> = std::result::Result<T, SourceError>;

/// Everything the pipeline reads from a scan.
///
/// Implementations are shared between worker threads and must only read.
pub trait ImageSource: Sync {
    /// Name used in log messages.
    fn label(&self) -> String {
        "Set".to_string()
    }

    fn num_exposures(&self) -> usize;

    /// X-ray wavelength in angstrom.
    fn wavelength(&self) -> f64;

    fn frame(&self, index: usize) -> Result<DetectorFrame>;

    fn dark_frame(&self) -> Result<DetectorFrame>;

    /// Monitor (normalization) count of an exposure.
    fn monitor(&self, index: usize) -> Result<f64>;

    fn scan_angles(&self, index: usize) -> Result<ScanAngles>;
}

/// One exposure held in memory.
#[derive(Debug, Clone)]
pub struct Exposure {
    pub frame: DetectorFrame,
    pub monitor: f64,
    pub angles: ScanAngles,
}

/// Image source over frames that are already loaded.
#[derive(Debug, Clone)]
pub struct InMemoryScan {
    pub wavelength: f64,
    pub dark: DetectorFrame,
    pub exposures: Vec<Exposure>,
}

impl InMemoryScan {
    pub fn new(wavelength: f64, dark: DetectorFrame) -> Self {
        Self {
            wavelength,
            dark,
            exposures: Vec::new(),
        }
    }

    pub fn push(&mut self, frame: DetectorFrame, monitor: f64, angles: ScanAngles) {
        self.exposures.push(Exposure {
            frame,
            monitor,
            angles,
        });
    }

    fn exposure(&self, index: usize) -> Result<&Exposure> {
        self.exposures.get(index).ok_or(SourceError::NoSuchExposure {
            index,
            count: self.exposures.len(),
        })
    }
}

impl ImageSource for InMemoryScan {
    fn num_exposures(&self) -> usize {
        self.exposures.len()
    }

    fn wavelength(&self) -> f64 {
        self.wavelength
    }

    fn frame(&self, index: usize) -> Result<DetectorFrame> {
        Ok(self.exposure(index)?.frame.clone())
    }

    fn dark_frame(&self) -> Result<DetectorFrame> {
        Ok(self.dark.clone())
    }

    fn monitor(&self, index: usize) -> Result<f64> {
        Ok(self.exposure(index)?.monitor)
    }

    fn scan_angles(&self, index: usize) -> Result<ScanAngles> {
        Ok(self.exposure(index)?.angles)
    }
}
