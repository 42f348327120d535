//! Dark frame subtraction and monitor normalization.

use std::fmt;

use ndarray::Array2;

use super::{ProcessingError, Result};
use crate::core::frame::{extract_roi, DetectorFrame, RegionOfInterest};

/// Which frame a monitor value belongs to, for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorOf {
    /// An exposure of a scan
    Exposure(usize),
    /// A single data frame corrected on its own
    Data,
    Dark,
}

impl fmt::Display for MonitorOf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorOf::Exposure(index) => write!(f, "exposure {}", index),
            MonitorOf::Data => f.write_str("the data frame"),
            MonitorOf::Dark => f.write_str("the dark frame"),
        }
    }
}

/// Reject monitors that would make the normalization meaningless.
pub fn check_monitor(frame: MonitorOf, monitor: f64) -> Result<f64> {
    if monitor.is_finite() && monitor > 0.0 {
        Ok(monitor)
    } else {
        Err(ProcessingError::InvalidMonitor {
            frame,
            value: monitor,
        })
    }
}

/// The dark frame's region of interest, already divided by its monitor.
///
/// Built once per set and subtracted from every exposure.
#[derive(Debug, Clone)]
pub struct DarkReference {
    scaled: Array2<f64>,
}

impl DarkReference {
    pub fn new(dark: &DetectorFrame, monitor: f64, roi: &RegionOfInterest) -> Result<Self> {
        let monitor = check_monitor(MonitorOf::Dark, monitor)?;
        let scaled = extract_roi(dark, roi)?.mapv(|v| v / monitor);
        Ok(Self { scaled })
    }

    /// `roi(data) / monitor - dark`. Negative results are kept.
    pub fn correct(
        &self,
        data: &DetectorFrame,
        monitor: f64,
        frame: MonitorOf,
        roi: &RegionOfInterest,
    ) -> Result<Array2<f64>> {
        let monitor = check_monitor(frame, monitor)?;
        let cut = extract_roi(data, roi)?;
        debug_assert_eq!(cut.dim(), self.scaled.dim());

        let mut corrected = cut.mapv(|v| v / monitor);
        corrected -= &self.scaled;
        Ok(corrected)
    }
}

/// One-shot correction:
/// `roi(data) / data_monitor - roi(dark) / dark_monitor`.
pub fn correct_frame(
    data: &DetectorFrame,
    data_monitor: f64,
    dark: &DetectorFrame,
    dark_monitor: f64,
    roi: &RegionOfInterest,
) -> Result<Array2<f64>> {
    DarkReference::new(dark, dark_monitor, roi)?.correct(
        data,
        data_monitor,
        MonitorOf::Data,
        roi,
    )
}
