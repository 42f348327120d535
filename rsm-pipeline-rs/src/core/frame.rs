//! Detector frames and region of interest handling.
//!
//! Frames are indexed `(row, col) = (y, x)`. Regions of interest use the
//! 1-based detector pixel convention `[x_min, x_width, y_min, y_height]`.

use ndarray::{s, Array2, ArrayView2};
use thiserror::Error;

/// One exposure read from the detector.
pub type DetectorFrame = Array2<f64>;

/// Errors raised for malformed or misplaced regions of interest.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegionError {
    #[error("region extents must be positive (x_width = {x_width}, y_height = {y_height})")]
    EmptyExtent { x_width: usize, y_height: usize },

    #[error("region origin is 1-based (x_min = {x_min}, y_min = {y_min})")]
    ZeroOrigin { x_min: usize, y_min: usize },

    #[error("region [{x_min}, {x_width}, {y_min}, {y_height}] exceeds the addressable pixel range")]
    Unaddressable {
        x_min: usize,
        x_width: usize,
        y_min: usize,
        y_height: usize,
    },

    #[error(
        "region x {x_min}..={x_last}, y {y_min}..={y_last} exceeds the {cols}x{rows} frame"
    )]
    OutOfFrame {
        x_min: usize,
        x_last: usize,
        y_min: usize,
        y_last: usize,
        cols: usize,
        rows: usize,
    },
}

/// Result type for region operations.
pub type Result<T> = std::result::Result<T, RegionError>;

/// Rectangular detector window, 1-based origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegionOfInterest {
    pub x_min: usize,
    pub x_width: usize,
    pub y_min: usize,
    pub y_height: usize,
}

impl RegionOfInterest {
    pub fn new(x_min: usize, x_width: usize, y_min: usize, y_height: usize) -> Result<Self> {
        if x_width == 0 || y_height == 0 {
            return Err(RegionError::EmptyExtent { x_width, y_height });
        }
        if x_min == 0 || y_min == 0 {
            return Err(RegionError::ZeroOrigin { x_min, y_min });
        }
        let addressable = x_min.checked_add(x_width).is_some()
            && y_min.checked_add(y_height).is_some()
            && x_width.checked_mul(y_height).is_some();
        if !addressable {
            return Err(RegionError::Unaddressable {
                x_min,
                x_width,
                y_min,
                y_height,
            });
        }
        Ok(Self {
            x_min,
            x_width,
            y_min,
            y_height,
        })
    }

    /// Build from `[x_min, x_width, y_min, y_height]`.
    pub fn from_array(roi: [usize; 4]) -> Result<Self> {
        Self::new(roi[0], roi[1], roi[2], roi[3])
    }

    /// The whole frame as a region.
    pub fn full_frame(frame: &DetectorFrame) -> Result<Self> {
        let (rows, cols) = frame.dim();
        Self::new(1, cols, 1, rows)
    }

    /// Shape of the extracted window as `(rows, cols)`.
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.y_height, self.x_width)
    }

    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.x_width * self.y_height
    }

    /// Check that the region lies inside a frame of shape `(rows, cols)`.
    ///
    /// The fields are public, so the constructor invariants are checked again.
    pub fn check_within(&self, (rows, cols): (usize, usize)) -> Result<()> {
        Self::new(self.x_min, self.x_width, self.y_min, self.y_height)?;
        let x_last = self.x_min + self.x_width - 1;
        let y_last = self.y_min + self.y_height - 1;
        if x_last > cols || y_last > rows {
            return Err(RegionError::OutOfFrame {
                x_min: self.x_min,
                x_last,
                y_min: self.y_min,
                y_last,
                cols,
                rows,
            });
        }
        Ok(())
    }
}

/// Flattened detector coordinates of every pixel in a region.
///
/// Position `i` matches position `i` of the row-major flattened ROI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelCoordinateGrid {
    pub x: Vec<usize>,
    pub y: Vec<usize>,
}

impl PixelCoordinateGrid {
    #[inline]
    pub fn len(&self) -> usize {
        self.x.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// Cut the region of interest out of a full frame.
///
/// The returned view has shape `(y_height, x_width)`.
pub fn extract_roi<'a>(
    frame: &'a DetectorFrame,
    roi: &RegionOfInterest,
) -> Result<ArrayView2<'a, f64>> {
    roi.check_within(frame.dim())?;

    let y0 = roi.y_min - 1;
    let x0 = roi.x_min - 1;
    Ok(frame.slice(s![y0..y0 + roi.y_height, x0..x0 + roi.x_width]))
}

/// Detector coordinates covering `[x_min, x_min + x_width) x [y_min, y_min + y_height)`.
pub fn extract_coordinates(roi: &RegionOfInterest) -> PixelCoordinateGrid {
    let n = roi.pixel_count();
    let mut x = Vec::with_capacity(n);
    let mut y = Vec::with_capacity(n);

    for row in roi.y_min..roi.y_min + roi.y_height {
        for col in roi.x_min..roi.x_min + roi.x_width {
            x.push(col);
            y.push(row);
        }
    }

    PixelCoordinateGrid { x, y }
}
