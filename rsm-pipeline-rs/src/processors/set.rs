//! Aggregation of every exposure of a scan into one point cloud.
//!
//! Exposure 0 is processed first: it fixes the frame shape, the default
//! region of interest and the number of points per exposure. The output
//! buffer is then sized once and the remaining exposures are transformed in
//! parallel, each writing its own disjoint block, so the final order is
//! exposure order followed by pixel order regardless of scheduling.

use log::{debug, info};
use rayon::prelude::*;

use super::correction::{check_monitor, DarkReference, MonitorOf};
use super::image::{process_image, ExposureContext};
use super::{ProcessingError, Result};
use crate::config::ScanSettings;
use crate::core::frame::{extract_coordinates, DetectorFrame, RegionOfInterest};
use crate::core::point_cloud::{PointCloud, ReciprocalPoint};
use crate::core::source::ImageSource;
use crate::geometry::AngleToQ;

/// Processes the exposures of one [`ImageSource`] with one Q calculator.
pub struct SetProcessor<'a, S: ImageSource + ?Sized, G: AngleToQ + ?Sized> {
    source: &'a S,
    calculator: &'a G,
    settings: &'a ScanSettings,
}

impl<'a, S: ImageSource + ?Sized, G: AngleToQ + ?Sized> SetProcessor<'a, S, G> {
    pub fn new(source: &'a S, calculator: &'a G, settings: &'a ScanSettings) -> Self {
        Self {
            source,
            calculator,
            settings,
        }
    }

    /// Transform all exposures into `(qx, qy, qz, intensity)` points.
    pub fn process(&self) -> Result<PointCloud> {
        self.process_with_progress(|_| {})
    }

    /// Like [`process`](Self::process), calling `on_exposure` with the index
    /// of every exposure once it is done. Calls may come from worker threads
    /// and in any order.
    pub fn process_with_progress<F>(&self, on_exposure: F) -> Result<PointCloud>
    where
        F: Fn(usize) + Sync,
    {
        let label = self.source.label();
        let count = self.source.num_exposures();
        if count == 0 {
            return Err(ProcessingError::EmptySet);
        }

        info!(
            "{}: transforming {} exposures to (Qx, Qy, Qz, I) in the {} frame",
            label, count, self.settings.frame_mode
        );

        let first = self.source.frame(0)?;
        let shape = first.dim();
        let roi = match self.settings.roi {
            Some(roi) => roi,
            None => RegionOfInterest::full_frame(&first)?,
        };
        roi.check_within(shape)?;
        debug!("{}: region of interest {:?} on a {:?} frame", label, roi, shape);

        let dark_frame = self.source.dark_frame()?;
        if dark_frame.dim() != shape {
            return Err(ProcessingError::DarkShapeMismatch {
                expected: shape,
                found: dark_frame.dim(),
            });
        }
        // The dark frame is always normalized by the monitor of exposure 0
        let dark_monitor = check_monitor(MonitorOf::Exposure(0), self.source.monitor(0)?)?;
        let dark = DarkReference::new(&dark_frame, dark_monitor, &roi)?;
        drop(dark_frame);
        let coords = extract_coordinates(&roi);
        let ctx = ExposureContext {
            detector: &self.settings.detector,
            coords: &coords,
            wavelength: self.source.wavelength(),
            frame_mode: self.settings.frame_mode,
        };

        let first_points = self.transform(&label, &ctx, &dark, &roi, 0, first)?;
        let per_exposure = first_points.len();
        on_exposure(0);

        let mut points = vec![ReciprocalPoint::default(); per_exposure * count];
        points[..per_exposure].copy_from_slice(&first_points);
        drop(first_points);

        if count > 1 && per_exposure > 0 {
            points[per_exposure..]
                .par_chunks_mut(per_exposure)
                .enumerate()
                .try_for_each(|(offset, block)| -> Result<()> {
                    let index = offset + 1;
                    let frame = self.source.frame(index)?;
                    if frame.dim() != shape {
                        return Err(ProcessingError::GeometryMismatch {
                            exposure: index,
                            expected: shape,
                            found: frame.dim(),
                        });
                    }

                    let image = self.transform(&label, &ctx, &dark, &roi, index, frame)?;
                    if image.len() != block.len() {
                        return Err(ProcessingError::PixelCountMismatch {
                            expected: block.len(),
                            found: image.len(),
                        });
                    }
                    block.copy_from_slice(&image);
                    on_exposure(index);
                    Ok(())
                })?;
        }

        info!("{}: {} points from {} exposures", label, points.len(), count);
        Ok(PointCloud::from_points(points))
    }

    fn transform(
        &self,
        label: &str,
        ctx: &ExposureContext<'_>,
        dark: &DarkReference,
        roi: &RegionOfInterest,
        index: usize,
        frame: DetectorFrame,
    ) -> Result<Vec<ReciprocalPoint>> {
        debug!("{} image #{:03}: read image", label, index);
        let monitor = self.source.monitor(index)?;
        let corrected = dark.correct(&frame, monitor, MonitorOf::Exposure(index), roi)?;
        drop(frame);

        let angles = self.source.scan_angles(index)?;
        debug!("{} image #{:03}: get (Qx, Qy, Qz)", label, index);
        process_image(&corrected, &angles, ctx, self.calculator)
    }
}

/// Transform every exposure of `source` into one point cloud.
///
/// # Example
///
/// ```no_run
/// use rsm_pipeline::config::PipelineConfig;
/// use rsm_pipeline::core::loaders::FileScan;
/// use rsm_pipeline::geometry::SixCircle;
/// use rsm_pipeline::processors::process_set;
///
/// let settings = PipelineConfig::default().resolve_scan().unwrap();
/// let scan = FileScan::load("scan.csv", "dark.csv", 1.5406).unwrap();
/// let cloud = process_set(&scan, &SixCircle::new(), &settings).unwrap();
/// ```
pub fn process_set<S, G>(source: &S, calculator: &G, settings: &ScanSettings) -> Result<PointCloud>
where
    S: ImageSource + ?Sized,
    G: AngleToQ + ?Sized,
{
    SetProcessor::new(source, calculator, settings).process()
}
