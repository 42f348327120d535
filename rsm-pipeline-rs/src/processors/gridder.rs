//! Resampling of a reciprocal space point cloud onto a regular cuboid.
//!
//! The cuboid is the closed box `[q_min, q_max]` on every axis, cut into
//! `bins` equal cells. A point exactly at `q_max` belongs to the last cell;
//! points outside the box are counted and dropped, never clamped into an
//! edge cell. Cells accumulate an intensity sum and a point count.

use log::{debug, warn};
use ndarray::{Array2, Array3, Axis};
use rayon::prelude::*;
use thiserror::Error;

use crate::config::GridOptions;
use crate::core::point_cloud::PointCloud;

/// Bin count used on every axis when none is configured.
pub const DEFAULT_BINS: usize = 100;

/// Errors raised while setting up a grid.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GridError {
    #[error("cannot derive grid bounds from an empty point cloud")]
    EmptyCloud,

    #[error("axis {axis}: bounds must be finite, got [{q_min}, {q_max}]")]
    NonFiniteBounds { axis: usize, q_min: f64, q_max: f64 },

    #[error("axis {axis}: q_max ({q_max}) is below q_min ({q_min})")]
    InvertedAxis { axis: usize, q_min: f64, q_max: f64 },

    #[error("axis {axis}: bin count must be positive")]
    ZeroBins { axis: usize },
}

/// Result type for gridding operations.
pub type Result<T> = std::result::Result<T, GridError>;

/// Fully resolved cuboid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSpec {
    pub q_min: [f64; 3],
    pub q_max: [f64; 3],
    pub bins: [usize; 3],
}

impl GridSpec {
    pub fn new(q_min: [f64; 3], q_max: [f64; 3], bins: [usize; 3]) -> Result<Self> {
        for axis in 0..3 {
            let (lo, hi) = (q_min[axis], q_max[axis]);
            if !lo.is_finite() || !hi.is_finite() {
                return Err(GridError::NonFiniteBounds {
                    axis,
                    q_min: lo,
                    q_max: hi,
                });
            }
            if hi < lo {
                return Err(GridError::InvertedAxis {
                    axis,
                    q_min: lo,
                    q_max: hi,
                });
            }
            if bins[axis] == 0 {
                return Err(GridError::ZeroBins { axis });
            }
        }
        Ok(Self { q_min, q_max, bins })
    }

    /// Fill unset options from the data: bounds from the cloud's per-axis
    /// extent, [`DEFAULT_BINS`] cells per axis.
    pub fn resolve(options: &GridOptions, cloud: &PointCloud) -> Result<Self> {
        let bins = options.bins.unwrap_or([DEFAULT_BINS; 3]);

        let (q_min, q_max) = match (options.q_min, options.q_max) {
            (Some(lo), Some(hi)) => (lo, hi),
            (lo, hi) => {
                let (data_lo, data_hi) = cloud.q_bounds().ok_or(GridError::EmptyCloud)?;
                (lo.unwrap_or(data_lo), hi.unwrap_or(data_hi))
            }
        };

        Self::new(q_min, q_max, bins)
    }

    #[inline]
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.bins[0], self.bins[1], self.bins[2])
    }

    pub fn cell_count(&self) -> usize {
        self.bins.iter().product()
    }

    /// Width of one cell along `axis` (zero for a degenerate axis).
    pub fn bin_width(&self, axis: usize) -> f64 {
        (self.q_max[axis] - self.q_min[axis]) / self.bins[axis] as f64
    }

    /// Cell centers along `axis`.
    pub fn centers(&self, axis: usize) -> Vec<f64> {
        let width = self.bin_width(axis);
        (0..self.bins[axis])
            .map(|i| self.q_min[axis] + (i as f64 + 0.5) * width)
            .collect()
    }

    /// Cell index of `q` along `axis`, `None` when outside the closed range.
    #[inline]
    pub fn bin_index(&self, axis: usize, q: f64) -> Option<usize> {
        let (lo, hi, n) = (self.q_min[axis], self.q_max[axis], self.bins[axis]);
        // NaN fails both comparisons
        if !(q >= lo && q <= hi) {
            return None;
        }
        if hi == lo {
            return Some(0);
        }
        let raw = ((q - lo) / (hi - lo) * n as f64).floor() as usize;
        Some(raw.min(n - 1))
    }

    /// Cell of a Q vector, `None` if it falls outside on any axis.
    #[inline]
    pub fn cell(&self, q: [f64; 3]) -> Option<[usize; 3]> {
        Some([
            self.bin_index(0, q[0])?,
            self.bin_index(1, q[1])?,
            self.bin_index(2, q[2])?,
        ])
    }
}

/// Gridding result: per-cell sums and counts plus diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct GriddedVolume {
    pub spec: GridSpec,
    /// Summed intensity per cell
    pub intensity: Array3<f64>,
    /// Number of points per cell
    pub occupancy: Array3<u64>,
    /// Points outside the cuboid on at least one axis
    pub out_of_bounds: usize,
    /// Cells that received no point
    pub empty_cells: usize,
}

impl GriddedVolume {
    /// Points that landed inside the cuboid.
    pub fn points_in_grid(&self) -> u64 {
        self.occupancy.sum()
    }

    /// Mean intensity per cell; empty cells are `None`.
    pub fn mean(&self) -> Array3<Option<f64>> {
        let mut mean = Array3::from_elem(self.spec.shape(), None);
        ndarray::Zip::from(&mut mean)
            .and(&self.intensity)
            .and(&self.occupancy)
            .for_each(|m, &sum, &count| {
                if count > 0 {
                    *m = Some(sum / count as f64);
                }
            });
        mean
    }

    /// Mean intensity after summing the volume along `axis`.
    ///
    /// The remaining two axes keep their order, so projecting along z gives
    /// an `(nx, ny)` map.
    pub fn projected_mean(&self, axis: usize) -> Array2<Option<f64>> {
        let sums = self.intensity.sum_axis(Axis(axis));
        let counts = self.occupancy.sum_axis(Axis(axis));
        let mut mean = Array2::from_elem(sums.dim(), None);
        ndarray::Zip::from(&mut mean)
            .and(&sums)
            .and(&counts)
            .for_each(|m, &sum, &count| {
                if count > 0 {
                    *m = Some(sum / count as f64);
                }
            });
        mean
    }
}

/// Bin every point of `cloud` into the cuboid described by `spec`.
///
/// Points are sorted by cell and intensity before summation, so the result
/// does not depend on the order of the input.
pub fn grid(cloud: &PointCloud, spec: &GridSpec) -> GriddedVolume {
    let mut binned: Vec<([usize; 3], f64)> = cloud
        .points
        .par_iter()
        .filter_map(|p| spec.cell(p.q()).map(|cell| (cell, p.intensity)))
        .collect();
    let out_of_bounds = cloud.len() - binned.len();

    binned.par_sort_unstable_by(|a, b| a.0.cmp(&b.0).then(a.1.total_cmp(&b.1)));

    let mut intensity = Array3::<f64>::zeros(spec.shape());
    let mut occupancy = Array3::<u64>::zeros(spec.shape());
    for (cell, value) in binned {
        intensity[cell] += value;
        occupancy[cell] += 1;
    }

    let empty_cells = occupancy.iter().filter(|&&count| count == 0).count();

    GriddedVolume {
        spec: *spec,
        intensity,
        occupancy,
        out_of_bounds,
        empty_cells,
    }
}

/// Resolve the grid from `options` and the data, then grid the cloud.
///
/// Out-of-bounds points and empty cells are logged as warnings and returned
/// in the volume; they never fail the call.
pub fn grid_point_cloud(cloud: &PointCloud, options: &GridOptions) -> Result<GriddedVolume> {
    let spec = GridSpec::resolve(options, cloud)?;
    debug!(
        "Grid: q_min {:?}, q_max {:?}, bins {:?}",
        spec.q_min, spec.q_max, spec.bins
    );

    let volume = grid(cloud, &spec);

    if volume.out_of_bounds != 0 {
        warn!(
            "There are {:.2e} points outside the grid ({:.2e} points in the grid)",
            volume.out_of_bounds as f64,
            volume.points_in_grid() as f64
        );
    }
    if volume.empty_cells != 0 {
        warn!(
            "There are {:.2e} empty cells in the grid",
            volume.empty_cells as f64
        );
    }

    Ok(volume)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::point_cloud::ReciprocalPoint;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};

    fn point(q: [f64; 3], intensity: f64) -> ReciprocalPoint {
        ReciprocalPoint {
            qx: q[0],
            qy: q[1],
            qz: q[2],
            intensity,
        }
    }

    fn cloud(points: &[([f64; 3], f64)]) -> PointCloud {
        points.iter().map(|&(q, i)| point(q, i)).collect()
    }

    #[test]
    fn test_point_at_q_min_lands_in_first_cell() {
        let spec = GridSpec::new([-1.0, 0.0, 2.0], [1.0, 4.0, 3.0], [10, 8, 5]).unwrap();
        let volume = grid(&cloud(&[([-1.0, 0.0, 2.0], 3.0)]), &spec);

        assert_eq!(volume.out_of_bounds, 0);
        assert_eq!(volume.occupancy[[0, 0, 0]], 1);
        assert_eq!(volume.intensity[[0, 0, 0]], 3.0);
    }

    #[test]
    fn test_point_at_q_max_lands_in_last_cell() {
        let spec = GridSpec::new([-1.0, 0.0, 2.0], [1.0, 4.0, 3.0], [10, 8, 5]).unwrap();
        let volume = grid(&cloud(&[([1.0, 4.0, 3.0], 2.0)]), &spec);

        assert_eq!(volume.out_of_bounds, 0);
        assert_eq!(volume.occupancy[[9, 7, 4]], 1);
    }

    #[test]
    fn test_points_outside_are_excluded_not_clamped() {
        let spec = GridSpec::new([0.0; 3], [1.0; 3], [4, 4, 4]).unwrap();
        let points = cloud(&[
            ([0.5, 0.5, 0.5], 1.0),
            ([1.0 + 1e-12, 0.5, 0.5], 100.0),
            ([-1e-12, 0.5, 0.5], 100.0),
            ([0.5, 2.0, 0.5], 100.0),
            ([0.5, 0.5, f64::NAN], 100.0),
        ]);

        let volume = grid(&points, &spec);

        assert_eq!(volume.out_of_bounds, 4);
        assert_eq!(volume.points_in_grid(), 1);
        assert_eq!(volume.intensity.sum(), 1.0);
        assert_eq!(volume.intensity[[3, 2, 2]], 0.0);
        assert_eq!(volume.intensity[[0, 2, 2]], 0.0);
    }

    #[test]
    fn test_bin_index_linear_mapping() {
        let spec = GridSpec::new([0.0; 3], [4.0; 3], [4, 4, 4]).unwrap();
        assert_eq!(spec.bin_index(0, 0.0), Some(0));
        assert_eq!(spec.bin_index(0, 0.999), Some(0));
        assert_eq!(spec.bin_index(0, 1.0), Some(1));
        assert_eq!(spec.bin_index(0, 3.5), Some(3));
        assert_eq!(spec.bin_index(0, 4.0), Some(3));
        assert_eq!(spec.bin_index(0, 4.001), None);
        assert_eq!(spec.bin_index(0, -0.001), None);
    }

    #[test]
    fn test_degenerate_axis() {
        let spec = GridSpec::new([0.0, 0.0, 0.0], [3.0, 3.0, 0.0], [4, 4, 1]).unwrap();
        assert_eq!(spec.bin_index(2, 0.0), Some(0));
        assert_eq!(spec.bin_index(2, 1e-9), None);
        assert_eq!(spec.centers(2), vec![0.0]);
    }

    #[test]
    fn test_accumulates_sums_and_occupancy() {
        let spec = GridSpec::new([0.0; 3], [2.0; 3], [2, 2, 2]).unwrap();
        let points = cloud(&[
            ([0.1, 0.1, 0.1], 1.0),
            ([0.2, 0.3, 0.4], 2.5),
            ([1.5, 1.5, 1.5], 4.0),
        ]);

        let volume = grid(&points, &spec);

        assert_eq!(volume.occupancy[[0, 0, 0]], 2);
        assert_eq!(volume.intensity[[0, 0, 0]], 3.5);
        assert_eq!(volume.occupancy[[1, 1, 1]], 1);
        assert_eq!(volume.empty_cells, 6);

        let mean = volume.mean();
        assert_eq!(mean[[0, 0, 0]], Some(1.75));
        assert_eq!(mean[[1, 1, 1]], Some(4.0));
        assert_eq!(mean[[0, 1, 0]], None);
    }

    #[test]
    fn test_projected_mean() {
        let spec = GridSpec::new([0.0; 3], [2.0; 3], [2, 2, 2]).unwrap();
        let points = cloud(&[
            ([0.5, 0.5, 0.5], 1.0),
            ([0.5, 0.5, 1.5], 3.0),
            ([1.5, 0.5, 0.5], 5.0),
        ]);

        let projection = grid(&points, &spec).projected_mean(2);

        assert_eq!(projection.dim(), (2, 2));
        assert_eq!(projection[[0, 0]], Some(2.0));
        assert_eq!(projection[[1, 0]], Some(5.0));
        assert_eq!(projection[[0, 1]], None);
    }

    #[test]
    fn test_shuffled_input_gives_identical_volume() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut points: Vec<ReciprocalPoint> = (0..5000)
            .map(|_| {
                point(
                    [
                        rng.random::<f64>() * 2.0 - 1.0,
                        rng.random::<f64>() * 2.0 - 1.0,
                        rng.random::<f64>() * 0.5,
                    ],
                    rng.random::<f64>() * 1e3 - 10.0,
                )
            })
            .collect();
        let spec = GridSpec::new([-0.8, -0.8, 0.0], [0.8, 0.8, 0.4], [7, 9, 5]).unwrap();

        let reference = grid(&PointCloud::from_points(points.clone()), &spec);
        for _ in 0..3 {
            points.shuffle(&mut rng);
            let shuffled = grid(&PointCloud::from_points(points.clone()), &spec);
            assert_eq!(shuffled, reference);
        }
        assert!(reference.out_of_bounds > 0);
    }

    #[test]
    fn test_default_bounds_are_data_extent() {
        let points = cloud(&[
            ([-0.5, 2.0, 0.0], 1.0),
            ([0.25, -1.0, 0.125], 1.0),
            ([0.1, 0.0, -3.0], 1.0),
        ]);

        let volume = grid_point_cloud(&points, &GridOptions::default()).unwrap();

        assert_eq!(volume.spec.q_min, [-0.5, -1.0, -3.0]);
        assert_eq!(volume.spec.q_max, [0.25, 2.0, 0.125]);
        assert_eq!(volume.spec.bins, [100, 100, 100]);
        assert_eq!(volume.intensity.dim(), (100, 100, 100));
        assert_eq!(volume.out_of_bounds, 0);
        assert_eq!(volume.points_in_grid(), 3);
        assert_eq!(volume.empty_cells, volume.spec.cell_count() - 3);
    }

    #[test]
    fn test_partial_options_mix_with_data() {
        let points = cloud(&[([1.0, 1.0, 1.0], 1.0), ([2.0, 3.0, 4.0], 1.0)]);
        let options = GridOptions {
            q_min: Some([0.0, 0.0, 0.0]),
            q_max: None,
            bins: Some([2, 3, 4]),
        };

        let spec = GridSpec::resolve(&options, &points).unwrap();
        assert_eq!(spec.q_min, [0.0, 0.0, 0.0]);
        assert_eq!(spec.q_max, [2.0, 3.0, 4.0]);
        assert_eq!(spec.bins, [2, 3, 4]);
    }

    #[test]
    fn test_resolve_errors() {
        assert_eq!(
            GridSpec::resolve(&GridOptions::default(), &PointCloud::new()),
            Err(GridError::EmptyCloud)
        );
        assert!(matches!(
            GridSpec::new([1.0, 0.0, 0.0], [0.0, 1.0, 1.0], [1, 1, 1]),
            Err(GridError::InvertedAxis { axis: 0, .. })
        ));
        assert!(matches!(
            GridSpec::new([0.0; 3], [1.0; 3], [1, 0, 1]),
            Err(GridError::ZeroBins { axis: 1 })
        ));
        assert!(matches!(
            GridSpec::new([0.0; 3], [1.0, f64::INFINITY, 1.0], [1, 1, 1]),
            Err(GridError::NonFiniteBounds { axis: 1, .. })
        ));
    }

    #[test]
    fn test_explicit_bounds_ignore_empty_cloud() {
        let options = GridOptions {
            q_min: Some([0.0; 3]),
            q_max: Some([1.0; 3]),
            bins: Some([2, 2, 2]),
        };
        let volume = grid_point_cloud(&PointCloud::new(), &options).unwrap();
        assert_eq!(volume.empty_cells, 8);
        assert_eq!(volume.out_of_bounds, 0);
    }
}
