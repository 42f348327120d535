//! End-to-end tests: scan in, gridded volume out.

use std::fs;
use std::path::Path;

use nalgebra::Vector3;
use ndarray::Array2;
use tempfile::tempdir;

use rsm_pipeline::config::{DetectorGeometry, GridOptions, PipelineConfig, ScanSettings};
use rsm_pipeline::core::loaders::{load_point_cloud_csv, FileScan};
use rsm_pipeline::core::source::InMemoryScan;
use rsm_pipeline::core::writers::{write_frame_csv, write_point_cloud_csv};
use rsm_pipeline::geometry::{
    self, AngleToQ, FrameMode, PixelAngles, SampleAngles, ScanAngles, SixCircle,
};
use rsm_pipeline::processors::{grid, grid_point_cloud, process_set, GridSpec};

/// Undoes the pixel to angle mapping of a detector with unit distance and
/// pitch whose reference pixel is (1, 1), so Q = (x - 1, y - 1, 0).
struct PixelIdentity;

impl AngleToQ for PixelIdentity {
    fn angles_to_q(
        &self,
        _wavelength: f64,
        pixels: &PixelAngles,
        _sample: &SampleAngles,
        _frame: FrameMode,
    ) -> geometry::Result<Vec<Vector3<f64>>> {
        let offset = |angle: f64| (-angle.to_radians().tan()).round();
        Ok(pixels
            .delta
            .iter()
            .zip(&pixels.gamma)
            .map(|(&d, &g)| Vector3::new(offset(g), offset(d), 0.0))
            .collect())
    }
}

fn unit_detector() -> DetectorGeometry {
    DetectorGeometry {
        distance: 1.0,
        pixel_size_x: 1.0,
        pixel_size_y: 1.0,
        size_x: 4.0,
        size_y: 4.0,
        center_x: 1.0,
        center_y: 1.0,
    }
}

#[test]
fn test_single_exposure_fills_every_cell_once() {
    let mut scan = InMemoryScan::new(1.0, Array2::zeros((4, 4)));
    scan.push(Array2::ones((4, 4)), 1.0, ScanAngles::default());
    let settings = ScanSettings {
        detector: unit_detector(),
        roi: None,
        frame_mode: FrameMode::Cartesian,
    };

    let cloud = process_set(&scan, &PixelIdentity, &settings).unwrap();

    assert_eq!(cloud.len(), 16);
    for (i, point) in cloud.iter().enumerate() {
        assert_eq!(point.intensity, 1.0);
        assert_eq!(point.qx, (i % 4) as f64);
        assert_eq!(point.qy, (i / 4) as f64);
        assert_eq!(point.qz, 0.0);
    }

    let spec = GridSpec::new([0.0, 0.0, 0.0], [3.0, 3.0, 0.0], [4, 4, 1]).unwrap();
    let volume = grid(&cloud, &spec);

    assert_eq!(volume.out_of_bounds, 0);
    assert_eq!(volume.empty_cells, 0);
    assert!(volume.occupancy.iter().all(|&count| count == 1));
    assert!(volume.intensity.iter().all(|&sum| sum == 1.0));
}

#[test]
fn test_default_grid_bounds_are_data_extent() {
    let mut scan = InMemoryScan::new(1.0, Array2::zeros((4, 4)));
    scan.push(Array2::from_elem((4, 4), 2.0), 1.0, ScanAngles::default());
    let settings = ScanSettings {
        detector: unit_detector(),
        roi: None,
        frame_mode: FrameMode::Cartesian,
    };
    let cloud = process_set(&scan, &PixelIdentity, &settings).unwrap();

    let volume = grid_point_cloud(
        &cloud,
        &GridOptions {
            bins: Some([2, 2, 1]),
            ..GridOptions::default()
        },
    )
    .unwrap();

    assert_eq!(volume.spec.q_min, [0.0, 0.0, 0.0]);
    assert_eq!(volume.spec.q_max, [3.0, 3.0, 0.0]);
    assert_eq!(volume.out_of_bounds, 0);
    assert_eq!(volume.points_in_grid(), 16);
    assert!(volume.occupancy.iter().all(|&count| count == 4));
}

fn write_scan_table(path: &Path, rows: &[(&str, f64, f64, f64)]) {
    let mut content = String::from("image,monitor,delta,theta,chi,phi,mu,gamma\n");
    for (image, monitor, delta, theta) in rows {
        content.push_str(&format!("{},{},{},{},0,0,0,0\n", image, monitor, delta, theta));
    }
    fs::write(path, content).unwrap();
}

#[test]
fn test_scan_from_files_with_yaml_config() {
    let dir = tempdir().unwrap();

    write_frame_csv(&dir.path().join("dark.csv"), &Array2::from_elem((3, 4), 1.0)).unwrap();
    write_frame_csv(
        &dir.path().join("img_000.csv"),
        &Array2::from_elem((3, 4), 11.0),
    )
    .unwrap();
    write_frame_csv(
        &dir.path().join("img_001.csv"),
        &Array2::from_elem((3, 4), 21.0),
    )
    .unwrap();
    let table = dir.path().join("scan_42.csv");
    write_scan_table(
        &table,
        &[("img_000.csv", 1.0, 20.0, 10.0), ("img_001.csv", 2.0, 22.0, 11.0)],
    );

    let config_path = dir.path().join("rsm.yaml");
    fs::write(
        &config_path,
        "detector:\n  distance_mm: 300.0\n  pixel_size_x_mm: 0.1\n  pixel_size_y_mm: 0.1\n  \
         size_x: 4\n  size_y: 3\n  center_x: 2.0\n  center_y: 2.0\n\
         image:\n  frame_mode: 3\n",
    )
    .unwrap();
    let config = PipelineConfig::from_yaml(&config_path).unwrap();
    let settings = config.resolve_scan().unwrap();
    assert_eq!(settings.frame_mode, FrameMode::Cartesian);

    let wavelength = 1.5406;
    let scan = FileScan::load(&table, dir.path().join("dark.csv"), wavelength).unwrap();
    let cloud = process_set(&scan, &SixCircle::new(), &settings).unwrap();

    assert_eq!(cloud.len(), 24);
    // the dark frame is scaled by the first exposure's monitor
    assert!(cloud.points[..12].iter().all(|p| p.intensity == 10.0));
    assert!(cloud.points[12..].iter().all(|p| p.intensity == 9.5));

    // pixel (2, 2) sits at flat index 5 and sees the nominal angles
    let k = 2.0 * std::f64::consts::PI / wavelength;
    let delta = 20.0_f64.to_radians();
    let reference = cloud.points[5];
    assert!((reference.qx - k * delta.sin()).abs() < 1e-12);
    assert!((reference.qy - k * (delta.cos() - 1.0)).abs() < 1e-12);
    assert!(reference.qz.abs() < 1e-12);

    let points_path = dir.path().join("out").join("points.csv");
    write_point_cloud_csv(&points_path, &cloud).unwrap();
    let reloaded = load_point_cloud_csv(&points_path).unwrap();
    assert_eq!(reloaded.len(), cloud.len());

    let volume = grid_point_cloud(&reloaded, &config.grid.options().unwrap()).unwrap();
    assert_eq!(volume.spec.bins, [100, 100, 100]);
    assert_eq!(volume.out_of_bounds, 0);
    assert_eq!(volume.points_in_grid(), 24);
}

#[test]
fn test_missing_frame_file_fails_the_set() {
    let dir = tempdir().unwrap();
    write_frame_csv(&dir.path().join("dark.csv"), &Array2::zeros((2, 2))).unwrap();
    write_frame_csv(&dir.path().join("img_000.csv"), &Array2::ones((2, 2))).unwrap();
    let table = dir.path().join("scan.csv");
    write_scan_table(
        &table,
        &[("img_000.csv", 1.0, 20.0, 10.0), ("missing.csv", 1.0, 20.0, 10.0)],
    );

    let scan = FileScan::load(&table, dir.path().join("dark.csv"), 1.0).unwrap();
    let settings = PipelineConfig::default().resolve_scan().unwrap();

    assert!(process_set(&scan, &SixCircle::new(), &settings).is_err());
}
