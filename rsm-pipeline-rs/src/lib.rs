//! Reciprocal space mapping of CCD X-ray diffraction scans.
//!
//! This crate provides tools for:
//! - Cutting a region of interest out of each detector exposure
//! - Dark frame subtraction and monitor normalization
//! - Mapping detector pixels to diffractometer angles and on to Q vectors
//! - Aggregating all exposures of a scan into one point cloud (parallelized)
//! - Gridding the point cloud into a regular 3D volume with occupancy
//!
//! # Example
//!
//! ```no_run
//! use rsm_pipeline::{
//!     config::PipelineConfig, core::loaders::FileScan, geometry::SixCircle,
//!     processors::{grid_point_cloud, process_set},
//! };
//!
//! let config = PipelineConfig::default();
//! let scan = FileScan::load("scan.csv", "dark.csv", 1.5406).unwrap();
//! let cloud = process_set(&scan, &SixCircle::new(), &config.resolve_scan().unwrap()).unwrap();
//! let volume = grid_point_cloud(&cloud, &config.grid.options().unwrap()).unwrap();
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod geometry;
pub mod processors;
pub mod visualization;

pub use config::{DetectorConfig, GridConfig, ImageConfig, PipelineConfig, SampleConfig};
pub use core::point_cloud::{PointCloud, ReciprocalPoint};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
