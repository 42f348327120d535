//! Core data types and I/O operations.

pub mod frame;
pub mod loaders;
pub mod point_cloud;
pub mod source;
pub mod transforms;
pub mod writers;

pub use frame::{DetectorFrame, PixelCoordinateGrid, RegionError, RegionOfInterest};
pub use loaders::{FileScan, LoaderError};
pub use point_cloud::{PointCloud, ReciprocalPoint};
pub use source::{ImageSource, InMemoryScan, SourceError};
pub use writers::{write_grid_csv, write_point_cloud_csv, WriteError};
