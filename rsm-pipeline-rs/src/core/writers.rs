//! Data writers for CSV outputs.
//!
//! This module writes:
//! - Reciprocal space point clouds (`qx,qy,qz,intensity`)
//! - Gridded volumes, one row per cell, with bin centers and occupancy
//! - Detector frames as numeric CSV matrices

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use thiserror::Error;

use super::frame::DetectorFrame;
use super::point_cloud::PointCloud;
use crate::processors::gridder::GriddedVolume;

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or open file for writing.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write data to file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV writing error.
    #[error("CSV write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Creates parent directories for a file path if they don't exist.
fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// Creates a CSV writer over a buffered file.
fn create_csv_writer(path: &Path) -> Result<csv::Writer<BufWriter<File>>> {
    ensure_parent_dirs(path)?;
    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(BufWriter::new(file)))
}

fn write_row<I, T>(writer: &mut csv::Writer<BufWriter<File>>, path: &Path, row: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    writer
        .write_record(row)
        .map_err(|e| WriteError::CsvError {
            path: path.display().to_string(),
            source: e,
        })
}

fn finish(mut writer: csv::Writer<BufWriter<File>>, path: &Path) -> Result<()> {
    writer.flush().map_err(|e| WriteError::WriteFile {
        path: path.display().to_string(),
        source: e,
    })
}

/// Write a point cloud to CSV with qx, qy, qz, intensity columns.
///
/// Values use the shortest exponent form that parses back to the same `f64`.
///
/// # Example
///
/// ```no_run
/// use rsm_pipeline::core::point_cloud::PointCloud;
/// use rsm_pipeline::core::writers::write_point_cloud_csv;
/// use std::path::Path;
///
/// let cloud = PointCloud::default();
/// write_point_cloud_csv(Path::new("points.csv"), &cloud).unwrap();
/// ```
pub fn write_point_cloud_csv(path: &Path, cloud: &PointCloud) -> Result<()> {
    let mut writer = create_csv_writer(path)?;

    write_row(&mut writer, path, ["qx", "qy", "qz", "intensity"])?;
    for point in cloud {
        write_row(
            &mut writer,
            path,
            [
                format!("{:e}", point.qx),
                format!("{:e}", point.qy),
                format!("{:e}", point.qz),
                format!("{:e}", point.intensity),
            ],
        )?;
    }

    finish(writer, path)
}

/// Write a gridded volume to CSV, one row per cell.
///
/// Columns: `ix,iy,iz,qx,qy,qz,intensity,occupancy,mean`, where `q*` are the
/// bin centers and `mean` is empty for cells without data.
pub fn write_grid_csv(path: &Path, volume: &GriddedVolume) -> Result<()> {
    let mut writer = create_csv_writer(path)?;
    let centers = [
        volume.spec.centers(0),
        volume.spec.centers(1),
        volume.spec.centers(2),
    ];

    write_row(
        &mut writer,
        path,
        ["ix", "iy", "iz", "qx", "qy", "qz", "intensity", "occupancy", "mean"],
    )?;
    for ((ix, iy, iz), &sum) in volume.intensity.indexed_iter() {
        let occupancy = volume.occupancy[(ix, iy, iz)];
        let mean = if occupancy > 0 {
            format!("{:e}", sum / occupancy as f64)
        } else {
            String::new()
        };
        write_row(
            &mut writer,
            path,
            [
                ix.to_string(),
                iy.to_string(),
                iz.to_string(),
                format!("{:e}", centers[0][ix]),
                format!("{:e}", centers[1][iy]),
                format!("{:e}", centers[2][iz]),
                format!("{:e}", sum),
                occupancy.to_string(),
                mean,
            ],
        )?;
    }

    finish(writer, path)
}

/// Write a detector frame as a headerless numeric CSV matrix.
pub fn write_frame_csv(path: &Path, frame: &DetectorFrame) -> Result<()> {
    let mut writer = create_csv_writer(path)?;
    for row in frame.rows() {
        write_row(&mut writer, path, row.iter().map(|v| v.to_string()))?;
    }
    finish(writer, path)
}
