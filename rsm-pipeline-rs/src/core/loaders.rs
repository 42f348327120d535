//! Data loaders for detector frames, scan tables and point clouds.
//!
//! This module provides parsers for:
//! - Detector frames stored as numeric CSV matrices (one line per detector row)
//! - Scan tables listing every exposure with its monitor and six angles
//! - Reciprocal space point cloud CSV files (qx, qy, qz, intensity columns)

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, Trim};
use serde::Deserialize;
use thiserror::Error;

use super::frame::DetectorFrame;
use super::point_cloud::{PointCloud, ReciprocalPoint};
use super::source::{self, ImageSource, SourceError};
use crate::geometry::ScanAngles;

/// Errors that can occur during file loading.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Empty file: {0}")]
    EmptyFile(PathBuf),

    #[error("{path}: row {row} has {found} values, expected {expected}")]
    RaggedFrame {
        path: PathBuf,
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Missing required columns in {path}: {columns}")]
    MissingColumns { path: PathBuf, columns: String },

    #[error("Parse error in {path}, row {row}: {value:?} is not a number")]
    ParseError {
        path: PathBuf,
        row: usize,
        value: String,
    },
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

fn open(path: &Path) -> Result<BufReader<File>> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| LoaderError::Io {
            path: path.to_path_buf(),
            source,
        })
}

fn parse_value(path: &Path, row: usize, field: &str) -> Result<f64> {
    field.parse().map_err(|_| LoaderError::ParseError {
        path: path.to_path_buf(),
        row,
        value: field.to_string(),
    })
}

/// Load one detector frame from a headerless numeric CSV matrix.
///
/// Line `r` of the file is detector row `r + 1`; every line must have the
/// same number of values.
///
/// # Errors
///
/// Returns an error if the file is empty, ragged or contains non-numbers.
pub fn load_frame_csv<P: AsRef<Path>>(path: P) -> Result<DetectorFrame> {
    let path = path.as_ref();
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(open(path)?);

    let mut values = Vec::new();
    let mut cols = 0;
    let mut rows = 0;

    for (row, result) in reader.records().enumerate() {
        let record = result?;
        if row == 0 {
            cols = record.len();
        } else if record.len() != cols {
            return Err(LoaderError::RaggedFrame {
                path: path.to_path_buf(),
                row: row + 1,
                expected: cols,
                found: record.len(),
            });
        }
        for field in record.iter() {
            values.push(parse_value(path, row + 1, field)?);
        }
        rows += 1;
    }

    if rows == 0 || cols == 0 {
        return Err(LoaderError::EmptyFile(path.to_path_buf()));
    }

    DetectorFrame::from_shape_vec((rows, cols), values).map_err(|e| LoaderError::ParseError {
        path: path.to_path_buf(),
        row: rows,
        value: e.to_string(),
    })
}

/// One line of a scan table.
#[derive(Debug, Clone, Deserialize)]
pub struct ScanEntry {
    /// Frame file, relative to the scan table's directory unless absolute
    pub image: PathBuf,
    pub monitor: f64,
    pub delta: f64,
    pub theta: f64,
    pub chi: f64,
    pub phi: f64,
    pub mu: f64,
    pub gamma: f64,
}

impl ScanEntry {
    pub fn angles(&self) -> ScanAngles {
        ScanAngles {
            delta: self.delta,
            theta: self.theta,
            chi: self.chi,
            phi: self.phi,
            mu: self.mu,
            gamma: self.gamma,
        }
    }
}

/// Load a scan table with columns
/// `image,monitor,delta,theta,chi,phi,mu,gamma`.
pub fn load_scan_table<P: AsRef<Path>>(path: P) -> Result<Vec<ScanEntry>> {
    let path = path.as_ref();
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(open(path)?);

    let entries = reader
        .deserialize()
        .collect::<std::result::Result<Vec<ScanEntry>, csv::Error>>()?;

    if entries.is_empty() {
        return Err(LoaderError::EmptyFile(path.to_path_buf()));
    }
    Ok(entries)
}

/// Image source backed by a scan table and CSV frames on disk.
///
/// Frames are read lazily, one exposure at a time.
#[derive(Debug, Clone)]
pub struct FileScan {
    name: String,
    wavelength: f64,
    dark: PathBuf,
    entries: Vec<ScanEntry>,
}

impl FileScan {
    /// Load the scan table; image paths are resolved against its directory.
    pub fn load<P: AsRef<Path>, Q: AsRef<Path>>(
        table: P,
        dark: Q,
        wavelength: f64,
    ) -> Result<Self> {
        let table = table.as_ref();
        let base = table.parent().unwrap_or_else(|| Path::new("."));

        let entries = load_scan_table(table)?
            .into_iter()
            .map(|mut entry| {
                if entry.image.is_relative() {
                    entry.image = base.join(&entry.image);
                }
                entry
            })
            .collect();

        let name = table
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "Scan".to_string());

        Ok(Self {
            name,
            wavelength,
            dark: dark.as_ref().to_path_buf(),
            entries,
        })
    }

    pub fn entries(&self) -> &[ScanEntry] {
        &self.entries
    }

    fn entry(&self, index: usize) -> source::Result<&ScanEntry> {
        self.entries.get(index).ok_or(SourceError::NoSuchExposure {
            index,
            count: self.entries.len(),
        })
    }
}

impl ImageSource for FileScan {
    fn label(&self) -> String {
        self.name.clone()
    }

    fn num_exposures(&self) -> usize {
        self.entries.len()
    }

    fn wavelength(&self) -> f64 {
        self.wavelength
    }

    fn frame(&self, index: usize) -> source::Result<DetectorFrame> {
        Ok(load_frame_csv(&self.entry(index)?.image)?)
    }

    fn dark_frame(&self) -> source::Result<DetectorFrame> {
        Ok(load_frame_csv(&self.dark)?)
    }

    fn monitor(&self, index: usize) -> source::Result<f64> {
        Ok(self.entry(index)?.monitor)
    }

    fn scan_angles(&self, index: usize) -> source::Result<ScanAngles> {
        Ok(self.entry(index)?.angles())
    }
}

/// Load a reciprocal space point cloud from CSV.
///
/// Columns are looked up by (case-insensitive) name: qx, qy, qz, intensity.
pub fn load_point_cloud_csv<P: AsRef<Path>>(path: P) -> Result<PointCloud> {
    let path = path.as_ref();
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(open(path)?);

    let headers = reader.headers()?.clone();
    let col_map: HashMap<String, usize> = headers
        .iter()
        .enumerate()
        .map(|(i, name)| (name.to_lowercase(), i))
        .collect();

    let required = ["qx", "qy", "qz", "intensity"];
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|name| !col_map.contains_key(*name))
        .collect();
    if !missing.is_empty() {
        return Err(LoaderError::MissingColumns {
            path: path.to_path_buf(),
            columns: missing.join(", "),
        });
    }
    let idx = required.map(|name| col_map[name]);

    let mut cloud = PointCloud::with_capacity(10_000);
    for (row, result) in reader.records().enumerate() {
        let record = result?;
        let mut values = [0.0; 4];
        for (value, &col) in values.iter_mut().zip(idx.iter()) {
            let field = record.get(col).unwrap_or("");
            *value = parse_value(path, row + 2, field)?;
        }
        cloud.push(ReciprocalPoint {
            qx: values[0],
            qy: values[1],
            qz: values[2],
            intensity: values[3],
        });
    }

    if cloud.is_empty() {
        return Err(LoaderError::EmptyFile(path.to_path_buf()));
    }

    Ok(cloud)
}
