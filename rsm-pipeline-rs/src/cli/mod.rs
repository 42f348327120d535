//! Command-line interface for the reciprocal space mapping pipeline.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::core::loaders::{load_point_cloud_csv, FileScan};
use crate::core::point_cloud::PointCloud;
use crate::core::source::ImageSource;
use crate::core::writers::{write_grid_csv, write_point_cloud_csv};
use crate::geometry::{FrameMode, SixCircle};
use crate::processors::gridder::{grid_point_cloud, GriddedVolume};
use crate::processors::SetProcessor;
use crate::visualization::plot_projection;
use crate::PipelineConfig;

#[derive(Parser)]
#[command(name = "rsm-pipeline")]
#[command(about = "Reciprocal space mapping of CCD diffraction scans", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command that reads a scan.
#[derive(clap::Args)]
struct ScanArgs {
    /// Scan table CSV (image,monitor,delta,theta,chi,phi,mu,gamma)
    scan_table: PathBuf,
    /// Dark frame CSV
    #[arg(short, long)]
    dark: PathBuf,
    /// X-ray wavelength in angstrom
    #[arg(short, long)]
    wavelength: f64,
    /// Frame of the Q vectors: 1 theta, 2 phi, 3 cartesian, 4 hkl
    #[arg(short, long)]
    mode: Option<u8>,
    /// Region of interest: x_min x_width y_min y_height (1-based)
    #[arg(long, num_args = 4, value_names = ["X_MIN", "X_WIDTH", "Y_MIN", "Y_HEIGHT"])]
    roi: Option<Vec<usize>>,
}

/// Grid overrides on top of the config file.
#[derive(clap::Args)]
struct GridArgs {
    /// Number of bins along qx, qy and qz
    #[arg(long, num_args = 3, value_names = ["NX", "NY", "NZ"])]
    bins: Option<Vec<usize>>,
}

#[derive(Subcommand)]
enum Commands {
    /// Transform a scan into a (qx, qy, qz, intensity) point cloud CSV
    Process {
        #[command(flatten)]
        scan: ScanArgs,
        /// Output CSV file
        #[arg(short, long, default_value = "points.csv")]
        output: PathBuf,
    },

    /// Grid a point cloud CSV onto a regular cuboid
    Grid {
        /// Point cloud CSV with qx,qy,qz,intensity columns
        points: PathBuf,
        /// Output CSV file
        #[arg(short, long, default_value = "grid.csv")]
        output: PathBuf,
        #[command(flatten)]
        grid: GridArgs,
    },

    /// Process a scan, grid it and write points, grid and a qz projection
    Run {
        #[command(flatten)]
        scan: ScanArgs,
        /// Output directory
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
        #[command(flatten)]
        grid: GridArgs,
        /// Skip the projection PNG
        #[arg(long)]
        no_plot: bool,
    },

    /// Grid a point cloud CSV and plot a projection as PNG
    Plot {
        /// Point cloud CSV with qx,qy,qz,intensity columns
        points: PathBuf,
        /// Output PNG file path (defaults to same name as input with .png extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Axis summed over: 0 qx, 1 qy, 2 qz
        #[arg(short, long, default_value_t = 2)]
        axis: usize,
        #[command(flatten)]
        grid: GridArgs,
    },

    /// Write the effective configuration as YAML
    InitConfig {
        /// Output YAML file
        #[arg(default_value = "rsm.yaml")]
        output: PathBuf,
    },
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Create a progress bar counting exposures
fn create_progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} exposures")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<62} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 39 {
            format!("{}...", value.chars().take(36).collect::<String>())
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<39} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    // Load config
    let config = match &cli.config {
        Some(path) => match PipelineConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                error!("Failed to load config from {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => PipelineConfig::default(),
    };

    // Dispatch to subcommands
    let outcome = match cli.command {
        Commands::Process { scan, output } => cmd_process(&scan, &output, config),
        Commands::Grid { points, output, grid } => cmd_grid(&points, &output, &grid, config),
        Commands::Run {
            scan,
            output_dir,
            grid,
            no_plot,
        } => cmd_run(&scan, &output_dir, &grid, no_plot, config),
        Commands::Plot {
            points,
            output,
            axis,
            grid,
        } => cmd_plot(&points, output, axis, &grid, config),
        Commands::InitConfig { output } => cmd_init_config(&output, &config),
    };

    if let Err(e) = outcome {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

/// Fold command-line overrides into the config file settings.
fn apply_scan_overrides(config: &mut PipelineConfig, scan: &ScanArgs) {
    if let Some(mode) = scan.mode {
        config.image.frame_mode = mode;
    }
    if let Some(roi) = &scan.roi {
        config.image.roi = Some([roi[0], roi[1], roi[2], roi[3]]);
    }
}

fn apply_grid_overrides(config: &mut PipelineConfig, grid: &GridArgs) {
    if let Some(bins) = &grid.bins {
        config.grid.bins = Some([bins[0], bins[1], bins[2]]);
    }
}

/// Transform the scan named by `scan` with the resolved config.
fn transform_scan(scan: &ScanArgs, config: &PipelineConfig) -> Result<PointCloud> {
    let settings = config.resolve_scan().context("invalid scan settings")?;
    let calculator = match config.sample.ub().context("invalid sample description")? {
        Some(ub) => SixCircle::with_ub(ub).context("invalid UB matrix")?,
        None => {
            if settings.frame_mode == FrameMode::Hkl {
                warn!("hkl frame requested without sample.lattice or sample.ub_matrix");
            }
            SixCircle::new()
        }
    };

    let source = FileScan::load(&scan.scan_table, &scan.dark, scan.wavelength)
        .with_context(|| format!("failed to load scan {}", scan.scan_table.display()))?;

    println!("Processing scan...");
    println!("Input: {}", scan.scan_table.display());
    println!("Exposures: {}", source.num_exposures());
    println!("Frame: {}", settings.frame_mode);

    let pb = create_progress_bar(source.num_exposures());
    let cloud = SetProcessor::new(&source, &calculator, &settings)
        .process_with_progress(|_| pb.inc(1));
    pb.finish_and_clear();

    cloud.with_context(|| format!("failed to process {}", source.label()))
}

fn grid_cloud(cloud: &PointCloud, config: &PipelineConfig) -> Result<GriddedVolume> {
    let options = config.grid.options().context("invalid grid options")?;
    grid_point_cloud(cloud, &options).context("gridding failed")
}

fn cmd_process(scan: &ScanArgs, output: &Path, mut config: PipelineConfig) -> Result<()> {
    let start = Instant::now();
    apply_scan_overrides(&mut config, scan);

    let cloud = transform_scan(scan, &config)?;
    write_point_cloud_csv(output, &cloud)?;

    print_summary(
        "Processing Complete",
        &[
            ("Scan table", scan.scan_table.display().to_string()),
            ("Output CSV", output.display().to_string()),
            ("Points", cloud.len().to_string()),
            ("Total intensity", format!("{:.4e}", cloud.total_intensity())),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
    Ok(())
}

fn cmd_grid(points: &Path, output: &Path, grid: &GridArgs, mut config: PipelineConfig) -> Result<()> {
    let start = Instant::now();
    apply_grid_overrides(&mut config, grid);

    let spinner = create_spinner("Loading point cloud...");
    let cloud = load_point_cloud_csv(points)
        .with_context(|| format!("failed to load {}", points.display()));
    let cloud = match cloud {
        Ok(c) => c,
        Err(e) => {
            spinner.finish_and_clear();
            return Err(e);
        }
    };

    spinner.set_message("Gridding...");
    let volume = grid_cloud(&cloud, &config);
    spinner.finish_and_clear();
    let volume = volume?;
    write_grid_csv(output, &volume)?;

    print_summary(
        "Gridding Complete",
        &[
            ("Input file", points.display().to_string()),
            ("Output CSV", output.display().to_string()),
            ("Bins", format!("{:?}", volume.spec.bins)),
            ("Points in grid", volume.points_in_grid().to_string()),
            ("Points outside", volume.out_of_bounds.to_string()),
            ("Empty cells", volume.empty_cells.to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
    Ok(())
}

fn cmd_run(
    scan: &ScanArgs,
    output_dir: &Path,
    grid: &GridArgs,
    no_plot: bool,
    mut config: PipelineConfig,
) -> Result<()> {
    let start = Instant::now();
    apply_scan_overrides(&mut config, scan);
    apply_grid_overrides(&mut config, grid);

    let cloud = transform_scan(scan, &config)?;
    let points_path = output_dir.join("points.csv");
    write_point_cloud_csv(&points_path, &cloud)?;

    let volume = grid_cloud(&cloud, &config)?;
    let grid_path = output_dir.join("grid.csv");
    write_grid_csv(&grid_path, &volume)?;

    let plot_path = output_dir.join("projection_qz.png");
    let plot = if no_plot {
        "skipped".to_string()
    } else {
        match plot_projection(&plot_path, &volume, 2) {
            Ok(()) => plot_path.display().to_string(),
            Err(e) => {
                warn!("Projection plot failed: {}", e);
                "failed".to_string()
            }
        }
    };

    print_summary(
        "Pipeline Complete",
        &[
            ("Scan table", scan.scan_table.display().to_string()),
            ("Points CSV", points_path.display().to_string()),
            ("Grid CSV", grid_path.display().to_string()),
            ("Projection", plot),
            ("Points", cloud.len().to_string()),
            ("Points outside", volume.out_of_bounds.to_string()),
            ("Empty cells", volume.empty_cells.to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
    Ok(())
}

fn cmd_plot(
    points: &Path,
    output: Option<PathBuf>,
    axis: usize,
    grid: &GridArgs,
    mut config: PipelineConfig,
) -> Result<()> {
    let start = Instant::now();
    apply_grid_overrides(&mut config, grid);

    // Determine output path (default to same name as input with .png extension)
    let output_path = output.unwrap_or_else(|| points.with_extension("png"));

    let spinner = create_spinner("Loading point cloud...");
    let volume = load_point_cloud_csv(points)
        .with_context(|| format!("failed to load {}", points.display()))
        .and_then(|cloud| {
            spinner.set_message("Gridding...");
            grid_cloud(&cloud, &config)
        })
        .and_then(|volume| {
            spinner.set_message("Generating plot...");
            plot_projection(&output_path, &volume, axis)?;
            Ok(volume)
        });
    spinner.finish_and_clear();
    let volume = volume?;

    print_summary(
        "Visualization Complete",
        &[
            ("Input file", points.display().to_string()),
            ("Output PNG", output_path.display().to_string()),
            ("Projection axis", axis.to_string()),
            ("Points in grid", volume.points_in_grid().to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
    Ok(())
}

fn cmd_init_config(output: &Path, config: &PipelineConfig) -> Result<()> {
    config
        .to_yaml(output)
        .with_context(|| format!("failed to write {}", output.display()))?;
    println!("Wrote configuration to {}", output.display());
    Ok(())
}
