use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use demprep::formats::{read_geo_info, read_geotiff};
use demprep::pipeline::TracingObserver;
use demprep::{fit, Dimensions, Pipeline, PipelineConfig, Result};

#[derive(Parser, Debug)]
#[command(name = "demprep")]
#[command(about = "Prepare DEM, mask and imagery artifacts for terrain rendering")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full pipeline
    Run {
        /// Pipeline configuration (YAML)
        #[arg(short, long, default_value = "demprep.yaml")]
        config: PathBuf,
    },
    /// Fetch only the imagery for the configured AOI
    Imagery {
        #[arg(short, long, default_value = "demprep.yaml")]
        config: PathBuf,
        /// Requested width; fitted from the clipped DEM when omitted
        #[arg(long, requires = "height")]
        width: Option<u32>,
        #[arg(long, requires = "width")]
        height: Option<u32>,
    },
    /// Print the request size fitted to imagery provider limits
    Fit {
        width: u32,
        height: u32,
        #[arg(long, default_value = "10000000")]
        max_pixels: u64,
        #[arg(long, default_value = "2500")]
        max_dim: u32,
    },
    /// Print grid, bands and georeferencing of a GeoTIFF
    Info { raster: PathBuf },
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    let args = Args::parse();
    match execute(args.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(kind = ?err.kind(), "{}", err);
            ExitCode::FAILURE
        }
    }
}

fn execute(command: Command) -> Result<()> {
    match command {
        Command::Run { config } => {
            let config = PipelineConfig::load(&config)?;
            let report = Pipeline::from_config(&config)?.run()?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Imagery { config, width, height } => {
            let config = PipelineConfig::load(&config)?;
            let size = width.zip(height).map(|(w, h)| Dimensions::new(w, h));
            let report = Pipeline::from_config(&config)?.fetch_imagery(size, &mut TracingObserver)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Fit { width, height, max_pixels, max_dim } => {
            let dims = fit(width, height, max_pixels, max_dim);
            println!("{} x {} = {} pixels", dims.width, dims.height, dims.pixel_count());
        }
        Command::Info { raster } => print_info(&raster)?,
    }
    Ok(())
}

fn print_info(path: &Path) -> Result<()> {
    let dataset = read_geotiff(path)?;
    let bounds = dataset.bounds();
    let [a, b, c, d, e, f] = dataset.transform().coeffs();

    println!("{}", path.display());
    println!("  Size: {} x {}", dataset.width(), dataset.height());
    println!("  Bands: {}", dataset.band_count());
    println!("  Data Type: {}", dataset.data_type().name());
    println!("  CRS: {}", dataset.crs());
    println!("  Transform: [{}, {}, {}, {}, {}, {}]", a, b, c, d, e, f);
    println!("  Bounding Box:");
    println!("    Min: ({}, {})", bounds.min_x, bounds.min_y);
    println!("    Max: ({}, {})", bounds.max_x, bounds.max_y);
    match dataset.nodata() {
        Some(nodata) => println!("  NoData: {}", nodata),
        None => println!("  NoData: none"),
    }
    println!();
    print!("{}", read_geo_info(path)?);
    Ok(())
}
