extern crate log;
pub mod config;
pub mod crs;
pub mod db;
pub mod dem;
pub mod dirs;
pub mod error;
pub mod geofile;
pub mod pointcloud;
pub mod sewers;
use crate::config::Config;
use crate::db::loader::load_sewers;
use crate::db::store::MongoStore;
use crate::dem::pipeline::prepare_dem;
use crate::pointcloud::pipeline::prepare_point_cloud;
use crate::sewers::pipeline::prepare_sewers;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Prepare survey data (sewers, elevation models, point clouds) for a 3D web client.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert sewer shapefiles to GeoJSON with bounding box files.
    PrepareSewers {
        /// Path to the input config file.
        #[arg(short, long)]
        config_filepath: PathBuf,
    },
    /// Load prepared sewer files into the database.
    LoadSewers {
        /// Path to the input config file.
        #[arg(short, long)]
        config_filepath: PathBuf,
    },
    /// Convert gzipped XYZ grids to GeoTIFF DEMs at several resolutions.
    PrepareDem {
        /// Path to the input config file.
        #[arg(short, long)]
        config_filepath: PathBuf,
    },
    /// Convert E57 point cloud captures to LAS files in WGS84.
    PreparePointCloud {
        /// Path to the input config file.
        #[arg(short, long)]
        config_filepath: PathBuf,
    },
}

fn try_main() -> anyhow::Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    env_logger::init();

    let args = Args::try_parse()?;
    match args.command {
        Command::PrepareSewers { config_filepath } => {
            let config = Config::from_file(&config_filepath)?;
            prepare_sewers(&config.sewers)?;
        }
        Command::LoadSewers { config_filepath } => {
            let config = Config::from_file(&config_filepath)?;
            let database = config.database()?;
            let input_dir = database
                .input_dir
                .clone()
                .unwrap_or_else(|| config.sewers.output_dir.clone());
            let store = MongoStore::connect(database)?;
            let reports = load_sewers(&store, &database.collection, &input_dir)?;
            let num_failures: usize = reports.iter().map(|report| report.failures.len()).sum();
            log::info!(
                "Loaded {} files, {} features could not be inserted",
                reports.len(),
                num_failures
            );
        }
        Command::PrepareDem { config_filepath } => {
            let config = Config::from_file(&config_filepath)?;
            prepare_dem(config.dem()?)?;
        }
        Command::PreparePointCloud { config_filepath } => {
            let config = Config::from_file(&config_filepath)?;
            prepare_point_cloud(config.point_cloud()?)?;
        }
    }
    Ok(())
}

fn main() {
    if let Err(e) = try_main() {
        eprintln!("Error: {:?}", e);
        std::process::exit(1)
    }
}
